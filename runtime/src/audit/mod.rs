//! Append-only audit trail of a run.

pub mod logger;
