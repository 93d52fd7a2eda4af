// Copyright 2026 Quoteshot Contributors
// SPDX-License-Identifier: Apache-2.0

//! Quoteshot runtime library — batch quote extraction and page capture.
//!
//! Visits a list of market-data pages in a headless browser, extracts a small
//! set of quote fields through a selector → URL fragment → body text cascade,
//! captures a full-page screenshot of each and writes CSV/JSON reports.

pub mod audit;
pub mod cli;
pub mod config;
pub mod extract;
pub mod manifest;
pub mod pipeline;
pub mod progress;
pub mod renderer;
