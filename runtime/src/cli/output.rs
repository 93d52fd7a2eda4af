//! Terminal output helpers shared by every subcommand.
//!
//! Global flags are exported by `main` as `QUOTESHOT_*` environment
//! variables so any module can check them without threading them through.

use serde::Serialize;

fn flag(name: &str) -> bool {
    std::env::var(name).map(|v| v == "1").unwrap_or(false)
}

pub fn is_json() -> bool {
    flag("QUOTESHOT_JSON")
}

pub fn is_quiet() -> bool {
    flag("QUOTESHOT_QUIET")
}

pub fn no_color() -> bool {
    flag("QUOTESHOT_NO_COLOR") || std::env::var_os("NO_COLOR").is_some()
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("  Error: failed to serialize output: {e}"),
    }
}

/// Status symbols, colored unless color is disabled.
pub struct Styled {
    color: bool,
}

impl Styled {
    pub fn new() -> Self {
        Self { color: !no_color() }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn ok_sym(&self) -> String {
        self.paint("32", "[OK]")
    }

    pub fn warn_sym(&self) -> String {
        self.paint("33", "[!!]")
    }

    pub fn fail_sym(&self) -> String {
        self.paint("31", "[FAIL]")
    }

    pub fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }

    pub fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_symbols() {
        let s = Styled { color: false };
        assert_eq!(s.ok_sym(), "[OK]");
        assert_eq!(s.bold("x"), "x");
    }

    #[test]
    fn test_colored_symbols() {
        let s = Styled { color: true };
        assert_eq!(s.warn_sym(), "\x1b[33m[!!]\x1b[0m");
    }
}
