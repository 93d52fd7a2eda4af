//! Environment readiness check.

use crate::cli::output::{self, Styled};
use crate::extract::rules::RuleBook;
use crate::renderer::chromium::find_chromium;
use anyhow::Result;
use std::path::Path;
use std::process::Command;

/// Check Chromium availability, the rule table and available memory.
pub async fn run(rules_path: Option<&Path>) -> Result<()> {
    let chromium_path = find_chromium();
    let rules = RuleBook::load(rules_path);
    let mem_mb = get_available_memory_mb();
    let ready = chromium_path.is_some() && rules.is_ok();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium_path,
            "rules": match &rules {
                Ok(book) => serde_json::json!({ "ok": true, "domains": book.domains().len() }),
                Err(e) => serde_json::json!({ "ok": false, "error": format!("{e:#}") }),
            },
            "available_memory_mb": mem_mb,
            "ready": ready,
        }));
        return Ok(());
    }

    let s = Styled::new();
    println!("Quoteshot Doctor");
    println!("================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium_path {
        Some(path) => println!("{} Chromium found: {}", s.ok_sym(), path.display()),
        None => println!(
            "{} Chromium NOT found. Install Chrome/Chromium or set QUOTESHOT_CHROMIUM_PATH.",
            s.warn_sym()
        ),
    }

    match &rules {
        Ok(book) => println!(
            "{} Rule table loaded ({} domain(s))",
            s.ok_sym(),
            book.domains().len()
        ),
        Err(e) => println!("{} Rule table failed to load: {e:#}", s.fail_sym()),
    }

    match mem_mb {
        Some(mb) if mb >= 256 => println!("{} Available memory: {mb}MB (>= 256MB required)", s.ok_sym()),
        Some(mb) => println!(
            "{} Available memory: {mb}MB (< 256MB, may be insufficient)",
            s.warn_sym()
        ),
        None => println!("[??] Could not determine available memory"),
    }

    println!();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}

/// Get available memory in MB (platform-specific).
fn get_available_memory_mb() -> Option<u64> {
    #[cfg(target_os = "macos")]
    {
        let output = Command::new("sysctl")
            .args(["-n", "hw.memsize"])
            .output()
            .ok()?;
        let s = String::from_utf8_lossy(&output.stdout);
        let bytes: u64 = s.trim().parse().ok()?;
        Some(bytes / 1_048_576)
    }
    #[cfg(target_os = "linux")]
    {
        let output = Command::new("free").args(["-m"]).output().ok()?;
        let s = String::from_utf8_lossy(&output.stdout);
        s.lines()
            .find(|line| line.starts_with("Mem:"))
            .and_then(|line| line.split_whitespace().nth(6))
            .and_then(|avail| avail.parse().ok())
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}
