// Copyright 2026 Quoteshot Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use quoteshot::cli;
use quoteshot::cli::capture_cmd::CaptureArgs;
use quoteshot::extract::body_scan::DEFAULT_SCAN_LIMIT;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "quoteshot",
    about = "Quoteshot — batch quote extraction and full-page capture",
    version,
    after_help = "Run 'quoteshot <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Visit every URL in a manifest, extract quote fields and screenshot each page
    Capture {
        /// Input manifest (.csv/.tsv table with a url column, or one URL per line)
        #[arg(long, short)]
        input: PathBuf,
        /// Root directory for run output
        #[arg(long, short, default_value = "output")]
        out: PathBuf,
        /// Browser viewport as WIDTHxHEIGHT
        #[arg(long, default_value = "1366x768")]
        viewport: String,
        /// Settle delay after navigation, in milliseconds
        #[arg(long, default_value = "1500")]
        delay: u64,
        /// Navigation timeout, in milliseconds
        #[arg(long, default_value = "45000")]
        timeout: u64,
        /// Visibility wait per selector candidate, in milliseconds
        #[arg(long, default_value = "1500")]
        selector_wait: u64,
        /// Visibility wait per consent-button candidate, in milliseconds
        #[arg(long, default_value = "0")]
        consent_wait: u64,
        /// IANA timezone for captured_at_local (e.g. "Europe/Rome")
        #[arg(long, default_value = "UTC")]
        tz: String,
        /// JSON rule file layered over the built-in rule table
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Number of browser tabs working in parallel
        #[arg(long, default_value = "1")]
        workers: usize,
        /// Explicit Chromium/Chrome binary
        #[arg(long)]
        chromium_path: Option<PathBuf>,
        /// Maximum characters of body text scanned by the fallback
        #[arg(long, default_value_t = DEFAULT_SCAN_LIMIT)]
        body_scan_limit: usize,
    },
    /// Print the effective extraction rule table
    Rules {
        /// JSON rule file layered over the built-in rule table
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Show a single domain only
        #[arg(long)]
        domain: Option<String>,
    },
    /// Check environment and diagnose issues
    Doctor {
        /// JSON rule file to validate alongside the built-in table
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "quoteshot=debug" } else { "quoteshot=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_ansi(!cli::output::no_color()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("QUOTESHOT_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("QUOTESHOT_QUIET", "1");
    }
    if cli.no_color {
        std::env::set_var("QUOTESHOT_NO_COLOR", "1");
    }
    init_tracing(cli.verbose, cli.json);

    let result = match cli.command {
        Commands::Capture {
            input,
            out,
            viewport,
            delay,
            timeout,
            selector_wait,
            consent_wait,
            tz,
            rules,
            workers,
            chromium_path,
            body_scan_limit,
        } => {
            let args = CaptureArgs {
                input,
                out,
                viewport,
                delay_ms: delay,
                timeout_ms: timeout,
                selector_wait_ms: selector_wait,
                consent_wait_ms: consent_wait,
                tz,
                rules,
                workers,
                chromium_path,
                body_scan_limit,
            };
            cli::capture_cmd::run(&args).await
        }
        Commands::Rules { rules, domain } => {
            cli::rules_cmd::run(rules.as_deref(), domain.as_deref()).await
        }
        Commands::Doctor { rules } => cli::doctor::run(rules.as_deref()).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "quoteshot", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() && !cli::output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}
