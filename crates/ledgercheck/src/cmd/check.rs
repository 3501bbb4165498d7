//! Implementation for the `ledger-check` command.

use crate::render;
use anyhow::{Context, Result};
use clap::Parser;
use ledgercheck_booking::interpolate;
use ledgercheck_core::Directive;
use ledgercheck_validate::validate;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

/// Validate a ledger file and report errors.
#[derive(Parser, Debug)]
#[command(name = "ledger-check", author, version, about, long_about = None)]
pub struct Args {
    /// The ledger file to check.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Show verbose output including timing information.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all diagnostic output (rely on the exit code only).
    #[arg(short, long)]
    pub quiet: bool,
}

struct CheckOutcome {
    diagnostics: String,
    error_count: usize,
}

fn run(args: &Args) -> Result<CheckOutcome> {
    let start = std::time::Instant::now();

    if !args.file.exists() {
        anyhow::bail!("file not found: {}", args.file.display());
    }

    let source = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let filename = args.file.display().to_string();

    tracing::debug!(file = %filename, "parse start");
    let parse_result = ledgercheck_parser::parse(&source);
    tracing::debug!(
        directives = parse_result.directives.len(),
        errors = parse_result.errors.len(),
        "parse end"
    );

    let mut out = String::new();
    for err in &parse_result.errors {
        out.push_str(&render::render_parse_error(&filename, &source, err));
        out.push('\n');
    }

    let mut directives: Vec<Directive> = parse_result
        .directives
        .iter()
        .map(|s| s.value.clone())
        .collect();

    let mut interpolation_errors = 0usize;
    for directive in &mut directives {
        if let Directive::Transaction(txn) = directive {
            match interpolate(txn) {
                Ok(result) => *txn = result.transaction,
                Err(e) => {
                    interpolation_errors += 1;
                    out.push_str(&format!(
                        "{filename}: {e} ({}, \"{}\")\n\n",
                        txn.date, txn.narration
                    ));
                }
            }
        }
    }

    tracing::debug!("validation start");
    let validation_errors = validate(&directives);
    tracing::debug!(count = validation_errors.len(), "validation end");

    let mut claimed = vec![false; parse_result.directives.len()];
    let semantic_error_count = validation_errors
        .iter()
        .filter(|e| !e.code.is_warning())
        .count();

    for verr in &validation_errors {
        out.push_str(&render::render_validation_error(
            &filename,
            &source,
            &parse_result.directives,
            &mut claimed,
            verr,
        ));
        out.push('\n');
    }

    let error_count = parse_result.errors.len() + interpolation_errors + semantic_error_count;
    out.push_str(&render::render_summary(error_count));
    out.push('\n');

    if args.verbose {
        out.push_str(&format!(
            "\nChecked in {:.2}ms\n",
            start.elapsed().as_secs_f64() * 1000.0
        ));
    }

    Ok(CheckOutcome {
        diagnostics: out,
        error_count,
    })
}

/// Main entry point for the check command.
pub fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();
    }

    match run(&args) {
        Ok(outcome) => {
            if !args.quiet {
                eprint!("{}", outcome.diagnostics);
            }
            if outcome.error_count > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
