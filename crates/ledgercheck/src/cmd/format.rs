//! Implementation for the `ledger-format` command.

use anyhow::{Context, Result};
use clap::Parser;
use ledgercheck_core::FormatConfig;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Format a ledger file.
#[derive(Parser, Debug)]
#[command(name = "ledger-format", author, version, about, long_about = None)]
pub struct Args {
    /// The ledger file(s) to format.
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Output file (only valid with a single input file, default: stdout).
    #[arg(short = 'o', long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Format file(s) in place.
    #[arg(short = 'i', long)]
    pub in_place: bool,

    /// Check if the file is already formatted (exit 1 if not).
    #[arg(long)]
    pub check: bool,

    /// Column to align currencies at (same as `--currency-column`).
    #[arg(short = 'c', long = "currency-column", default_value = "60")]
    pub column: usize,

    /// Number of spaces for posting indentation (default: 2).
    #[arg(long, default_value = "2")]
    pub indent: usize,

    /// Show verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

fn run(args: &Args) -> Result<ExitCode> {
    if args.output.is_some() && args.files.len() > 1 {
        anyhow::bail!(
            "--output can only be used with a single input file. Use --in-place for multiple files."
        );
    }
    if args.output.is_some() && args.in_place {
        anyhow::bail!("--output and --in-place cannot be used together");
    }

    let mut any_needs_formatting = false;
    for file in &args.files {
        if format_file(file, args)? == ExitCode::from(1) {
            any_needs_formatting = true;
        }
    }

    if args.check && any_needs_formatting {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn render(original: &str, config: &FormatConfig) -> Result<String> {
    let parse_result = ledgercheck_parser::parse(original);
    if !parse_result.errors.is_empty() {
        for err in &parse_result.errors {
            eprintln!("error: {err}");
        }
        anyhow::bail!("file has parse errors, cannot format");
    }

    Ok(ledgercheck_parser::format_with_trivia(
        original,
        &parse_result,
        config,
    ))
}

fn format_file(file: &PathBuf, args: &Args) -> Result<ExitCode> {
    if !file.exists() {
        anyhow::bail!("file not found: {}", file.display());
    }

    let original = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let config = FormatConfig::new(args.column, args.indent);
    let formatted = render(&original, &config)?;

    if args.check {
        if formatted.trim_end() == original.trim_end() {
            if args.verbose {
                eprintln!("File is already formatted: {}", file.display());
            }
            Ok(ExitCode::SUCCESS)
        } else {
            if args.verbose {
                eprintln!("File needs formatting: {}", file.display());
            }
            Ok(ExitCode::from(1))
        }
    } else if args.in_place {
        fs::write(file, &formatted)
            .with_context(|| format!("failed to write {}", file.display()))?;
        if args.verbose {
            eprintln!("Formatted: {}", file.display());
        }
        Ok(ExitCode::SUCCESS)
    } else if let Some(ref output_path) = args.output {
        fs::write(output_path, &formatted)
            .with_context(|| format!("failed to write {}", output_path.display()))?;
        if args.verbose {
            eprintln!("Formatted {} -> {}", file.display(), output_path.display());
        }
        Ok(ExitCode::SUCCESS)
    } else {
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(formatted.as_bytes())
            .context("failed to write to stdout")?;
        Ok(ExitCode::SUCCESS)
    }
}

/// Main entry point for the format command.
pub fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
