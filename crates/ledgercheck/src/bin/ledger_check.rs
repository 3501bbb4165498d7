//! `ledger-check` — validate a ledger file.

fn main() -> std::process::ExitCode {
    ledgercheck::cmd::check::main()
}
