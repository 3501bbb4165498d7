//! `ledger-format` — pretty-print a ledger file.

fn main() -> std::process::ExitCode {
    ledgercheck::cmd::format::main()
}
