//! Command implementations for the CLI binaries.
//!
//! Each module contains the full implementation for a command; the thin
//! binaries in `src/bin/` just call its `main()`.

pub mod check;
pub mod format;
