//! Thin CLI tools for the ledger format.
//!
//! This crate provides exactly the two collaborator entry points described
//! by the core's external interface: `ledger-check` validates a file,
//! `ledger-format` pretty-prints one. Everything beyond single-file
//! parse -> validate/format -> print (multi-file loading, plugins, queries,
//! reporting) lives outside this crate's scope.
//!
//! # Example Usage
//!
//! ```bash
//! ledger-check ledger.beancount
//! ledger-format ledger.beancount
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cmd;
pub mod render;
