//! Beancount validation rules.
//!
//! This crate implements validation checks for beancount ledgers:
//!
//! - Account lifecycle (opened before use, not used after close)
//! - Balance assertions
//! - Transaction balancing
//! - Currency constraints
//! - Booking validation (lot matching, sufficient units)
//!
//! # Error Codes
//!
//! Error codes are grouped by category, each with a stable numeric code:
//!
//! | Code | Description |
//! |------|-------------|
//! | E1001 | Account not opened |
//! | E1002 | Account already open |
//! | E1003 | Account already closed |
//! | E1004 | Account close with non-zero balance |
//! | E1005 | Invalid account name |
//! | E2001 | Balance assertion failed |
//! | E2003 | Pad without subsequent balance |
//! | E2004 | Multiple pads for same balance |
//! | E3001 | Transaction does not balance |
//! | E3002 | Multiple missing amounts in transaction |
//! | E3003 | Transaction has no postings |
//! | E3004 | Transaction has single posting (warning) |
//! | E4001 | No matching lot for reduction |
//! | E4002 | Insufficient units in lot |
//! | E4003 | Ambiguous lot match |
//! | E4004 | Reduction would create negative inventory |
//! | E5001 | Currency not declared |
//! | E5002 | Currency not allowed in account |
//! | E6001 | Duplicate metadata key |
//! | E6002 | Invalid metadata value |
//! | E7001 | Unknown option |
//! | E7002 | Invalid option value |
//! | E7003 | Duplicate option |
//! | E8001 | Document file not found |
//! | E10001 | Date out of order (info) |
//! | E10002 | Entry dated in the future (warning) |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use ledgercheck_core::{
    Amount, Balance, BookingMethod, Close, Directive, Document, IncompleteAmount, Inventory,
    Open, Pad, Position, Transaction,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Validation error codes.
///
/// Each variant maps to a stable, documented code string (see [`ErrorCode::code`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // === Account Errors (E1xxx) ===
    /// E1001: Account used before it was opened.
    AccountNotOpen,
    /// E1002: Account already open (duplicate open directive).
    AccountAlreadyOpen,
    /// E1003: Account used after it was closed.
    AccountClosed,
    /// E1004: Account close with non-zero balance.
    AccountCloseNotEmpty,
    /// E1005: Invalid account name.
    InvalidAccountName,

    // === Balance Errors (E2xxx) ===
    /// E2001: Balance assertion failed.
    BalanceAssertionFailed,
    /// E2003: Pad without subsequent balance assertion.
    PadWithoutBalance,
    /// E2004: Multiple pads for same balance assertion.
    MultiplePadForBalance,

    // === Transaction Errors (E3xxx) ===
    /// E3001: Transaction does not balance.
    TransactionUnbalanced,
    /// E3002: Multiple postings missing amounts for same currency.
    MultipleInterpolation,
    /// E3003: Transaction has no postings.
    NoPostings,
    /// E3004: Transaction has single posting (warning).
    SinglePosting,

    // === Booking Errors (E4xxx) ===
    /// E4001: No matching lot for reduction.
    NoMatchingLot,
    /// E4002: Insufficient units in lot for reduction.
    InsufficientUnits,
    /// E4003: Ambiguous lot match in STRICT mode.
    AmbiguousLotMatch,
    /// E4004: Reduction would create negative inventory.
    NegativeInventory,

    // === Currency Errors (E5xxx) ===
    /// E5001: Currency not declared (when strict mode enabled).
    UndeclaredCurrency,
    /// E5002: Currency not allowed in account.
    CurrencyNotAllowed,

    // === Metadata Errors (E6xxx) ===
    /// E6001: Duplicate metadata key.
    DuplicateMetadataKey,
    /// E6002: Invalid metadata value type.
    InvalidMetadataValue,

    // === Option Errors (E7xxx) ===
    /// E7001: Unknown option name.
    UnknownOption,
    /// E7002: Invalid option value.
    InvalidOptionValue,
    /// E7003: Duplicate non-repeatable option.
    DuplicateOption,

    // === Document Errors (E8xxx) ===
    /// E8001: Document file not found.
    DocumentNotFound,

    // === Date Errors (E10xxx) ===
    /// E10001: Date out of order (info only).
    DateOutOfOrder,
    /// E10002: Entry dated in the future (warning).
    FutureDate,
}

impl ErrorCode {
    /// Get the error code string (e.g., "E1001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            // Account errors
            Self::AccountNotOpen => "E1001",
            Self::AccountAlreadyOpen => "E1002",
            Self::AccountClosed => "E1003",
            Self::AccountCloseNotEmpty => "E1004",
            Self::InvalidAccountName => "E1005",
            // Balance errors
            Self::BalanceAssertionFailed => "E2001",
            Self::PadWithoutBalance => "E2003",
            Self::MultiplePadForBalance => "E2004",
            // Transaction errors
            Self::TransactionUnbalanced => "E3001",
            Self::MultipleInterpolation => "E3002",
            Self::NoPostings => "E3003",
            Self::SinglePosting => "E3004",
            // Booking errors
            Self::NoMatchingLot => "E4001",
            Self::InsufficientUnits => "E4002",
            Self::AmbiguousLotMatch => "E4003",
            Self::NegativeInventory => "E4004",
            // Currency errors
            Self::UndeclaredCurrency => "E5001",
            Self::CurrencyNotAllowed => "E5002",
            // Metadata errors
            Self::DuplicateMetadataKey => "E6001",
            Self::InvalidMetadataValue => "E6002",
            // Option errors
            Self::UnknownOption => "E7001",
            Self::InvalidOptionValue => "E7002",
            Self::DuplicateOption => "E7003",
            // Document errors
            Self::DocumentNotFound => "E8001",
            // Date errors
            Self::DateOutOfOrder => "E10001",
            Self::FutureDate => "E10002",
        }
    }

    /// Check if this is a warning (not an error).
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::FutureDate
                | Self::SinglePosting
                | Self::AccountCloseNotEmpty
                | Self::DateOutOfOrder
        )
    }

    /// Check if this is just informational.
    #[must_use]
    pub const fn is_info(&self) -> bool {
        matches!(self, Self::DateOutOfOrder)
    }

    /// Get the severity level.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        if self.is_info() {
            Severity::Info
        } else if self.is_warning() {
            Severity::Warning
        } else {
            Severity::Error
        }
    }
}

/// Severity level for validation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Ledger is invalid.
    Error,
    /// Suspicious but valid.
    Warning,
    /// Informational only.
    Info,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A validation error.
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct ValidationError {
    /// Error code.
    pub code: ErrorCode,
    /// Error message.
    pub message: String,
    /// Date of the directive that caused the error.
    pub date: NaiveDate,
    /// Additional context.
    pub context: Option<String>,
}

impl ValidationError {
    /// Create a new validation error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            code,
            message: message.into(),
            date,
            context: None,
        }
    }

    /// Add context to this error.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Account state for tracking lifecycle.
#[derive(Debug, Clone)]
struct AccountState {
    /// Date opened.
    opened: NaiveDate,
    /// Date closed (if closed).
    closed: Option<NaiveDate>,
    /// Allowed currencies (empty = any).
    currencies: HashSet<String>,
    /// Booking method (stored for future use in booking validation).
    #[allow(dead_code)]
    booking: BookingMethod,
}

/// Validation options.
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Whether to require commodity declarations.
    pub require_commodities: bool,
    /// Whether to check if document files exist.
    pub check_documents: bool,
    /// Whether to warn about future-dated entries.
    pub warn_future_dates: bool,
    /// Base directory for resolving relative document paths.
    pub document_base: Option<std::path::PathBuf>,
}

/// Pending pad directive info.
#[derive(Debug, Clone)]
struct PendingPad {
    /// Source account for padding.
    source_account: String,
    /// Date of the pad directive.
    date: NaiveDate,
}

/// Ledger state for validation.
#[derive(Debug, Default)]
pub struct LedgerState {
    /// Account states.
    accounts: HashMap<String, AccountState>,
    /// Account inventories.
    inventories: HashMap<String, Inventory>,
    /// Declared commodities.
    commodities: HashSet<String>,
    /// Pending pad directives (account -> list of pads).
    pending_pads: HashMap<String, Vec<PendingPad>>,
    /// Validation options.
    options: ValidationOptions,
    /// Track previous directive date for out-of-order detection.
    last_date: Option<NaiveDate>,
}

impl LedgerState {
    /// Create a new ledger state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new ledger state with options.
    #[must_use]
    pub fn with_options(options: ValidationOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    /// Set whether to require commodity declarations.
    pub fn set_require_commodities(&mut self, require: bool) {
        self.options.require_commodities = require;
    }

    /// Set whether to check document files.
    pub fn set_check_documents(&mut self, check: bool) {
        self.options.check_documents = check;
    }

    /// Set whether to warn about future dates.
    pub fn set_warn_future_dates(&mut self, warn: bool) {
        self.options.warn_future_dates = warn;
    }

    /// Set the document base directory.
    pub fn set_document_base(&mut self, base: impl Into<std::path::PathBuf>) {
        self.options.document_base = Some(base.into());
    }

    /// Get the inventory for an account.
    #[must_use]
    pub fn inventory(&self, account: &str) -> Option<&Inventory> {
        self.inventories.get(account)
    }

    /// Get all account names.
    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }
}

/// Validate a stream of directives.
///
/// Returns a list of validation errors found.
pub fn validate(directives: &[Directive]) -> Vec<ValidationError> {
    validate_with_options(directives, ValidationOptions::default())
}

/// Validate a stream of directives with custom options.
///
/// Returns a list of validation errors and warnings found.
pub fn validate_with_options(
    directives: &[Directive],
    options: ValidationOptions,
) -> Vec<ValidationError> {
    let mut state = LedgerState::with_options(options);
    let mut errors = Vec::new();

    let today = Local::now().date_naive();

    // Sort directives by date
    let mut sorted: Vec<&Directive> = directives.iter().collect();
    sorted.sort_by_key(|d| d.date());

    for directive in sorted {
        let date = directive.date();

        // Check for date ordering (info only - we sort anyway)
        if let Some(last) = state.last_date {
            if date < last {
                errors.push(ValidationError::new(
                    ErrorCode::DateOutOfOrder,
                    format!("Directive date {date} is before previous directive {last}"),
                    date,
                ));
            }
        }
        state.last_date = Some(date);

        // Check for future dates if enabled
        if state.options.warn_future_dates && date > today {
            errors.push(ValidationError::new(
                ErrorCode::FutureDate,
                format!("Entry dated in the future: {date}"),
                date,
            ));
        }

        match directive {
            Directive::Open(open) => {
                validate_open(&mut state, open, &mut errors);
            }
            Directive::Close(close) => {
                validate_close(&mut state, close, &mut errors);
            }
            Directive::Transaction(txn) => {
                validate_transaction(&mut state, txn, &mut errors);
            }
            Directive::Balance(bal) => {
                validate_balance(&mut state, bal, &mut errors);
            }
            Directive::Commodity(comm) => {
                state.commodities.insert(comm.currency.clone());
            }
            Directive::Pad(pad) => {
                validate_pad(&mut state, pad, &mut errors);
            }
            Directive::Document(doc) => {
                validate_document(&state, doc, &mut errors);
            }
            _ => {}
        }
    }

    // Check for unused pads (E2003)
    for (account, pads) in &state.pending_pads {
        for pad in pads {
            errors.push(
                ValidationError::new(
                    ErrorCode::PadWithoutBalance,
                    format!("Pad directive for {account} has no subsequent balance assertion"),
                    pad.date,
                )
                .with_context(format!("source account: {}", pad.source_account)),
            );
        }
    }

    errors
}

/// Valid account root types in beancount.
const VALID_ACCOUNT_ROOTS: &[&str] = &["Assets", "Liabilities", "Equity", "Income", "Expenses"];

/// Validate an account name according to beancount rules.
/// Returns None if valid, or Some(reason) if invalid.
fn validate_account_name(account: &str) -> Option<String> {
    if account.is_empty() {
        return Some("account name is empty".to_string());
    }

    let parts: Vec<&str> = account.split(':').collect();
    if parts.is_empty() {
        return Some("account name has no components".to_string());
    }

    // Check root account type
    let root = parts[0];
    if !VALID_ACCOUNT_ROOTS.contains(&root) {
        return Some(format!(
            "account must start with one of: {}",
            VALID_ACCOUNT_ROOTS.join(", ")
        ));
    }

    // Check each component
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            return Some(format!("component {} is empty", i + 1));
        }

        // First character must be uppercase letter or digit
        let first_char = part.chars().next().unwrap();
        if !first_char.is_ascii_uppercase() && !first_char.is_ascii_digit() {
            return Some(format!(
                "component '{part}' must start with uppercase letter or digit"
            ));
        }

        // Remaining characters: letters, numbers, dashes
        for c in part.chars().skip(1) {
            if !c.is_ascii_alphanumeric() && c != '-' {
                return Some(format!(
                    "component '{part}' contains invalid character '{c}'"
                ));
            }
        }
    }

    None // Valid
}

fn validate_open(state: &mut LedgerState, open: &Open, errors: &mut Vec<ValidationError>) {
    // Validate account name format
    if let Some(reason) = validate_account_name(&open.account) {
        errors.push(
            ValidationError::new(
                ErrorCode::InvalidAccountName,
                format!("Invalid account name \"{}\": {}", open.account, reason),
                open.date,
            )
            .with_context(open.account.clone()),
        );
        // Continue anyway to allow further validation
    }

    // Check if already open
    if let Some(existing) = state.accounts.get(&open.account) {
        errors.push(ValidationError::new(
            ErrorCode::AccountAlreadyOpen,
            format!(
                "Account {} is already open (opened on {})",
                open.account, existing.opened
            ),
            open.date,
        ));
        return;
    }

    let booking = open
        .booking
        .as_ref()
        .and_then(|b| b.parse::<BookingMethod>().ok())
        .unwrap_or_default();

    state.accounts.insert(
        open.account.clone(),
        AccountState {
            opened: open.date,
            closed: None,
            currencies: open.currencies.iter().cloned().collect(),
            booking,
        },
    );

    state
        .inventories
        .insert(open.account.clone(), Inventory::new());
}

fn validate_close(state: &mut LedgerState, close: &Close, errors: &mut Vec<ValidationError>) {
    match state.accounts.get_mut(&close.account) {
        Some(account_state) => {
            if account_state.closed.is_some() {
                errors.push(ValidationError::new(
                    ErrorCode::AccountClosed,
                    format!("Account {} already closed", close.account),
                    close.date,
                ));
            } else {
                // Check if account has non-zero balance (warning)
                if let Some(inv) = state.inventories.get(&close.account) {
                    if !inv.is_empty() {
                        let positions: Vec<String> = inv
                            .positions()
                            .iter()
                            .map(|p| format!("{} {}", p.units.number, p.units.currency))
                            .collect();
                        errors.push(
                            ValidationError::new(
                                ErrorCode::AccountCloseNotEmpty,
                                format!(
                                    "Cannot close account {} with non-zero balance",
                                    close.account
                                ),
                                close.date,
                            )
                            .with_context(format!("balance: {}", positions.join(", "))),
                        );
                    }
                }
                account_state.closed = Some(close.date);
            }
        }
        None => {
            errors.push(ValidationError::new(
                ErrorCode::AccountNotOpen,
                format!("Account {} was never opened", close.account),
                close.date,
            ));
        }
    }
}

fn validate_transaction(
    state: &mut LedgerState,
    txn: &Transaction,
    errors: &mut Vec<ValidationError>,
) {
    // Check transaction structure
    if txn.postings.is_empty() {
        errors.push(ValidationError::new(
            ErrorCode::NoPostings,
            "Transaction must have at least one posting".to_string(),
            txn.date,
        ));
        return; // No point checking further
    }

    if txn.postings.len() == 1 {
        errors.push(ValidationError::new(
            ErrorCode::SinglePosting,
            "Transaction has only one posting".to_string(),
            txn.date,
        ));
        // Continue validation - this is just a warning
    }

    // Check each posting
    for posting in &txn.postings {
        // Check account lifecycle
        match state.accounts.get(&posting.account) {
            Some(account_state) => {
                if txn.date < account_state.opened {
                    errors.push(ValidationError::new(
                        ErrorCode::AccountNotOpen,
                        format!(
                            "Account {} used on {} but not opened until {}",
                            posting.account, txn.date, account_state.opened
                        ),
                        txn.date,
                    ));
                }

                if let Some(closed) = account_state.closed {
                    if txn.date > closed {
                        errors.push(ValidationError::new(
                            ErrorCode::AccountClosed,
                            format!(
                                "Account {} used on {} but was closed on {}",
                                posting.account, txn.date, closed
                            ),
                            txn.date,
                        ));
                    }
                }

                // Check currency constraints (only for complete amounts)
                if let Some(units) = posting.amount() {
                    if !account_state.currencies.is_empty()
                        && !account_state.currencies.contains(&units.currency)
                    {
                        errors.push(ValidationError::new(
                            ErrorCode::CurrencyNotAllowed,
                            format!(
                                "Currency {} not allowed in account {}",
                                units.currency, posting.account
                            ),
                            txn.date,
                        ));
                    }

                    // Check commodity declaration
                    if state.options.require_commodities
                        && !state.commodities.contains(&units.currency)
                    {
                        errors.push(ValidationError::new(
                            ErrorCode::UndeclaredCurrency,
                            format!("Currency {} not declared", units.currency),
                            txn.date,
                        ));
                    }
                }
            }
            None => {
                errors.push(ValidationError::new(
                    ErrorCode::AccountNotOpen,
                    format!("Account {} was never opened", posting.account),
                    txn.date,
                ));
            }
        }
    }

    // Check transaction balance. Tolerance is computed per-currency from the
    // explicit amounts present (half the smallest decimal increment seen);
    // a currency with no explicit amount falls back to 0.005.
    let explicit_amounts: Vec<&Amount> = txn
        .postings
        .iter()
        .filter_map(|p| match &p.units {
            Some(IncompleteAmount::Complete(a)) => Some(a),
            _ => None,
        })
        .collect();
    let tolerances = ledgercheck_booking::calculate_tolerance(&explicit_amounts);

    let residuals = ledgercheck_booking::calculate_residual(txn);
    for (currency, residual) in residuals {
        let tolerance = tolerances
            .get(&currency)
            .copied()
            .unwrap_or_else(|| Decimal::new(5, 3));
        if residual.abs() > tolerance {
            errors.push(ValidationError::new(
                ErrorCode::TransactionUnbalanced,
                format!("Transaction does not balance: residual {residual} {currency}"),
                txn.date,
            ));
        }
    }

    // Update inventories with booking validation (only for complete amounts)
    for posting in &txn.postings {
        if let Some(units) = posting.amount() {
            if let Some(inv) = state.inventories.get_mut(&posting.account) {
                // Get booking method for this account
                let booking_method = state
                    .accounts
                    .get(&posting.account)
                    .map(|a| a.booking)
                    .unwrap_or_default();

                // Check if this is a reduction (negative units with cost)
                let is_reduction = units.number.is_sign_negative() && posting.cost.is_some();

                if is_reduction {
                    // For reductions, use booking to match against existing lots
                    // The reduce method expects negative amounts (opposite sign from positions)
                    let reduction_units = units.clone();

                    // Try to reduce from inventory
                    match inv.reduce(&reduction_units, posting.cost.as_ref(), booking_method) {
                        Ok(_) => {}
                        Err(ledgercheck_core::BookingError::InsufficientUnits {
                            requested,
                            available,
                            ..
                        }) => {
                            errors.push(
                                ValidationError::new(
                                    ErrorCode::InsufficientUnits,
                                    format!(
                                        "Insufficient units in {}: requested {}, available {}",
                                        posting.account, requested, available
                                    ),
                                    txn.date,
                                )
                                .with_context(format!("currency: {}", units.currency)),
                            );
                        }
                        Err(ledgercheck_core::BookingError::NoMatchingLot { currency, .. }) => {
                            errors.push(
                                ValidationError::new(
                                    ErrorCode::NoMatchingLot,
                                    format!(
                                        "No matching lot for {} in {}",
                                        currency, posting.account
                                    ),
                                    txn.date,
                                )
                                .with_context(format!("cost spec: {:?}", posting.cost)),
                            );
                        }
                        Err(ledgercheck_core::BookingError::AmbiguousMatch {
                            currency,
                            num_matches,
                        }) => {
                            errors.push(
                                ValidationError::new(
                                    ErrorCode::AmbiguousLotMatch,
                                    format!(
                                        "Ambiguous lot match for {}: {} lots match in {}",
                                        currency, num_matches, posting.account
                                    ),
                                    txn.date,
                                )
                                .with_context(
                                    "Specify cost, date, or label to disambiguate".to_string(),
                                ),
                            );
                        }
                        Err(ledgercheck_core::BookingError::CurrencyMismatch { .. }) => {
                            // This shouldn't happen in normal validation
                        }
                    }
                } else {
                    // For additions, just add the position
                    let position = if let Some(cost_spec) = &posting.cost {
                        if let Some(cost) = cost_spec.resolve(units.number, txn.date) {
                            ledgercheck_core::Position::with_cost(units.clone(), cost)
                        } else {
                            ledgercheck_core::Position::simple(units.clone())
                        }
                    } else {
                        ledgercheck_core::Position::simple(units.clone())
                    };

                    inv.add(position);
                }
            }
        }
    }
}

fn validate_pad(state: &mut LedgerState, pad: &Pad, errors: &mut Vec<ValidationError>) {
    // Check that the target account exists
    if !state.accounts.contains_key(&pad.account) {
        errors.push(ValidationError::new(
            ErrorCode::AccountNotOpen,
            format!("Pad target account {} was never opened", pad.account),
            pad.date,
        ));
        return;
    }

    // Check that the source account exists
    if !state.accounts.contains_key(&pad.source_account) {
        errors.push(ValidationError::new(
            ErrorCode::AccountNotOpen,
            format!("Pad source account {} was never opened", pad.source_account),
            pad.date,
        ));
        return;
    }

    // Add to pending pads list for this account
    let pending_pad = PendingPad {
        source_account: pad.source_account.clone(),
        date: pad.date,
    };
    state
        .pending_pads
        .entry(pad.account.clone())
        .or_default()
        .push(pending_pad);
}

fn validate_balance(state: &mut LedgerState, bal: &Balance, errors: &mut Vec<ValidationError>) {
    // Check account exists
    if !state.accounts.contains_key(&bal.account) {
        errors.push(ValidationError::new(
            ErrorCode::AccountNotOpen,
            format!("Account {} was never opened", bal.account),
            bal.date,
        ));
        return;
    }

    // Check if there are pending pads for this account
    if let Some(pending_pads) = state.pending_pads.remove(&bal.account) {
        // Check for multiple pads (E2004)
        if pending_pads.len() > 1 {
            errors.push(
                ValidationError::new(
                    ErrorCode::MultiplePadForBalance,
                    format!(
                        "Multiple pad directives for {} {} before balance assertion",
                        bal.account, bal.amount.currency
                    ),
                    bal.date,
                )
                .with_context(format!(
                    "pad dates: {}",
                    pending_pads
                        .iter()
                        .map(|p| p.date.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )),
            );
        }

        // Use the most recent pad
        if let Some(pending_pad) = pending_pads.last() {
            // Apply padding: calculate difference and add to both accounts
            if let Some(inv) = state.inventories.get(&bal.account) {
                let actual = inv.units(&bal.amount.currency);
                let expected = bal.amount.number;
                let difference = expected - actual;

                if difference != Decimal::ZERO {
                    // Add padding amount to target account
                    if let Some(target_inv) = state.inventories.get_mut(&bal.account) {
                        target_inv.add(Position::simple(Amount::new(
                            difference,
                            &bal.amount.currency,
                        )));
                    }

                    // Subtract padding amount from source account
                    if let Some(source_inv) = state.inventories.get_mut(&pending_pad.source_account)
                    {
                        source_inv.add(Position::simple(Amount::new(
                            -difference,
                            &bal.amount.currency,
                        )));
                    }
                } else {
                    // The balance already held without padding: the pad was
                    // unused (§4.3.4 "If needed == 0, mark the pad unused").
                    errors.push(
                        ValidationError::new(
                            ErrorCode::PadWithoutBalance,
                            format!(
                                "Pad directive for {} was not needed; balance already matched",
                                bal.account
                            ),
                            pending_pad.date,
                        )
                        .with_context(format!("source account: {}", pending_pad.source_account)),
                    );
                }
            }
        }
        // After padding, the balance should match (no error needed)
        return;
    }

    // Get inventory and check balance (no padding case)
    if let Some(inv) = state.inventories.get(&bal.account) {
        let actual = inv.units(&bal.amount.currency);
        let expected = bal.amount.number;
        let tolerance = bal.tolerance.unwrap_or(bal.amount.inferred_tolerance());

        if (actual - expected).abs() > tolerance {
            errors.push(
                ValidationError::new(
                    ErrorCode::BalanceAssertionFailed,
                    format!(
                        "Balance assertion failed for {}: expected {} {}, got {} {}",
                        bal.account, expected, bal.amount.currency, actual, bal.amount.currency
                    ),
                    bal.date,
                )
                .with_context(format!("difference: {}", actual - expected)),
            );
        }
    }
}

fn validate_document(state: &LedgerState, doc: &Document, errors: &mut Vec<ValidationError>) {
    // Check account exists
    if !state.accounts.contains_key(&doc.account) {
        errors.push(ValidationError::new(
            ErrorCode::AccountNotOpen,
            format!("Account {} was never opened", doc.account),
            doc.date,
        ));
    }

    // Check if document file exists (if enabled)
    if state.options.check_documents {
        let doc_path = Path::new(&doc.path);

        let full_path = if doc_path.is_absolute() {
            doc_path.to_path_buf()
        } else if let Some(base) = &state.options.document_base {
            base.join(doc_path)
        } else {
            doc_path.to_path_buf()
        };

        if !full_path.exists() {
            errors.push(
                ValidationError::new(
                    ErrorCode::DocumentNotFound,
                    format!("Document file not found: {}", doc.path),
                    doc.date,
                )
                .with_context(format!("resolved path: {}", full_path.display())),
            );
        }
    }
}
