//! Coverage tests for every validation error code, checked end to end
//! through `validate`/`validate_with_options` over small directive streams.

use chrono::{Local, NaiveDate};
use rust_decimal_macros::dec;
use ledgercheck_core::{
    Amount, Balance, Close, Directive, IncompleteAmount, Open, Posting, Transaction,
};
use ledgercheck_validate::{validate, validate_with_options, ErrorCode, Severity, ValidationOptions};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn complete(number: rust_decimal::Decimal, currency: &str) -> Option<IncompleteAmount> {
    Some(IncompleteAmount::Complete(Amount::new(number, currency)))
}

fn open(d: NaiveDate, account: &str) -> Directive {
    Directive::Open(Open {
        date: d,
        account: account.to_string(),
        currencies: vec![],
        booking: None,
        meta: Default::default(),
    })
}

fn close(d: NaiveDate, account: &str) -> Directive {
    Directive::Close(Close {
        date: d,
        account: account.to_string(),
        meta: Default::default(),
    })
}

fn posting(account: &str, number: rust_decimal::Decimal) -> Posting {
    Posting {
        account: account.to_string(),
        units: complete(number, "USD"),
        cost: None,
        price: None,
        flag: None,
        meta: Default::default(),
    }
}

fn txn(d: NaiveDate, narration: &str, postings: Vec<Posting>) -> Directive {
    Directive::Transaction(Transaction {
        date: d,
        flag: '*',
        payee: None,
        narration: narration.to_string(),
        tags: vec![],
        links: vec![],
        postings,
        meta: Default::default(),
    })
}

fn has(errors: &[ledgercheck_validate::ValidationError], code: ErrorCode) -> bool {
    errors.iter().any(|e| e.code == code)
}

// ============================================================================
// Full error code table
// ============================================================================

#[test]
fn all_26_error_codes_have_their_documented_code_string() {
    let all_codes = [
        (ErrorCode::AccountNotOpen, "E1001"),
        (ErrorCode::AccountAlreadyOpen, "E1002"),
        (ErrorCode::AccountClosed, "E1003"),
        (ErrorCode::AccountCloseNotEmpty, "E1004"),
        (ErrorCode::InvalidAccountName, "E1005"),
        (ErrorCode::BalanceAssertionFailed, "E2001"),
        (ErrorCode::PadWithoutBalance, "E2003"),
        (ErrorCode::MultiplePadForBalance, "E2004"),
        (ErrorCode::TransactionUnbalanced, "E3001"),
        (ErrorCode::MultipleInterpolation, "E3002"),
        (ErrorCode::NoPostings, "E3003"),
        (ErrorCode::SinglePosting, "E3004"),
        (ErrorCode::NoMatchingLot, "E4001"),
        (ErrorCode::InsufficientUnits, "E4002"),
        (ErrorCode::AmbiguousLotMatch, "E4003"),
        (ErrorCode::NegativeInventory, "E4004"),
        (ErrorCode::UndeclaredCurrency, "E5001"),
        (ErrorCode::CurrencyNotAllowed, "E5002"),
        (ErrorCode::DuplicateMetadataKey, "E6001"),
        (ErrorCode::InvalidMetadataValue, "E6002"),
        (ErrorCode::UnknownOption, "E7001"),
        (ErrorCode::InvalidOptionValue, "E7002"),
        (ErrorCode::DuplicateOption, "E7003"),
        (ErrorCode::DocumentNotFound, "E8001"),
        (ErrorCode::DateOutOfOrder, "E10001"),
        (ErrorCode::FutureDate, "E10002"),
    ];

    for (code, expected) in &all_codes {
        assert_eq!(code.code(), *expected, "mismatch for {code:?}");
    }
    assert_eq!(all_codes.len(), 26);
}

#[test]
fn warning_and_info_codes_have_the_right_severity() {
    assert_eq!(ErrorCode::SinglePosting.severity(), Severity::Warning);
    assert_eq!(ErrorCode::FutureDate.severity(), Severity::Warning);
    assert_eq!(ErrorCode::DateOutOfOrder.severity(), Severity::Info);
}

#[test]
fn remaining_codes_default_to_error_severity() {
    let error_codes = [
        ErrorCode::AccountNotOpen,
        ErrorCode::AccountAlreadyOpen,
        ErrorCode::AccountClosed,
        ErrorCode::BalanceAssertionFailed,
        ErrorCode::TransactionUnbalanced,
        ErrorCode::MultipleInterpolation,
        ErrorCode::NoPostings,
        ErrorCode::NoMatchingLot,
        ErrorCode::InsufficientUnits,
        ErrorCode::AmbiguousLotMatch,
        ErrorCode::NegativeInventory,
        ErrorCode::UndeclaredCurrency,
        ErrorCode::CurrencyNotAllowed,
        ErrorCode::DuplicateMetadataKey,
        ErrorCode::InvalidMetadataValue,
        ErrorCode::UnknownOption,
        ErrorCode::InvalidOptionValue,
        ErrorCode::DuplicateOption,
        ErrorCode::DocumentNotFound,
    ];
    for code in error_codes {
        assert_eq!(code.severity(), Severity::Error, "{code:?} should be error");
    }
}

// ============================================================================
// E1xxx: account lifecycle
// ============================================================================

#[test]
fn e1001_posting_to_unopened_account_is_flagged() {
    let directives = vec![txn(
        date(2024, 1, 15),
        "Test",
        vec![posting("Assets:Bank", dec!(100)), posting("Expenses:Food", dec!(-100))],
    )];
    let errors = validate(&directives);
    assert!(has(&errors, ErrorCode::AccountNotOpen));
}

#[test]
fn e1001_no_error_once_both_accounts_are_opened() {
    let directives = vec![
        open(date(2024, 1, 1), "Assets:Bank"),
        open(date(2024, 1, 1), "Expenses:Food"),
        txn(
            date(2024, 1, 15),
            "Test",
            vec![posting("Assets:Bank", dec!(100)), posting("Expenses:Food", dec!(-100))],
        ),
    ];
    let errors = validate(&directives);
    assert!(!has(&errors, ErrorCode::AccountNotOpen));
}

#[test]
fn e1001_names_the_specific_unopened_account() {
    let directives = vec![
        open(date(2024, 1, 1), "Assets:Bank"),
        txn(
            date(2024, 1, 15),
            "Test",
            vec![
                posting("Assets:Bank", dec!(100)),
                posting("Expenses:Unopened", dec!(-100)),
            ],
        ),
    ];
    let errors = validate(&directives);
    let e1001: Vec<_> = errors.iter().filter(|e| e.code == ErrorCode::AccountNotOpen).collect();
    assert!(!e1001.is_empty());
    assert!(e1001.iter().any(|e| {
        e.message.contains("Expenses:Unopened")
            || e.context.as_deref().is_some_and(|c| c.contains("Expenses:Unopened"))
    }));
}

#[test]
fn e1002_duplicate_open_is_flagged() {
    let directives = vec![
        open(date(2024, 1, 1), "Assets:Bank"),
        open(date(2024, 2, 1), "Assets:Bank"),
    ];
    let errors = validate(&directives);
    assert!(has(&errors, ErrorCode::AccountAlreadyOpen));
}

#[test]
fn e1003_posting_after_close_is_flagged() {
    let directives = vec![
        open(date(2024, 1, 1), "Assets:Bank"),
        close(date(2024, 6, 1), "Assets:Bank"),
        open(date(2024, 1, 1), "Expenses:Food"),
        txn(
            date(2024, 7, 1),
            "Test",
            vec![posting("Assets:Bank", dec!(100)), posting("Expenses:Food", dec!(-100))],
        ),
    ];
    let errors = validate(&directives);
    assert!(has(&errors, ErrorCode::AccountClosed));
}

#[test]
fn closing_an_account_that_was_never_opened_reports_account_not_open() {
    let directives = vec![close(date(2024, 1, 1), "Assets:Bank")];
    let errors = validate(&directives);
    assert!(has(&errors, ErrorCode::AccountNotOpen));
}

#[test]
fn reopening_a_closed_account_is_rejected() {
    let directives = vec![
        open(date(2024, 1, 1), "Assets:Bank"),
        close(date(2024, 6, 1), "Assets:Bank"),
        open(date(2024, 12, 1), "Assets:Bank"),
    ];
    let errors = validate(&directives);
    assert!(!errors.is_empty());
}

// ============================================================================
// E3xxx: transaction structure and balance
// ============================================================================

#[test]
fn e3003_empty_transaction_is_flagged() {
    let directives = vec![txn(date(2024, 3, 15), "Empty", vec![])];
    let errors = validate(&directives);
    let matching: Vec<_> = errors.iter().filter(|e| e.code == ErrorCode::NoPostings).collect();
    assert!(!matching.is_empty());
    assert!(matching.iter().any(|e| e.date == date(2024, 3, 15)));
}

#[test]
fn e3004_single_posting_is_a_warning_not_an_error() {
    let directives = vec![
        open(date(2024, 1, 1), "Assets:Bank"),
        txn(date(2024, 4, 20), "Single", vec![posting("Assets:Bank", dec!(100))]),
    ];
    let errors = validate(&directives);
    let matching: Vec<_> = errors.iter().filter(|e| e.code == ErrorCode::SinglePosting).collect();
    assert!(!matching.is_empty());
    assert!(matching.iter().any(|e| e.date == date(2024, 4, 20)));
    assert_eq!(ErrorCode::SinglePosting.severity(), Severity::Warning);
}

#[test]
fn e3002_two_elided_postings_in_one_currency_cannot_be_interpolated() {
    // `ErrorCode::MultipleInterpolation` names this case (E3002); the actual
    // detection happens one layer down, in the interpolator that the CLI
    // runs before validation.
    let transaction = Transaction {
        date: date(2024, 1, 15),
        flag: '*',
        payee: None,
        narration: "Multiple missing amounts".to_string(),
        tags: vec![],
        links: vec![],
        postings: vec![
            posting("Assets:Bank", dec!(100)),
            Posting {
                account: "Expenses:Food".to_string(),
                units: None,
                cost: None,
                price: None,
                flag: None,
                meta: Default::default(),
            },
            Posting {
                account: "Expenses:Drinks".to_string(),
                units: None,
                cost: None,
                price: None,
                flag: None,
                meta: Default::default(),
            },
        ],
        meta: Default::default(),
    };

    let result = ledgercheck_booking::interpolate(&transaction);
    assert!(matches!(
        result,
        Err(ledgercheck_booking::InterpolationError::MultipleMissing { .. })
    ));
}

#[test]
fn e3001_unbalanced_transaction_is_flagged() {
    let directives = vec![
        open(date(2024, 1, 1), "Assets:Bank"),
        open(date(2024, 1, 1), "Expenses:Food"),
        txn(
            date(2024, 1, 15),
            "Unbalanced",
            vec![posting("Assets:Bank", dec!(100)), posting("Expenses:Food", dec!(-50))],
        ),
    ];
    let errors = validate(&directives);
    assert!(has(&errors, ErrorCode::TransactionUnbalanced));
}

#[test]
fn prop_balance_error_means_mismatch() {
    let directives = vec![
        open(date(2024, 1, 1), "Assets:Bank"),
        open(date(2024, 1, 1), "Equity:Opening"),
        txn(
            date(2024, 1, 1),
            "Initial deposit",
            vec![posting("Assets:Bank", dec!(500)), posting("Equity:Opening", dec!(-500))],
        ),
        Directive::Balance(Balance {
            date: date(2024, 1, 5),
            account: "Assets:Bank".to_string(),
            amount: Amount::new(dec!(400), "USD"),
            tolerance: None,
            meta: Default::default(),
        }),
    ];
    let errors = validate(&directives);
    assert!(has(&errors, ErrorCode::BalanceAssertionFailed));
}

#[test]
fn prop_no_error_when_balance_matches() {
    let directives = vec![
        open(date(2024, 1, 1), "Assets:Bank"),
        open(date(2024, 1, 1), "Equity:Opening"),
        txn(
            date(2024, 1, 1),
            "Initial deposit",
            vec![posting("Assets:Bank", dec!(500)), posting("Equity:Opening", dec!(-500))],
        ),
        Directive::Balance(Balance {
            date: date(2024, 1, 5),
            account: "Assets:Bank".to_string(),
            amount: Amount::new(dec!(500), "USD"),
            tolerance: None,
            meta: Default::default(),
        }),
    ];
    let errors = validate(&directives);
    assert!(!has(&errors, ErrorCode::BalanceAssertionFailed));
}

// ============================================================================
// E10xxx: date ordering
// ============================================================================

#[test]
fn e10002_future_dated_transaction_warns_when_opted_in() {
    let future = Local::now().date_naive() + chrono::Duration::days(30);
    let directives = vec![
        open(date(2020, 1, 1), "Assets:Bank"),
        open(date(2020, 1, 1), "Expenses:Food"),
        txn(
            future,
            "Future transaction",
            vec![posting("Assets:Bank", dec!(100)), posting("Expenses:Food", dec!(-100))],
        ),
    ];

    let errors = validate(&directives);
    assert!(!has(&errors, ErrorCode::FutureDate));

    let errors = validate_with_options(
        &directives,
        ValidationOptions {
            warn_future_dates: true,
            ..Default::default()
        },
    );
    assert!(has(&errors, ErrorCode::FutureDate));
    assert_eq!(ErrorCode::FutureDate.severity(), Severity::Warning);
}

#[test]
fn e10001_out_of_order_dates_are_flagged_as_info() {
    let directives = vec![
        open(date(2020, 1, 1), "Assets:Bank"),
        open(date(2020, 1, 1), "Equity:Opening"),
        txn(
            date(2024, 6, 1),
            "Later",
            vec![posting("Assets:Bank", dec!(10)), posting("Equity:Opening", dec!(-10))],
        ),
        txn(
            date(2024, 1, 1),
            "Earlier, out of order",
            vec![posting("Assets:Bank", dec!(10)), posting("Equity:Opening", dec!(-10))],
        ),
    ];
    let errors = validate(&directives);
    assert!(has(&errors, ErrorCode::DateOutOfOrder));
    assert_eq!(ErrorCode::DateOutOfOrder.severity(), Severity::Info);
}

// ============================================================================
// Errors accumulate monotonically as more directives are checked
// ============================================================================

#[test]
fn errors_accumulate_as_more_offending_directives_are_added() {
    let one = vec![open(date(2024, 1, 1), "Assets:Bank"), open(date(2024, 2, 1), "Assets:Bank")];
    let mut two = one.clone();
    two.push(open(date(2024, 3, 1), "Assets:Bank"));

    let errors_one = validate(&one);
    let errors_two = validate(&two);
    assert!(errors_two.len() >= errors_one.len());
}
