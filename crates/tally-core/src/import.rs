//! CSV transaction import
//!
//! Header-based files: columns are matched case-insensitively and in any
//! order. `Date`, `Type` and `Amount` are required; `Category`, `Merchant`,
//! `Bank`, `Account`, `Balance` and `Description` are optional (`Balance` is
//! read and ignored). Rows whose amount does not parse to a non-zero number
//! are dropped without an error.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{NewTransaction, TransactionSource, TransactionType};

/// Columns every file must carry
pub const REQUIRED_COLUMNS: [&str; 3] = ["Date", "Type", "Amount"];

pub const DEFAULT_CATEGORY: &str = "Other";
pub const DEFAULT_DESCRIPTION: &str = "CSV import";

/// Values used for columns a row leaves empty
#[derive(Debug, Clone, Default)]
pub struct CsvDefaults {
    pub account_id: Option<i64>,
    pub bank: String,
    pub account_number: String,
}

/// Outcome of a CSV import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvImportResult {
    /// Rows that produced a transaction
    pub parsed: usize,
    pub imported: usize,
    /// Rows skipped because the same transaction already exists
    pub duplicates: usize,
}

fn iso_date_prefix() -> &'static Regex {
    static ISO_DATE_PREFIX_RE: OnceLock<Regex> = OnceLock::new();
    ISO_DATE_PREFIX_RE.get_or_init(|| {
        Regex::new(r"^(\d{4}-\d{2}-\d{2})").expect("ISO date prefix regex should compile")
    })
}

/// Header positions keyed by lower-cased column name
struct Columns(HashMap<String, usize>);

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let map: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !map.contains_key(&c.to_lowercase()))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingColumns(missing));
        }
        Ok(Self(map))
    }

    /// Trimmed non-empty value of a column
    fn get<'r>(&self, record: &'r StringRecord, column: &str) -> Option<&'r str> {
        self.0
            .get(column)
            .and_then(|i| record.get(*i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Parse CSV text into transactions ready to store
///
/// Fails with `InvalidFile` when there is no data row and `MissingColumns`
/// when a required header is absent.
pub fn parse_csv(text: &str, defaults: &CsvDefaults) -> Result<Vec<NewTransaction>> {
    let non_empty_lines = text.lines().filter(|l| !l.trim().is_empty()).count();
    if non_empty_lines < 2 {
        return Err(Error::InvalidFile);
    }

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let columns = Columns::from_headers(rdr.headers()?)?;

    let mut transactions = Vec::new();
    let mut dropped = 0usize;
    for result in rdr.records() {
        let parsed = result
            .ok()
            .and_then(|record| parse_row(&columns, &record, defaults));
        match parsed {
            Some(tx) => transactions.push(tx),
            None => dropped += 1,
        }
    }

    debug!(rows = transactions.len(), dropped, "Parsed CSV");
    Ok(transactions)
}

fn parse_row(
    columns: &Columns,
    record: &StringRecord,
    defaults: &CsvDefaults,
) -> Option<NewTransaction> {
    let amount = parse_amount(columns.get(record, "amount")?)?;

    let date = columns
        .get(record, "date")
        .and_then(parse_date_value)
        .unwrap_or_else(Utc::now);

    let text = |column: &str, fallback: &str| {
        columns
            .get(record, column)
            .unwrap_or(fallback)
            .to_string()
    };

    Some(NewTransaction {
        account_id: defaults.account_id,
        date,
        transaction_type: TransactionType::normalize(columns.get(record, "type").unwrap_or("")),
        amount,
        category: text("category", DEFAULT_CATEGORY),
        merchant: text("merchant", ""),
        bank: text("bank", &defaults.bank),
        account_number: text("account", &defaults.account_number),
        description: text("description", DEFAULT_DESCRIPTION),
        source: TransactionSource::Csv,
        splits: None,
    })
}

/// A calendar date at local noon, as an instant
fn local_noon(date: NaiveDate) -> Option<DateTime<Utc>> {
    let noon = date.and_hms_opt(12, 0, 0)?;
    Local
        .from_local_datetime(&noon)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a date cell
///
/// A `YYYY-MM-DD` prefix means that calendar date at local noon, so the day
/// does not shift across time zones. Anything else goes through RFC 3339 and
/// the common spreadsheet formats.
pub fn parse_date_value(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Some(prefix) = iso_date_prefix().captures(s).and_then(|c| c.get(1)) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix.as_str(), "%Y-%m-%d") {
            return local_noon(date);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let datetime_formats = ["%Y/%m/%d %H:%M:%S", "%m/%d/%Y %H:%M:%S", "%d/%m/%Y %H:%M"];
    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Local
                .from_local_datetime(&dt)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }

    // Try common date formats
    let formats = [
        "%m/%d/%Y", // 01/15/2024
        "%m/%d/%y", // 01/15/24
        "%Y/%m/%d", // 2024/01/15
        "%m-%d-%Y", // 01-15-2024
        "%d/%m/%Y", // 15/01/2024 (European)
        "%d %b %Y", // 15 Jan 2024
        "%b %d, %Y", // Jan 15, 2024
    ];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return local_noon(date);
        }
    }

    None
}

/// Currency markers allowed before or after an amount, longest first
const CURRENCY_MARKERS: &[&str] = &[
    "US$", "MVR", "MRF", "USD", "EUR", "GBP", "INR", "LKR", "RF.", "RS.", "RF", "RS", "$", "€",
    "£", "₹",
];

fn amount_number() -> &'static Regex {
    static AMOUNT_RE: OnceLock<Regex> = OnceLock::new();
    AMOUNT_RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?|\.\d+)$")
            .expect("amount regex should compile")
    })
}

fn strip_currency_prefix(s: &str) -> &str {
    for marker in CURRENCY_MARKERS {
        if let Some(head) = s.get(..marker.len()) {
            if head.eq_ignore_ascii_case(marker) {
                return s[marker.len()..].trim_start();
            }
        }
    }
    s
}

fn strip_currency_suffix(s: &str) -> &str {
    for marker in CURRENCY_MARKERS {
        let Some(start) = s.len().checked_sub(marker.len()) else {
            continue;
        };
        if let Some(tail) = s.get(start..) {
            if tail.eq_ignore_ascii_case(marker) {
                return s[..start].trim_end();
            }
        }
    }
    s
}

/// Parse an amount cell into a non-zero magnitude
///
/// One currency symbol or code may lead or trail the number, thousands are
/// grouped with `,`, and `(100.00)` reads as 100. Anything else left over
/// (letters, exponents, a second number) rejects the cell.
pub fn parse_amount(s: &str) -> Option<f64> {
    let mut rest = s.trim();
    if let Some(inner) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        rest = inner.trim();
    }
    if let Some(unsigned) = rest.strip_prefix('-').or_else(|| rest.strip_prefix('+')) {
        rest = unsigned.trim_start();
    }
    let number = strip_currency_suffix(strip_currency_prefix(rest));

    if !amount_number().is_match(number) {
        return None;
    }
    let value = number.replace(',', "").parse::<f64>().ok()?;
    if !value.is_finite() || value == 0.0 {
        return None;
    }
    Some(value.abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> CsvDefaults {
        CsvDefaults {
            account_id: Some(4),
            bank: "BML".to_string(),
            account_number: "7788".to_string(),
        }
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("-123.45"), Some(123.45));
        assert_eq!(parse_amount("(100.00)"), Some(100.00));
        assert_eq!(parse_amount("MVR 50"), Some(50.0));
        assert_eq!(parse_amount("Rs. 50"), Some(50.0));
        assert_eq!(parse_amount("-$5.25"), Some(5.25));
        assert_eq!(parse_amount("75.5 MVR"), Some(75.5));
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("abc1"), None);
        assert_eq!(parse_amount("1e5"), None);
        assert_eq!(parse_amount("12 34"), None);
        assert_eq!(parse_amount("inf"), None);
        assert_eq!(parse_amount("0.00"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_iso_date_is_local_noon() {
        let parsed = parse_date_value("2024-01-05").unwrap();
        let local = parsed.with_timezone(&Local);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(local.format("%H:%M").to_string(), "12:00");

        // Time after the prefix is ignored
        let with_time = parse_date_value("2024-01-05T23:59:00Z").unwrap();
        assert_eq!(with_time, parsed);
    }

    #[test]
    fn test_generic_date_formats() {
        let us = parse_date_value("01/15/2024").unwrap().with_timezone(&Local);
        assert_eq!(us.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert!(parse_date_value("Jan 15, 2024").is_some());
        assert!(parse_date_value("not a date").is_none());
    }

    #[test]
    fn test_bad_amount_rows_are_dropped() {
        let csv = "Date,Type,Amount,Category\n\
                   2024-01-05,debit,150.00,Food\n\
                   2024-01-06,credit,abc,Salary\n";
        let txs = parse_csv(csv, &defaults()).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, 150.0);
        assert_eq!(txs[0].category, "Food");
        assert_eq!(txs[0].transaction_type, TransactionType::Debit);
    }

    #[test]
    fn test_headers_any_case_and_order() {
        let csv = "amount,DESCRIPTION,type,date\n\
                   -42.10,Coffee,Income,2024-02-01\n";
        let txs = parse_csv(csv, &defaults()).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, 42.10);
        assert_eq!(txs[0].description, "Coffee");
        assert_eq!(txs[0].transaction_type, TransactionType::Credit);
    }

    #[test]
    fn test_defaults_fill_missing_columns() {
        let csv = "Date,Type,Amount\n2024-03-01,,10\n";
        let txs = parse_csv(csv, &defaults()).unwrap();
        let tx = &txs[0];
        assert_eq!(tx.category, DEFAULT_CATEGORY);
        assert_eq!(tx.merchant, "");
        assert_eq!(tx.bank, "BML");
        assert_eq!(tx.account_number, "7788");
        assert_eq!(tx.description, DEFAULT_DESCRIPTION);
        assert_eq!(tx.transaction_type, TransactionType::Debit);
        assert_eq!(tx.source, TransactionSource::Csv);
        assert_eq!(tx.account_id, Some(4));
    }

    #[test]
    fn test_unknown_type_passes_through() {
        let csv = "Date,Type,Amount\n2024-03-01,Transfer,10\n";
        let txs = parse_csv(csv, &defaults()).unwrap();
        assert_eq!(
            txs[0].transaction_type,
            TransactionType::Other("transfer".to_string())
        );
    }

    #[test]
    fn test_missing_columns() {
        let err = parse_csv("Date,Category\n2024-01-01,Food\n", &defaults()).unwrap_err();
        match err {
            Error::MissingColumns(cols) => assert_eq!(cols, vec!["Type", "Amount"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_header_only_is_invalid() {
        assert!(matches!(
            parse_csv("Date,Type,Amount\n\n", &defaults()),
            Err(Error::InvalidFile)
        ));
        assert!(matches!(parse_csv("", &defaults()), Err(Error::InvalidFile)));
    }

    #[test]
    fn test_unparseable_date_becomes_now() {
        let before = Utc::now();
        let txs = parse_csv("Date,Type,Amount\nsomeday,debit,5\n", &defaults()).unwrap();
        assert!(txs[0].date >= before);
    }
}
