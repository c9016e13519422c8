//! Canonicalization of the date and amount encodings found in bill exports.
//!
//! Bill sources disagree on almost everything: dates arrive as spreadsheet
//! serial numbers or as locale strings, amounts arrive currency-prefixed,
//! comma-separated and signed. Everything funnels through here into
//! `(NaiveDate, integer cents)` pairs. All functions are pure.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::EngineError;

/// Upper bound on any stored amount: 999,999,999 yuan, in cents.
pub const MAX_AMOUNT_CENTS: i64 = 999_999_999_00;

/// Spreadsheet serial numbers count days from this epoch (the classic
/// 1900-leap-year bug epoch, so serial 1 is 1899-12-31).
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Serials at or above this are not plausible dates and are rejected.
const SERIAL_MAX: i64 = 200_000;

/// A raw date cell before normalization: spreadsheet readers hand back
/// either a day-count serial or a text form, depending on cell typing.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawDateValue {
    Serial(f64),
    Text(String),
}

/// Decode a raw date cell into a calendar date.
///
/// Numbers are interpreted as days since 1899-12-30 (fractional time-of-day
/// parts are dropped); strings are tried against the formats the supported
/// exports actually produce.
pub fn normalize_date(raw: &RawDateValue) -> Result<NaiveDate, EngineError> {
    match raw {
        RawDateValue::Serial(serial) => {
            if !serial.is_finite() {
                return Err(EngineError::InvalidDate(format!(
                    "non-finite serial: {serial}"
                )));
            }
            let days = serial.trunc() as i64;
            if days <= 0 || days >= SERIAL_MAX {
                return Err(EngineError::InvalidDate(format!(
                    "serial out of range: {serial}"
                )));
            }
            let (y, m, d) = SERIAL_EPOCH;
            let epoch = NaiveDate::from_ymd_opt(y, m, d)
                .ok_or_else(|| EngineError::InvalidDate("bad serial epoch".to_string()))?;
            epoch
                .checked_add_signed(Duration::days(days))
                .ok_or_else(|| EngineError::InvalidDate(format!("serial out of range: {serial}")))
        }
        RawDateValue::Text(text) => parse_date_text(text.trim()),
    }
}

fn parse_date_text(text: &str) -> Result<NaiveDate, EngineError> {
    if text.is_empty() {
        return Err(EngineError::InvalidDate("empty date".to_string()));
    }

    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y年%m月%d日"];
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
    ];

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Ok(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(datetime.date());
        }
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Ok(datetime.date_naive());
    }

    Err(EngineError::InvalidDate(text.to_string()))
}

/// Decode a raw amount string into non-negative integer cents.
///
/// Currency glyphs, thousands separators and whitespace are stripped; an
/// explicit sign is discarded (direction travels on the record kind, never
/// on the amount). More than two decimals are rounded half away from zero.
/// Non-numeric residue, zero and out-of-bound magnitudes are rejected.
pub fn normalize_amount(raw: &str) -> Result<i64, EngineError> {
    let mut cleaned = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        match ch {
            '¥' | '￥' | '$' | '€' | ',' | '，' | ' ' => {}
            '+' | '-' if cleaned.is_empty() => {}
            other => cleaned.push(other),
        }
    }

    let (int_part, frac_part) = match cleaned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (cleaned.as_str(), ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(EngineError::InvalidAmount(raw.to_string()));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(EngineError::InvalidAmount(raw.to_string()));
    }

    let whole: i64 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| EngineError::InvalidAmount(raw.to_string()))?
    };

    let mut frac_digits = frac_part.chars();
    let tens = frac_digits.next().and_then(|c| c.to_digit(10)).unwrap_or(0) as i64;
    let units = frac_digits.next().and_then(|c| c.to_digit(10)).unwrap_or(0) as i64;
    let round_up = frac_digits
        .next()
        .and_then(|c| c.to_digit(10))
        .is_some_and(|d| d >= 5);

    let cents = whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(tens * 10 + units))
        .and_then(|v| v.checked_add(i64::from(round_up)))
        .ok_or_else(|| EngineError::InvalidAmount(raw.to_string()))?;

    check_bounds(cents, raw)
}

/// Convert an AI-sourced numeric amount (yuan) into cents.
pub fn cents_from_yuan(yuan: f64) -> Result<i64, EngineError> {
    if !yuan.is_finite() {
        return Err(EngineError::InvalidAmount(format!("non-finite: {yuan}")));
    }
    let cents = (yuan.abs() * 100.0).round();
    if cents > MAX_AMOUNT_CENTS as f64 {
        return Err(EngineError::InvalidAmount(format!("out of range: {yuan}")));
    }
    check_bounds(cents as i64, &yuan.to_string())
}

fn check_bounds(cents: i64, raw: &str) -> Result<i64, EngineError> {
    if cents == 0 {
        return Err(EngineError::InvalidAmount(format!("zero amount: {raw}")));
    }
    if cents > MAX_AMOUNT_CENTS {
        return Err(EngineError::InvalidAmount(format!("out of range: {raw}")));
    }
    Ok(cents)
}
