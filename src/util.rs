// Utility helpers for parsing, rounding and display formatting.
//
// This module centralizes all the "dirty" spreadsheet handling (Brazilian
// number formats, Excel serial dates, blank cells) so the rest of the code
// can assume clean, typed values.
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use num_format::{Locale, ToFormattedString};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::{Cell, ReportPeriod};

/// Round to 2 decimal places, half to even. Every derived figure in the
/// report goes through here so the rounding mode is uniform.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Parse a money-like text value.
///
/// - Trims whitespace and a leading `R$`.
/// - `1.234,56` (Brazilian) and `1,234.56` are both accepted: whichever
///   separator comes last is the decimal point.
/// - A lone `,` is treated as the decimal point.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim().trim_start_matches("R$").trim();
    if s.is_empty() {
        return None;
    }
    let cleaned = match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) => s.replace(',', "."),
        _ => s.to_string(),
    };
    Decimal::from_str(&cleaned).ok()
}

/// Money value of a cell. Blank cells count as zero; `None` means the cell
/// holds something that is not a number.
pub fn decimal_from_cell(cell: &Cell) -> Option<Decimal> {
    match cell {
        Cell::Empty => Some(Decimal::ZERO),
        Cell::Number(n) => Decimal::from_f64(*n),
        Cell::Text(s) if s.trim().is_empty() => Some(Decimal::ZERO),
        Cell::Text(s) => parse_decimal(s),
        Cell::Date(_) => None,
    }
}

/// Whole days from a cell, rounded to the nearest day. Blank is zero.
pub fn days_from_cell(cell: &Cell) -> Option<i64> {
    decimal_from_cell(cell)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Convert an Excel serial day number (1900 date system) to a date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

pub fn parse_date_safe(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    // Timestamps like `2024-09-15 00:00:00` keep only the date part.
    let date_part = s.split_whitespace().next().unwrap_or(s);
    ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

pub fn date_from_cell(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::Number(n) => excel_serial_to_date(*n),
        Cell::Text(s) => parse_date_safe(s),
        Cell::Empty => None,
    }
}

/// Date-like text of a cell: ISO when parseable, the raw text otherwise,
/// `None` when blank.
pub fn date_text_from_cell(cell: &Cell) -> Option<String> {
    if cell.is_blank() {
        return None;
    }
    Some(match date_from_cell(cell) {
        Some(d) => format_iso(d),
        None => cell.to_string().trim().to_string(),
    })
}

pub fn format_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn days_diff(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// Yesterday back to the same day one year earlier. 29 February maps to
/// 28 February of the previous year.
pub fn report_period(today: NaiveDate) -> ReportPeriod {
    let end = today.pred_opt().unwrap_or(today);
    let start = end.with_year(end.year() - 1).unwrap_or_else(|| {
        let shifted = end - Duration::days(1);
        shifted.with_year(shifted.year() - 1).unwrap_or(shifted)
    });
    ReportPeriod { start, end }
}

/// Brazilian currency, e.g. `R$ 1.234,56`.
pub fn format_brl(value: Decimal) -> String {
    let rounded = round2(value);
    let neg = rounded.is_sign_negative() && !rounded.is_zero();
    let abs = rounded.abs();
    let int_part = abs.trunc().to_i64().unwrap_or(0);
    let cents = ((abs - abs.trunc()) * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .unwrap_or(0);
    // en groups with ',' which the Brazilian format writes as '.'.
    let grouped = int_part.to_formatted_string(&Locale::en).replace(',', ".");
    let sign = if neg { "-" } else { "" };
    format!("{sign}R$ {grouped},{cents:02}")
}

/// Percentage with two decimals, `-` when indeterminate.
pub fn format_percent(value: Option<Decimal>) -> String {
    match value {
        Some(v) => format!("{:.2}%", round2(v)),
        None => "-".to_string(),
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for counts in console messages
    // (e.g., `9,855 titles loaded`).
    n.to_formatted_string(&Locale::en)
}

/// Severity band of a delinquency percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelinquencyBand {
    /// Up to 5%.
    Healthy,
    /// Up to 10%.
    Low,
    /// Up to 15%.
    Moderate,
    /// Up to 20%.
    High,
    /// Above 20%.
    Critical,
    /// Percentage is indeterminate.
    Unknown,
}

impl DelinquencyBand {
    pub fn from_percent(percent: Option<Decimal>) -> Self {
        let Some(p) = percent else {
            return Self::Unknown;
        };
        if p <= Decimal::from(5) {
            Self::Healthy
        } else if p <= Decimal::from(10) {
            Self::Low
        } else if p <= Decimal::from(15) {
            Self::Moderate
        } else if p <= Decimal::from(20) {
            Self::High
        } else {
            Self::Critical
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Healthy => "#00FF00",
            Self::Low => "#90EE90",
            Self::Moderate => "#FFFF00",
            Self::High => "#FFA500",
            Self::Critical => "#FF0000",
            Self::Unknown => "#666666",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }
}
