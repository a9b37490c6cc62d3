//! Numeric parsing policy shared by the row filter, the integer coercion
//! steps and the yearly summary.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Cell;

static THOUSANDS_GROUPED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("valid thousands pattern")
});

/// Parse a text value as a finite number.
///
/// Accepts surrounding whitespace, a sign, a decimal fraction, an exponent
/// and comma thousands grouping (`"1,250"`). `inf`, `nan` and anything else
/// yields `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = if THOUSANDS_GROUPED.is_match(trimmed) {
        trimmed.replace(',', "")
    } else {
        trimmed.to_string()
    };

    // Rust also accepts "inf", "infinity" and "nan".
    if !candidate
        .trim_start_matches(|c: char| c == '+' || c == '-')
        .starts_with(|c: char| c.is_ascii_digit() || c == '.')
    {
        return None;
    }

    candidate.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Numeric value of a cell, `None` for missing or unparsable cells.
pub fn cell_number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Missing => None,
        Cell::Int(n) => Some(*n as f64),
        Cell::Float(f) => f.is_finite().then_some(*f),
        Cell::Text(s) => parse_number(s),
    }
}

/// Whether the cell holds a number.
pub fn is_numeric(cell: &Cell) -> bool {
    match cell {
        Cell::Int(_) => true,
        other => cell_number(other).is_some(),
    }
}

/// Integer value of a cell: unparsable or missing becomes 0, fractions are
/// truncated toward zero.
pub fn coerce_integer(cell: &Cell) -> i64 {
    match cell {
        Cell::Int(n) => *n,
        other => cell_number(other).map(|n| n.trunc() as i64).unwrap_or(0),
    }
}
