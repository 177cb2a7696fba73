//! Cell types, raw values and the display decoder used by every report
//!
//! Decoding is a pure function of the cell's type code, its raw value and the
//! workbook datemode. Date cells that cannot be represented in the workbook's
//! date system are not errors for the caller: they come back as an ERROR-typed
//! entry carrying a short diagnostic, so one bad cell never stops a report.

use chrono::{Datelike, Days, NaiveDate};
use std::fmt;
use thiserror::Error;

/// Number of known cell type codes
pub const CELL_TYPE_COUNT: usize = 7;

/// Cell type codes, numbered the way the report output shows them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CellType {
    Empty = 0,
    Text = 1,
    Number = 2,
    Date = 3,
    Boolean = 4,
    Error = 5,
    Blank = 6,
}

impl CellType {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Raw cell value as stored by the reader
///
/// Booleans and error codes are stored as integers; dates are numbers whose
/// meaning depends on the workbook datemode.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Int(i64),
}

impl CellValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int(i) => Some(*i),
            CellValue::Number(n) if n.fract() == 0.0 => Some(*n as i64),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => f.write_str("''"),
            CellValue::Text(s) => f.write_str(&repr_str(s)),
            CellValue::Number(n) => write!(f, "{:?}", n),
            CellValue::Int(i) => write!(f, "{}", i),
        }
    }
}

/// A single cell: type code plus raw value
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub ctype: CellType,
    pub value: CellValue,
}

impl Cell {
    pub fn new(ctype: CellType, value: CellValue) -> Self {
        Self { ctype, value }
    }

    pub fn empty() -> Self {
        Self::new(CellType::Empty, CellValue::Empty)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::new(CellType::Text, CellValue::Text(s.into()))
    }

    pub fn number(n: f64) -> Self {
        Self::new(CellType::Number, CellValue::Number(n))
    }

    pub fn date(serial: f64) -> Self {
        Self::new(CellType::Date, CellValue::Number(serial))
    }

    pub fn boolean(b: bool) -> Self {
        Self::new(CellType::Boolean, CellValue::Int(b as i64))
    }

    pub fn error(code: u8) -> Self {
        Self::new(CellType::Error, CellValue::Int(code as i64))
    }
}

/// Calendar tuple produced from a date serial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTuple {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl fmt::Display for DateTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}, {}, {})",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Why a date serial could not be converted
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DateError {
    #[error("{0} is negative")]
    Negative(f64),

    #[error("{0} falls before 1900-03-01 in the 1900 date system")]
    Ambiguous(f64),

    #[error("{0} is beyond the last representable date")]
    TooLarge(f64),

    #[error("datemode {0} is neither 0 (1900) nor 1 (1904)")]
    BadDatemode(u8),
}

impl DateError {
    pub fn kind(&self) -> &'static str {
        match self {
            DateError::Negative(_) => "DateNegative",
            DateError::Ambiguous(_) => "DateAmbiguous",
            DateError::TooLarge(_) => "DateTooLarge",
            DateError::BadDatemode(_) => "DateBadDatemode",
        }
    }
}

// First day number that no longer fits before year 10000, per datemode.
const XLDAYS_TOO_LARGE: [i64; 2] = [2_958_466, 2_958_466 - 1462];

/// Convert a date serial to a calendar tuple
///
/// Datemode 0 counts from 1899-12-30 (so day 61 is 1900-03-01) and rejects
/// day numbers below 61, where the phantom 1900-02-29 makes dates ambiguous.
/// Datemode 1 counts from 1904-01-01.
pub fn xldate_as_tuple(xldate: f64, datemode: u8) -> Result<DateTuple, DateError> {
    if datemode > 1 {
        return Err(DateError::BadDatemode(datemode));
    }
    if xldate == 0.0 {
        return Ok(DateTuple::default());
    }
    if xldate < 0.0 {
        return Err(DateError::Negative(xldate));
    }
    // Reject before the integer cast, which saturates for huge serials
    if !xldate.is_finite() || xldate >= XLDAYS_TOO_LARGE[datemode as usize] as f64 {
        return Err(DateError::TooLarge(xldate));
    }

    let mut xldays = xldate.trunc() as i64;
    let frac = xldate - xldays as f64;
    let seconds = (frac * 86400.0).round_ties_even() as i64;
    let (hour, minute, second) = if seconds >= 86400 {
        xldays += 1;
        (0, 0, 0)
    } else {
        (seconds / 3600, (seconds % 3600) / 60, seconds % 60)
    };

    if xldays >= XLDAYS_TOO_LARGE[datemode as usize] {
        return Err(DateError::TooLarge(xldate));
    }
    let time_only = DateTuple {
        hour: hour as u32,
        minute: minute as u32,
        second: second as u32,
        ..DateTuple::default()
    };
    if xldays == 0 {
        return Ok(time_only);
    }
    if xldays < 61 && datemode == 0 {
        return Err(DateError::Ambiguous(xldate));
    }

    let epoch = if datemode == 0 {
        NaiveDate::from_ymd_opt(1899, 12, 30)
    } else {
        NaiveDate::from_ymd_opt(1904, 1, 1)
    };
    let date = epoch
        .and_then(|e| e.checked_add_days(Days::new(xldays as u64)))
        .ok_or(DateError::TooLarge(xldate))?;

    Ok(DateTuple {
        year: date.year(),
        month: date.month(),
        day: date.day(),
        ..time_only
    })
}

/// Text for the built-in error codes
pub fn error_text_from_code(code: i64) -> Option<&'static str> {
    match code {
        0x00 => Some("#NULL!"),
        0x07 => Some("#DIV/0!"),
        0x0F => Some("#VALUE!"),
        0x17 => Some("#REF!"),
        0x1D => Some("#NAME?"),
        0x24 => Some("#NUM!"),
        0x2A => Some("#N/A"),
        _ => None,
    }
}

/// Report-ready value of a cell
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayValue {
    Raw(CellValue),
    Date(DateTuple),
    Text(String),
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayValue::Raw(v) => write!(f, "{}", v),
            DisplayValue::Date(t) => write!(f, "{}", t),
            DisplayValue::Text(s) => f.write_str(&repr_str(s)),
        }
    }
}

/// Decode one raw cell for display
///
/// Returns the type to report alongside the display value. Only DATE cells
/// can change type, and only to ERROR when the serial does not convert.
pub fn decode_cell(ctype: CellType, value: &CellValue, datemode: u8) -> (CellType, DisplayValue) {
    match ctype {
        CellType::Date => {
            let serial = value.as_f64().unwrap_or(f64::NAN);
            match xldate_as_tuple(serial, datemode) {
                Ok(tuple) => (CellType::Date, DisplayValue::Date(tuple)),
                Err(e) => (
                    CellType::Error,
                    DisplayValue::Text(format!("{}:{}", e.kind(), e)),
                ),
            }
        }
        CellType::Error => {
            let code = value.as_i64().unwrap_or(-1);
            let text = match error_text_from_code(code) {
                Some(text) => text.to_string(),
                None => format!("<Unknown error code 0x{:02x}>", code),
            };
            (CellType::Error, DisplayValue::Text(text))
        }
        _ => (ctype, DisplayValue::Raw(value.clone())),
    }
}

/// Quote a string the way the reports show text values
pub fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
