use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::SpreadsheetError;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use iso8601_duration::Duration as IsoDuration;
use serde_json::Number;
use serde_json::Value;

/// Day zero of a serial date number.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DateEpoch {
    /// 1900 date system, including the Lotus 1-2-3 phantom 1900-02-29
    Epoch1900,
    /// 1904 date system (older Mac workbooks)
    Epoch1904,
}

/// Which part of a serial date number a format displays.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Temporal {
    DateTime,
    Date,
    Time,
}

/// How the raw text of a cell is interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CellType {
    #[default]
    Empty,
    /// `1` or `0`
    Boolean,
    Number,
    /// Number with a date/time format applied
    Serial(Temporal, DateEpoch),
    /// ISO 8601 date or date-time text
    IsoDateTime,
    /// ISO 8601 duration text, used by OpenDocument for times
    IsoDuration,
    Text,
    /// Index into the workbook's shared string table
    SharedString,
    /// Error literal such as `#DIV/0!`
    Error,
}

impl CellType {
    /// Maps built-in Excel number format ids to date/time types.
    pub(crate) fn from_builtin_format(id: &str, epoch: DateEpoch) -> Option<Self> {
        let temporal = match id {
            "22" => Temporal::DateTime,
            "14" | "15" | "16" | "17" => Temporal::Date,
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Temporal::Time,
            _ => return None,
        };
        Some(Self::Serial(temporal, epoch))
    }

    /// Inspects a custom format code for date and time tokens, ignoring
    /// quoted literals, escapes and bracketed sections such as `[Red]`.
    pub(crate) fn from_custom_format(format: &str, epoch: DateEpoch) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut has_date = false;
        let mut has_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,
                '"' => is_literal = !is_literal,
                _ if is_literal => (),
                '[' => is_bracket = true,
                ']' => is_bracket = false,
                _ if is_bracket => (),
                'Y' | 'y' | 'D' | 'd' => has_date = true,
                'H' | 'h' | 'S' | 's' => has_time = true,
                _ => (),
            }
        }
        match (has_date, has_time) {
            (true, true) => Self::Serial(Temporal::DateTime, epoch),
            (true, false) => Self::Serial(Temporal::Date, epoch),
            (false, true) => Self::Serial(Temporal::Time, epoch),
            (false, false) => Self::Number,
        }
    }
}

/// A single non-empty cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
    pub kind: CellType,
    /// Raw cell text as stored in the workbook
    pub value: String,
}

impl Cell {
    pub fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Returns the JSON scalar for this cell, or `None` when the cell
    /// carries no value (empty and error cells). Date-formatted numbers keep
    /// their serial value.
    pub fn to_json(&self) -> Result<Option<Value>, SpreadsheetError> {
        let value = match self.kind {
            CellType::Empty | CellType::Error => return Ok(None),
            CellType::Boolean => Value::Bool(self.is_true()),
            CellType::Number | CellType::Serial(..) => Value::Number(self.to_number()?),
            CellType::IsoDateTime | CellType::IsoDuration | CellType::Text | CellType::SharedString => {
                Value::String(self.to_text()?)
            }
        };
        Ok(Some(value))
    }

    /// Renders the cell the way it reads in a header row.
    pub fn to_text(&self) -> Result<String, SpreadsheetError> {
        match self.kind {
            CellType::Boolean => Ok(if self.is_true() { "TRUE" } else { "FALSE" }.to_owned()),
            CellType::Number => Ok(self.to_number()?.to_string()),
            CellType::Serial(temporal, epoch) => self.to_serial_string(temporal, epoch),
            CellType::IsoDateTime => Ok(self.to_iso_datetime_string()),
            CellType::IsoDuration => self.to_duration_string(),
            _ => Ok(self.value.to_owned()),
        }
    }

    fn is_true(&self) -> bool {
        self.value == "1" || self.value.eq_ignore_ascii_case("true")
    }

    fn to_double(&self) -> Result<f64, SpreadsheetError> {
        self.value
            .trim()
            .parse::<f64>()
            .map_err(|_| self.invalid("not a number"))
    }

    /// Integral values become JSON integers, so `40` is not written as `40.0`.
    fn to_number(&self) -> Result<Number, SpreadsheetError> {
        let double = self.to_double()?;
        if double.fract() == 0.0 && double.abs() < 9_007_199_254_740_992f64 {
            Ok(Number::from(double as i64))
        } else {
            Number::from_f64(double).ok_or_else(|| self.invalid("not a finite number"))
        }
    }

    fn to_serial_string(&self, temporal: Temporal, epoch: DateEpoch) -> Result<String, SpreadsheetError> {
        let serial = self.to_double()?;
        let datetime = serial_to_datetime(serial, epoch).ok_or_else(|| self.invalid("date out of range"))?;
        let format = match temporal {
            Temporal::DateTime => "%Y-%m-%d %H:%M:%S",
            Temporal::Date => "%Y-%m-%d",
            Temporal::Time => "%H:%M:%S",
        };
        Ok(datetime.format(format).to_string())
    }

    fn to_iso_datetime_string(&self) -> String {
        NaiveDateTime::parse_from_str(&self.value, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|datetime| datetime.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|_| self.value.to_owned())
    }

    fn to_duration_string(&self) -> Result<String, SpreadsheetError> {
        let duration = self
            .value
            .parse::<IsoDuration>()
            .map_err(|_| self.invalid("not an ISO 8601 duration"))?;
        let seconds = (duration.hour as i64) * 3_600 + (duration.minute as i64) * 60 + duration.second.round() as i64;
        Ok(format!("{:02}:{:02}:{:02}", seconds / 3_600, seconds % 3_600 / 60, seconds % 60))
    }

    fn invalid(&self, message: &str) -> SpreadsheetError {
        SpreadsheetError::InvalidCellValue {
            position: self.reference(),
            message: format!("'{}' is {}", self.value, message),
        }
    }
}

/// Converts a serial date number to a date-time, rounded to the second.
fn serial_to_datetime(serial: f64, epoch: DateEpoch) -> Option<NaiveDateTime> {
    let mut days = serial.trunc() as i64;
    match epoch {
        // Serial 60 is the non-existent 1900-02-29
        DateEpoch::Epoch1900 if days < 60 => days += 1,
        DateEpoch::Epoch1900 => (),
        DateEpoch::Epoch1904 => days += 1_462,
    }
    let seconds = (serial.fract() * 86_400f64).round() as i64;
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    base.checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::seconds(seconds))
}
