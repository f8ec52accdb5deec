use crate::spreadsheet::reference::col_to_index;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::row_to_index;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Display;
use thiserror::Error;

static RANGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]*)(\d*)(:([A-Z]*)(\d*))?$").expect("Hardcode regex pattern"));

#[derive(Error, Debug)]
pub enum RangeError {
    #[error("Invalid range format '{0}'")]
    FormatError(String),

    #[error("Range '{0}' must name both corners, e.g. 'A1:B4'")]
    UnboundedError(String),
}

/// Excel-style cell range. A missing bound means "up to the used range of the sheet".
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Range {
    pub row_lower_bound: Option<usize>,
    pub row_upper_bound: Option<usize>,
    pub col_lower_bound: Option<usize>,
    pub col_upper_bound: Option<usize>,
}

/// A fully resolved rectangle, inclusive on all sides.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub row_lower: usize,
    pub row_upper: usize,
    pub col_lower: usize,
    pub col_upper: usize,
}

impl Range {
    /// Range starting at `row` and open everywhere else.
    pub fn from_row(row: usize) -> Self {
        Range {
            row_lower_bound: Some(row),
            ..Range::default()
        }
    }

    /// Returns the bounds when all four corners are given.
    pub fn bounds(&self) -> Option<Bounds> {
        Some(Bounds {
            row_lower: self.row_lower_bound?,
            row_upper: self.row_upper_bound?,
            col_lower: self.col_lower_bound?,
            col_upper: self.col_upper_bound?,
        })
    }

    /// Fills the open sides from `used`, the used range of a sheet.
    pub fn resolve(&self, used: Bounds) -> Bounds {
        Bounds {
            row_lower: self.row_lower_bound.unwrap_or(used.row_lower),
            row_upper: self.row_upper_bound.unwrap_or(used.row_upper),
            col_lower: self.col_lower_bound.unwrap_or(used.col_lower),
            col_upper: self.col_upper_bound.unwrap_or(used.col_upper),
        }
    }
}

impl TryFrom<&str> for Range {
    type Error = RangeError;

    /// Parses `A1`, `B2:C5`, `A:C` or `1:10`.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim().to_ascii_uppercase();
        let captures = RANGE_PATTERN
            .captures(&value)
            .filter(|_| !value.is_empty())
            .ok_or_else(|| RangeError::FormatError(value.to_owned()))?;
        let group = |index: usize| captures.get(index).map(|matcher| matcher.as_str());
        let mut range = Range {
            col_lower_bound: group(1).and_then(col_to_index),
            row_lower_bound: group(2).and_then(row_to_index),
            col_upper_bound: group(4).and_then(col_to_index),
            row_upper_bound: group(5).and_then(row_to_index),
        };
        // A single cell covers itself
        if captures.get(3).is_none() {
            range.col_upper_bound = range.col_lower_bound;
            range.row_upper_bound = range.row_lower_bound;
        }
        Ok(range)
    }
}

impl Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.bounds() {
            Some(bounds) => write!(f, "{bounds}"),
            None => write!(f, "{self:?}"),
        }
    }
}

impl Bounds {
    pub fn rows(&self) -> std::ops::RangeInclusive<usize> {
        self.row_lower..=self.row_upper
    }

    pub fn cols(&self) -> std::ops::RangeInclusive<usize> {
        self.col_lower..=self.col_upper
    }

    pub fn width(&self) -> usize {
        (self.col_upper + 1).saturating_sub(self.col_lower)
    }
}

impl Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}",
            index_to_reference(self.row_lower, self.col_lower),
            index_to_reference(self.row_upper, self.col_upper)
        )
    }
}
