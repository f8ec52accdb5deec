//! Worksheets with a fixed "odd" layout: a small key/value block at the top
//! followed by a regular table further down.

use crate::spreadsheet::range::Bounds;
use crate::spreadsheet::range::RangeError;
use crate::spreadsheet::Range;
use serde::Deserialize;

/// Describes one odd-layout worksheet.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawLayout")]
pub struct LayoutSpec {
    /// Worksheet name, matched exactly
    pub name: String,
    /// Key/value block, e.g. `A1:B4`
    pub header_range: Bounds,
    /// Row index (0-based) where the tabular body starts; that row is the body's header row
    pub header_rows: usize,
    /// Names of the key and value columns, used in log and error messages.
    /// The block's records are keyed by the key cells themselves.
    pub header: [String; 2],
}

/// Layout entry as written in a configuration file.
#[derive(Deserialize)]
struct RawLayout {
    name: String,
    header_range: String,
    header_rows: usize,
    #[serde(default = "default_header")]
    header: [String; 2],
}

fn default_header() -> [String; 2] {
    ["key".to_owned(), "value".to_owned()]
}

impl TryFrom<RawLayout> for LayoutSpec {
    type Error = RangeError;

    fn try_from(raw: RawLayout) -> Result<Self, Self::Error> {
        let range = Range::try_from(raw.header_range.as_str())?;
        let header_range = range
            .bounds()
            .ok_or_else(|| RangeError::UnboundedError(raw.header_range.to_owned()))?;
        Ok(LayoutSpec {
            name: raw.name,
            header_range,
            header_rows: raw.header_rows,
            header: raw.header,
        })
    }
}

impl LayoutSpec {
    /// Builds a layout from an A1-style block.
    pub fn new(name: &str, header_range: &str, header_rows: usize) -> Result<Self, RangeError> {
        LayoutSpec::try_from(RawLayout {
            name: name.to_owned(),
            header_range: header_range.to_owned(),
            header_rows,
            header: default_header(),
        })
    }
}

/// How a worksheet is extracted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Layout<'a> {
    Special(&'a LayoutSpec),
    Generic,
}

/// The odd-layout worksheets known to a run. Built once and shared read-only.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct LayoutTable {
    layouts: Vec<LayoutSpec>,
}

impl LayoutTable {
    pub fn new(layouts: Vec<LayoutSpec>) -> Self {
        LayoutTable { layouts }
    }

    /// `ACDC_Converter` (block `A1:B4`, body from row 4) and
    /// `Charge_Controller` (block `A1:B2`, body from row 2).
    pub fn builtin() -> Self {
        let bounds = |row_upper| Bounds {
            row_lower: 0,
            row_upper,
            col_lower: 0,
            col_upper: 1,
        };
        LayoutTable::new(vec![
            LayoutSpec {
                name: "ACDC_Converter".to_owned(),
                header_range: bounds(3),
                header_rows: 4,
                header: default_header(),
            },
            LayoutSpec {
                name: "Charge_Controller".to_owned(),
                header_range: bounds(1),
                header_rows: 2,
                header: default_header(),
            },
        ])
    }

    pub fn classify(&self, name: &str) -> Layout<'_> {
        self.layouts
            .iter()
            .find(|layout| layout.name == name)
            .map(Layout::Special)
            .unwrap_or(Layout::Generic)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayoutSpec> {
        self.layouts.iter()
    }
}

impl Default for LayoutTable {
    fn default() -> Self {
        LayoutTable::builtin()
    }
}
