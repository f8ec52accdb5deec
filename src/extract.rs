//! Turns a loaded worksheet into JSON records.
//!
//! Generic worksheets are read as one table whose first row names the fields.
//! Odd-layout worksheets carry a key/value block above the table; the block
//! is folded into a single record.

use crate::error::SheetMapperError;
use crate::layout::Layout;
use crate::layout::LayoutSpec;
use crate::layout::LayoutTable;
use crate::output::write_json;
use crate::record::ExtractionResult;
use crate::record::Record;
use crate::sanitize::trim_keys;
use crate::spreadsheet::range::Bounds;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::Range;
use crate::spreadsheet::Sheet;
use log::debug;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Field name given to a column whose header cell is empty.
pub const EMPTY_HEADER: &str = "__EMPTY";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Worksheet '{sheet}': '{column}' cell {position} of the header block is empty")]
    MissingLayoutKey {
        sheet: String,
        column: String,
        position: String,
    },
}

/// Classifies, extracts and sanitizes `sheet`, writes the result to `target`
/// as JSON and returns it.
///
/// A header-block key without a value stays in the returned result as `null`,
/// so it still names a mapping field, but is left out of the written file.
pub fn extract_sheet(sheet: &Sheet, layouts: &LayoutTable, target: &Path) -> Result<ExtractionResult, SheetMapperError> {
    let result = match layouts.classify(&sheet.name) {
        Layout::Special(spec) => {
            debug!("Worksheet '{}' has the odd layout {}", sheet.name, spec.header_range);
            extract_layout(sheet, spec)?
        }
        Layout::Generic => {
            debug!("Worksheet '{}' is a plain table", sheet.name);
            ExtractionResult::Table(extract_table(sheet, Range::default())?)
        }
    };
    let result = result.map_records(trim_keys);
    write_json(target, &result.clone().map_records(drop_nulls))?;
    Ok(result)
}

/// Reads the part of the used range selected by `range` as a table: the
/// first row names the fields and every following non-blank row is a record.
pub fn extract_table(sheet: &Sheet, range: Range) -> Result<Vec<Record>, SheetMapperError> {
    let bounds = match sheet.used_range() {
        Some(used) => range.resolve(used),
        None => return Ok(Vec::new()),
    };
    if bounds.row_lower > bounds.row_upper || bounds.col_lower > bounds.col_upper {
        return Ok(Vec::new());
    }

    let headers = read_headers(sheet, &bounds)?;
    let mut records = Vec::new();
    for row in bounds.row_lower + 1..=bounds.row_upper {
        let mut record = Record::new();
        for (col, header) in bounds.cols().zip(&headers) {
            if let Some(value) = cell_value(sheet, row, col)? {
                record.insert(header.to_owned(), value);
            }
        }
        if !record.is_empty() {
            records.push(record);
        }
    }
    Ok(records)
}

/// Reads an odd-layout worksheet: the header block becomes the single
/// `columnData` record, the table starting at `header_rows` becomes `rowData`.
pub fn extract_layout(sheet: &Sheet, spec: &LayoutSpec) -> Result<ExtractionResult, SheetMapperError> {
    let block = spec.header_range;
    let [key_header, value_header] = &spec.header;
    let mut header = Record::new();
    for row in block.rows() {
        let key_col = block.col_lower;
        let value_col = key_col + 1;
        let entry = (
            sheet.get(row, key_col).map(|cell| cell.to_text()).transpose()?,
            cell_value(sheet, row, value_col)?,
        );
        match entry {
            (None, None) => continue,
            (None, Some(_)) => Err(ExtractError::MissingLayoutKey {
                sheet: sheet.name.to_owned(),
                column: key_header.to_owned(),
                position: index_to_reference(row, key_col),
            })?,
            (Some(key), value) => {
                header.insert(key, value.unwrap_or(Value::Null));
            }
        }
    }
    debug!(
        "Worksheet '{}' header block read as '{}'/'{}' pairs: {} entries",
        sheet.name,
        key_header,
        value_header,
        header.len()
    );

    let row_data = extract_table(sheet, Range::from_row(spec.header_rows))?;
    Ok(ExtractionResult::Layout {
        column_data: vec![header],
        row_data,
    })
}

/// Field names for the first row of `bounds`, made unique.
fn read_headers(sheet: &Sheet, bounds: &Bounds) -> Result<Vec<String>, SheetMapperError> {
    let mut taken = HashMap::<String, usize>::new();
    let mut headers = Vec::with_capacity(bounds.width());
    for col in bounds.cols() {
        let name = match sheet.get(bounds.row_lower, col) {
            Some(cell) => cell.to_text()?,
            None => EMPTY_HEADER.to_owned(),
        };
        headers.push(unique_name(&mut taken, name));
    }
    Ok(headers)
}

/// Returns `name`, or `name_1`, `name_2`, ... when it is already taken.
fn unique_name(taken: &mut HashMap<String, usize>, name: String) -> String {
    let mut counter = taken.get(&name).copied().unwrap_or(0);
    if counter == 0 {
        taken.insert(name.to_owned(), 1);
        return name;
    }
    let mut candidate = format!("{name}_{counter}");
    counter += 1;
    while taken.contains_key(&candidate) {
        candidate = format!("{name}_{counter}");
        counter += 1;
    }
    taken.insert(name, counter);
    taken.insert(candidate.to_owned(), 1);
    candidate
}

fn drop_nulls(record: Record) -> Record {
    record.into_iter().filter(|(_, value)| !value.is_null()).collect()
}

fn cell_value(sheet: &Sheet, row: usize, col: usize) -> Result<Option<Value>, SheetMapperError> {
    Ok(sheet.get(row, col).map(|cell| cell.to_json()).transpose()?.flatten())
}
