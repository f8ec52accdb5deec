//! # Workbook loading
//!
//! Reads Office Open XML (`.xlsx`, `.xlsm`, `.xlam`) and OpenDocument (`.ods`)
//! workbooks into in-memory [`Sheet`]s. Both formats are ZIP containers of XML
//! parts and are parsed with a pull parser, one worksheet at a time.
use crate::error::SheetMapperError;
use std::ffi::OsStr;
use std::path::Path;
use thiserror::Error;

pub mod cell;
pub(crate) mod ods;
pub mod range;
pub(crate) mod reference;
pub mod sheet;
pub(crate) mod xlsx;

pub use cell::Cell;
pub use cell::CellType;
pub use range::Bounds;
pub use range::Range;
pub use sheet::Sheet;

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Cannot detect file format for '{0}'")]
    InvalidFileFormat(String),

    #[error("Missing '{0}' in workbook")]
    FileError(String),

    #[error("Workbook '{0}' has no worksheets")]
    SpreadsheetEmptyError(String),

    #[error("Workbook '{0}' is password protected")]
    SpreadsheetPasswordProtectedError(String),

    #[error("Worksheet without a name in '{0}'")]
    MissingSheetName(String),

    #[error("Invalid cell value at '{position}': {message}")]
    InvalidCellValue { position: String, message: String },
}

/// A workbook opened from disk.
pub trait Spreadsheet {
    /// Reads every worksheet, in workbook order.
    fn read_sheets(&mut self) -> Result<Vec<Sheet>, SheetMapperError>;
}

/// Opens a workbook, choosing the reader from the file extension.
pub fn open_spreadsheet<P: AsRef<Path>>(path: P) -> Result<Box<dyn Spreadsheet>, SheetMapperError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("xlsx") | Some("xlsm") | Some("xlam") => Ok(Box::new(xlsx::XlsxSpreadsheet::open(path)?)),
        Some("ods") => Ok(Box::new(ods::OdsSpreadsheet::open(path)?)),
        _ => Err(SpreadsheetError::InvalidFileFormat(path.display().to_string()).into()),
    }
}
