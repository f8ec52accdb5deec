//! # Sheet Mapper
//!
//! Converts spreadsheet workbooks into JSON records and derives a field-name
//! mapping table from their column headers.
//!
//! ## Features
//!
//! - **Formats**: Office Open XML (`.xlsx`, `.xlsm`, `.xlam`) and OpenDocument (`.ods`)
//! - **Plain tables**: the first row of the used range names the fields, every other row is a record
//! - **Odd layouts**: worksheets such as `ACDC_Converter` keep a key/value block above their table;
//!   the block becomes one record next to the table rows
//! - **Mapping table**: every header is normalized to `[A-Za-z0-9_]` and mapped back to its original text
//! - **Parallel extraction**: worksheets are converted on tokio's blocking pool
//!
//! ## Output
//!
//! For a job `{country: "US", year: "2020", path: "uploads/US_2020.xlsx"}`:
//!
//! - `json/US_2020_{worksheet}.json` for every worksheet
//! - `mapping/US.json` with `{normalizedName: originalHeader}`, when any header was found
//!
//! The source workbook is removed afterwards.

pub mod config;
pub mod error;
pub mod extract;
pub(crate) mod helpers;
pub mod layout;
pub mod mapping;
pub mod output;
pub mod processor;
pub mod record;
pub mod sanitize;
pub mod spreadsheet;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::SheetMapperError;
pub use layout::Layout;
pub use layout::LayoutSpec;
pub use layout::LayoutTable;
pub use mapping::build_mapping;
pub use mapping::normalize;
pub use mapping::MappingTable;
pub use processor::process_file;
pub use processor::Job;
pub use processor::ProcessReport;
pub use record::ExtractionResult;
pub use record::Record;
pub use sanitize::sanitize;
pub use spreadsheet::open_spreadsheet;
