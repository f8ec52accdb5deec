use thiserror::Error;

/// Main error type for the sheet mapper.
/// Aggregates errors from the standard library, dependencies, and internal modules.
#[derive(Error, Debug)]
pub enum SheetMapperError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Worksheet task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    OdsError(#[from] crate::spreadsheet::ods::OdsError),

    #[error("{0}")]
    RangeError(#[from] crate::spreadsheet::range::RangeError),

    // Conversion pipeline errors
    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("{0}")]
    ExtractError(#[from] crate::extract::ExtractError),

    #[error("{0}")]
    ProcessError(#[from] crate::processor::ProcessError),
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, SheetMapperError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| SheetMapperError::WithContextError(format!("{}: {}", message, e)))
    }
}
