use thiserror::Error;

/// Failures of an ETL run.
///
/// The extraction engine absorbs `Transport` and `DataFormat` per page and
/// `ListingMapping` per listing, except while establishing the page range:
/// there any error aborts the run.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("embedded data format error: {0}")]
    DataFormat(String),

    #[error("listing mapping error: {0}")]
    ListingMapping(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to generate request identity: {0}")]
    Identity(String),

    #[error("sink error: {0}")]
    Sink(String),
}

impl From<std::io::Error> for EtlError {
    fn from(err: std::io::Error) -> Self {
        EtlError::Sink(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
