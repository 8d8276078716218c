use std::path::Path;

/// Errors produced while running a sign or validate pipeline.
///
/// Every variant maps to a stable machine-readable code via [`Error::code`];
/// the `Display` form is the human-readable message carried in the response
/// payload when a pipeline run fails.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid package identifier: {0}")]
    IdentifierInvalid(String),

    #[error("failed to retrieve package: {0}")]
    RetrievalFailed(String),

    #[error("failed to extract package archive: {0}")]
    ExtractionFailed(String),

    #[error("malformed metadata document: {0}")]
    Parse(String),

    #[error("checksum mismatch for attachment: {attachment}")]
    ChecksumMismatch { attachment: String },

    #[error("signing service call failed: {0}")]
    SigningFailed(String),

    #[error("signature validation call failed: {0}")]
    ValidationCallFailed(String),

    #[error("failed to upload signed package: {0}")]
    UploadFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::IdentifierInvalid(_) => "identifier_invalid",
            Error::RetrievalFailed(_) => "retrieval_failed",
            Error::ExtractionFailed(_) => "extraction_failed",
            Error::Parse(_) => "parse_error",
            Error::ChecksumMismatch { .. } => "checksum_mismatch",
            Error::SigningFailed(_) => "signing_failed",
            Error::ValidationCallFailed(_) => "validation_call_failed",
            Error::UploadFailed(_) => "upload_failed",
            Error::Io(_) => "io_error",
        }
    }

    /// `Io` error for a file that is expected but absent on disk.
    pub fn missing_file(path: &Path) -> Self {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("file not found: {}", path.display()),
        ))
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ExtractionFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
