use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SpecbookError {
    #[error("invalid compound id: {0}")]
    InvalidCompoundId(String),

    #[error("invalid spectrum filename: {0}")]
    InvalidSpectrumFilename(String),

    #[error("webbook request failed: {0}")]
    WebbookHttp(String),

    #[error("webbook returned status {status}: {message}")]
    WebbookStatus { status: u16, message: String },

    #[error("compound index not found: {0}")]
    IndexNotFound(Utf8PathBuf),

    #[error("failed to read compound index: {0}")]
    IndexRead(String),

    #[error("compound index is missing column {0}")]
    IndexColumn(String),

    #[error("archive not found: {0}")]
    ArchiveNotFound(Utf8PathBuf),

    #[error("failed to read archive: {0}")]
    ArchiveRead(String),

    #[error("no peak data found in {0}")]
    NoPeakData(String),

    #[error("malformed peak pair {pair:?} in {origin}")]
    MalformedPeakPair { origin: String, pair: String },

    #[error("destination is not a directory: {0}")]
    NotADirectory(Utf8PathBuf),

    #[error("output directory does not exist: {0}")]
    MissingOutputDir(Utf8PathBuf),

    #[error("invalid crawl delay: {0}")]
    InvalidDelay(f64),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
