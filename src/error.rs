use thiserror::Error;

/// Errors surfaced by schedule ingestion and persistence
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// File extension is not one of the accepted schedule formats
    #[error("Unsupported file format: {0} (expected .csv or .xlsx)")]
    UnsupportedFormat(String),

    /// Grid is too small or has no usable header structure
    #[error("Malformed schedule input: {0}")]
    MalformedInput(String),

    /// Error reading or writing a file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error decoding delimited text
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error decoding a spreadsheet workbook
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    /// Error encoding or decoding stored JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Write to the shared schedule store was rejected
    #[error("Remote write failed: {0}")]
    RemoteWrite(String),
}

/// Result type for schedule operations
pub type Result<T> = std::result::Result<T, ScheduleError>;
