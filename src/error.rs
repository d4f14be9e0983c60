use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed row at byte {offset}: {reason} in '{row}'")]
    MalformedRow {
        offset: usize,
        row: String,
        reason: &'static str,
    },

    #[error("Line of {length} bytes exceeds the {limit} byte limit; raise max_line_length")]
    OversizedLine { length: usize, limit: usize },

    #[error("No stations observed in input")]
    NoStations,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Worker thread panicked: {0}")]
    WorkerPanic(String),
}

impl From<config::ConfigError> for ProcessingError {
    fn from(err: config::ConfigError) -> Self {
        ProcessingError::Config(err.to_string())
    }
}

impl ProcessingError {
    /// Build a malformed-row error from the offending bytes.
    pub fn malformed(offset: usize, row: &[u8], reason: &'static str) -> Self {
        ProcessingError::MalformedRow {
            offset,
            row: String::from_utf8_lossy(row).into_owned(),
            reason,
        }
    }

    /// Rebase a chunk-relative row offset onto the whole input
    pub fn at_offset(self, base: usize) -> Self {
        match self {
            ProcessingError::MalformedRow {
                offset,
                row,
                reason,
            } => ProcessingError::MalformedRow {
                offset: base + offset,
                row,
                reason,
            },
            other => other,
        }
    }
}
