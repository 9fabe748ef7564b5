use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("state file {path}: {source}")]
    State {
        path: String,
        #[source]
        source: smb_core::CoreError,
    },
    #[error("audit row has {got} columns, header has {expected}")]
    ColumnMismatch { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, AdapterError>;
