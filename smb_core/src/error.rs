use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("state error: {0}")]
    State(String),
    #[error("context intent error: {0}")]
    Intent(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
