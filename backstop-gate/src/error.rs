use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("gate configuration error: {0}")]
    Config(String),
    #[error("gate runtime error: {0}")]
    Runtime(String),
    #[error("gate IO error: {0}")]
    Io(#[from] std::io::Error),
}
