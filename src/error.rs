use thiserror::Error;

#[derive(Error, Debug)]
pub enum J2kError {
    /// A parameter value was malformed or contradicts another one.
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Point ({x}, {y}) lies outside the subband mask")]
    OutOfBounds { x: i64, y: i64 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid data: {0}")]
    InvalidData(&'static str),
}

pub type J2kResult<T> = Result<T, J2kError>;

impl J2kError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
