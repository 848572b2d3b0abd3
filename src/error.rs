//! Crate-wide error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Transient or protocol-level KV failure. Surfaced to the caller
    /// unchanged; the broker never retries on its own.
    #[error("kv error: {0}")]
    Kv(String),

    /// A strategy or limiter name was requested that no registered
    /// factory provides. Raised at first use, not at config parse time.
    #[error("{kind} '{name}' is not defined")]
    NotDefined { kind: &'static str, name: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("queue driver is disabled")]
    Disabled,

    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::Kv(e.to_string())
    }
}

impl Error {
    pub fn not_defined(kind: &'static str, name: impl Into<String>) -> Self {
        Error::NotDefined {
            kind,
            name: name.into(),
        }
    }
}
