use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("usage error: {0}")]
    Usage(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("invalid {kind} {raw:?}: {reason}")]
    InvalidHex {
        kind: &'static str,
        raw: String,
        reason: String,
    },
    #[error("invalid quantity {raw:?}")]
    InvalidQuantity { raw: String },
    #[error("unexpected shape for {what}: {found}")]
    Shape { what: &'static str, found: String },
}
