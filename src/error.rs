use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("index error: {0}")]
    Index(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown key {0}")]
    UnknownKey(u64),

    #[error("unknown translation {0}")]
    UnknownTranslation(u64),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
