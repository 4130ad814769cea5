use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrawlError {
    #[error("browser error: {0}")]
    Browser(String),

    #[error("page error: {0}")]
    Page(String),

    #[error("timed out after {0:?} waiting for {1}")]
    Wait(Duration, String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("two-factor authentication required")]
    TwoFactorRequired,

    #[error("metadata extraction gave up after {attempts} attempts")]
    MetadataGaveUp { attempts: u32 },

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TrawlError>;
