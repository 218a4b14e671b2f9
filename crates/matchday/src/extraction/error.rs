use std::fmt;

use thiserror::Error;

/// Classification of a failed fetch, stored on outcome rows as a short code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorClass {
    RateLimited,
    /// 403 carrying a bot challenge page.
    Challenge,
    Forbidden,
    Server(u16),
    Client(u16),
    Timeout,
    Network,
    Decode,
    /// The fetched payload could not be written to the raw tree.
    Storage,
}

impl HttpErrorClass {
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            429 => HttpErrorClass::RateLimited,
            403 if body.to_ascii_lowercase().contains("challenge") => HttpErrorClass::Challenge,
            403 => HttpErrorClass::Forbidden,
            500..=599 => HttpErrorClass::Server(status),
            _ => HttpErrorClass::Client(status),
        }
    }

    /// Whether a retry may succeed without operator action.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            HttpErrorClass::RateLimited
                | HttpErrorClass::Challenge
                | HttpErrorClass::Server(_)
                | HttpErrorClass::Timeout
        )
    }

    pub fn code(self) -> String {
        match self {
            HttpErrorClass::RateLimited => "http_429".to_string(),
            HttpErrorClass::Challenge => "http_403_challenge".to_string(),
            HttpErrorClass::Forbidden => "http_403".to_string(),
            HttpErrorClass::Server(code) | HttpErrorClass::Client(code) => format!("http_{}", code),
            HttpErrorClass::Timeout => "timeout".to_string(),
            HttpErrorClass::Network => "network".to_string(),
            HttpErrorClass::Decode => "decode".to_string(),
            HttpErrorClass::Storage => "storage".to_string(),
        }
    }
}

impl fmt::Display for HttpErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

/// A failed fetch of one match, as reported by a [`MatchSource`](super::MatchSource).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{endpoint}: {class} ({message})")]
pub struct FetchError {
    pub class: HttpErrorClass,
    pub endpoint: String,
    pub message: String,
}

impl FetchError {
    pub fn new(class: HttpErrorClass, endpoint: &str, message: impl Into<String>) -> Self {
        Self {
            class,
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }
}

/// Engine-level failures. Per-match failures are recorded, never returned here.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("Invalid extraction options: {0}")]
    InvalidOptions(String),
}
