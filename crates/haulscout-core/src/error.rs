use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HaulError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("ENCRYPTION_KEY is not set")]
    MissingEncryptionKey,
    #[error("Decryption error: {0}")]
    Decryption(String),
    #[error("Encryption error: {0}")]
    Encryption(String),
    #[error("Marketplace session expired")]
    SessionExpired,
    #[error("No marketplace account connected for user {0}")]
    NotConnected(String),
    #[error("Browser error: {0}")]
    Browser(String),
    #[error("Scraping error: {0}")]
    Scraping(String),
    #[error("Scan worker has stopped")]
    WorkerStopped,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid value: {0}")]
    Invalid(String),
}

impl HaulError {
    /// Errors the user can only fix by reconnecting their marketplace account.
    pub fn needs_reconnect(&self) -> bool {
        matches!(
            self,
            HaulError::SessionExpired | HaulError::NotConnected(_) | HaulError::Decryption(_)
        )
    }

    /// Message stored in the scan status side channel.
    pub fn user_message(&self) -> String {
        if self.needs_reconnect() {
            format!("{}. Please reconnect your account.", self)
        } else {
            self.to_string()
        }
    }
}

pub type Result<T> = std::result::Result<T, HaulError>;
