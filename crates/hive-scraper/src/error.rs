//! Scraper error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Unexpected answer from platform: {0}")]
    Platform(String),

    #[error("Login failed for {email}: {reason}")]
    Auth { email: String, reason: String },

    #[error("WebDriver error: {0}")]
    WebDriver(String),

    #[error("Timed out waiting for {0}")]
    RenderTimeout(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScrapeError {
    /// Network-layer failures that a reconnect may cure. Server-side 5xx
    /// answers count; 4xx answers do not. Render timeouts do not either: the
    /// browser answered, the page just never showed the element.
    pub fn is_transport(&self) -> bool {
        match self {
            ScrapeError::Http(_) | ScrapeError::WebDriver(_) => true,
            ScrapeError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
