//! Error types for the mangadl application.
//!
//! Uses `thiserror` for structured error definitions that provide
//! clear context about what went wrong.

use thiserror::Error;

/// Error type for catalog (MangaDex API) operations.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The catalog answered with something we could not use
    #[error("Catalog API error: {0}")]
    Api(String),

    /// The input is neither a manga URL, a UUID, nor a legacy numeric id
    #[error("Please enter a valid MangaDex manga (not chapter) URL or ID: {0}")]
    InvalidId(String),

    /// Manga, chapter, group or user not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// No title in the requested language, the alt titles, or English
    #[error("Could not retrieve manga title for {0}")]
    MissingTitle(String),

    /// The feed reported zero chapters for the language
    #[error("No chapters available to download!")]
    NoChapters,
}

impl CatalogError {
    /// Returns true when the error means there is simply nothing to download.
    pub fn is_nothing_to_download(&self) -> bool {
        matches!(self, CatalogError::NoChapters)
    }
}

/// Error type for page download and packaging.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Catalog lookup (delivery session) failed
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// HTTP request for a page failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The page server answered with a non-success status
    #[error("error {0}")]
    BadStatus(u16),

    /// Filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing the archive failed
    #[error("Failed to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory not found
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Result type alias using anyhow for application-level error handling.
pub type Result<T> = anyhow::Result<T>;
