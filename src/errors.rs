// errors.rs
use thiserror::Error;

use crate::domain::validation::ValidationErrors;
use crate::export::ExportError;
use crate::scraper::ScraperError;

/// Errors originating from either the server logic
/// (routing, missing resources, etc.) or downstream layers (DB, export, scraper).
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not Found")]
    NotFound,
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
    #[error("Database Error: {0}")]
    DbError(String),
    #[error("Spreadsheet Error: {0}")]
    XlsxError(String),
    #[error("Scraper Error: {0}")]
    Scraper(#[from] ScraperError),
    #[error("Config Error: {0}")]
    Config(String),
    #[error("Internal Server Error")]
    InternalError,
}

impl ServerError {
    /// Short machine-readable kind used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::NotFound => "not_found",
            ServerError::BadRequest(_) => "bad_request",
            ServerError::Validation(_) => "validation",
            ServerError::Export(_) => "export",
            ServerError::DbError(_) => "database",
            ServerError::XlsxError(_) => "spreadsheet",
            ServerError::Scraper(_) => "scraper",
            ServerError::Config(_) => "config",
            ServerError::InternalError => "internal",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            ServerError::NotFound => 404,
            ServerError::BadRequest(_) | ServerError::Export(_) => 400,
            ServerError::Validation(_) => 422,
            ServerError::Scraper(_) => 502,
            ServerError::DbError(_)
            | ServerError::XlsxError(_)
            | ServerError::Config(_)
            | ServerError::InternalError => 500,
        }
    }
}

impl From<rusqlite::Error> for ServerError {
    fn from(e: rusqlite::Error) -> Self {
        ServerError::DbError(e.to_string())
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(e: serde_json::Error) -> Self {
        ServerError::BadRequest(format!("Invalid JSON: {e}"))
    }
}
