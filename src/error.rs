//! Error types for the license check agent

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for license check operations
pub type Result<T> = std::result::Result<T, LicenseCheckError>;

#[derive(Error, Debug)]
pub enum LicenseCheckError {

    // =============================
    // Setup Errors
    // =============================

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("Document store error: {0}")]
    DocumentStore(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    // =============================
    // Verification Errors
    // =============================

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Verification error: {0}")]
    Verification(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workbook write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}
