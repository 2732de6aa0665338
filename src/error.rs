// SPDX-License-Identifier: MIT

//! Error types for Visor

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Visor operations
pub type Result<T> = std::result::Result<T, VisorError>;

/// Visor error types
#[derive(Error, Debug)]
pub enum VisorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Source file missing: {0}")]
    MissingSourceFile(PathBuf),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
