//! Campushire Core Library
//!
//! This crate provides core domain models, error types, configuration, and
//! validation shared across all Campushire components.

pub mod config;
pub mod error;
pub mod models;
pub mod sheet;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use sheet::{SheetError, REQUIRED_COLUMNS};
