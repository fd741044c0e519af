//! Data models for the application
//!
//! This module contains the data structures used throughout the application,
//! organized by domain.

mod import_job;
mod student;

// Re-export all models for convenient imports
pub use import_job::*;
pub use student::*;
