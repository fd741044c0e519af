//! Database layer for Campushire.
//!
//! Postgres-backed repositories plus the store traits the import worker is
//! written against (so tests can substitute in-memory implementations).

pub mod db;

pub use db::{ImportJobRepository, ImportJobStore, StudentRepository, StudentStore};
