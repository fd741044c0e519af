//! Database repositories for the data access layer
//!
//! Each repository is responsible for a specific domain entity and provides
//! CRUD operations and specialized queries. The import worker consumes the
//! repositories through the traits in `traits`.

mod import_job;
mod student;
mod traits;

pub use import_job::ImportJobRepository;
pub use student::StudentRepository;
pub use traits::{ImportJobStore, StudentStore};
