pub mod health;
pub mod import_status;
pub mod import_submit;
