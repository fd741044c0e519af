use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One raw parsed spreadsheet row: header -> cell, plus its 1-based position
/// in the source file (header row excluded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRow {
    pub row_index: i64,
    fields: HashMap<String, String>,
}

impl StudentRow {
    pub fn new(row_index: i64, fields: HashMap<String, String>) -> Self {
        Self { row_index, fields }
    }

    /// Trimmed cell value for a header; blank cells read as None.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Validated upsert payload produced by the row processor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudentUpsert {
    pub enrollment_no: String,
    pub name: String,
    pub email: String,
    pub branch: Option<String>,
    pub graduation_year: Option<i32>,
    pub phone: Option<String>,
    pub cgpa: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_get_trims_and_blanks() {
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), "  Riya Sharma ".to_string());
        fields.insert("email".to_string(), "   ".to_string());
        let row = StudentRow::new(1, fields);

        assert_eq!(row.get("name"), Some("Riya Sharma"));
        assert_eq!(row.get("email"), None);
        assert_eq!(row.get("missing"), None);
    }
}
