//! Import domain methods for the Campushire API client.

use anyhow::{Context, Result};
use uuid::Uuid;

use campushire_core::models::{ImportJobResponse, ImportSubmitResponse};

use crate::{api_prefix, ApiClient, ApiStatusError};

impl ApiClient {
    /// Submit a student spreadsheet for import from a local file path.
    pub async fn submit_import(
        &self,
        college_id: Uuid,
        file_path: &str,
    ) -> Result<ImportSubmitResponse> {
        let path = std::path::Path::new(file_path);
        if path
            .components()
            .any(|c| c == std::path::Component::ParentDir)
        {
            return Err(anyhow::anyhow!("Invalid input: {}", path.display()));
        }
        let buffer = std::fs::read(path)
            .with_context(|| format!("Failed to read file: {}", file_path))?;

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("students.csv");

        self.submit_import_bytes(college_id, filename, buffer).await
    }

    /// Submit a spreadsheet already held in memory.
    pub async fn submit_import_bytes(
        &self,
        college_id: Uuid,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<ImportSubmitResponse> {
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string()),
        );

        self.post_multipart(
            &format!("{}/colleges/{}/imports", api_prefix(), college_id),
            form,
        )
        .await
    }

    /// Fetch one import job by id.
    pub async fn get_import(&self, college_id: Uuid, job_id: Uuid) -> Result<ImportJobResponse> {
        self.get(&format!(
            "{}/colleges/{}/imports/{}",
            api_prefix(),
            college_id,
            job_id
        ))
        .await
    }

    /// Fetch the college's most recently created import job. `Ok(None)` means
    /// the college has no import jobs yet.
    pub async fn latest_import(&self, college_id: Uuid) -> Result<Option<ImportJobResponse>> {
        let result: Result<ImportJobResponse> = self
            .get(&format!(
                "{}/colleges/{}/imports/latest",
                api_prefix(),
                college_id
            ))
            .await;

        match result {
            Ok(job) => Ok(Some(job)),
            Err(e) => match e.downcast_ref::<ApiStatusError>() {
                Some(status) if status.status == 404 => Ok(None),
                _ => Err(e),
            },
        }
    }
}

/// Extract the in-flight job id from a 409 submission error, so callers can
/// switch to polling it instead of re-submitting.
pub fn conflict_job_id(err: &anyhow::Error) -> Option<Uuid> {
    let status = err.downcast_ref::<ApiStatusError>()?;
    if status.status != 409 {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(&status.body).ok()?;
    value
        .get("job_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_job_id_from_409_body() {
        let job_id = Uuid::new_v4();
        let err: anyhow::Error = ApiStatusError {
            status: 409,
            body: format!(
                r#"{{"error":"An import is already running for this college","code":"IMPORT_IN_PROGRESS","recoverable":false,"job_id":"{}"}}"#,
                job_id
            ),
        }
        .into();

        assert_eq!(conflict_job_id(&err), Some(job_id));
    }

    #[test]
    fn test_conflict_job_id_ignores_other_statuses() {
        let err: anyhow::Error = ApiStatusError {
            status: 400,
            body: r#"{"error":"file is empty","code":"UNPARSEABLE_FILE","recoverable":false}"#
                .to_string(),
        }
        .into();
        assert_eq!(conflict_job_id(&err), None);

        let transport = anyhow::anyhow!("connection refused");
        assert_eq!(conflict_job_id(&transport), None);
    }

    #[test]
    fn test_conflict_job_id_tolerates_unparseable_body() {
        let err: anyhow::Error = ApiStatusError {
            status: 409,
            body: "<html>conflict</html>".to_string(),
        }
        .into();
        assert_eq!(conflict_job_id(&err), None);
    }
}
