//! Row processor: validates one source row and upserts it into the tenant's
//! student records.

use uuid::Uuid;

use campushire_core::models::{StudentRow, StudentUpsert};
use campushire_core::validation::{is_valid_cgpa, is_valid_email, is_valid_graduation_year};
use campushire_core::AppError;
use campushire_db::StudentStore;

/// Outcome of processing a single row. A rejection is recorded on the job,
/// never thrown; a store failure is a pipeline fault and aborts the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Ok,
    Rejected(String),
}

/// Validate required fields and build the upsert payload. Returns the
/// rejection reason on failure.
fn validate_row(row: &StudentRow) -> Result<StudentUpsert, String> {
    let enrollment_no = row
        .get("enrollment_no")
        .ok_or_else(|| "missing_field:enrollment_no".to_string())?;
    let name = row
        .get("name")
        .ok_or_else(|| "missing_field:name".to_string())?;
    let email = row
        .get("email")
        .ok_or_else(|| "missing_field:email".to_string())?;

    if !is_valid_email(email) {
        return Err("invalid_email".to_string());
    }

    let graduation_year = match row.get("graduation_year") {
        Some(raw) => {
            let year: i32 = raw
                .parse()
                .map_err(|_| "invalid_field:graduation_year".to_string())?;
            if !is_valid_graduation_year(year) {
                return Err("invalid_field:graduation_year".to_string());
            }
            Some(year)
        }
        None => None,
    };

    let cgpa = match row.get("cgpa") {
        Some(raw) => {
            let value: f64 = raw.parse().map_err(|_| "invalid_field:cgpa".to_string())?;
            if !is_valid_cgpa(value) {
                return Err("invalid_field:cgpa".to_string());
            }
            Some(value)
        }
        None => None,
    };

    Ok(StudentUpsert {
        enrollment_no: enrollment_no.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        branch: row.get("branch").map(str::to_string),
        graduation_year,
        phone: row.get("phone").map(str::to_string),
        cgpa,
    })
}

/// Process one row: validate, then upsert keyed by
/// `(tenant_id, enrollment_no)`. Zero writes on rejection.
pub async fn process_row(
    store: &dyn StudentStore,
    tenant_id: Uuid,
    row: &StudentRow,
) -> Result<RowOutcome, AppError> {
    let upsert = match validate_row(row) {
        Ok(upsert) => upsert,
        Err(reason) => {
            tracing::debug!(
                tenant_id = %tenant_id,
                row_index = row.row_index,
                reason = %reason,
                "Row rejected"
            );
            return Ok(RowOutcome::Rejected(reason));
        }
    };

    store.upsert_student(tenant_id, &upsert).await?;
    Ok(RowOutcome::Ok)
}
