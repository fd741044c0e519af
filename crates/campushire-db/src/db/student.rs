use sqlx::PgPool;
use uuid::Uuid;

use campushire_core::models::StudentUpsert;
use campushire_core::AppError;

/// Repository for student records (the record store the row processor writes
/// into). The upsert key is `(tenant_id, enrollment_no)`, so re-importing a
/// corrected spreadsheet updates rather than duplicates.
#[derive(Clone)]
pub struct StudentRepository {
    pool: PgPool,
}

impl StudentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or update one student record. Exactly one row is
    /// created-or-updated per call.
    #[tracing::instrument(skip(self, upsert), fields(enrollment_no = %upsert.enrollment_no))]
    pub async fn upsert_student(
        &self,
        tenant_id: Uuid,
        upsert: &StudentUpsert,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO students (
                tenant_id, enrollment_no, name, email,
                branch, graduation_year, phone, cgpa
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (tenant_id, enrollment_no) DO UPDATE
            SET name = EXCLUDED.name,
                email = EXCLUDED.email,
                branch = EXCLUDED.branch,
                graduation_year = EXCLUDED.graduation_year,
                phone = EXCLUDED.phone,
                cgpa = EXCLUDED.cgpa,
                updated_at = NOW()
            "#,
        )
        .bind(tenant_id)
        .bind(&upsert.enrollment_no)
        .bind(&upsert.name)
        .bind(&upsert.email)
        .bind(&upsert.branch)
        .bind(upsert.graduation_year)
        .bind(&upsert.phone)
        .bind(upsert.cgpa)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
