use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::models::{Certificate, NewCertificate};
use crate::db::DatabaseError;

const CERTIFICATE_COLUMNS: &str =
    "id, enrollment_id, certificate_type, verification_id, storage_key, status, sent_at, created_at";

#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// Replaces the enrollment's batch with `batch`, all stamped with `verification_id`.
    async fn replace_batch(
        &self,
        enrollment_id: Uuid,
        verification_id: &str,
        batch: &[NewCertificate],
    ) -> Result<Vec<Certificate>, DatabaseError>;

    async fn list_for_enrollment(&self, enrollment_id: Uuid) -> Result<Vec<Certificate>, DatabaseError>;

    /// Flags every certificate of the enrollment as sent in one statement.
    async fn mark_sent(&self, enrollment_id: Uuid, sent_at: OffsetDateTime) -> Result<u64, DatabaseError>;
}

pub struct PgCertificateRepository {
    pool: PgPool,
}

impl PgCertificateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CertificateRepository for PgCertificateRepository {
    async fn replace_batch(
        &self,
        enrollment_id: Uuid,
        verification_id: &str,
        batch: &[NewCertificate],
    ) -> Result<Vec<Certificate>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM certificates WHERE enrollment_id = $1")
            .bind(enrollment_id)
            .execute(&mut *tx)
            .await?;

        let insert = format!(
            r#"
            INSERT INTO certificates (id, enrollment_id, certificate_type, verification_id, storage_key)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CERTIFICATE_COLUMNS}
            "#
        );

        let mut stored = Vec::with_capacity(batch.len());
        for certificate in batch {
            let row = sqlx::query_as::<_, Certificate>(&insert)
                .bind(Uuid::now_v7())
                .bind(enrollment_id)
                .bind(certificate.certificate_type)
                .bind(verification_id)
                .bind(&certificate.storage_key)
                .fetch_one(&mut *tx)
                .await?;
            stored.push(row);
        }

        tx.commit().await?;
        Ok(stored)
    }

    async fn list_for_enrollment(&self, enrollment_id: Uuid) -> Result<Vec<Certificate>, DatabaseError> {
        let sql = format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE enrollment_id = $1 ORDER BY created_at, id"
        );
        let certificates = sqlx::query_as::<_, Certificate>(&sql)
            .bind(enrollment_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(certificates)
    }

    async fn mark_sent(&self, enrollment_id: Uuid, sent_at: OffsetDateTime) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE certificates SET status = 'sent', sent_at = $2 WHERE enrollment_id = $1",
        )
        .bind(enrollment_id)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
