use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::render::{CertificateDocument, DocumentRenderer};
use super::verification::verification_id;
use crate::db::models::{CertificateType, EnrollmentDetail, NewCertificate};
use crate::db::repositories::{CertificateRepository, EnrollmentRepository};
use crate::db::DatabaseError;
use crate::storage::{slugify, MediaKey, MediaLayout, ObjectStorage};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Enrollment not found: {0}")]
    NotFound(Uuid),

    #[error("Enrollment {0} is not completed")]
    Incomplete(Uuid),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CertificateOutcome {
    Issued {
        certificate_id: Uuid,
        key: MediaKey,
        url: String,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeOutcome {
    pub certificate_type: CertificateType,
    #[serde(flatten)]
    pub outcome: CertificateOutcome,
}

/// Per-type result of one generation run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub enrollment_id: Uuid,
    pub verification_id: String,
    pub outcomes: Vec<TypeOutcome>,
}

impl GenerationReport {
    pub fn issued_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, CertificateOutcome::Issued { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.issued_count()
    }
}

pub struct CertificateGenerator {
    enrollments: Arc<dyn EnrollmentRepository>,
    certificates: Arc<dyn CertificateRepository>,
    storage: Arc<dyn ObjectStorage>,
    renderer: Arc<dyn DocumentRenderer>,
    layout: MediaLayout,
}

impl CertificateGenerator {
    pub fn new(
        enrollments: Arc<dyn EnrollmentRepository>,
        certificates: Arc<dyn CertificateRepository>,
        storage: Arc<dyn ObjectStorage>,
        renderer: Arc<dyn DocumentRenderer>,
        layout: MediaLayout,
    ) -> Self {
        Self {
            enrollments,
            certificates,
            storage,
            renderer,
            layout,
        }
    }

    /// Issues the tier's certificate set for a completed enrollment.
    ///
    /// A failing type does not stop the others. Issued types replace the
    /// enrollment's previous batch; when nothing could be issued the previous
    /// batch is left alone.
    #[instrument(skip_all, fields(enrollment_id = %enrollment_id))]
    pub async fn generate(&self, enrollment_id: Uuid) -> Result<GenerationReport, GenerationError> {
        let detail = self
            .enrollments
            .find_detail(enrollment_id)
            .await?
            .ok_or(GenerationError::NotFound(enrollment_id))?;
        if !detail.enrollment.is_completed {
            return Err(GenerationError::Incomplete(enrollment_id));
        }

        let now = OffsetDateTime::now_utc();
        let verification_id = verification_id(enrollment_id, detail.account.id, now);
        let requested = CertificateType::for_tier(detail.tier);

        let mut written: Vec<(CertificateType, MediaKey)> = Vec::with_capacity(requested.len());
        let mut failures: Vec<(CertificateType, String)> = Vec::new();
        for kind in &requested {
            match self.issue_one(&detail, *kind, &verification_id, now).await {
                Ok(key) => written.push((*kind, key)),
                Err(reason) => {
                    warn!(certificate_type = %kind, %reason, "Certificate could not be issued");
                    failures.push((*kind, reason));
                }
            }
        }

        let stored = if written.is_empty() {
            Vec::new()
        } else {
            let batch: Vec<NewCertificate> = written
                .iter()
                .map(|(kind, key)| NewCertificate {
                    certificate_type: *kind,
                    storage_key: key.as_str().to_string(),
                })
                .collect();
            self.certificates
                .replace_batch(enrollment_id, &verification_id, &batch)
                .await?
        };

        let outcomes = requested
            .iter()
            .map(|kind| {
                let outcome = match written.iter().find(|(k, _)| k == kind) {
                    Some((_, key)) => {
                        let certificate_id = stored
                            .iter()
                            .find(|c| c.certificate_type == *kind)
                            .map(|c| c.id)
                            .unwrap_or_default();
                        CertificateOutcome::Issued {
                            certificate_id,
                            url: self.layout.public_url(key),
                            key: key.clone(),
                        }
                    }
                    None => CertificateOutcome::Failed {
                        reason: failures
                            .iter()
                            .find(|(k, _)| k == kind)
                            .map(|(_, reason)| reason.clone())
                            .unwrap_or_default(),
                    },
                };
                TypeOutcome {
                    certificate_type: *kind,
                    outcome,
                }
            })
            .collect();

        let report = GenerationReport {
            enrollment_id,
            verification_id,
            outcomes,
        };
        info!(
            verification_id = %report.verification_id,
            issued = report.issued_count(),
            failed = report.failed_count(),
            "Certificate batch generated"
        );
        Ok(report)
    }

    async fn issue_one(
        &self,
        detail: &EnrollmentDetail,
        kind: CertificateType,
        verification_id: &str,
        now: OffsetDateTime,
    ) -> Result<MediaKey, String> {
        let student_name = detail.account.display_name();
        let document = CertificateDocument {
            certificate_type: kind,
            student_name: student_name.clone(),
            program_name: detail.program.full_name(),
            verification_id: verification_id.to_string(),
            completed_on: detail.enrollment.completed_at.unwrap_or(now),
        };

        let rendered = self
            .renderer
            .render(&document)
            .await
            .map_err(|e| format!("render failed: {e}"))?;

        let slug_source = if slugify(&student_name).is_empty() {
            detail.account.id.to_string()
        } else {
            student_name
        };
        let key = self
            .layout
            .key("certificates", kind.slug(), &slug_source, Uuid::new_v4(), rendered.extension)
            .map_err(|e| e.to_string())?;

        self.storage
            .put(&key, rendered.bytes, rendered.content_type)
            .await
            .map_err(|e| format!("storage write failed: {e}"))?;
        Ok(key)
    }
}
