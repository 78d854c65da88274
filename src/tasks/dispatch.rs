use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::queue::{DispatchJob, QueueError, TaskQueue};
use crate::db::models::TaskStatus;
use crate::db::repositories::{CertificateRepository, EnrollmentRepository, TaskResultRepository};
use crate::db::DatabaseError;
use crate::mail::{attachment_content_type, CertificateMail, MailAttachment, MailError, Mailer};
use crate::storage::{MediaLayout, ObjectStorage, StorageError};

pub const TASK_NAME: &str = "send_certificates_email";

/// Total attempts per task, the first one included.
pub const MAX_ATTEMPTS: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_secs(60);

/// Why one delivery attempt did not go out.
#[derive(Debug, Error)]
pub enum DispatchFailure {
    #[error("Course progress not found: {0}")]
    EnrollmentNotFound(Uuid),

    #[error("Enrollment {0} is not completed")]
    Incomplete(Uuid),

    #[error("No certificates found")]
    NoCertificates,

    #[error("Student has no email address")]
    NoRecipient,

    #[error("No certificate files available to attach")]
    NothingAttached,

    #[error("Certificate storage unavailable: {0}")]
    Storage(String),

    #[error("Mail delivery failed: {0}")]
    Mail(#[from] MailError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl DispatchFailure {
    /// Mail, storage and database errors are retried. Everything else fails the task.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DispatchFailure::Mail(_) | DispatchFailure::Storage(_) | DispatchFailure::Database(_)
        )
    }
}

/// Bookkeeping failure around a job, as opposed to a failed delivery.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchSuccess {
    pub email: String,
    pub certificates_count: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Retrying { next_attempt: u32 },
    Failed,
}

/// Creates dispatch tasks. Callers only learn that the task was accepted.
pub struct DispatchScheduler {
    tasks: Arc<dyn TaskResultRepository>,
    queue: Arc<dyn TaskQueue>,
}

impl DispatchScheduler {
    pub fn new(tasks: Arc<dyn TaskResultRepository>, queue: Arc<dyn TaskQueue>) -> Self {
        Self { tasks, queue }
    }

    pub async fn enqueue(&self, enrollment_id: Uuid) -> Result<Uuid, TaskError> {
        let task_id = Uuid::now_v7();
        self.tasks.create_pending(task_id, TASK_NAME, enrollment_id).await?;
        self.queue
            .push(&DispatchJob::first(task_id, enrollment_id), Duration::ZERO)
            .await?;
        info!(%task_id, %enrollment_id, "Certificate dispatch enqueued");
        Ok(task_id)
    }
}

pub struct CertificateDispatch {
    enrollments: Arc<dyn EnrollmentRepository>,
    certificates: Arc<dyn CertificateRepository>,
    tasks: Arc<dyn TaskResultRepository>,
    storage: Arc<dyn ObjectStorage>,
    mailer: Arc<dyn Mailer>,
    queue: Arc<dyn TaskQueue>,
    mail: CertificateMail,
    layout: MediaLayout,
}

impl CertificateDispatch {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        enrollments: Arc<dyn EnrollmentRepository>,
        certificates: Arc<dyn CertificateRepository>,
        tasks: Arc<dyn TaskResultRepository>,
        storage: Arc<dyn ObjectStorage>,
        mailer: Arc<dyn Mailer>,
        queue: Arc<dyn TaskQueue>,
        mail: CertificateMail,
        layout: MediaLayout,
    ) -> Self {
        Self {
            enrollments,
            certificates,
            tasks,
            storage,
            mailer,
            queue,
            mail,
            layout,
        }
    }

    pub fn queue(&self) -> Arc<dyn TaskQueue> {
        self.queue.clone()
    }

    /// Runs one leased attempt, applies the retry policy to its result and
    /// acknowledges the lease. On `Err` the lease is left to expire, so the same
    /// attempt runs again once the queue reclaims it.
    #[instrument(skip_all, fields(task_id = %job.task_id, enrollment_id = %job.enrollment_id, attempt = job.attempt))]
    pub async fn process(&self, job: DispatchJob) -> Result<JobOutcome, TaskError> {
        let outcome = self.settle(&job).await?;
        self.queue.ack(&job).await?;
        Ok(outcome)
    }

    async fn settle(&self, job: &DispatchJob) -> Result<JobOutcome, TaskError> {
        let attempts = job.attempt as i32;
        match self.attempt(job).await {
            Ok(success) => {
                info!(email = %success.email, count = success.certificates_count, "Certificates sent");
                self.tasks
                    .finish(job.task_id, TaskStatus::Success, attempts, json!(success))
                    .await?;
                Ok(JobOutcome::Succeeded)
            }
            Err(failure) if failure.is_transient() && job.attempt < MAX_ATTEMPTS => {
                warn!(error = %failure, "Dispatch attempt failed, retrying in {}s", RETRY_DELAY.as_secs());
                // The retry must be queued even if the progress note below is lost.
                let next = job.next_attempt();
                self.queue.push(&next, RETRY_DELAY).await?;
                if let Err(e) = self
                    .tasks
                    .record_attempt(job.task_id, attempts, &failure.to_string())
                    .await
                {
                    warn!(error = %e, "Failed to record dispatch attempt");
                }
                Ok(JobOutcome::Retrying {
                    next_attempt: next.attempt,
                })
            }
            Err(failure) => {
                error!(error = %failure, "Dispatch failed");
                self.tasks
                    .finish(
                        job.task_id,
                        TaskStatus::Failure,
                        attempts,
                        json!({ "error": failure.to_string(), "attempts": job.attempt }),
                    )
                    .await?;
                Ok(JobOutcome::Failed)
            }
        }
    }

    /// One delivery attempt: gather, attach, send, then flag the batch as sent.
    pub async fn attempt(&self, job: &DispatchJob) -> Result<DispatchSuccess, DispatchFailure> {
        let detail = self
            .enrollments
            .find_detail(job.enrollment_id)
            .await?
            .ok_or(DispatchFailure::EnrollmentNotFound(job.enrollment_id))?;
        if !detail.enrollment.is_completed {
            return Err(DispatchFailure::Incomplete(job.enrollment_id));
        }

        let certificates = self.certificates.list_for_enrollment(job.enrollment_id).await?;
        if certificates.is_empty() {
            return Err(DispatchFailure::NoCertificates);
        }

        let recipient = detail
            .account
            .email
            .clone()
            .filter(|email| !email.trim().is_empty())
            .ok_or(DispatchFailure::NoRecipient)?;

        let mut attachments = Vec::with_capacity(certificates.len());
        let mut backend_error = None;
        for certificate in &certificates {
            let bytes = match self.layout.resolve_stored(&certificate.storage_key) {
                Ok(key) => self.storage.get(&key).await,
                Err(e) => Err(e),
            };
            match bytes {
                Ok(bytes) => {
                    let file_name = CertificateMail::attachment_name(certificate);
                    attachments.push(MailAttachment {
                        content_type: attachment_content_type(&file_name).to_string(),
                        file_name,
                        bytes,
                    });
                }
                Err(e) => {
                    error!(certificate_id = %certificate.id, error = %e, "Error attaching certificate");
                    if let StorageError::Backend(reason) = e {
                        backend_error = Some(reason);
                    }
                }
            }
        }
        if attachments.is_empty() {
            // Backend errors are retried, missing files are not.
            return Err(match backend_error {
                Some(reason) => DispatchFailure::Storage(reason),
                None => DispatchFailure::NothingAttached,
            });
        }

        let count = attachments.len();
        let message = self.mail.compose(&detail, &recipient, attachments);
        self.mailer.send(message).await?;

        self.certificates
            .mark_sent(job.enrollment_id, OffsetDateTime::now_utc())
            .await?;

        Ok(DispatchSuccess {
            message: format!(
                "Successfully sent {count} certificates to {}",
                detail.account.display_name()
            ),
            email: recipient,
            certificates_count: count,
        })
    }
}
