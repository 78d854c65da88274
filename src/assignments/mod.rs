//! Admin-granted program access without payment.

use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::db::models::{AccountRole, AssignmentListing, AssignmentStats, NewGrant, Purchase, PurchaseTier};
use crate::db::pagination::{Page, PageRequest, ADMIN_PAGE_SIZE};
use crate::db::repositories::{AccountRepository, AssignmentRepository};
use crate::db::DatabaseError;

#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("Student not found")]
    StudentNotFound,

    #[error("Program not found")]
    ProgramNotFound,

    #[error("Student already has active access to this program")]
    DuplicateGrant { existing: Uuid },

    #[error("Revoking access requires confirmation")]
    ConfirmationRequired,

    #[error("Assignment not found")]
    NotFound,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub struct AssignmentManager {
    accounts: Arc<dyn AccountRepository>,
    assignments: Arc<dyn AssignmentRepository>,
}

impl AssignmentManager {
    pub fn new(accounts: Arc<dyn AccountRepository>, assignments: Arc<dyn AssignmentRepository>) -> Self {
        Self { accounts, assignments }
    }

    /// Grants a student active, zero-cost access to a program.
    pub async fn assign(
        &self,
        student_id: Uuid,
        program_id: Uuid,
        tier: PurchaseTier,
    ) -> Result<Purchase, AssignmentError> {
        let student = self
            .accounts
            .find_by_id(student_id)
            .await?
            .filter(|account| account.role == AccountRole::Student)
            .ok_or(AssignmentError::StudentNotFound)?;
        let program = self
            .assignments
            .find_program(program_id)
            .await?
            .ok_or(AssignmentError::ProgramNotFound)?;

        if let Some(existing) = self.assignments.find_active(student.id, program.id).await? {
            return Err(AssignmentError::DuplicateGrant { existing: existing.id });
        }

        let grant = NewGrant {
            account_id: student.id,
            program_id: program.id,
            tier,
        };
        let purchase = match self.assignments.create_grant(&grant).await {
            Ok(purchase) => purchase,
            // The partial unique index caught a concurrent grant.
            Err(DatabaseError::Duplicate) => {
                let existing = self
                    .assignments
                    .find_active(student.id, program.id)
                    .await?
                    .map(|p| p.id)
                    .unwrap_or_default();
                return Err(AssignmentError::DuplicateGrant { existing });
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            purchase_id = %purchase.id,
            student_id = %student.id,
            program = %program.title,
            "Program assigned to {}",
            student.display_name()
        );
        Ok(purchase)
    }

    /// Ends an assignment's access immediately.
    pub async fn revoke(&self, grant_id: Uuid, confirmed: bool) -> Result<Purchase, AssignmentError> {
        if !confirmed {
            return Err(AssignmentError::ConfirmationRequired);
        }
        let purchase = self
            .assignments
            .revoke(grant_id, OffsetDateTime::now_utc())
            .await?
            .ok_or(AssignmentError::NotFound)?;
        info!(purchase_id = %purchase.id, "Assignment revoked");
        Ok(purchase)
    }

    pub async fn list(&self, search: Option<&str>, page: Option<u32>) -> Result<Page<AssignmentListing>, AssignmentError> {
        let request = PageRequest::new(page, ADMIN_PAGE_SIZE);
        Ok(self.assignments.list(search, request).await?)
    }

    pub async fn stats(&self) -> Result<AssignmentStats, AssignmentError> {
        Ok(self.assignments.stats().await?)
    }
}
