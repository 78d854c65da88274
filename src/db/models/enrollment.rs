use serde::Serialize;
use sqlx::types::Uuid;
use time::OffsetDateTime;

use super::{Account, Program, PurchaseTier};

/// A student's progress through one purchased program.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub account_id: Uuid,
    pub purchase_id: Uuid,
    pub is_completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

/// Enrollment joined with everything certificate work needs.
#[derive(Debug, Clone)]
pub struct EnrollmentDetail {
    pub enrollment: Enrollment,
    pub account: Account,
    pub program: Program,
    pub tier: PurchaseTier,
}

/// Certificate state of one completed enrollment, as shown to admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    NotIssued,
    Pending,
    Sent,
}

impl IssueState {
    pub fn from_counts(issued: i64, sent: i64) -> Self {
        match (issued, sent) {
            (0, _) => IssueState::NotIssued,
            (issued, sent) if sent >= issued => IssueState::Sent,
            _ => IssueState::Pending,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IssueState::NotIssued => "Not issued",
            IssueState::Pending => "Pending",
            IssueState::Sent => "Sent",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletedEnrollmentRow {
    pub enrollment_id: Uuid,
    pub account_id: Uuid,
    pub student_name: Option<String>,
    pub student_email: Option<String>,
    pub program_title: String,
    pub tier: PurchaseTier,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    pub verification_id: Option<String>,
    pub certificates_issued: i64,
    pub certificates_sent: i64,
    pub state: IssueState,
}

/// Status filter on the admin certificate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueFilter {
    #[default]
    All,
    Sent,
    Pending,
}

impl IssueFilter {
    /// `pending` covers enrollments without any certificate too.
    pub fn matches(self, state: IssueState) -> bool {
        match self {
            IssueFilter::All => true,
            IssueFilter::Sent => state == IssueState::Sent,
            IssueFilter::Pending => state != IssueState::Sent,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CertificateTotals {
    pub total_completed: i64,
    pub total_sent: i64,
    pub total_pending: i64,
}
