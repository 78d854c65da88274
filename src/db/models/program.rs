use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use time::OffsetDateTime;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Program {
    pub id: Uuid,
    pub title: String,
    pub subtitle: Option<String>,
    pub slug: String,
    pub category: String,
}

impl Program {
    /// "<title> <subtitle>", as printed on certificates.
    pub fn full_name(&self) -> String {
        match self.subtitle.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(subtitle) => format!("{} {}", self.title, subtitle),
            None => self.title.clone(),
        }
    }
}

/// Purchase level. Gold Pass adds the placement certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "purchase_tier", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseTier {
    #[default]
    Standard,
    Gold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "purchase_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Active,
    Revoked,
}

/// How access was granted. Admin assignments never went through payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "purchase_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseSource {
    Payment,
    AdminAssignment,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Purchase {
    pub id: Uuid,
    pub account_id: Uuid,
    pub program_id: Uuid,
    pub amount_paid_cents: i64,
    pub tier: PurchaseTier,
    pub status: PurchaseStatus,
    pub source: PurchaseSource,
    #[serde(with = "time::serde::rfc3339")]
    pub purchased_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub revoked_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewGrant {
    pub account_id: Uuid,
    pub program_id: Uuid,
    pub tier: PurchaseTier,
}

/// Headline counts above the admin assignment list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssignmentStats {
    /// Every purchase, paid or granted, in any status.
    pub total_assignments: i64,
    pub active_assignments: i64,
    /// Distinct students holding at least one active purchase.
    pub total_students_with_programs: i64,
}

/// One row of the admin assignment list.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AssignmentListing {
    pub id: Uuid,
    pub account_id: Uuid,
    pub student_name: Option<String>,
    pub student_email: Option<String>,
    pub program_id: Uuid,
    pub program_title: String,
    pub tier: PurchaseTier,
    pub status: PurchaseStatus,
    pub source: PurchaseSource,
    pub amount_paid_cents: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub purchased_at: OffsetDateTime,
}
