use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use std::fmt;
use time::OffsetDateTime;

use super::PurchaseTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "certificate_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CertificateType {
    Internship,
    Training,
    Credit,
    Recommendation,
    Placement,
}

impl CertificateType {
    const STANDARD: [CertificateType; 4] = [
        CertificateType::Internship,
        CertificateType::Training,
        CertificateType::Credit,
        CertificateType::Recommendation,
    ];

    /// Types issued for a purchase tier. Placement is Gold Pass only.
    pub fn for_tier(tier: PurchaseTier) -> Vec<CertificateType> {
        let mut types = Self::STANDARD.to_vec();
        if tier == PurchaseTier::Gold {
            types.push(CertificateType::Placement);
        }
        types
    }

    pub fn slug(self) -> &'static str {
        match self {
            CertificateType::Internship => "internship",
            CertificateType::Training => "training",
            CertificateType::Credit => "credit",
            CertificateType::Recommendation => "recommendation",
            CertificateType::Placement => "placement",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            CertificateType::Internship => "Internship Certificate",
            CertificateType::Training => "Training Certificate",
            CertificateType::Credit => "Credit Certificate",
            CertificateType::Recommendation => "Letter of Recommendation",
            CertificateType::Placement => "Placement Certificate",
        }
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "certificate_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Pending,
    Sent,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Certificate {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub certificate_type: CertificateType,
    pub verification_id: String,
    pub storage_key: String,
    pub status: CertificateStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub sent_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewCertificate {
    pub certificate_type: CertificateType,
    pub storage_key: String,
}
