use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use time::OffsetDateTime;

/// Channel an account was originally created through. Never changes after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "registration_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RegistrationMethod {
    Email,
    Phone,
}

impl RegistrationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationMethod::Email => "email",
            RegistrationMethod::Phone => "phone_otp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "account_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Student,
    Admin,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub fullname: Option<String>,
    pub role: AccountRole,
    pub registration_method: RegistrationMethod,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Account {
    /// Name used on certificates and in mail greetings.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.fullname.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }
        match (&self.email, &self.phone_number) {
            (Some(email), _) => email.split('@').next().unwrap_or(email).to_string(),
            (None, Some(phone)) => phone.clone(),
            (None, None) => "Student".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub fullname: Option<String>,
    pub role: AccountRole,
    pub registration_method: RegistrationMethod,
}

/// Contact fields that survived the profile gate. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactUpdate {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

impl ContactUpdate {
    pub fn is_empty(&self) -> bool {
        self.fullname.is_none() && self.email.is_none() && self.phone_number.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LearningStats {
    pub total_purchases: i64,
    pub total_bookmarks: i64,
    pub total_courses: i64,
    pub completed_courses: i64,
    pub completion_rate: f64,
    pub recent_activity_count: i64,
}

impl LearningStats {
    /// Percentage of started courses that are complete, rounded to one decimal.
    pub fn completion_rate(completed: i64, total: i64) -> f64 {
        if total <= 0 {
            return 0.0;
        }
        let rate = completed as f64 / total as f64 * 100.0;
        (rate * 10.0).round() / 10.0
    }
}
