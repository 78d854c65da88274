//! Student profile reads and the contact-channel update gate.
//!
//! The channel an account registered through is its identity and stays fixed;
//! only the other channel (and the name) can be edited.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::db::models::{Account, ContactUpdate, LearningStats, RegistrationMethod};
use crate::db::repositories::AccountRepository;
use crate::db::DatabaseError;

/// Window for `recent_activity_count`.
const RECENT_ACTIVITY_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub can_update_email: bool,
    pub can_update_phone: bool,
}

impl Capabilities {
    pub fn for_method(method: RegistrationMethod) -> Self {
        match method {
            RegistrationMethod::Email => Capabilities {
                can_update_email: false,
                can_update_phone: true,
            },
            RegistrationMethod::Phone => Capabilities {
                can_update_email: true,
                can_update_phone: false,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(length(min = 1, max = 255, message = "Full name must be between 1 and 255 characters"))]
    pub fullname: Option<String>,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 7, max = 15, message = "Phone number must be between 7 and 15 characters"))]
    pub phone_number: Option<String>,
}

impl UpdateProfile {
    /// Trims every field; blank fields count as not provided.
    fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }
        Self {
            fullname: clean(self.fullname),
            email: clean(self.email),
            phone_number: clean(self.phone_number),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Account not found")]
    NotFound,

    #[error("Invalid profile data")]
    Validation(#[from] ValidationErrors),

    #[error("{reason}")]
    FieldLocked { field: &'static str, reason: &'static str },

    #[error("This {} is already registered with another account", field_label(field))]
    AlreadyInUse { field: &'static str },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

fn field_label(field: &str) -> &str {
    match field {
        "phone_number" => "phone number",
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileView {
    pub id: Uuid,
    pub email: Option<String>,
    pub fullname: String,
    pub phone_number: String,
    #[serde(flatten)]
    pub capabilities: Capabilities,
    pub registration_type: &'static str,
}

impl From<&Account> for ProfileView {
    fn from(account: &Account) -> Self {
        ProfileView {
            id: account.id,
            email: account.email.clone(),
            fullname: account.fullname.clone().unwrap_or_default(),
            phone_number: account.phone_number.clone().unwrap_or_default(),
            capabilities: Capabilities::for_method(account.registration_method),
            registration_type: account.registration_method.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileOverview {
    pub user_info: ProfileView,
    pub learning_stats: LearningStats,
}

pub struct ProfileService {
    accounts: Arc<dyn AccountRepository>,
}

impl ProfileService {
    pub fn new(accounts: Arc<dyn AccountRepository>) -> Self {
        Self { accounts }
    }

    async fn load(&self, account_id: Uuid) -> Result<Account, ProfileError> {
        self.accounts
            .find_by_id(account_id)
            .await?
            .ok_or(ProfileError::NotFound)
    }

    pub async fn overview(&self, account_id: Uuid) -> Result<ProfileOverview, ProfileError> {
        let account = self.load(account_id).await?;
        let since = OffsetDateTime::now_utc() - Duration::days(RECENT_ACTIVITY_DAYS);
        let learning_stats = self.accounts.learning_stats(account_id, since).await?;
        Ok(ProfileOverview {
            user_info: ProfileView::from(&account),
            learning_stats,
        })
    }

    /// Applies a contact update. Either every provided field is written or none is.
    pub async fn update(&self, account_id: Uuid, request: UpdateProfile) -> Result<ProfileView, ProfileError> {
        let request = request.normalized();
        request.validate()?;

        let account = self.load(account_id).await?;
        let capabilities = Capabilities::for_method(account.registration_method);

        if request.email.is_some() && !capabilities.can_update_email {
            return Err(ProfileError::FieldLocked {
                field: "email",
                reason: "Email cannot be updated for accounts registered via email",
            });
        }
        if request.phone_number.is_some() && !capabilities.can_update_phone {
            return Err(ProfileError::FieldLocked {
                field: "phone_number",
                reason: "Phone number cannot be updated for accounts registered via phone OTP",
            });
        }

        if let Some(email) = &request.email {
            if self.accounts.email_taken(email, account_id).await? {
                return Err(ProfileError::AlreadyInUse { field: "email" });
            }
        }
        if let Some(phone) = &request.phone_number {
            if self.accounts.phone_taken(phone, account_id).await? {
                return Err(ProfileError::AlreadyInUse { field: "phone_number" });
            }
        }

        let update = ContactUpdate {
            fullname: request.fullname,
            email: request.email,
            phone_number: request.phone_number,
        };
        if update.is_empty() {
            return Ok(ProfileView::from(&account));
        }

        let updated = match self.accounts.update_contact(account_id, &update).await {
            Ok(account) => account,
            // Lost a race with another account claiming the same value.
            Err(DatabaseError::Duplicate) => {
                let field = if update.email.is_some() { "email" } else { "phone_number" };
                return Err(ProfileError::AlreadyInUse { field });
            }
            Err(e) => return Err(e.into()),
        };

        info!(account_id = %account_id, "Profile updated");
        Ok(ProfileView::from(&updated))
    }
}
