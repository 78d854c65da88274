use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::firebase::IdentityVerifier;
use super::tokens::{TokenPair, TokenService};
use super::AuthError;
use crate::db::models::{Account, AccountRole, NewAccount, RegistrationMethod};
use crate::db::repositories::AccountRepository;
use crate::db::DatabaseError;

#[derive(Debug, Clone, Serialize)]
pub struct SignIn {
    pub message: &'static str,
    pub account_id: Uuid,
    pub created: bool,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

pub struct AuthService {
    accounts: Arc<dyn AccountRepository>,
    verifier: Arc<dyn IdentityVerifier>,
    tokens: Arc<TokenService>,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        verifier: Arc<dyn IdentityVerifier>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            accounts,
            verifier,
            tokens,
        }
    }

    /// Signs in by verified phone, creating a phone-registered student on first use.
    pub async fn phone_sign_in(&self, id_token: &str, name: Option<&str>) -> Result<SignIn, AuthError> {
        let phone = self.verifier.verify(id_token).await?;

        let (account, created) = match self.accounts.find_by_phone(&phone.phone_number).await? {
            Some(account) => (account, false),
            None => {
                let name = name
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .ok_or(AuthError::NameRequired)?;
                let new_account = NewAccount {
                    email: None,
                    phone_number: Some(phone.phone_number.clone()),
                    fullname: Some(name.to_string()),
                    role: AccountRole::Student,
                    registration_method: RegistrationMethod::Phone,
                };
                match self.accounts.create(&new_account).await {
                    Ok(account) => (account, true),
                    // Concurrent first sign-in with the same phone.
                    Err(DatabaseError::Duplicate) => {
                        let account = self
                            .accounts
                            .find_by_phone(&phone.phone_number)
                            .await?
                            .ok_or(AuthError::AccountNotFound)?;
                        (account, false)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let tokens = self.tokens.issue_pair(account.id)?;
        info!(account_id = %account.id, created, "Phone sign-in");
        Ok(SignIn {
            message: if created {
                "User created and signed in successfully"
            } else {
                "Phone signin successful"
            },
            account_id: account.id,
            created,
            tokens,
        })
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        self.tokens.refresh(refresh_token)
    }

    /// Resolves a bearer access token to its account.
    pub async fn authenticate(&self, access_token: &str) -> Result<Account, AuthError> {
        let account_id = self.tokens.verify_access(access_token)?;
        self.accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)
    }
}
