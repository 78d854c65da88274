//! Phone sign-in, JWT access/refresh pairs and bearer extraction.

mod extract;
mod firebase;
mod service;
mod tokens;

use thiserror::Error;

use crate::db::DatabaseError;

pub use extract::{AdminAccount, AuthenticatedAccount};
pub use firebase::{normalize_phone, FirebaseVerifier, IdentityVerifier, VerifiedPhone};
pub use service::{AuthService, SignIn};
pub use tokens::{Claims, TokenKind, TokenPair, TokenService};

#[cfg(test)]
pub use firebase::fake::FakeVerifier;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingCredentials,

    #[error("Invalid or expired token: {0}")]
    InvalidToken(String),

    #[error("Wrong token type")]
    WrongTokenKind,

    #[error("Failed to issue token: {0}")]
    TokenIssue(String),

    #[error("{0}")]
    IdentityRejected(String),

    #[error("Identity service unavailable: {0}")]
    IdentityUnavailable(String),

    #[error("Full name is required for new users. Please provide your name.")]
    NameRequired,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Admin access required")]
    Forbidden,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}
