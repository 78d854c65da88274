use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

use super::AuthError;
use crate::config::AuthConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// HS256 access/refresh tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    fn issue(&self, account_id: Uuid, kind: TokenKind) -> Result<String, AuthError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.sign(&Claims {
            sub: account_id,
            kind,
            iat: now,
            exp: now + ttl.as_secs() as i64,
            jti: Uuid::new_v4(),
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::TokenIssue(e.to_string()))
    }

    pub fn issue_pair(&self, account_id: Uuid) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue(account_id, TokenKind::Access)?,
            refresh_token: self.issue(account_id, TokenKind::Refresh)?,
        })
    }

    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?
            .claims;
        if claims.kind != expected {
            return Err(AuthError::WrongTokenKind);
        }
        Ok(claims)
    }

    /// Account id carried by a valid access token.
    pub fn verify_access(&self, token: &str) -> Result<Uuid, AuthError> {
        Ok(self.verify(token, TokenKind::Access)?.sub)
    }

    /// Exchanges a refresh token for a fresh access token.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.verify(refresh_token, TokenKind::Refresh)?;
        self.issue(claims.sub, TokenKind::Access)
    }
}
