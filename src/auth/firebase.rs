use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use super::AuthError;

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const JWKS_TTL: Duration = Duration::from_secs(3600);

/// Phone identity proven by the third-party verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPhone {
    /// National number, country code removed.
    pub phone_number: String,
    pub full_phone: String,
    pub uid: String,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<VerifiedPhone, AuthError>;
}

/// Strips the `+91` country code, then any remaining `+`.
pub fn normalize_phone(raw: &str) -> String {
    let raw = raw.trim();
    raw.strip_prefix("+91").unwrap_or(raw).replace('+', "")
}

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    phone_number: Option<String>,
}

/// Verifies Firebase ID tokens against Google's published signing keys.
pub struct FirebaseVerifier {
    http: reqwest::Client,
    project_id: String,
    keys: RwLock<Option<(Instant, JwkSet)>>,
}

impl FirebaseVerifier {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            project_id: project_id.into(),
            keys: RwLock::new(None),
        }
    }

    async fn fetch_keys(&self) -> Result<JwkSet, AuthError> {
        let keys = self
            .http
            .get(JWKS_URL)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AuthError::IdentityUnavailable(e.to_string()))?
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::IdentityUnavailable(e.to_string()))?;
        debug!(count = keys.keys.len(), "Fetched Firebase signing keys");
        Ok(keys)
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cached = self.keys.read().await;
            if let Some((fetched_at, keys)) = cached.as_ref() {
                if fetched_at.elapsed() < JWKS_TTL {
                    if let Some(jwk) = keys.find(kid) {
                        return DecodingKey::from_jwk(jwk)
                            .map_err(|e| AuthError::IdentityRejected(e.to_string()));
                    }
                }
            }
        }

        // Stale cache or a rotated key.
        let keys = self.fetch_keys().await?;
        let key = keys
            .find(kid)
            .ok_or_else(|| AuthError::IdentityRejected(format!("unknown signing key {kid}")))
            .and_then(|jwk| {
                DecodingKey::from_jwk(jwk).map_err(|e| AuthError::IdentityRejected(e.to_string()))
            });
        *self.keys.write().await = Some((Instant::now(), keys));
        key
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, id_token: &str) -> Result<VerifiedPhone, AuthError> {
        let header = decode_header(id_token)
            .map_err(|_| AuthError::IdentityRejected("Invalid or expired Firebase token".into()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::IdentityRejected("Firebase token has no key id".into()))?;
        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!("https://securetoken.google.com/{}", self.project_id)]);

        let claims = decode::<FirebaseClaims>(id_token, &key, &validation)
            .map_err(|_| AuthError::IdentityRejected("Invalid or expired Firebase token".into()))?
            .claims;
        let full_phone = claims
            .phone_number
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| AuthError::IdentityRejected("Phone number not found in token".into()))?;

        Ok(VerifiedPhone {
            phone_number: normalize_phone(&full_phone),
            full_phone,
            uid: claims.sub,
        })
    }
}
