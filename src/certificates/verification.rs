use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Eight uppercase hex characters shared by every certificate of one batch.
pub fn verification_id(enrollment_id: Uuid, account_id: Uuid, issued_at: OffsetDateTime) -> String {
    let mut hasher = Sha256::new();
    hasher.update(enrollment_id.as_bytes());
    hasher.update(account_id.as_bytes());
    hasher.update(issued_at.unix_timestamp_nanos().to_be_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    let digest = hasher.finalize();
    hex::encode_upper(&digest[..4])
}
