use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::error;
use uuid::Uuid;

/// How long a claimed job may run before another worker may take it over.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Malformed job payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// One delivery attempt of a certificate dispatch task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchJob {
    pub task_id: Uuid,
    pub enrollment_id: Uuid,
    pub attempt: u32,
}

impl DispatchJob {
    pub fn first(task_id: Uuid, enrollment_id: Uuid) -> Self {
        Self {
            task_id,
            enrollment_id,
            attempt: 1,
        }
    }

    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Makes `job` available to workers once `delay` has passed.
    async fn push(&self, job: &DispatchJob, delay: Duration) -> Result<(), QueueError>;

    /// Leases one ready job to the caller. The job stays in flight until it is
    /// acknowledged, and goes back to the ready set if its lease runs out first.
    async fn pop_ready(&self) -> Result<Option<DispatchJob>, QueueError>;

    /// Releases a leased job for good once its outcome is recorded.
    async fn ack(&self, job: &DispatchJob) -> Result<(), QueueError>;

    /// Moves jobs whose lease expired back to the ready set. Returns how many moved.
    async fn requeue_expired(&self) -> Result<usize, QueueError>;
}

/// Moves the earliest ready member into the leased set in one step, so two
/// workers can never claim the same member.
static CLAIM: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
        local ready = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, 1)
        if #ready == 0 then
            return false
        end
        redis.call('ZREM', KEYS[1], ready[1])
        redis.call('ZADD', KEYS[2], ARGV[2], ready[1])
        return ready[1]
        ",
    )
});

/// Moves leased members past their deadline back to the ready set, ready now.
static RECLAIM: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
        local expired = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
        for _, member in ipairs(expired) do
            redis.call('ZREM', KEYS[2], member)
            redis.call('ZADD', KEYS[1], ARGV[1], member)
        end
        return #expired
        ",
    )
});

/// Delayed queue on two Redis sorted sets: ready jobs scored by ready-at epoch
/// milliseconds, leased jobs scored by lease deadline.
#[derive(Clone)]
pub struct RedisQueue {
    connection: ConnectionManager,
    key: String,
    leased_key: String,
    lease: Duration,
}

impl RedisQueue {
    pub async fn connect(url: &str, key: impl Into<String>, lease: Duration) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_connection_manager().await?;
        let key = key.into();
        Ok(Self {
            connection,
            leased_key: format!("{key}:leased"),
            key,
            lease,
        })
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[async_trait]
impl TaskQueue for RedisQueue {
    async fn push(&self, job: &DispatchJob, delay: Duration) -> Result<(), QueueError> {
        let member = serde_json::to_string(job)?;
        let ready_at = now_millis() + delay.as_millis() as i64;
        let mut connection = self.connection.clone();
        let _: i64 = connection.zadd(&self.key, member, ready_at).await?;
        Ok(())
    }

    async fn pop_ready(&self) -> Result<Option<DispatchJob>, QueueError> {
        let mut connection = self.connection.clone();
        let now = now_millis();
        let claimed: Option<String> = CLAIM
            .key(&self.key)
            .key(&self.leased_key)
            .arg(now)
            .arg(now + self.lease.as_millis() as i64)
            .invoke_async(&mut connection)
            .await?;
        let Some(member) = claimed else {
            return Ok(None);
        };

        match serde_json::from_str(&member) {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                error!(payload = %member, "Dropping undecodable dispatch job");
                let _: i64 = connection.zrem(&self.leased_key, &member).await?;
                Err(e.into())
            }
        }
    }

    async fn ack(&self, job: &DispatchJob) -> Result<(), QueueError> {
        // Serialization is deterministic, so the member is rebuilt from the job.
        let member = serde_json::to_string(job)?;
        let mut connection = self.connection.clone();
        let _: i64 = connection.zrem(&self.leased_key, member).await?;
        Ok(())
    }

    async fn requeue_expired(&self) -> Result<usize, QueueError> {
        let mut connection = self.connection.clone();
        let moved: usize = RECLAIM
            .key(&self.key)
            .key(&self.leased_key)
            .arg(now_millis())
            .invoke_async(&mut connection)
            .await?;
        Ok(moved)
    }
}
