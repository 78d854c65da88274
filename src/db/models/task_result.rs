use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Success,
    Failure,
}

/// Durable outcome of one background task, polled by operators.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct TaskResult {
    pub id: Uuid,
    pub task_name: String,
    pub enrollment_id: Uuid,
    pub status: TaskStatus,
    pub attempts: i32,
    pub result: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
