use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{TaskResult, TaskStatus};
use crate::db::DatabaseError;

const TASK_COLUMNS: &str = "id, task_name, enrollment_id, status, attempts, result, created_at, updated_at";

#[async_trait]
pub trait TaskResultRepository: Send + Sync {
    async fn create_pending(&self, id: Uuid, task_name: &str, enrollment_id: Uuid) -> Result<TaskResult, DatabaseError>;

    async fn record_attempt(&self, id: Uuid, attempts: i32, last_error: &str) -> Result<(), DatabaseError>;

    async fn finish(
        &self,
        id: Uuid,
        status: TaskStatus,
        attempts: i32,
        result: serde_json::Value,
    ) -> Result<TaskResult, DatabaseError>;

    async fn find(&self, id: Uuid) -> Result<Option<TaskResult>, DatabaseError>;
}

pub struct PgTaskResultRepository {
    pool: PgPool,
}

impl PgTaskResultRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskResultRepository for PgTaskResultRepository {
    async fn create_pending(&self, id: Uuid, task_name: &str, enrollment_id: Uuid) -> Result<TaskResult, DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO task_results (id, task_name, enrollment_id, status, attempts)
            VALUES ($1, $2, $3, 'pending', 0)
            RETURNING {TASK_COLUMNS}
            "#
        );
        let task = sqlx::query_as::<_, TaskResult>(&sql)
            .bind(id)
            .bind(task_name)
            .bind(enrollment_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(task)
    }

    async fn record_attempt(&self, id: Uuid, attempts: i32, last_error: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE task_results
            SET attempts = $2, result = jsonb_build_object('last_error', $3::text), updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(attempts)
        .bind(last_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finish(
        &self,
        id: Uuid,
        status: TaskStatus,
        attempts: i32,
        result: serde_json::Value,
    ) -> Result<TaskResult, DatabaseError> {
        let sql = format!(
            r#"
            UPDATE task_results
            SET status = $2, attempts = $3, result = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        );
        let task = sqlx::query_as::<_, TaskResult>(&sql)
            .bind(id)
            .bind(status)
            .bind(attempts)
            .bind(result)
            .fetch_one(&self.pool)
            .await?;
        Ok(task)
    }

    async fn find(&self, id: Uuid) -> Result<Option<TaskResult>, DatabaseError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM task_results WHERE id = $1");
        let task = sqlx::query_as::<_, TaskResult>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }
}
