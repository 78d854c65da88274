use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::models::{Account, ContactUpdate, LearningStats, NewAccount};
use crate::db::DatabaseError;

const ACCOUNT_COLUMNS: &str =
    "id, email, phone_number, fullname, role, registration_method, created_at, updated_at";

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, DatabaseError>;

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<Account>, DatabaseError>;

    async fn create(&self, new_account: &NewAccount) -> Result<Account, DatabaseError>;

    /// Whether an account other than `except` already owns `email` (case-insensitive).
    async fn email_taken(&self, email: &str, except: Uuid) -> Result<bool, DatabaseError>;

    async fn phone_taken(&self, phone_number: &str, except: Uuid) -> Result<bool, DatabaseError>;

    /// Writes contact fields. Never touches the registration method.
    async fn update_contact(&self, id: Uuid, update: &ContactUpdate) -> Result<Account, DatabaseError>;

    async fn learning_stats(&self, id: Uuid, active_since: OffsetDateTime) -> Result<LearningStats, DatabaseError>;
}

pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, DatabaseError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<Account>, DatabaseError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE phone_number = $1");
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(phone_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn create(&self, new_account: &NewAccount) -> Result<Account, DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO accounts (id, email, phone_number, fullname, role, registration_method)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        );
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(Uuid::now_v7())
            .bind(new_account.email.as_deref().map(str::to_lowercase))
            .bind(&new_account.phone_number)
            .bind(&new_account.fullname)
            .bind(new_account.role)
            .bind(new_account.registration_method)
            .fetch_one(&self.pool)
            .await?;
        Ok(account)
    }

    async fn email_taken(&self, email: &str, except: Uuid) -> Result<bool, DatabaseError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM accounts WHERE LOWER(email) = LOWER($1) AND id <> $2)",
        )
        .bind(email)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn phone_taken(&self, phone_number: &str, except: Uuid) -> Result<bool, DatabaseError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM accounts WHERE phone_number = $1 AND id <> $2)",
        )
        .bind(phone_number)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn update_contact(&self, id: Uuid, update: &ContactUpdate) -> Result<Account, DatabaseError> {
        let sql = format!(
            r#"
            UPDATE accounts
            SET
                fullname = COALESCE($1, fullname),
                email = COALESCE(LOWER($2), email),
                phone_number = COALESCE($3, phone_number),
                updated_at = NOW()
            WHERE id = $4
            RETURNING {ACCOUNT_COLUMNS}
            "#
        );
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(&update.fullname)
            .bind(&update.email)
            .bind(&update.phone_number)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(account)
    }

    async fn learning_stats(&self, id: Uuid, active_since: OffsetDateTime) -> Result<LearningStats, DatabaseError> {
        let (total_purchases, total_bookmarks, total_courses, completed_courses, recent_activity_count): (
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM purchases WHERE account_id = $1),
                (SELECT COUNT(*) FROM bookmarks WHERE account_id = $1),
                (SELECT COUNT(*) FROM enrollments WHERE account_id = $1),
                (SELECT COUNT(*) FROM enrollments WHERE account_id = $1 AND is_completed),
                (SELECT COUNT(*) FROM topic_progress WHERE account_id = $1 AND last_watched_at >= $2)
            "#,
        )
        .bind(id)
        .bind(active_since)
        .fetch_one(&self.pool)
        .await?;

        Ok(LearningStats {
            total_purchases,
            total_bookmarks,
            total_courses,
            completed_courses,
            completion_rate: LearningStats::completion_rate(completed_courses, total_courses),
            recent_activity_count,
        })
    }
}
