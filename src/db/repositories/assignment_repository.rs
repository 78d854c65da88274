use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::enrollment_repository::like_pattern;
use crate::db::models::{AssignmentListing, AssignmentStats, NewGrant, Program, Purchase};
use crate::db::pagination::{Page, PageRequest};
use crate::db::DatabaseError;

const PURCHASE_COLUMNS: &str =
    "id, account_id, program_id, amount_paid_cents, tier, status, source, purchased_at, revoked_at";

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn find_program(&self, program_id: Uuid) -> Result<Option<Program>, DatabaseError>;

    async fn find_active(&self, account_id: Uuid, program_id: Uuid) -> Result<Option<Purchase>, DatabaseError>;

    /// Inserts a free, already-active grant and the enrollment it opens.
    async fn create_grant(&self, grant: &NewGrant) -> Result<Purchase, DatabaseError>;

    /// Revokes an active grant. `None` when the grant is unknown or no longer active.
    async fn revoke(&self, purchase_id: Uuid, revoked_at: OffsetDateTime) -> Result<Option<Purchase>, DatabaseError>;

    async fn count_active(&self, account_id: Uuid, program_id: Uuid) -> Result<i64, DatabaseError>;

    async fn list(&self, search: Option<&str>, page: PageRequest) -> Result<Page<AssignmentListing>, DatabaseError>;

    /// Unfiltered counts over every purchase.
    async fn stats(&self) -> Result<AssignmentStats, DatabaseError>;
}

pub struct PgAssignmentRepository {
    pool: PgPool,
}

impl PgAssignmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const LISTING_BODY: &str = r#"
    FROM purchases p
    JOIN accounts a ON a.id = p.account_id
    JOIN programs g ON g.id = p.program_id
    WHERE ($1::text IS NULL
        OR a.fullname ILIKE $1 OR a.email ILIKE $1 OR g.title ILIKE $1 OR g.category ILIKE $1)
"#;

#[async_trait]
impl AssignmentRepository for PgAssignmentRepository {
    async fn find_program(&self, program_id: Uuid) -> Result<Option<Program>, DatabaseError> {
        let program = sqlx::query_as::<_, Program>(
            "SELECT id, title, subtitle, slug, category FROM programs WHERE id = $1",
        )
        .bind(program_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(program)
    }

    async fn find_active(&self, account_id: Uuid, program_id: Uuid) -> Result<Option<Purchase>, DatabaseError> {
        let sql = format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE account_id = $1 AND program_id = $2 AND status = 'active'"
        );
        let purchase = sqlx::query_as::<_, Purchase>(&sql)
            .bind(account_id)
            .bind(program_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(purchase)
    }

    async fn create_grant(&self, grant: &NewGrant) -> Result<Purchase, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO purchases (id, account_id, program_id, amount_paid_cents, tier, status, source)
            VALUES ($1, $2, $3, 0, $4, 'active', 'admin_assignment')
            RETURNING {PURCHASE_COLUMNS}
            "#
        );
        let purchase = sqlx::query_as::<_, Purchase>(&sql)
            .bind(Uuid::now_v7())
            .bind(grant.account_id)
            .bind(grant.program_id)
            .bind(grant.tier)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO enrollments (id, account_id, purchase_id) VALUES ($1, $2, $3)")
            .bind(Uuid::now_v7())
            .bind(grant.account_id)
            .bind(purchase.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(purchase)
    }

    async fn revoke(&self, purchase_id: Uuid, revoked_at: OffsetDateTime) -> Result<Option<Purchase>, DatabaseError> {
        let sql = format!(
            r#"
            UPDATE purchases
            SET status = 'revoked', revoked_at = $2
            WHERE id = $1 AND status = 'active'
            RETURNING {PURCHASE_COLUMNS}
            "#
        );
        let purchase = sqlx::query_as::<_, Purchase>(&sql)
            .bind(purchase_id)
            .bind(revoked_at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(purchase)
    }

    async fn count_active(&self, account_id: Uuid, program_id: Uuid) -> Result<i64, DatabaseError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM purchases WHERE account_id = $1 AND program_id = $2 AND status = 'active'",
        )
        .bind(account_id)
        .bind(program_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn list(&self, search: Option<&str>, page: PageRequest) -> Result<Page<AssignmentListing>, DatabaseError> {
        let pattern = like_pattern(search);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {LISTING_BODY}"))
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        let page = page.clamp(total as u64);
        let sql = format!(
            r#"
            SELECT
                p.id, p.account_id, a.fullname AS student_name, a.email AS student_email,
                p.program_id, g.title AS program_title, p.tier, p.status, p.source,
                p.amount_paid_cents, p.purchased_at
            {LISTING_BODY}
            ORDER BY p.purchased_at DESC, p.id
            LIMIT $2 OFFSET $3
            "#
        );
        let items = sqlx::query_as::<_, AssignmentListing>(&sql)
            .bind(&pattern)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(items, page, total as u64))
    }

    async fn stats(&self) -> Result<AssignmentStats, DatabaseError> {
        let (total_assignments, active_assignments, total_students_with_programs): (i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE p.status = 'active'),
                    COUNT(DISTINCT p.account_id) FILTER (WHERE p.status = 'active' AND a.role = 'student')
                FROM purchases p
                JOIN accounts a ON a.id = p.account_id
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(AssignmentStats {
            total_assignments,
            active_assignments,
            total_students_with_programs,
        })
    }
}
