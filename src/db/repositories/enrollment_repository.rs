use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::models::{
    Account, AccountRole, CertificateTotals, CompletedEnrollmentRow, Enrollment, EnrollmentDetail,
    IssueFilter, IssueState, Program, PurchaseTier, RegistrationMethod,
};
use crate::db::pagination::{Page, PageRequest};
use crate::db::DatabaseError;

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    async fn find_detail(&self, enrollment_id: Uuid) -> Result<Option<EnrollmentDetail>, DatabaseError>;

    /// Completed enrollments with their certificate state, newest completion first.
    async fn completed_overview(
        &self,
        search: Option<&str>,
        filter: IssueFilter,
        page: PageRequest,
    ) -> Result<Page<CompletedEnrollmentRow>, DatabaseError>;

    async fn certificate_totals(&self) -> Result<CertificateTotals, DatabaseError>;
}

pub struct PgEnrollmentRepository {
    pool: PgPool,
}

impl PgEnrollmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DetailRow {
    enrollment_id: Uuid,
    purchase_id: Uuid,
    is_completed: bool,
    started_at: OffsetDateTime,
    completed_at: Option<OffsetDateTime>,
    account_id: Uuid,
    email: Option<String>,
    phone_number: Option<String>,
    fullname: Option<String>,
    role: AccountRole,
    registration_method: RegistrationMethod,
    account_created_at: OffsetDateTime,
    account_updated_at: OffsetDateTime,
    tier: PurchaseTier,
    program_id: Uuid,
    title: String,
    subtitle: Option<String>,
    slug: String,
    category: String,
}

impl From<DetailRow> for EnrollmentDetail {
    fn from(row: DetailRow) -> Self {
        EnrollmentDetail {
            enrollment: Enrollment {
                id: row.enrollment_id,
                account_id: row.account_id,
                purchase_id: row.purchase_id,
                is_completed: row.is_completed,
                started_at: row.started_at,
                completed_at: row.completed_at,
            },
            account: Account {
                id: row.account_id,
                email: row.email,
                phone_number: row.phone_number,
                fullname: row.fullname,
                role: row.role,
                registration_method: row.registration_method,
                created_at: row.account_created_at,
                updated_at: row.account_updated_at,
            },
            program: Program {
                id: row.program_id,
                title: row.title,
                subtitle: row.subtitle,
                slug: row.slug,
                category: row.category,
            },
            tier: row.tier,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OverviewRow {
    enrollment_id: Uuid,
    account_id: Uuid,
    student_name: Option<String>,
    student_email: Option<String>,
    program_title: String,
    tier: PurchaseTier,
    completed_at: Option<OffsetDateTime>,
    verification_id: Option<String>,
    certificates_issued: i64,
    certificates_sent: i64,
}

impl From<OverviewRow> for CompletedEnrollmentRow {
    fn from(row: OverviewRow) -> Self {
        CompletedEnrollmentRow {
            state: IssueState::from_counts(row.certificates_issued, row.certificates_sent),
            enrollment_id: row.enrollment_id,
            account_id: row.account_id,
            student_name: row.student_name,
            student_email: row.student_email,
            program_title: row.program_title,
            tier: row.tier,
            completed_at: row.completed_at,
            verification_id: row.verification_id,
            certificates_issued: row.certificates_issued,
            certificates_sent: row.certificates_sent,
        }
    }
}

// $1 = ILIKE pattern or NULL, $2 = 'all' | 'sent' | 'pending'
const OVERVIEW_BODY: &str = r#"
    SELECT
        e.id AS enrollment_id,
        e.account_id,
        a.fullname AS student_name,
        a.email AS student_email,
        g.title AS program_title,
        p.tier,
        e.completed_at,
        MAX(c.verification_id) AS verification_id,
        COUNT(c.id) AS certificates_issued,
        COUNT(c.id) FILTER (WHERE c.status = 'sent') AS certificates_sent
    FROM enrollments e
    JOIN accounts a ON a.id = e.account_id
    JOIN purchases p ON p.id = e.purchase_id
    JOIN programs g ON g.id = p.program_id
    LEFT JOIN certificates c ON c.enrollment_id = e.id
    WHERE e.is_completed
      AND ($1::text IS NULL OR a.fullname ILIKE $1 OR a.email ILIKE $1 OR g.title ILIKE $1)
    GROUP BY e.id, a.id, g.id, p.id
    HAVING $2 = 'all'
        OR ($2 = 'sent' AND COUNT(c.id) > 0 AND COUNT(c.id) FILTER (WHERE c.status = 'sent') = COUNT(c.id))
        OR ($2 = 'pending' AND NOT (COUNT(c.id) > 0 AND COUNT(c.id) FILTER (WHERE c.status = 'sent') = COUNT(c.id)))
"#;

fn filter_param(filter: IssueFilter) -> &'static str {
    match filter {
        IssueFilter::All => "all",
        IssueFilter::Sent => "sent",
        IssueFilter::Pending => "pending",
    }
}

pub(crate) fn like_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")))
}

#[async_trait]
impl EnrollmentRepository for PgEnrollmentRepository {
    async fn find_detail(&self, enrollment_id: Uuid) -> Result<Option<EnrollmentDetail>, DatabaseError> {
        let row = sqlx::query_as::<_, DetailRow>(
            r#"
            SELECT
                e.id AS enrollment_id, e.purchase_id, e.is_completed, e.started_at, e.completed_at,
                a.id AS account_id, a.email, a.phone_number, a.fullname, a.role, a.registration_method,
                a.created_at AS account_created_at, a.updated_at AS account_updated_at,
                p.tier,
                g.id AS program_id, g.title, g.subtitle, g.slug, g.category
            FROM enrollments e
            JOIN accounts a ON a.id = e.account_id
            JOIN purchases p ON p.id = e.purchase_id
            JOIN programs g ON g.id = p.program_id
            WHERE e.id = $1
            "#,
        )
        .bind(enrollment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(EnrollmentDetail::from))
    }

    async fn completed_overview(
        &self,
        search: Option<&str>,
        filter: IssueFilter,
        page: PageRequest,
    ) -> Result<Page<CompletedEnrollmentRow>, DatabaseError> {
        let pattern = like_pattern(search);
        let status = filter_param(filter);

        let count_sql = format!("SELECT COUNT(*) FROM ({OVERVIEW_BODY}) AS overview");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&pattern)
            .bind(status)
            .fetch_one(&self.pool)
            .await?;

        let page = page.clamp(total as u64);
        let page_sql =
            format!("{OVERVIEW_BODY} ORDER BY e.completed_at DESC NULLS LAST, e.id LIMIT $3 OFFSET $4");
        let rows = sqlx::query_as::<_, OverviewRow>(&page_sql)
            .bind(&pattern)
            .bind(status)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(
            rows.into_iter().map(CompletedEnrollmentRow::from).collect(),
            page,
            total as u64,
        ))
    }

    async fn certificate_totals(&self) -> Result<CertificateTotals, DatabaseError> {
        let (total_completed, total_sent): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE issued > 0 AND sent = issued)
            FROM (
                SELECT
                    COUNT(c.id) AS issued,
                    COUNT(c.id) FILTER (WHERE c.status = 'sent') AS sent
                FROM enrollments e
                LEFT JOIN certificates c ON c.enrollment_id = e.id
                WHERE e.is_completed
                GROUP BY e.id
            ) AS per_enrollment
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CertificateTotals {
            total_completed,
            total_sent,
            total_pending: total_completed - total_sent,
        })
    }
}
