use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::AdminAccount;
use crate::certificates::GenerationReport;
use crate::db::models::{
    AssignmentListing, AssignmentStats, CertificateTotals, CompletedEnrollmentRow, IssueFilter, Purchase, PurchaseTier,
    TaskResult,
};
use crate::db::pagination::{Page, PageRequest, ADMIN_PAGE_SIZE};
use crate::error::{AppError, AppResult};

/// Rows shown under "Recent completions" on the dashboard.
const DASHBOARD_RECENT: u32 = 5;

struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                error!("Failed to render template: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
struct DashboardTemplate {
    app_name: String,
    admin_name: String,
    totals: CertificateTotals,
    recent: Vec<CompletedEnrollmentRow>,
}

pub async fn admin_dashboard(
    State(state): State<AppState>,
    AdminAccount(admin): AdminAccount,
) -> AppResult<impl IntoResponse> {
    let totals = state.enrollments.certificate_totals().await?;
    let recent = state
        .enrollments
        .completed_overview(None, IssueFilter::All, PageRequest::new(None, DASHBOARD_RECENT))
        .await?
        .items;

    Ok(HtmlTemplate(DashboardTemplate {
        app_name: state.env.app.name.clone(),
        admin_name: admin.display_name(),
        totals,
        recent,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CertificateListQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub status: IssueFilter,
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CertificateList {
    pub totals: CertificateTotals,
    pub status: IssueFilter,
    pub search: Option<String>,
    #[serde(flatten)]
    pub page: Page<CompletedEnrollmentRow>,
}

pub async fn list_certificates(
    State(state): State<AppState>,
    _admin: AdminAccount,
    Query(query): Query<CertificateListQuery>,
) -> AppResult<Json<CertificateList>> {
    let search = query
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let page = state
        .enrollments
        .completed_overview(
            search.as_deref(),
            query.status,
            PageRequest::new(query.page, ADMIN_PAGE_SIZE),
        )
        .await?;
    let totals = state.enrollments.certificate_totals().await?;

    Ok(Json(CertificateList {
        totals,
        status: query.status,
        search,
        page,
    }))
}

#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub report: GenerationReport,
    /// Absent when nothing was issued, so nothing was queued.
    pub task_id: Option<Uuid>,
}

pub async fn generate_certificates(
    State(state): State<AppState>,
    AdminAccount(admin): AdminAccount,
    Path(enrollment_id): Path<Uuid>,
) -> AppResult<Json<GenerationResponse>> {
    info!(%enrollment_id, admin_id = %admin.id, "Certificate generation requested");
    let report = state.generator.generate(enrollment_id).await?;

    let task_id = if report.issued_count() > 0 {
        Some(state.scheduler.enqueue(enrollment_id).await?)
    } else {
        None
    };

    Ok(Json(GenerationResponse { report, task_id }))
}

#[derive(Debug, Serialize)]
pub struct DispatchQueued {
    pub task_id: Uuid,
    pub message: &'static str,
}

pub async fn send_certificates(
    State(state): State<AppState>,
    _admin: AdminAccount,
    Path(enrollment_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<DispatchQueued>)> {
    if state.enrollments.find_detail(enrollment_id).await?.is_none() {
        return Err(AppError::NotFound(format!("enrollment {enrollment_id}")));
    }
    let task_id = state.scheduler.enqueue(enrollment_id).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DispatchQueued {
            task_id,
            message: "Certificate email queued",
        }),
    ))
}

pub async fn get_task(
    State(state): State<AppState>,
    _admin: AdminAccount,
    Path(task_id): Path<Uuid>,
) -> AppResult<Json<TaskResult>> {
    state
        .tasks
        .find(task_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("task {task_id}")))
}

#[derive(Debug, Deserialize)]
pub struct AssignmentListQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AssignmentList {
    pub stats: AssignmentStats,
    #[serde(flatten)]
    pub page: Page<AssignmentListing>,
}

pub async fn list_assignments(
    State(state): State<AppState>,
    _admin: AdminAccount,
    Query(query): Query<AssignmentListQuery>,
) -> AppResult<Json<AssignmentList>> {
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let page = state.assignments.list(search, query.page).await?;
    let stats = state.assignments.stats().await?;
    Ok(Json(AssignmentList { stats, page }))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub student_id: Uuid,
    pub program_id: Uuid,
    #[serde(default)]
    pub tier: PurchaseTier,
}

pub async fn create_assignment(
    State(state): State<AppState>,
    _admin: AdminAccount,
    Json(request): Json<AssignRequest>,
) -> AppResult<(StatusCode, Json<Purchase>)> {
    let purchase = state
        .assignments
        .assign(request.student_id, request.program_id, request.tier)
        .await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

#[derive(Debug, Deserialize)]
pub struct RevokeQuery {
    #[serde(default)]
    pub confirm: bool,
}

pub async fn revoke_assignment(
    State(state): State<AppState>,
    _admin: AdminAccount,
    Path(grant_id): Path<Uuid>,
    Query(query): Query<RevokeQuery>,
) -> AppResult<Json<Purchase>> {
    Ok(Json(state.assignments.revoke(grant_id, query.confirm).await?))
}
