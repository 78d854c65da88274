use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;

use crate::assignments::AssignmentManager;
use crate::auth::AuthService;
use crate::certificates::CertificateGenerator;
use crate::config::Config;
use crate::db::repositories::{EnrollmentRepository, TaskResultRepository};
use crate::profile::ProfileService;
use crate::tasks::DispatchScheduler;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub env: Config,
    pub auth: Arc<AuthService>,
    pub profile: Arc<ProfileService>,
    pub assignments: Arc<AssignmentManager>,
    pub generator: Arc<CertificateGenerator>,
    pub scheduler: Arc<DispatchScheduler>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub tasks: Arc<dyn TaskResultRepository>,
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}
