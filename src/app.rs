use axum::{extract::State, middleware, routing::get, Json, Router};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::{
    app_state::AppState,
    middleware::tracing::observability_middleware,
    modules::{admin::routes::admin_routes, auth::routes::auth_routes, profile::routes::profile_routes},
};

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/auth", auth_routes())
        .nest("/profile", profile_routes());

    let static_dir = state.env.app.static_dir.clone();

    Router::new()
        .route("/", get(hello))
        .route("/health", get(health_check))
        .nest("/api", api)
        .nest("/admin", admin_routes())
        .nest_service("/static", tower_http::services::ServeDir::new(static_dir))
        .layer(middleware::from_fn(observability_middleware))
        .with_state(state)
}

async fn hello() -> &'static str {
    "TopGrade Backend says hello!\n"
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db_status = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "healthy",
        Err(e) => {
            tracing::info!("Database health check failed: {}", e);
            "unhealthy"
        }
    };

    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();

    Json(json!({
        "status": "ok",
        "timestamp": timestamp,
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "database": db_status,
            "telemetry": crate::telemetry::telemetry_health_check(),
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::assignments::AssignmentManager;
    use crate::auth::{AuthService, FakeVerifier, TokenService};
    use crate::certificates::{CertificateGenerator, HtmlRenderer};
    use crate::config::Config;
    use crate::db::models::{AccountRole, PurchaseTier, RegistrationMethod};
    use crate::db::repositories::memory::MemoryDb;
    use crate::profile::ProfileService;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::MediaLayout;
    use crate::tasks::memory::MemoryQueue;
    use crate::tasks::DispatchScheduler;

    struct TestApp {
        router: Router,
        db: Arc<MemoryDb>,
        queue: Arc<MemoryQueue>,
        tokens: Arc<TokenService>,
    }

    fn test_app() -> TestApp {
        let vars = HashMap::from([
            ("DATABASE_URL", "postgres://localhost/topgrade_test"),
            ("REDIS_URL", "redis://localhost"),
            ("SMTP_HOST", "localhost"),
            ("JWT_SECRET", "router-test-secret"),
            ("FIREBASE_PROJECT_ID", "topgrade-test"),
        ]);
        let env = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        let db = Arc::new(MemoryDb::new());
        let queue = Arc::new(MemoryQueue::new());
        let storage = Arc::new(MemoryStorage::new());
        let layout = MediaLayout::from_config(&env.storage);
        let tokens = Arc::new(TokenService::new(&env.auth));
        let verifier = FakeVerifier::default().with("valid-firebase-token", "+919876543210");

        let state = AppState {
            db: PgPoolOptions::new().connect_lazy(&env.database.url).unwrap(),
            auth: Arc::new(AuthService::new(db.clone(), Arc::new(verifier), tokens.clone())),
            profile: Arc::new(ProfileService::new(db.clone())),
            assignments: Arc::new(AssignmentManager::new(db.clone(), db.clone())),
            generator: Arc::new(CertificateGenerator::new(
                db.clone(),
                db.clone(),
                storage,
                Arc::new(HtmlRenderer),
                layout,
            )),
            scheduler: Arc::new(DispatchScheduler::new(db.clone(), queue.clone())),
            enrollments: db.clone(),
            tasks: db.clone(),
            env,
        };

        TestApp {
            router: create_router(state),
            db,
            queue,
            tokens,
        }
    }

    impl TestApp {
        fn bearer_for(&self, role: AccountRole) -> String {
            let email = format!("{}@example.com", Uuid::new_v4());
            let account = self.db.add_account_with_role(
                Some(email.as_str()),
                None,
                RegistrationMethod::Email,
                role,
            );
            let pair = self.tokens.issue_pair(account.id).unwrap();
            format!("Bearer {}", pair.access_token)
        }

        async fn send(&self, method: Method, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(bearer) = bearer {
                request = request.header(header::AUTHORIZATION, bearer);
            }
            let body = match body {
                Some(json) => {
                    request = request.header(header::CONTENT_TYPE, "application/json");
                    Body::from(json.to_string())
                }
                None => Body::empty(),
            };

            let response = self.router.clone().oneshot(request.body(body).unwrap()).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, json)
        }
    }

    #[tokio::test]
    async fn phone_sign_in_then_profile_round_trip() {
        let app = test_app();

        let (status, signed_in) = app
            .send(
                Method::POST,
                "/api/auth/phone-signin",
                None,
                Some(json!({ "name": "Asha Rao", "firebaseToken": "valid-firebase-token" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(signed_in["message"], "User created and signed in successfully");

        let bearer = format!("Bearer {}", signed_in["access_token"].as_str().unwrap());
        let (status, profile) = app.send(Method::GET, "/api/profile", Some(&bearer), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["user_info"]["phone_number"], "9876543210");
        assert_eq!(profile["user_info"]["can_update_phone"], false);

        let (status, body) = app
            .send(
                Method::PUT,
                "/api/profile/update",
                Some(&bearer),
                Some(json!({ "phone_number": "9000000000" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "field_locked");

        let (status, body) = app
            .send(
                Method::PUT,
                "/api/profile/update",
                Some(&bearer),
                Some(json!({ "email": "asha@example.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "asha@example.com");
    }

    #[tokio::test]
    async fn refresh_exchanges_only_refresh_tokens() {
        let app = test_app();
        let (_, signed_in) = app
            .send(
                Method::POST,
                "/api/auth/phone-signin",
                None,
                Some(json!({ "name": "Asha", "firebaseToken": "valid-firebase-token" })),
            )
            .await;

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/refresh",
                None,
                Some(json!({ "refresh_token": signed_in["refresh_token"] })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["access_token"].is_string());

        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/refresh",
                None,
                Some(json!({ "refresh_token": signed_in["access_token"] })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_routes_require_an_admin_bearer() {
        let app = test_app();

        let (status, body) = app.send(Method::GET, "/admin/certificates", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthorized");

        let student = app.bearer_for(AccountRole::Student);
        let (status, _) = app.send(Method::GET, "/admin/certificates", Some(&student), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn generating_certificates_queues_a_dispatch() {
        let app = test_app();
        let admin = app.bearer_for(AccountRole::Admin);
        let student = app.db.add_account(Some("asha@example.com"), None, RegistrationMethod::Email);
        let program = app.db.add_program("Data Science");
        let enrollment = app.db.add_enrollment(&student, &program, PurchaseTier::Gold, true);

        let uri = format!("/admin/enrollments/{}/certificates", enrollment.id);
        let (status, body) = app.send(Method::POST, &uri, Some(&admin), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"]["outcomes"].as_array().unwrap().len(), 5);
        let task_id: Uuid = body["task_id"].as_str().unwrap().parse().unwrap();
        assert_eq!(app.queue.len(), 1);

        let (status, task) = app
            .send(Method::GET, &format!("/admin/tasks/{task_id}"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(task["status"], "pending");

        let (status, list) = app
            .send(Method::GET, "/admin/certificates?status=pending", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["totals"]["total_completed"], 1);
        assert_eq!(list["items"][0]["certificates_issued"], 5);
    }

    #[tokio::test]
    async fn incomplete_enrollment_is_rejected_without_queueing() {
        let app = test_app();
        let admin = app.bearer_for(AccountRole::Admin);
        let student = app.db.add_account(Some("asha@example.com"), None, RegistrationMethod::Email);
        let program = app.db.add_program("Data Science");
        let enrollment = app.db.add_enrollment(&student, &program, PurchaseTier::Standard, false);

        let uri = format!("/admin/enrollments/{}/certificates", enrollment.id);
        let (status, body) = app.send(Method::POST, &uri, Some(&admin), None).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "enrollment_incomplete");
        assert_eq!(app.queue.len(), 0);
    }

    #[tokio::test]
    async fn assignment_lifecycle_over_http() {
        let app = test_app();
        let admin = app.bearer_for(AccountRole::Admin);
        let student = app.db.add_account(Some("asha@example.com"), None, RegistrationMethod::Email);
        let program = app.db.add_program("Data Science");
        let grant = json!({ "student_id": student.id, "program_id": program.id });

        let (status, purchase) = app
            .send(Method::POST, "/admin/assignments", Some(&admin), Some(grant.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(purchase["tier"], "standard");

        let (status, body) = app
            .send(Method::POST, "/admin/assignments", Some(&admin), Some(grant))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "duplicate_grant");

        let (status, list) = app.send(Method::GET, "/admin/assignments", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["stats"]["total_assignments"], 1);
        assert_eq!(list["stats"]["active_assignments"], 1);
        assert_eq!(list["stats"]["total_students_with_programs"], 1);
        assert_eq!(list["items"][0]["program_title"], "Data Science");

        let uri = format!("/admin/assignments/{}", purchase["id"].as_str().unwrap());
        let (status, body) = app.send(Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "confirmation_required");

        let (status, revoked) = app
            .send(Method::DELETE, &format!("{uri}?confirm=true"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(revoked["status"], "revoked");
    }

    #[tokio::test]
    async fn hello_is_public() {
        let app = test_app();
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
