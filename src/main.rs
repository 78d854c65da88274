use anyhow::Context;
use dotenv::dotenv;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use topgrade_backend::{
    app::create_router,
    app_state::AppState,
    assignments::AssignmentManager,
    auth::{AuthService, FirebaseVerifier, TokenService},
    certificates::{CertificateGenerator, HtmlRenderer},
    config::{self, Config},
    db::{
        self,
        repositories::{
            PgAccountRepository, PgAssignmentRepository, PgCertificateRepository, PgEnrollmentRepository,
            PgTaskResultRepository,
        },
    },
    mail::{CertificateMail, SmtpMailer},
    profile::ProfileService,
    storage::{LocalStorage, MediaLayout, ObjectStorage, S3Storage},
    tasks::{CertificateDispatch, DispatchScheduler, RedisQueue, TaskQueue, WorkerPool},
    telemetry::{init_telemetry, TelemetryConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = config::init().context("Failed to load configuration")?;
    let telemetry = init_telemetry(Some(TelemetryConfig::for_app(config))).await?;
    info!(role = ?config.worker.role, environment = ?config.app.environment, "Starting {}", config.app.name);

    let pool = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database")?;

    let queue: Arc<dyn TaskQueue> = Arc::new(
        RedisQueue::connect(
            &config.redis.url,
            config.redis.dispatch_queue_key.clone(),
            config.worker.lease,
        )
        .await
        .context("Failed to connect to Redis")?,
    );

    let storage: Arc<dyn ObjectStorage> = match &config.s3 {
        Some(s3) => {
            info!(bucket = %s3.bucket_name, "Using S3 media storage");
            Arc::new(S3Storage::new(s3))
        }
        None => {
            info!(root = %config.storage.local_root, "Using local media storage");
            Arc::new(LocalStorage::new(&config.storage.local_root))
        }
    };
    let layout = MediaLayout::from_config(&config.storage);

    let accounts = Arc::new(PgAccountRepository::new(pool.clone()));
    let enrollments = Arc::new(PgEnrollmentRepository::new(pool.clone()));
    let certificates = Arc::new(PgCertificateRepository::new(pool.clone()));
    let tasks = Arc::new(PgTaskResultRepository::new(pool.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let workers = if config.worker.role.runs_worker() {
        let mailer = SmtpMailer::new(&config.mail).context("Failed to configure SMTP transport")?;
        let dispatch = Arc::new(CertificateDispatch::new(
            enrollments.clone(),
            certificates.clone(),
            tasks.clone(),
            storage.clone(),
            Arc::new(mailer),
            queue.clone(),
            CertificateMail::from_config(&config.mail),
            layout.clone(),
        ));
        WorkerPool::new(dispatch, &config.worker).spawn(shutdown_rx.clone())
    } else {
        Vec::new()
    };

    if config.worker.role.runs_server() {
        let state = AppState {
            db: pool.clone(),
            env: config.clone(),
            auth: Arc::new(AuthService::new(
                accounts.clone(),
                Arc::new(FirebaseVerifier::new(config.firebase.project_id.clone())),
                Arc::new(TokenService::new(&config.auth)),
            )),
            profile: Arc::new(ProfileService::new(accounts.clone())),
            assignments: Arc::new(AssignmentManager::new(
                accounts.clone(),
                Arc::new(PgAssignmentRepository::new(pool.clone())),
            )),
            generator: Arc::new(CertificateGenerator::new(
                enrollments.clone(),
                certificates.clone(),
                storage.clone(),
                Arc::new(HtmlRenderer),
                layout.clone(),
            )),
            scheduler: Arc::new(DispatchScheduler::new(tasks.clone(), queue.clone())),
            enrollments,
            tasks,
        };
        serve(config, state).await?;
    } else {
        shutdown_signal().await;
    }

    // Workers finish the job in hand before stopping.
    let _ = shutdown_tx.send(true);
    for handle in workers {
        if let Err(e) = handle.await {
            error!(error = %e, "Dispatch worker panicked");
        }
    }

    telemetry.shutdown().await?;
    Ok(())
}

async fn serve(config: &Config, state: AppState) -> anyhow::Result<()> {
    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("{} listening on {}", config.app.name, addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to serve application")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}
