use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub s3: Option<S3Config>,
    pub storage: StorageConfig,
    pub mail: MailConfig,
    pub auth: AuthConfig,
    pub firebase: FirebaseConfig,
    pub worker: WorkerConfig,
    pub app: AppConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub dispatch_queue_key: String,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub bucket_name: String,
    pub region: String,
}

/// Where media lives and how it is addressed publicly.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Single source of truth for the object key prefix, shared by writers and readers.
    pub media_prefix: String,
    /// CDN or bucket domain that serves `<media_prefix>/...` keys.
    pub public_domain: String,
    /// Root directory for the filesystem backend when S3 is not configured.
    pub local_root: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub from_address: String,
    pub verification_portal_url: String,
    pub support_email: String,
    pub support_phones: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub project_id: String,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub role: ProcessRole,
    pub concurrency: usize,
    pub poll_interval: Duration,
    /// How long a claimed job may run before another worker takes it over.
    pub lease: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub name: String,
    pub environment: Environment,
    pub static_dir: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

/// Which halves of the system this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessRole {
    Server,
    Worker,
    #[default]
    All,
}

impl ProcessRole {
    pub fn runs_server(self) -> bool {
        matches!(self, ProcessRole::Server | ProcessRole::All)
    }

    pub fn runs_worker(self) -> bool {
        matches!(self, ProcessRole::Worker | ProcessRole::All)
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // Server configuration
        let host = or("SERVER_HOST", "0.0.0.0")
            .parse::<IpAddr>()
            .context("Failed to parse SERVER_HOST")?;
        let port = or("SERVER_PORT", "8000")
            .parse::<u16>()
            .context("Failed to parse SERVER_PORT")?;

        // Database configuration
        let db_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let max_connections = or("DATABASE_MAX_CONNECTIONS", "10")
            .parse()
            .context("Failed to parse DATABASE_MAX_CONNECTIONS")?;
        let min_connections = or("DATABASE_MIN_CONNECTIONS", "1")
            .parse()
            .context("Failed to parse DATABASE_MIN_CONNECTIONS")?;

        let redis_url = lookup("REDIS_URL").context("REDIS_URL must be set")?;

        // S3 configuration (optional)
        let s3 = if let Some(bucket_name) = lookup("S3_BUCKET_NAME") {
            let access_key_id = lookup("S3_ACCESS_KEY_ID")
                .context("S3_ACCESS_KEY_ID must be set when S3_BUCKET_NAME is provided")?;
            let secret_access_key = lookup("S3_SECRET_ACCESS_KEY")
                .context("S3_SECRET_ACCESS_KEY must be set when S3_BUCKET_NAME is provided")?;

            Some(S3Config {
                endpoint: lookup("S3_ENDPOINT"),
                access_key_id,
                secret_access_key: SecretString::from(secret_access_key),
                bucket_name,
                region: or("S3_REGION", "ap-south-1"),
            })
        } else {
            None
        };

        let media_prefix = or("STORAGE_MEDIA_PREFIX", "media")
            .trim_matches('/')
            .to_string();
        if media_prefix.is_empty() {
            anyhow::bail!("STORAGE_MEDIA_PREFIX must not be empty");
        }
        let storage = StorageConfig {
            media_prefix,
            public_domain: or("STORAGE_PUBLIC_DOMAIN", "media.topgradeinnovation.com"),
            local_root: or("STORAGE_LOCAL_ROOT", "var/storage"),
        };

        let mail = MailConfig {
            smtp_host: lookup("SMTP_HOST").context("SMTP_HOST must be set")?,
            smtp_port: or("SMTP_PORT", "587")
                .parse()
                .context("Failed to parse SMTP_PORT")?,
            username: lookup("SMTP_USERNAME"),
            password: lookup("SMTP_PASSWORD").map(SecretString::from),
            from_address: or("MAIL_FROM", "noreply@topgradeinnovations.com"),
            verification_portal_url: or(
                "CERTIFICATE_PORTAL_URL",
                "https://www.topgradeinnovation.com/certificate-verification/",
            ),
            support_email: or("SUPPORT_EMAIL", "support@topgradeinnovations.com"),
            support_phones: or("SUPPORT_PHONES", "+91 76194 68135  |  +91 89044 65305"),
        };

        let auth = AuthConfig {
            jwt_secret: SecretString::from(lookup("JWT_SECRET").context("JWT_SECRET must be set")?),
            access_ttl: Duration::from_secs(
                or("JWT_ACCESS_TTL_SECS", "3600")
                    .parse()
                    .context("Failed to parse JWT_ACCESS_TTL_SECS")?,
            ),
            refresh_ttl: Duration::from_secs(
                or("JWT_REFRESH_TTL_SECS", "604800")
                    .parse()
                    .context("Failed to parse JWT_REFRESH_TTL_SECS")?,
            ),
        };

        let firebase = FirebaseConfig {
            project_id: lookup("FIREBASE_PROJECT_ID").context("FIREBASE_PROJECT_ID must be set")?,
        };

        let worker = WorkerConfig {
            role: or("PROCESS_ROLE", "all")
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Failed to parse PROCESS_ROLE")?,
            concurrency: or("WORKER_CONCURRENCY", "4")
                .parse()
                .context("Failed to parse WORKER_CONCURRENCY")?,
            poll_interval: Duration::from_millis(
                or("WORKER_POLL_INTERVAL_MS", "1000")
                    .parse()
                    .context("Failed to parse WORKER_POLL_INTERVAL_MS")?,
            ),
            lease: Duration::from_secs(
                or("WORKER_LEASE_SECS", "300")
                    .parse()
                    .context("Failed to parse WORKER_LEASE_SECS")?,
            ),
        };
        if worker.lease.is_zero() {
            anyhow::bail!("WORKER_LEASE_SECS must be greater than zero");
        }

        // Unknown environments fall back to development
        let environment = or("APP_ENVIRONMENT", "development")
            .parse()
            .unwrap_or_default();

        Ok(Config {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: db_url,
                max_connections: Some(max_connections),
                min_connections: Some(min_connections),
            },
            redis: RedisConfig {
                url: redis_url,
                dispatch_queue_key: or("DISPATCH_QUEUE_KEY", "queue:certificate_dispatch"),
            },
            s3,
            storage,
            mail,
            auth,
            firebase,
            worker,
            app: AppConfig {
                name: or("APP_NAME", "TopGrade Backend"),
                environment,
                static_dir: or("STATIC_DIR", "static"),
            },
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    pub fn is_production(&self) -> bool {
        self.app.environment == Environment::Production
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "development" => Ok(Environment::Development),
            _ => Err(format!("Unknown environment: {}", s)),
        }
    }
}

impl FromStr for ProcessRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "server" => Ok(ProcessRole::Server),
            "worker" => Ok(ProcessRole::Worker),
            "all" => Ok(ProcessRole::All),
            _ => Err(format!("Unknown process role: {}", s)),
        }
    }
}

// Global config instance, initialized once at process start
use once_cell::sync::OnceCell;

static CONFIG: OnceCell<Config> = OnceCell::new();

pub fn init() -> Result<&'static Config> {
    CONFIG.get_or_try_init(Config::from_env)
}
