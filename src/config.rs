use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub signing_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub base_url: String,
    pub frontend_url: String,
    pub max_body_size: usize,
    pub token_ttl: Option<chrono::Duration>,
    pub log_level: String,
    pub storage: StorageConfig,
    pub report: Option<ReportSchedule>,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub public_url: String,
}

/// Recurring overdue report. Only active when both an interval and a
/// recipient are configured.
#[derive(Debug, Clone)]
pub struct ReportSchedule {
    pub interval: Duration,
    pub recipient: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| format!("Missing required environment variable: {key}"))
        };
        let or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database_url = required("DATABASE_URL")?;
        let signing_secret = required("SHELF_SIGNING_SECRET")?;
        if signing_secret.len() < 32 {
            return Err("SHELF_SIGNING_SECRET must be at least 32 characters".to_string());
        }

        let host: IpAddr = or("SHELF_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid SHELF_HOST: {e}"))?;

        let port: u16 = or("SHELF_PORT", "8000")
            .parse()
            .map_err(|e| format!("Invalid SHELF_PORT: {e}"))?;

        let base_url = or("SHELF_BASE_URL", &format!("http://{host}:{port}"));
        let frontend_url = or("SHELF_FRONTEND_URL", "http://localhost:4200");

        let max_body_size: usize = or("SHELF_MAX_BODY_SIZE", "5242880")
            .parse()
            .map_err(|e| format!("Invalid SHELF_MAX_BODY_SIZE: {e}"))?;

        // 0 or unset means tokens never expire
        let token_ttl = match lookup("SHELF_TOKEN_TTL_MINUTES") {
            Some(raw) => {
                let minutes: i64 = raw
                    .parse()
                    .map_err(|e| format!("Invalid SHELF_TOKEN_TTL_MINUTES: {e}"))?;
                (minutes > 0).then(|| chrono::Duration::minutes(minutes))
            }
            None => None,
        };

        let log_level = or("SHELF_LOG_LEVEL", "info");

        let storage = StorageConfig {
            root: PathBuf::from(or("SHELF_STORAGE_DIR", "storage")),
            public_url: or("SHELF_STORAGE_PUBLIC_URL", &format!("{base_url}/storage")),
        };

        let report = match (
            lookup("SHELF_REPORT_INTERVAL_SECS"),
            lookup("SHELF_REPORT_RECIPIENT"),
        ) {
            (Some(secs), Some(recipient)) => {
                let secs: u64 = secs
                    .parse()
                    .map_err(|e| format!("Invalid SHELF_REPORT_INTERVAL_SECS: {e}"))?;
                if secs == 0 {
                    return Err("SHELF_REPORT_INTERVAL_SECS must be greater than zero".to_string());
                }
                Some(ReportSchedule {
                    interval: Duration::from_secs(secs),
                    recipient,
                })
            }
            _ => None,
        };

        let smtp = match (
            lookup("SHELF_SMTP_HOST"),
            lookup("SHELF_SMTP_PORT"),
            lookup("SHELF_SMTP_USER"),
            lookup("SHELF_SMTP_PASS"),
            lookup("SHELF_SMTP_FROM"),
        ) {
            (Some(host), Some(port), Some(user), Some(pass), Some(from)) => Some(SmtpConfig {
                host,
                port: port
                    .parse()
                    .map_err(|e| format!("Invalid SHELF_SMTP_PORT: {e}"))?,
                user,
                pass,
                from,
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            signing_secret,
            host,
            port,
            base_url,
            frontend_url,
            max_body_size,
            token_ttl,
            log_level,
            storage,
            report,
            smtp,
        })
    }
}
