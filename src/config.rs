use std::env;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub otp: OtpConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub access_token_ttl: Duration,
}

/// One-time passcode settings.
///
/// `fixed_code` is the single code every phone must submit; `expiry` is only
/// written into the audit log and never enforced.
#[derive(Clone)]
pub struct OtpConfig {
    pub fixed_code: String,
    pub expiry: Duration,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .finish()
    }
}

impl fmt::Debug for OtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpConfig")
            .field("fixed_code", &"<redacted>")
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl Config {
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("PORT").unwrap_or(8080),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| database_url_from_parts()),
                max_connections: parse_var("DB_MAX_CONNS").unwrap_or(10),
            },
            auth: AuthConfig {
                secret: env::var("AUTH_SECRET")
                    .unwrap_or_else(|_| "dev-secret-change-me".to_string()),
                access_token_ttl: scaled_duration("ACCESS_TOKEN_TTL_HOURS", 24, 60 * 60),
            },
            otp: OtpConfig {
                fixed_code: env::var("OTP_FIXED_CODE").unwrap_or_else(|_| "000000".to_string()),
                expiry: scaled_duration("OTP_EXPIRES_MINUTES", 5, 60),
            },
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Reads a count of `unit_secs` units. Unparsable values and values whose
/// seconds overflow fall back to `default`.
fn scaled_duration(key: &str, default: u64, unit_secs: u64) -> Duration {
    let value = parse_var::<u64>(key).unwrap_or(default);
    scale_secs(value, unit_secs).unwrap_or_else(|| {
        tracing::warn!("{}={} is out of range, using {}", key, value, default);
        Duration::from_secs(default * unit_secs)
    })
}

fn scale_secs(value: u64, unit_secs: u64) -> Option<Duration> {
    value.checked_mul(unit_secs).map(Duration::from_secs)
}

fn database_url_from_parts() -> String {
    let host = env::var("PGHOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PGPORT").unwrap_or_else(|_| "5432".to_string());
    let user = env::var("PGUSER").unwrap_or_else(|_| "postgres".to_string());
    let password = env::var("PGPASSWORD").unwrap_or_default();
    let database = env::var("PGDATABASE").unwrap_or_else(|_| "postgres".to_string());
    let ssl_mode = env::var("PGSSLMODE").unwrap_or_else(|_| "disable".to_string());

    format!(
        "postgres://{}:{}@{}:{}/{}?sslmode={}",
        user, password, host, port, database, ssl_mode
    )
}
