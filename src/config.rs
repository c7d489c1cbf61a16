use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// Time-quota settings shared by the user directory and the reset scheduler.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    pub default_remaining_ms: i64, // handed out at registration and on reset
    pub reset_day: u8,             // day of month, clamped to 1..=28
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_remaining_ms: 36_000_000,
            reset_day: 7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db: DbConfig,
    pub jwt: JwtConfig,
    pub quota: QuotaConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let db = DbConfig {
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            acquire_timeout_secs: env_or("DB_ACQUIRE_TIMEOUT_SECS", 5),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "mycap".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "mycap-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 72 * 60),
        };
        let defaults = QuotaConfig::default();
        let quota = QuotaConfig {
            default_remaining_ms: env_or("QUOTA_DEFAULT_MS", defaults.default_remaining_ms),
            reset_day: env_or("QUOTA_RESET_DAY", defaults.reset_day).clamp(1, 28),
        };
        anyhow::ensure!(
            quota.default_remaining_ms > 0,
            "QUOTA_DEFAULT_MS must be positive"
        );
        Ok(Self {
            database_url,
            db,
            jwt,
            quota,
        })
    }
}
