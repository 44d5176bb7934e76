use std::env;

/// One hour up to one year.
const SESSION_TTL_HOURS_RANGE: std::ops::RangeInclusive<i64> = 1..=8760;

/// Which store implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    MongoDB,
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(StoreBackend::MongoDB),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("Invalid STORE_BACKEND: {}. Supported: mongodb, memory", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_hours: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "default-secret-change-me".to_string(),
            issuer: "peer-evaluation-service".to_string(),
            audience: "peer-evaluation-api".to_string(),
            ttl_hours: 24,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub store_backend: StoreBackend,
    pub jwt: JwtConfig,
    pub settings_poll_interval_secs: u64,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    /// Call `dotenv().ok()` first so `.env` values are visible.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = lookup("PORT")
            .unwrap_or_else(|| "3002".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        let store_backend = match lookup("STORE_BACKEND") {
            Some(value) => StoreBackend::parse(&value)?,
            None => StoreBackend::MongoDB,
        };

        let database_url = lookup("DATABASE_URL");
        if store_backend == StoreBackend::MongoDB && database_url.is_none() {
            return Err("DATABASE_URL must be set".to_string());
        }

        let defaults = JwtConfig::default();
        let ttl_hours = match lookup("SESSION_TTL_HOURS") {
            Some(value) => value
                .parse::<i64>()
                .map_err(|e| format!("Invalid SESSION_TTL_HOURS: {}", e))?,
            None => defaults.ttl_hours,
        };
        if !SESSION_TTL_HOURS_RANGE.contains(&ttl_hours) {
            return Err(format!(
                "Invalid SESSION_TTL_HOURS: {} (must be between {} and {})",
                ttl_hours,
                SESSION_TTL_HOURS_RANGE.start(),
                SESSION_TTL_HOURS_RANGE.end()
            ));
        }
        let jwt = JwtConfig {
            secret: lookup("JWT_SECRET").unwrap_or(defaults.secret),
            issuer: lookup("JWT_ISSUER").unwrap_or(defaults.issuer),
            audience: lookup("JWT_AUDIENCE").unwrap_or(defaults.audience),
            ttl_hours,
        };

        let settings_poll_interval_secs = match lookup("SETTINGS_POLL_INTERVAL_SECS") {
            Some(value) => value
                .parse::<u64>()
                .map_err(|e| format!("Invalid SETTINGS_POLL_INTERVAL_SECS: {}", e))?
                .max(1),
            None => 5,
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        Ok(Self {
            host,
            port,
            database_url,
            store_backend,
            jwt,
            settings_poll_interval_secs,
            cors_allowed_origins,
        })
    }
}
