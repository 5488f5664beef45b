//! Service configuration

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Service configuration, read once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP port
    pub port: u16,
    pub database_max_connections: u32,
    /// Environment: development | staging | production
    pub environment: String,
    /// HS256 signing secret for access tokens
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    /// Event bus; events are only logged when unset
    pub nats_url: Option<String>,
    /// Allowed CORS origins; empty means permissive
    pub cors_origins: Vec<String>,
    /// Storefront base URL, used in password reset links
    pub frontend_url: String,
    /// Admin account created at startup when both are set and the email is unused
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            port: std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8083),
            database_max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(10),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            jwt_expiry_hours: std::env::var("JWT_EXPIRY_HOURS")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or(168),
            nats_url: std::env::var("NATS_URL").ok().filter(|s| !s.is_empty()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|v| v.split(',').map(|o| o.trim().to_string()).filter(|o| !o.is_empty()).collect())
                .unwrap_or_default(),
            frontend_url: std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".into()),
            admin_email: std::env::var("ADMIN_EMAIL").ok().filter(|s| !s.is_empty()),
            admin_password: std::env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty()),
            environment,
        })
    }

    /// Development defaults around an explicit database URL
    pub fn development(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            port: 8083,
            database_max_connections: 10,
            environment: "development".into(),
            jwt_secret: "dev-JWT_SECRET-not-for-production".into(),
            jwt_expiry_hours: 168,
            nats_url: None,
            cors_origins: vec![],
            frontend_url: "http://localhost:3000".into(),
            admin_email: None,
            admin_password: None,
        }
    }
}
