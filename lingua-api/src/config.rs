/// Configuration management for the API server
///
/// Everything comes from environment variables (a `.env` file is loaded first
/// in development).
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string, or `memory` for the
///   in-process store (required)
/// - `JWT_SECRET`: session signing key, at least 32 characters (required)
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8080)
/// - `APP_ENV`: `production` marks session cookies `Secure`
/// - `PUBLIC_URL`: site origin used in emailed links (default: http://localhost:3000)
/// - `CORS_ORIGINS`: comma-separated allowed origins (default: `PUBLIC_URL`)
/// - `SESSION_TTL_DAYS`: session lifetime (default: 30)
/// - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM`:
///   outgoing mail; without `SMTP_HOST` mail is logged and dropped
/// - `CONTACT_RELAY_URL`, `NEWSLETTER_RELAY_URL`: spreadsheet endpoints for forms
/// - `PAYMENT_WEBHOOK_SECRET`, `PAYMENT_WEBHOOK_TOLERANCE_SECS`: webhook signing
/// - `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_REDIRECT_URL`: Google sign-in
/// - `ARGON2_MEMORY_KIB`, `ARGON2_ITERATIONS`, `ARGON2_PARALLELISM`: hashing cost
/// - `FORM_RATE_LIMIT_PER_MINUTE`: per-IP budget for public forms (default: 10)
/// - `ADMIN_EMAIL`, `ADMIN_PASSWORD`: admin account created at startup if missing
///
/// # Example
///
/// ```no_run
/// use lingua_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use lingua_shared::auth::jwt::SESSION_TTL_DAYS;
use lingua_shared::auth::password::HashParams;
use lingua_shared::payments::DEFAULT_TOLERANCE_SECS;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// `DATABASE_URL` value selecting the in-memory store
pub const MEMORY_DATABASE_URL: &str = "memory";

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub email: EmailConfig,
    pub relay: RelayConfig,
    pub payments: PaymentsConfig,
    pub oauth: OAuthConfig,
    pub hashing: HashingConfig,
    pub rate_limit: RateLimitConfig,
    pub bootstrap: BootstrapConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Serve cookies with `Secure`
    pub production: bool,

    /// Public site origin, without a trailing slash
    pub public_url: String,

    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL, or [`MEMORY_DATABASE_URL`]
    pub url: String,

    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.url == MEMORY_DATABASE_URL
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for session signing
    ///
    /// IMPORTANT: must be kept secret and be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,

    pub ttl_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Empty disables delivery
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    #[serde(skip_serializing)]
    pub smtp_password: Option<String>,
    pub from: String,
}

impl EmailConfig {
    pub fn is_enabled(&self) -> bool {
        !self.smtp_host.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub contact_url: Option<String>,
    pub newsletter_url: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Webhooks are refused while unset
    #[serde(skip_serializing)]
    pub webhook_secret: Option<String>,
    pub tolerance_seconds: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub google: Option<GoogleOAuthConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl HashingConfig {
    pub fn params(&self) -> HashParams {
        HashParams {
            memory_kib: self.memory_kib,
            iterations: self.iterations,
            parallelism: self.parallelism,
        }
    }
}

impl From<HashParams> for HashingConfig {
    fn from(params: HashParams) -> Self {
        Self {
            memory_kib: params.memory_kib,
            iterations: params.iterations,
            parallelism: params.parallelism,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per minute per client IP on public form endpoints
    pub forms_per_minute: u32,
}

/// First admin account, so the back office can be reached on a fresh database
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub admin_email: Option<String>,
    #[serde(skip_serializing)]
    pub admin_password: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` or `JWT_SECRET` is missing
    /// - `JWT_SECRET` is shorter than 32 characters
    /// - a numeric variable does not parse
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let jwt_secret = get("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let public_url = or_default("PUBLIC_URL", "http://localhost:3000")
            .trim_end_matches('/')
            .to_string();
        let cors_origins = match get("CORS_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            None => vec![public_url.clone()],
        };

        let google = match (get("GOOGLE_CLIENT_ID"), get("GOOGLE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(GoogleOAuthConfig {
                client_id,
                client_secret,
                redirect_url: get("GOOGLE_REDIRECT_URL")
                    .unwrap_or_else(|| format!("{public_url}/api/auth/oauth/google/callback")),
            }),
            _ => None,
        };

        let defaults = HashParams::default();

        Ok(Self {
            api: ApiConfig {
                host: or_default("API_HOST", "0.0.0.0"),
                port: number(&get, "API_PORT", 8080)?,
                production: get("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production")),
                public_url,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: number(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                ttl_days: number(&get, "SESSION_TTL_DAYS", SESSION_TTL_DAYS)?,
            },
            email: EmailConfig {
                smtp_host: get("SMTP_HOST").unwrap_or_default(),
                smtp_port: number(&get, "SMTP_PORT", 587)?,
                smtp_username: get("SMTP_USERNAME"),
                smtp_password: get("SMTP_PASSWORD"),
                from: or_default("EMAIL_FROM", "Lingua <no-reply@lingua.center>"),
            },
            relay: RelayConfig {
                contact_url: get("CONTACT_RELAY_URL"),
                newsletter_url: get("NEWSLETTER_RELAY_URL"),
                timeout_seconds: number(&get, "RELAY_TIMEOUT_SECS", 10)?,
            },
            payments: PaymentsConfig {
                webhook_secret: get("PAYMENT_WEBHOOK_SECRET"),
                tolerance_seconds: number(&get, "PAYMENT_WEBHOOK_TOLERANCE_SECS", DEFAULT_TOLERANCE_SECS)?,
            },
            oauth: OAuthConfig { google },
            hashing: HashingConfig {
                memory_kib: number(&get, "ARGON2_MEMORY_KIB", defaults.memory_kib)?,
                iterations: number(&get, "ARGON2_ITERATIONS", defaults.iterations)?,
                parallelism: number(&get, "ARGON2_PARALLELISM", defaults.parallelism)?,
            },
            rate_limit: RateLimitConfig {
                forms_per_minute: number(&get, "FORM_RATE_LIMIT_PER_MINUTE", 10)?,
            },
            bootstrap: BootstrapConfig {
                admin_email: get("ADMIN_EMAIL"),
                admin_password: get("ADMIN_PASSWORD"),
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn number<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} is invalid: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "memory"), ("JWT_SECRET", SECRET)]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.database.is_memory());
        assert_eq!(config.jwt.ttl_days, 30);
        assert_eq!(config.payments.tolerance_seconds, 300);
        assert!(!config.email.is_enabled());
        assert!(config.oauth.google.is_none());
        assert_eq!(config.api.cors_origins, vec!["http://localhost:3000".to_string()]);
        assert_eq!(config.hashing.params(), HashParams::default());
        assert!(config.bootstrap.admin_email.is_none());
    }

    #[test]
    fn test_required_variables() {
        assert!(load(&[("JWT_SECRET", SECRET)]).is_err());
        assert!(load(&[("DATABASE_URL", "memory")]).is_err());
        assert!(load(&[("DATABASE_URL", "memory"), ("JWT_SECRET", "short")]).is_err());
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = load(&[
            ("DATABASE_URL", "memory"),
            ("JWT_SECRET", SECRET),
            ("API_PORT", "eighty"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("API_PORT"));
    }

    #[test]
    fn test_google_and_origins() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/lingua"),
            ("JWT_SECRET", SECRET),
            ("PUBLIC_URL", "https://lingua.center/"),
            ("CORS_ORIGINS", "https://lingua.center, https://admin.lingua.center"),
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("APP_ENV", "Production"),
        ])
        .unwrap();

        assert!(config.api.production);
        assert_eq!(config.api.public_url, "https://lingua.center");
        assert_eq!(config.api.cors_origins.len(), 2);
        let google = config.oauth.google.unwrap();
        assert_eq!(
            google.redirect_url,
            "https://lingua.center/api/auth/oauth/google/callback"
        );
    }
}
