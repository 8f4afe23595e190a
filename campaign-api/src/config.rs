/// Configuration management for the API server
///
/// Configuration is read once at startup from environment variables (a `.env`
/// file is loaded first when present) and passed to the router as an
/// `Arc<Config>`.
///
/// # Environment Variables
///
/// - `APP_HOST` / `APP_PORT`: bind address (default: 0.0.0.0:3030)
/// - `APP_URL`: public base URL (default: http://localhost:3030)
/// - `APP_ENV`: `production` enables HSTS (default: development)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 20)
/// - `JWT_SECRET`: token signing secret, at least 32 characters (required)
/// - `XENDIT_SECRET_KEY`: payment provider secret key (required)
/// - `XENDIT_API_URL`: provider base URL (default: https://api.xendit.co)
/// - `XENDIT_CALLBACK_TOKEN`: expected `x-callback-token` on webhooks (optional)
/// - `PAYMENT_TIMEOUT_SECS`: deadline for invoice creation (default: 15)
/// - `BASE_FILE_URL`: URL prefix of uploaded files (default: `{APP_URL}/uploads`)
/// - `UPLOAD_DIR`: directory uploaded files are written to (default: ./public/uploads)
/// - `RATE_LIMIT_PER_MINUTE`: requests per client IP per minute (default: 60)
/// - `CORS_ORIGINS`: comma-separated origins, `*` for any (default: *)
///
/// # Example
///
/// ```no_run
/// use campaign_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub payment: PaymentConfig,
    pub storage: StorageConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Public base URL, used for payment redirects
    pub url: String,

    /// Production mode (HSTS)
    pub production: bool,

    pub cors_origins: Vec<String>,

    /// Requests allowed per client IP per minute
    pub rate_limit_per_minute: u32,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub xendit_secret_key: String,
    pub xendit_api_url: String,

    /// When set, webhooks must carry this value in `x-callback-token`
    pub callback_token: Option<String>,

    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// URL prefix under which uploaded files are served
    pub base_file_url: String,
    pub upload_dir: String,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<String> {
    lookup(key).ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Builds the configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "APP_PORT", 3030u16)?;
        let url = lookup("APP_URL")
            .unwrap_or_else(|| "http://localhost:3030".to_string())
            .trim_end_matches('/')
            .to_string();
        let production = lookup("APP_ENV").map_or(false, |e| e.eq_ignore_ascii_case("production"));

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let database_url = required(&lookup, "DATABASE_URL")?;
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 20u32)?;

        let jwt_secret = required(&lookup, "JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let xendit_secret_key = required(&lookup, "XENDIT_SECRET_KEY")?;
        let timeout_secs = parse_or(&lookup, "PAYMENT_TIMEOUT_SECS", 15u64)?;
        if timeout_secs == 0 {
            anyhow::bail!("PAYMENT_TIMEOUT_SECS must be greater than zero");
        }

        let base_file_url = lookup("BASE_FILE_URL")
            .unwrap_or_else(|| format!("{}/uploads", url))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                url,
                production,
                cors_origins,
                rate_limit_per_minute: parse_or(&lookup, "RATE_LIMIT_PER_MINUTE", 60u32)?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            payment: PaymentConfig {
                xendit_secret_key,
                xendit_api_url: lookup("XENDIT_API_URL")
                    .unwrap_or_else(|| campaign_shared::payment::xendit::DEFAULT_BASE_URL.to_string()),
                callback_token: lookup("XENDIT_CALLBACK_TOKEN"),
                timeout: Duration::from_secs(timeout_secs),
            },
            storage: StorageConfig {
                base_file_url,
                upload_dir: lookup("UPLOAD_DIR").unwrap_or_else(|| "./public/uploads".to_string()),
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgresql://localhost/campaign"),
        ("JWT_SECRET", "test-secret-key-at-least-32-bytes-long"),
        ("XENDIT_SECRET_KEY", "xnd_development_key"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:3030");
        assert_eq!(config.api.url, "http://localhost:3030");
        assert!(!config.api.production);
        assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.api.rate_limit_per_minute, 60);
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.payment.xendit_api_url, "https://api.xendit.co");
        assert_eq!(config.payment.timeout, Duration::from_secs(15));
        assert!(config.payment.callback_token.is_none());
        assert_eq!(config.storage.base_file_url, "http://localhost:3030/uploads");
        assert_eq!(config.storage.upload_dir, "./public/uploads");
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("APP_HOST", "127.0.0.1"),
            ("APP_PORT", "8080"),
            ("APP_URL", "https://donate.example.com/"),
            ("APP_ENV", "production"),
            ("CORS_ORIGINS", "https://a.example.com, https://b.example.com"),
            ("XENDIT_CALLBACK_TOKEN", "cb-token"),
        ]);

        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert!(config.api.production);
        assert_eq!(config.api.cors_origins.len(), 2);
        assert_eq!(config.payment.callback_token.as_deref(), Some("cb-token"));
        assert_eq!(config.storage.base_file_url, "https://donate.example.com/uploads");
    }

    #[test]
    fn test_missing_required_variable() {
        let err = Config::from_lookup(lookup_from(&REQUIRED[..2])).unwrap_err();
        assert!(err.to_string().contains("XENDIT_SECRET_KEY"));
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let pairs = [REQUIRED[0], ("JWT_SECRET", "short"), REQUIRED[2]];
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("APP_PORT", "not-a-port"));

        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(err.to_string().contains("APP_PORT"));
    }
}
