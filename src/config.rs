//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (CONNIX__*)
//! 4. Deployment variables (SESSION_SECRET, GITHUB_CLIENT_ID,
//!    GITHUB_CLIENT_SECRET, APP_URL, PORT, DATABASE_PATH)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8000)
    pub port: u16,
    /// Public base URL (e.g., "https://connix.example.com")
    pub app_url: String,
    /// Directory served under /static
    pub static_dir: PathBuf,
}

impl ServerConfig {
    /// Public base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.app_url.trim_end_matches('/')
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Authentication configuration (GitHub OAuth + cookie sessions)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 2592000 = 30 days)
    pub session_max_age: i64,
    pub github: GitHubOAuthConfig,
}

/// GitHub OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Browser-facing authorization endpoint
    pub authorize_url: String,
    /// Code-for-token exchange endpoint
    pub token_url: String,
    /// REST API root used for profile lookups
    pub api_base_url: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

/// Plain deployment variables and the config keys they override.
const ENV_OVERRIDES: [(&str, &str); 5] = [
    ("SESSION_SECRET", "auth.session_secret"),
    ("GITHUB_CLIENT_ID", "auth.github.client_id"),
    ("GITHUB_CLIENT_SECRET", "auth.github.client_secret"),
    ("APP_URL", "server.app_url"),
    ("DATABASE_PATH", "database.path"),
];

impl AppConfig {
    /// Load configuration from files and the process environment
    ///
    /// # Errors
    /// Returns error if configuration is missing or invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        Self::load_with(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Load configuration, resolving the plain deployment variables
    /// through `lookup`.
    pub fn load_with<F>(lookup: F) -> Result<Self, crate::error::AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        use config::{Config, Environment, File};

        let mut builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("server.app_url", "http://localhost:8000")?
            .set_default("server.static_dir", "static")?
            .set_default("database.path", "data/connix.db")?
            .set_default("auth.session_max_age", 2_592_000)?
            .set_default("auth.github.client_id", "")?
            .set_default("auth.github.client_secret", "")?
            .set_default(
                "auth.github.authorize_url",
                "https://github.com/login/oauth/authorize",
            )?
            .set_default(
                "auth.github.token_url",
                "https://github.com/login/oauth/access_token",
            )?
            .set_default("auth.github.api_base_url", "https://api.github.com")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("CONNIX")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(key, lookup(var))?;
        }

        let port = lookup("PORT")
            .map(|raw| {
                raw.parse::<u16>().map_err(|_| {
                    crate::error::AppError::Config(format!("PORT must be a port number: {raw}"))
                })
            })
            .transpose()?;
        builder = builder.set_override_option("server.port", port.map(i64::from))?;

        let config = builder
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Whether session cookies must carry the `Secure` attribute
    pub fn should_use_secure_cookies(&self) -> bool {
        url::Url::parse(&self.server.app_url)
            .map(|url| url.scheme() == "https")
            .unwrap_or(false)
    }

    /// Callback URL registered with the GitHub OAuth app
    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/auth/github/callback", self.server.base_url())
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.as_bytes().len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        match url::Url::parse(&self.server.app_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(crate::error::AppError::Config(format!(
                    "server.app_url must be an http(s) URL: {}",
                    self.server.app_url
                )));
            }
        }

        if self.auth.github.client_id.is_empty() || self.auth.github.client_secret.is_empty() {
            tracing::warn!("GitHub OAuth credentials are not configured; sign-in will fail");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                app_url: "http://localhost:8000".to_string(),
                static_dir: PathBuf::from("static"),
            },
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/connix-test.db"),
            },
            auth: AuthConfig {
                session_secret: "x".repeat(32),
                session_max_age: 2_592_000,
                github: GitHubOAuthConfig {
                    client_id: "github-client-id".to_string(),
                    client_secret: "github-client-secret".to_string(),
                    authorize_url: "https://github.com/login/oauth/authorize".to_string(),
                    token_url: "https://github.com/login/oauth/access_token".to_string(),
                    api_base_url: "https://api.github.com".to_string(),
                },
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_http_on_localhost() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert!(!config.should_use_secure_cookies());
    }

    #[test]
    fn validate_rejects_short_session_secret() {
        let mut config = valid_config();
        config.auth.session_secret = "short-secret".to_string();

        let error = config
            .validate()
            .expect_err("session secret shorter than 32 bytes must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("auth.session_secret")
        ));
    }

    #[test]
    fn validate_rejects_non_http_app_url() {
        let mut config = valid_config();
        config.server.app_url = "ftp://connix.example.com".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn https_app_url_enables_secure_cookies() {
        let mut config = valid_config();
        config.server.app_url = "https://connix.example.com/".to_string();

        assert!(config.should_use_secure_cookies());
        assert_eq!(
            config.oauth_redirect_uri(),
            "https://connix.example.com/auth/github/callback"
        );
    }

    #[test]
    fn deployment_variables_override_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SESSION_SECRET", "0123456789abcdef0123456789abcdef"),
            ("GITHUB_CLIENT_ID", "client-from-env"),
            ("GITHUB_CLIENT_SECRET", "secret-from-env"),
            ("APP_URL", "https://connix.example.com"),
            ("PORT", "9123"),
        ]);

        let config = AppConfig::load_with(|key| vars.get(key).map(|v| v.to_string()))
            .expect("config loads from deployment variables");

        assert_eq!(config.server.port, 9123);
        assert_eq!(config.server.app_url, "https://connix.example.com");
        assert_eq!(config.auth.github.client_id, "client-from-env");
        assert_eq!(config.auth.session_max_age, 2_592_000);
    }

    #[test]
    fn missing_session_secret_is_rejected() {
        let error = AppConfig::load_with(|_| None).expect_err("session secret is required");
        assert!(matches!(error, crate::error::AppError::Config(_)));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SESSION_SECRET", "0123456789abcdef0123456789abcdef"),
            ("PORT", "not-a-port"),
        ]);

        let error = AppConfig::load_with(|key| vars.get(key).map(|v| v.to_string()))
            .expect_err("non-numeric PORT must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message) if message.contains("PORT")
        ));
    }
}
