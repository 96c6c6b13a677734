/// Configuration management for the API server
///
/// Configuration comes from environment variables; a `.env` file in the
/// working directory is loaded first when present.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `JWT_SECRET`: Secret key for JWT signing (required, at least 32 characters)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: `*`)
/// - `APP_ENV`: `production` turns on HSTS (default: development)
/// - `GOOGLE_CLIENT_ID`: OAuth client ID; Google sign-in is disabled without it
/// - `GOOGLE_TOKENINFO_URL`: override for Google's tokeninfo endpoint
/// - `RUST_LOG` / `LOG_FORMAT`: log filter and `json` output
///
/// # Example
///
/// ```no_run
/// use agencyhub_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use agencyhub_shared::{auth::google::DEFAULT_TOKENINFO_URL, db::pool};
use serde::{Deserialize, Serialize};
use std::env;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub google: GoogleConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `["*"]` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (enables HSTS)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Pool settings for `agencyhub_shared::db::pool::create_pool`
    pub fn pool_config(&self) -> pool::DatabaseConfig {
        pool::DatabaseConfig {
            max_connections: self.max_connections,
            min_connections: self.max_connections.min(2),
            ..pool::DatabaseConfig::new(self.url.clone())
        }
    }
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be at least 32 bytes. Generate with: `openssl rand -hex 32`
    pub secret: String,
}

/// Google sign-in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// `None` disables `POST /api/auth/google`
    pub client_id: Option<String>,
    pub tokeninfo_url: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` or `JWT_SECRET` is missing
    /// - `JWT_SECRET` is shorter than 32 characters
    /// - A numeric variable does not parse
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let cors_origins = parse_origins(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));
        let production = env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let google_client_id = env::var("GOOGLE_CLIENT_ID")
            .ok()
            .filter(|id| !id.trim().is_empty());
        let tokeninfo_url =
            env::var("GOOGLE_TOKENINFO_URL").unwrap_or_else(|_| DEFAULT_TOKENINFO_URL.to_string());

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
            },
            google: GoogleConfig {
                client_id: google_client_id,
                tokeninfo_url,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Configuration for tests; never reads the environment
    pub fn for_tests(database_url: &str, jwt_secret: &str) -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            database: DatabaseConfig {
                url: database_url.to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: jwt_secret.to_string(),
            },
            google: GoogleConfig {
                client_id: None,
                tokeninfo_url: DEFAULT_TOKENINFO_URL.to_string(),
            },
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let mut config = Config::for_tests(
            "postgresql://localhost/test",
            "test-secret-key-at-least-32-bytes-long",
        );
        config.api.port = 8080;

        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://app.example.com, http://localhost:5173,"),
            vec!["https://app.example.com", "http://localhost:5173"]
        );
        assert_eq!(parse_origins("*"), vec!["*"]);
        assert!(parse_origins(" , ").is_empty());
    }

    #[test]
    fn test_pool_config_carries_url_and_size() {
        let config = Config::for_tests("postgresql://localhost/agencyhub", "x".repeat(32).as_str());
        let pool = config.database.pool_config();

        assert_eq!(pool.url, "postgresql://localhost/agencyhub");
        assert_eq!(pool.max_connections, 5);
        assert!(pool.min_connections <= pool.max_connections);
    }
}
