use std::env;
use std::path::PathBuf;
use dotenv::dotenv;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    JsonFile(PathBuf),
    Postgres(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub backend: StoreBackend,
    pub images_dir: PathBuf,
    pub jwt_secret: String,
    pub login_path: String,
    pub suggested_limit: usize,
}

impl AppConfig {
    pub fn init() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get_or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let server_host = get_or("SERVER_HOST", "127.0.0.1");
        let server_port = get_or("SERVER_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;

        let backend = match get_or("STORE_BACKEND", "json").as_str() {
            "json" => StoreBackend::JsonFile(PathBuf::from(get_or("PRODUCTS_FILE", "data/products.json"))),
            "postgres" => {
                let url = lookup("DATABASE_URL").ok_or_else(|| {
                    AppError::Config("DATABASE_URL is required when STORE_BACKEND=postgres".to_string())
                })?;
                StoreBackend::Postgres(url)
            }
            other => {
                return Err(AppError::Config(format!(
                    "Unknown STORE_BACKEND '{}', expected 'json' or 'postgres'",
                    other
                )))
            }
        };

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set, using the development secret");
                "development-secret".to_string()
            }
        };

        let suggested_limit = get_or("SUGGESTED_LIMIT", "3")
            .parse::<usize>()
            .map_err(|e| AppError::Config(format!("Invalid SUGGESTED_LIMIT: {}", e)))?;

        Ok(AppConfig {
            server_host,
            server_port,
            backend,
            images_dir: PathBuf::from(get_or("IMAGES_DIR", "public/images/products")),
            jwt_secret,
            login_path: get_or("LOGIN_PATH", "/users/login"),
            suggested_limit,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
