use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;

pub const DEFAULT_SERVER_PORT: u16 = 3004;
pub const DEFAULT_VOLUNTEERS_PORT: u16 = 3005;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub cors_allowed_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = match env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => database_url_from_parts(
                &env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
                &env::var("DB_USER").context("DB_USER must be set when DATABASE_URL is not")?,
                env::var("DB_PASSWORD").ok().as_deref(),
                &env::var("DB_NAME").context("DB_NAME must be set when DATABASE_URL is not")?,
                env::var("DB_PORT")
                    .unwrap_or_else(|_| "5432".to_string())
                    .parse()
                    .context("DB_PORT must be a valid u16")?,
            )?,
        };
        let database_max_pool_size = env::var("DATABASE_MAX_POOL_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .map(|value| value.parse())
            .unwrap_or(Ok(DEFAULT_SERVER_PORT))
            .context("SERVER_PORT must be a valid u16")?;
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();

        Ok(Self {
            database_url,
            database_max_pool_size,
            server_host,
            server_port,
            cors_allowed_origin,
        })
    }

    pub fn redacted_database_url(&self) -> String {
        redact_database_url(&self.database_url)
    }
}

/// Settings for the file-backed volunteer server.
#[derive(Clone, Debug)]
pub struct VolunteerConfig {
    pub data_file: PathBuf,
    pub host: String,
    pub port: u16,
    pub cors_allowed_origin: Option<String>,
}

impl VolunteerConfig {
    pub fn from_env() -> Result<Self> {
        let data_file = env::var("VOLUNTEERS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("volunteers.json"));
        let host = env::var("VOLUNTEERS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("VOLUNTEERS_PORT")
            .map(|value| value.parse())
            .unwrap_or(Ok(DEFAULT_VOLUNTEERS_PORT))
            .context("VOLUNTEERS_PORT must be a valid u16")?;

        Ok(Self {
            data_file,
            host,
            port,
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN").ok(),
        })
    }
}

fn database_url_from_parts(
    host: &str,
    user: &str,
    password: Option<&str>,
    name: &str,
    port: u16,
) -> Result<String> {
    let mut url = Url::parse(&format!("postgres://{host}:{port}"))
        .with_context(|| format!("DB_HOST `{host}` is not a valid host"))?;
    url.set_username(user)
        .map_err(|_| anyhow::anyhow!("DB_USER cannot be used in a database URL"))?;
    if let Some(password) = password.filter(|value| !value.is_empty()) {
        url.set_password(Some(password))
            .map_err(|_| anyhow::anyhow!("DB_PASSWORD cannot be used in a database URL"))?;
    }
    url.set_path(&format!("/{name}"));
    Ok(url.to_string())
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("*****"));
            }
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
