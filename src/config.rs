use std::env;
use std::path::PathBuf;

use eyre::{eyre, Result};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_PUBLIC_DIR: &str = "public";
pub const DEFAULT_RELAY_URL: &str = "http://localhost:5000/";

mod vars {
    pub const API_KEY: &str = "GEMINI_API_KEY";
    pub const MODEL: &str = "GEMINI_MODEL";
    pub const API_BASE: &str = "GEMINI_API_BASE";
    pub const PORT: &str = "PORT";
    pub const UPLOAD_DIR: &str = "PIKABOT_UPLOAD_DIR";
    pub const PUBLIC_DIR: &str = "PIKABOT_PUBLIC_DIR";
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// API root without a trailing slash
    pub api_base: String,
}

/// Settings for the relay server, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub gemini: GeminiConfig,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub public_dir: PathBuf,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var(vars::API_KEY)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| eyre!("{} is not defined in the environment or .env file", vars::API_KEY))?;

        let model = env::var(vars::MODEL).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let api_base = env::var(vars::API_BASE)
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let port = match env::var(vars::PORT) {
            Ok(port) => port
                .parse()
                .map_err(|_| eyre!("{} must be a port number, got {:?}", vars::PORT, port))?,
            Err(_) => DEFAULT_PORT,
        };

        let upload_dir = env::var(vars::UPLOAD_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_DIR));
        let public_dir = env::var(vars::PUBLIC_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_PUBLIC_DIR));

        Ok(Self {
            gemini: GeminiConfig {
                api_key,
                model,
                api_base,
            },
            port,
            upload_dir,
            public_dir,
        })
    }
}

/// Where the terminal client keeps its persisted slots when no `--data-dir`
/// is given.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pikabot")
}
