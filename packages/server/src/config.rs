use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_FOLLOWUP_MODEL: &str = "gpt-4o-mini";
const PLACEHOLDER_API_KEY: &str = "sk-placeholder";
const MIN_API_KEY_LEN: usize = 20;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// `None` when the key is missing or clearly not a real key (demo mode)
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub followup_model: String,
    pub tavily_api_key: Option<String>,
    pub extension_token_secret: String,
    /// Empty means any origin
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let openai_api_key = usable_api_key(env::var("OPENAI_API_KEY").ok());

        let extension_token_secret = match env::var("EXTENSION_TOKEN_SECRET")
            .or_else(|_| env::var("NEXTAUTH_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) => {
                tracing::warn!("EXTENSION_TOKEN_SECRET not set, using development secret");
                "dev-secret".to_string()
            }
        };

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            openai_api_key,
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            followup_model: env::var("OPENAI_FOLLOWUP_MODEL")
                .unwrap_or_else(|_| DEFAULT_FOLLOWUP_MODEL.to_string()),
            tavily_api_key: env::var("TAVILY_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            extension_token_secret,
            allowed_origins: parse_origins(&env::var("ALLOWED_ORIGINS").unwrap_or_default()),
        })
    }

    pub fn demo_mode(&self) -> bool {
        self.openai_api_key.is_none()
    }
}

/// A key that is absent, the placeholder, or too short to be real is dropped.
pub fn usable_api_key(key: Option<String>) -> Option<String> {
    key.filter(|k| k != PLACEHOLDER_API_KEY && k.len() >= MIN_API_KEY_LEN)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty() && *origin != "*")
        .map(String::from)
        .collect()
}
