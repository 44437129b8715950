use crate::completion::DEFAULT_MODEL;
use anyhow::{Context, Result};
use std::env;

/// Application configuration, read once from the process environment at
/// startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// The model API key. `None` leaves the completion adapter in a
    /// degraded, always-failing state instead of aborting startup.
    pub gemini_api_key: Option<String>,
    pub model: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let gemini_api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        if gemini_api_key.is_none() {
            log::warn!(
                "GEMINI_API_KEY is not set; chat replies will fail with a descriptive error"
            );
        }

        let model = env::var("VEHI_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let supabase_url = env::var("SUPABASE_URL")
            .context("SUPABASE_URL must be set to the project's API base URL")?;
        let supabase_anon_key = env::var("SUPABASE_ANON_KEY")
            .context("SUPABASE_ANON_KEY must be set to the project's anonymous API key")?;

        Ok(Self {
            gemini_api_key,
            model,
            supabase_url,
            supabase_anon_key,
        })
    }
}
