use std::env;

use crate::error::Error;

/// Client configuration: connection credentials plus feature flags.
///
/// Built once at startup and shared behind an `Arc`; nothing mutates it
/// afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub admin_role: String,
    pub posts_per_page: u32,
    pub enable_comments: bool,
    pub enable_categories: bool,
    pub enable_tags: bool,
}

impl Config {
    pub fn new(supabase_url: impl Into<String>, supabase_anon_key: impl Into<String>) -> Self {
        Self {
            supabase_url: supabase_url.into(),
            supabase_anon_key: supabase_anon_key.into(),
            admin_role: "admin".to_string(),
            posts_per_page: 10,
            enable_comments: false,
            enable_categories: true,
            enable_tags: true,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Recognized variables: `SUPABASE_URL`, `SUPABASE_ANON_KEY`,
    /// `SUPABLOG_ADMIN_ROLE`, `SUPABLOG_POSTS_PER_PAGE`,
    /// `SUPABLOG_ENABLE_COMMENTS`, `SUPABLOG_ENABLE_CATEGORIES`,
    /// `SUPABLOG_ENABLE_TAGS`.
    pub fn from_env() -> Result<Self, Error> {
        let supabase_url = env::var("SUPABASE_URL")
            .map_err(|_| Error::Validation("SUPABASE_URL is not set".to_string()))?;
        let supabase_anon_key = env::var("SUPABASE_ANON_KEY")
            .map_err(|_| Error::Validation("SUPABASE_ANON_KEY is not set".to_string()))?;

        let mut config = Self::new(supabase_url, supabase_anon_key);

        if let Ok(role) = env::var("SUPABLOG_ADMIN_ROLE") {
            config.admin_role = role;
        }
        config.posts_per_page = env::var("SUPABLOG_POSTS_PER_PAGE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.posts_per_page);
        config.enable_comments = env_flag("SUPABLOG_ENABLE_COMMENTS", config.enable_comments);
        config.enable_categories = env_flag("SUPABLOG_ENABLE_CATEGORIES", config.enable_categories);
        config.enable_tags = env_flag("SUPABLOG_ENABLE_TAGS", config.enable_tags);

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.supabase_url.trim().is_empty() {
            return Err(Error::Validation("supabase_url cannot be empty".to_string()));
        }
        if self.supabase_anon_key.trim().is_empty() {
            return Err(Error::Validation(
                "supabase_anon_key cannot be empty".to_string(),
            ));
        }
        if self.posts_per_page == 0 {
            return Err(Error::Validation(
                "posts_per_page must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}
