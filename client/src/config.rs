//! Client configuration
//!
//! Configuration is loaded from environment variables on top of the defaults below.

use std::env;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Remote API configuration
    pub api: ApiConfig,

    /// Search configuration
    pub search: SearchConfig,
}

/// Remote API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL all API paths are appended to
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

/// Search-related configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Quiet period after the last keystroke before a search is issued
    pub debounce: Duration,
    /// Queries shorter than this (in characters) never hit the API
    pub min_query_len: usize,
    /// Maximum number of results presented
    pub max_results: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            min_query_len: 2,
            max_results: 5,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // API config
        if let Ok(url) = env::var("STOREFRONT_API_URL")
            && !url.is_empty()
        {
            config.api.base_url = url;
        }
        if let Ok(val) = env::var("API_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.api.request_timeout = Duration::from_secs(secs);
        }

        // Search config
        if let Ok(val) = env::var("SEARCH_DEBOUNCE_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.search.debounce = Duration::from_millis(ms);
        }
        if let Ok(val) = env::var("SEARCH_MIN_QUERY_LEN")
            && let Ok(len) = val.parse::<usize>()
            && len > 0
        {
            config.search.min_query_len = len;
        }
        if let Ok(val) = env::var("SEARCH_MAX_RESULTS")
            && let Ok(max) = val.parse::<usize>()
            && max > 0
        {
            config.search.max_results = max;
        }

        config
    }
}
