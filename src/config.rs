// Startup configuration
//
// All credentials are resolved once at startup and never mutated. A missing
// required variable fails the process immediately with the variable named,
// instead of surfacing as a confusing network error on first use.

use std::time::Duration;

use crate::error::TrackerError;

pub const ENV_GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_KEY: &str = "SUPABASE_KEY";
pub const ENV_GEMINI_MODEL: &str = "GEMINI_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "BILL_TRACKER_TIMEOUT_SECS";

/// Model used by default; overridable via GEMINI_MODEL.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite-preview-06-17";

/// Every outbound call is bounded by this unless overridden. An unbounded
/// call would hang the interactive session.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Gemini access key.
    pub google_api_key: String,
    /// Store endpoint, e.g. "https://xyzcompany.supabase.co".
    pub supabase_url: String,
    /// Store service or anon key.
    pub supabase_key: String,
    pub gemini_model: String,
    pub request_timeout: Duration,
}

impl AppConfig {
    /// Load from process environment. Reports *all* missing required
    /// variables at once so the user fixes them in one pass.
    pub fn from_env() -> Result<Self, TrackerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env` but with an injectable lookup, for tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TrackerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut required = |name: &'static str| -> String {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => value,
                _ => {
                    missing.push(name);
                    String::new()
                }
            }
        };

        let google_api_key = required(ENV_GOOGLE_API_KEY);
        let supabase_url = required(ENV_SUPABASE_URL);
        let supabase_key = required(ENV_SUPABASE_KEY);

        if !missing.is_empty() {
            return Err(TrackerError::Config {
                reason: format!(
                    "missing required environment variable(s): {}",
                    missing.join(", ")
                ),
            });
        }

        let gemini_model = lookup(ENV_GEMINI_MODEL)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        let timeout_secs = match lookup(ENV_TIMEOUT_SECS) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| TrackerError::Config {
                reason: format!("{ENV_TIMEOUT_SECS} must be a positive integer, got '{raw}'"),
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(TrackerError::Config {
                reason: format!("{ENV_TIMEOUT_SECS} must be greater than zero"),
            });
        }

        Ok(AppConfig {
            google_api_key,
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_key,
            gemini_model,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
