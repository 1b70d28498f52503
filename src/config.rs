//! Runtime configuration from the environment.
//! Defaults point at the public Adax client API.

use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api-1.adax.no/client-api";
pub const DEFAULT_POLL_SECS: u64 = 60;
pub const DEFAULT_MIN_REFRESH_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    /// Adax account id.
    pub username: String,
    /// API credential generated in the Adax app.
    pub password: String,
    pub api_url: String,
    /// How often the poll loop ticks.
    pub poll_interval: Duration,
    /// Hub refreshes closer together than this reuse the previous snapshot.
    pub min_refresh_interval: Duration,
    /// Reuse access tokens until they expire instead of logging in per request.
    pub cache_token: bool,
    /// Global per-request timeout; `None` keeps the HTTP client default.
    pub http_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let username = credential(&get, "ADAX_USERNAME")?;
        let password = credential(&get, "ADAX_PASSWORD")?;

        let api_url = get("ADAX_API_URL")
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let poll_secs = parse_secs(&get, "POLL_INTERVAL_SECS")?.unwrap_or(DEFAULT_POLL_SECS);
        if poll_secs == 0 {
            return Err("POLL_INTERVAL_SECS must be greater than zero".to_string());
        }
        let min_refresh_secs = parse_secs(&get, "MIN_REFRESH_INTERVAL_SECS")?.unwrap_or(DEFAULT_MIN_REFRESH_SECS);
        let http_timeout = parse_secs(&get, "HTTP_TIMEOUT_SECS")?.map(Duration::from_secs);

        let cache_token = get("CACHE_TOKEN")
            .map(|s| matches!(s.trim(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false);

        Ok(Config {
            username,
            password,
            api_url,
            poll_interval: Duration::from_secs(poll_secs),
            min_refresh_interval: Duration::from_secs(min_refresh_secs),
            cache_token,
            http_timeout,
        })
    }
}

/// Credentials are copied from the Adax app, which likes to insert spaces.
fn credential(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, String> {
    let value: String = get(key).unwrap_or_default().chars().filter(|c| *c != ' ').collect();
    if value.is_empty() {
        return Err(format!("Missing credential: set {}", key));
    }
    Ok(value)
}

fn parse_secs(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>, String> {
    match get(key) {
        Some(s) if !s.trim().is_empty() => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| format!("{} must be a whole number of seconds", key)),
        _ => Ok(None),
    }
}
