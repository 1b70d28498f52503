//! Blocking HTTP client for the Adax client API.
//!
//! - Uses `ureq` (no async); one request per call, no retries.
//! - Every endpoint wants a bearer token from the password grant at `/auth/token`.
//!
//! Authentication
//! - `authenticate()` always performs a fresh password grant.
//! - `bearer()` does the same unless token caching is enabled, in which case a
//!   token that carried `expires_in` is reused until shortly before it expires.

use serde::de::DeserializeOwned;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use http::StatusCode;
use log::debug;

use crate::config::Config;
use crate::models::adax::{ContentResponse, ControlRequest, Room, TokenResponse};

const TOKEN_PATH: &str = "/auth/token";
const CONTENT_PATH: &str = "/rest/v1/content/";
const CONTROL_PATH: &str = "/rest/v1/control/";
/// A cached token is dropped this long before the server says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum ApiError {
    Transport(String),
    Auth { status: u16, message: String },
    Fetch { status: u16, message: String },
    Parse(String),
    Control { status: u16, message: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth { status, .. } | ApiError::Fetch { status, .. } | ApiError::Control { status, .. } => {
                Some(*status)
            }
            ApiError::Transport(_) | ApiError::Parse(_) => None,
        }
    }
}

impl core::fmt::Display for ApiError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ApiError::Transport(s) => write!(f, "transport error: {}", s),
            ApiError::Auth { status, message } => write!(f, "auth failed: http {}: {}", status, message),
            ApiError::Fetch { status, message } => write!(f, "fetch failed: http {}: {}", status, message),
            ApiError::Parse(s) => write!(f, "unexpected response body: {}", s),
            ApiError::Control { status, message } => write!(f, "control failed: http {}: {}", status, message),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ureq::Error> for ApiError {
    fn from(value: ureq::Error) -> Self {
        ApiError::Transport(value.to_string())
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct AdaxClient {
    agent: ureq::Agent,
    base_url: String,
    username: String,
    password: String,
    cache_token: bool,
    token: Mutex<Option<CachedToken>>,
}

impl AdaxClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        cache_token: bool,
        timeout: Option<Duration>,
    ) -> Self {
        // Status codes are inspected by hand, so 4xx/5xx must not become `Err`.
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .into();

        AdaxClient {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            cache_token,
            token: Mutex::new(None),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.api_url.clone(),
            cfg.username.clone(),
            cfg.password.clone(),
            cfg.cache_token,
            cfg.http_timeout,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Password grant. Never consults or fills the token cache.
    pub fn authenticate(&self) -> Result<String, ApiError> {
        self.password_grant().map(|t| t.access_token)
    }

    fn password_grant(&self) -> Result<TokenResponse, ApiError> {
        let mut resp = self
            .agent
            .post(self.url(TOKEN_PATH))
            .header("Accept", "application/json")
            .send_form([
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
                ("grant_type", "password"),
            ])?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(ApiError::Auth {
                status: status.as_u16(),
                message: error_body(&mut resp),
            });
        }
        parse_json(&read_body(&mut resp)?)
    }

    /// Token for the next request, honouring the cache setting.
    pub fn bearer(&self) -> Result<String, ApiError> {
        if !self.cache_token {
            return self.authenticate();
        }

        let mut cached = self.token.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(t) = cached.as_ref()
            && Instant::now()
                .checked_add(TOKEN_EXPIRY_MARGIN)
                .is_some_and(|deadline| deadline < t.expires_at)
        {
            return Ok(t.access_token.clone());
        }

        let fresh = self.password_grant()?;
        // An `expires_in` too large for `Instant` is not cached.
        *cached = fresh
            .expires_in
            .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs)))
            .map(|expires_at| CachedToken {
                access_token: fresh.access_token.clone(),
                expires_at,
            });
        if cached.is_some() {
            debug!("Adax: cached access token");
        }
        Ok(fresh.access_token)
    }

    /// Forget the cached token, e.g. after the API rejected it with 401.
    pub fn invalidate_token(&self) {
        let mut cached = self.token.lock().unwrap_or_else(|e| e.into_inner());
        if cached.take().is_some() {
            debug!("Adax: dropped cached access token");
        }
    }

    fn forget_token_on_unauthorized(&self, err: &ApiError) {
        if err.status() == Some(StatusCode::UNAUTHORIZED.as_u16()) {
            self.invalidate_token();
        }
    }

    pub fn fetch_rooms(&self, token: &str) -> Result<Vec<Room>, ApiError> {
        let mut resp = self
            .agent
            .get(self.url(CONTENT_PATH))
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {}", token))
            .call()?;

        let status = resp.status();
        if status != StatusCode::OK {
            let err = ApiError::Fetch {
                status: status.as_u16(),
                message: error_body(&mut resp),
            };
            self.forget_token_on_unauthorized(&err);
            return Err(err);
        }
        let content: ContentResponse = parse_json(&read_body(&mut resp)?)?;
        Ok(content.rooms)
    }

    pub fn post_control(&self, token: &str, request: &ControlRequest) -> Result<(), ApiError> {
        let mut resp = self
            .agent
            .post(self.url(CONTROL_PATH))
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {}", token))
            .send_json(request)?;

        let status = resp.status();
        if status != StatusCode::OK {
            let err = ApiError::Control {
                status: status.as_u16(),
                message: error_body(&mut resp),
            };
            self.forget_token_on_unauthorized(&err);
            return Err(err);
        }
        Ok(())
    }

    /// Token + content fetch, the unit of work behind every refresh.
    pub fn authenticate_and_fetch(&self) -> Result<Vec<Room>, ApiError> {
        let token = self.bearer()?;
        self.fetch_rooms(&token)
    }

    /// Token + control POST.
    pub fn authenticate_and_control(&self, request: &ControlRequest) -> Result<(), ApiError> {
        let token = self.bearer()?;
        self.post_control(&token, request)
    }
}

fn read_body(resp: &mut http::Response<ureq::Body>) -> Result<String, ApiError> {
    Ok(resp.body_mut().read_to_string()?)
}

/// Body of a non-200 response, for the error message only.
fn error_body(resp: &mut http::Response<ureq::Body>) -> String {
    read_body(resp).unwrap_or_else(|_| String::from("<no body>"))
}

fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, ApiError> {
    let de = &mut serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(de).map_err(|e| ApiError::Parse(format!("{}: {}", e.path(), e.inner())))
}
