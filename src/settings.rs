use serde::Deserialize;
use std::time::Duration;

/// Token endpoint used when [`Settings::token_url`] is not configured.
pub const DEFAULT_TOKEN_URL: &str = "https://efihub.morefurniture.id/oauth/token";

/// Api base url used when [`Settings::api_base_url`] is not configured.
pub const DEFAULT_API_BASE_URL: &str = "https://efihub.morefurniture.id/api";

/// Timeout applied to every request, the token exchange included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Deserialize)]
pub struct Settings {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Sent as a space separated `scope` field, omitted when empty
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Settings {
    /// Settings for the given credentials, every other field defaulted.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Settings {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: default_token_url(),
            api_base_url: default_api_base_url(),
            scopes: Vec::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}
