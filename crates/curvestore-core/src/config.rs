use std::time::Duration;

use crate::auth::{Credentials, OAuthClientConfig};
use crate::codec::CodecRegistry;
use crate::error::ConfigError;
use crate::resilience::ResilienceConfig;

pub const BASE_URL_VAR: &str = "CURVESTORE_BASE_URL";
pub const API_KEY_VAR: &str = "CURVESTORE_API_KEY";
pub const CLIENT_ID_VAR: &str = "CURVESTORE_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "CURVESTORE_CLIENT_SECRET";
pub const TOKEN_URL_VAR: &str = "CURVESTORE_TOKEN_URL";
pub const AUDIENCE_VAR: &str = "CURVESTORE_AUDIENCE";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Everything a [`crate::ResilientClient`] needs to reach one curve store.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    base_url: String,
    credentials: Credentials,
    resilience: ResilienceConfig,
    request_timeout: Duration,
    codecs: CodecRegistry,
    user_agent: String,
}

impl ClientConfig {
    /// `base_url` is the versioned root, e.g. `https://curves.example/v1.0`.
    /// A trailing slash is dropped.
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Result<Self, ConfigError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }

        Ok(Self {
            base_url,
            credentials,
            resilience: ResilienceConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            codecs: CodecRegistry::default(),
            user_agent: default_user_agent(),
        })
    }

    /// Reads the `CURVESTORE_*` environment variables. An API key wins over
    /// client credentials when both are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let require = |name: &'static str| read(name).ok_or(ConfigError::MissingVariable { name });

        let base_url = require(BASE_URL_VAR)?;

        let credentials = match read(API_KEY_VAR) {
            Some(key) => Credentials::ApiKey(key),
            None => {
                if read(CLIENT_ID_VAR).is_none() {
                    return Err(ConfigError::MissingCredentials);
                }
                Credentials::ClientCredentials(OAuthClientConfig {
                    client_id: require(CLIENT_ID_VAR)?,
                    client_secret: require(CLIENT_SECRET_VAR)?,
                    token_url: require(TOKEN_URL_VAR)?,
                    audience: require(AUDIENCE_VAR)?,
                })
            }
        };

        Self::new(base_url, credentials)
    }

    pub fn with_resilience(mut self, resilience: ResilienceConfig) -> Self {
        self.resilience = resilience;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn resilience(&self) -> &ResilienceConfig {
        &self.resilience
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Absolute url for a path relative to the base.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn default_user_agent() -> String {
    format!(
        "curvestore-core/{} ({}; rust)",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}
