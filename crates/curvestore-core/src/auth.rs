use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::http_client::{HttpAuth, HttpClient, HttpRequest};

pub const API_KEY_HEADER: &str = "x-api-key";

/// OAuth client-credentials settings.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub audience: String,
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("audience", &self.audience)
            .finish()
    }
}

/// How the client identifies itself to the curve store.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    ApiKey(String),
    ClientCredentials(OAuthClientConfig),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Self::ClientCredentials(config) => {
                f.debug_tuple("ClientCredentials").field(config).finish()
            }
        }
    }
}

/// Failure to obtain a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenError(pub String);

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TokenError {}

/// Source of bearer tokens. Called once per dispatched call; implementations
/// that want caching add it themselves.
pub trait TokenProvider: Send + Sync {
    fn token<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<String, TokenError>> + Send + 'a>>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Plain client-credentials exchange against a token endpoint.
#[derive(Clone)]
pub struct ClientCredentialsTokenProvider {
    config: OAuthClientConfig,
    http_client: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl ClientCredentialsTokenProvider {
    pub fn new(config: OAuthClientConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
            timeout: Duration::from_secs(30),
        }
    }

    fn form_body(&self) -> String {
        [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("audience", self.config.audience.as_str()),
        ]
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
    }
}

impl TokenProvider for ClientCredentialsTokenProvider {
    fn token<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<String, TokenError>> + Send + 'a>> {
        Box::pin(async move {
            let request = HttpRequest::post(&self.config.token_url)
                .with_header("content-type", "application/x-www-form-urlencoded")
                .with_header("accept", "application/json")
                .with_body(self.form_body())
                .with_timeout(self.timeout);

            let response = self
                .http_client
                .execute(request)
                .await
                .map_err(|e| TokenError(format!("token endpoint unreachable: {e}")))?;

            if !response.is_success() {
                return Err(TokenError(format!(
                    "token endpoint returned status {}",
                    response.status
                )));
            }

            let token: TokenResponse = serde_json::from_slice(&response.body)
                .map_err(|e| TokenError(format!("malformed token response: {e}")))?;
            Ok(token.access_token)
        })
    }
}

/// Resolves per-call identity from configured credentials.
#[derive(Clone)]
pub(crate) enum Identity {
    ApiKey(String),
    Token(Arc<dyn TokenProvider>),
}

impl Identity {
    pub(crate) fn from_credentials(
        credentials: &Credentials,
        http_client: &Arc<dyn HttpClient>,
    ) -> Self {
        match credentials {
            Credentials::ApiKey(key) => Self::ApiKey(key.clone()),
            Credentials::ClientCredentials(config) => Self::Token(Arc::new(
                ClientCredentialsTokenProvider::new(config.clone(), Arc::clone(http_client)),
            )),
        }
    }

    pub(crate) async fn resolve(&self) -> Result<HttpAuth, TokenError> {
        match self {
            Self::ApiKey(key) => Ok(HttpAuth::Header {
                name: String::from(API_KEY_HEADER),
                value: key.clone(),
            }),
            Self::Token(provider) => provider.token().await.map(HttpAuth::BearerToken),
        }
    }
}
