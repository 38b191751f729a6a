use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::auth::Identity;
use crate::codec::{Codec, PayloadKind, JSON_MEDIA_TYPE};
use crate::config::ClientConfig;
use crate::error::{ClientFailure, CurveStoreError, RemoteFailure};
use crate::http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};
use crate::problem::failure_detail;
use crate::resilience::{CircuitState, ResilienceError, ResiliencePipeline};

pub const AGENT_HEADER: &str = "x-curvestore-agent";

/// HTTP client that negotiates codecs, authenticates every call and runs it
/// through the resilience pipeline.
///
/// One instance is meant to be shared (behind an `Arc`) by every caller that
/// talks to the same curve store, so that they share the breaker, the
/// bulkhead and the connection pool.
pub struct ResilientClient {
    config: ClientConfig,
    http_client: Arc<dyn HttpClient>,
    identity: Identity,
    pipeline: ResiliencePipeline,
    accept: String,
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("base_url", &self.config.base_url())
            .field("pipeline", &self.pipeline)
            .field("accept", &self.accept)
            .finish_non_exhaustive()
    }
}

impl ResilientClient {
    /// Client backed by the reqwest transport.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_http_client(config, Arc::new(ReqwestHttpClient::new()))
    }

    pub fn with_http_client(config: ClientConfig, http_client: Arc<dyn HttpClient>) -> Self {
        let identity = Identity::from_credentials(config.credentials(), &http_client);
        let pipeline = ResiliencePipeline::new(config.resilience().clone());
        let accept = config.codecs().accept_header();

        Self {
            config,
            http_client,
            identity,
            pipeline,
            accept,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.pipeline.circuit_state()
    }

    pub async fn get<T>(&self, path: &str, cancel: &CancellationToken) -> Result<T, CurveStoreError>
    where
        T: DeserializeOwned + Default,
    {
        self.execute::<(), T>(HttpMethod::Get, path, None, cancel).await
    }

    pub async fn post<B, T>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<T, CurveStoreError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Default,
    {
        self.execute(HttpMethod::Post, path, Some(body), cancel).await
    }

    pub async fn put<B, T>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<T, CurveStoreError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Default,
    {
        self.execute(HttpMethod::Put, path, Some(body), cancel).await
    }

    pub async fn delete<T>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<T, CurveStoreError>
    where
        T: DeserializeOwned + Default,
    {
        self.execute::<(), T>(HttpMethod::Delete, path, None, cancel).await
    }

    /// Sends one logical call and maps its outcome.
    ///
    /// `204` and `404` yield `T::default()`. Other unsuccessful statuses are
    /// classified by [`CurveStoreError::from_status`] and never retried. Only
    /// transport failures are retried and counted by the breaker.
    pub async fn execute<B, T>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        cancel: &CancellationToken,
    ) -> Result<T, CurveStoreError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Default,
    {
        let url = self.config.url_for(path);

        let encoded = match body {
            Some(body) => {
                let codec = self
                    .config
                    .codecs()
                    .preferred(PayloadKind::Data)
                    .map_err(|e| CurveStoreError::client(method, url.as_str(), e.into()))?;
                let bytes = codec
                    .encode(body)
                    .map_err(|e| CurveStoreError::client(method, url.as_str(), e.into()))?;
                Some((codec.media_type(), bytes))
            }
            None => None,
        };

        let auth = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(CurveStoreError::Cancelled { method, url });
            }
            resolved = self.identity.resolve() => resolved.map_err(|e| {
                CurveStoreError::client(
                    method,
                    url.as_str(),
                    ClientFailure::Authentication(e.to_string()),
                )
            })?,
        };

        let request = self.build_request(method, &url, &auth, encoded);

        let outcome = self
            .pipeline
            .execute(
                |attempt| {
                    tracing::debug!(%method, url = %request.url, attempt, "dispatching call");
                    self.http_client.execute(request.clone())
                },
                HttpError::retryable,
                cancel,
            )
            .await;

        match outcome {
            Ok(response) => self.handle_response(method, url, response),
            Err(ResilienceError::Cancelled) => Err(CurveStoreError::Cancelled { method, url }),
            Err(ResilienceError::CircuitOpen) => Err(CurveStoreError::client(
                method,
                url,
                ClientFailure::CircuitOpen,
            )),
            Err(ResilienceError::BulkheadRejected(_)) => Err(CurveStoreError::client(
                method,
                url,
                ClientFailure::BulkheadRejected,
            )),
            Err(ResilienceError::Failed(error)) => {
                tracing::warn!(%method, %url, %error, "transport failure");
                Err(CurveStoreError::client(
                    method,
                    url,
                    ClientFailure::Transport(error),
                ))
            }
        }
    }

    fn build_request(
        &self,
        method: HttpMethod,
        url: &str,
        auth: &HttpAuth,
        body: Option<(&'static str, Vec<u8>)>,
    ) -> HttpRequest {
        let mut request = HttpRequest::new(method, url)
            .with_header("accept", self.accept.as_str())
            .with_header(AGENT_HEADER, self.config.user_agent())
            .with_auth(auth)
            .with_timeout(self.config.request_timeout());

        if let Some((media_type, bytes)) = body {
            request = request
                .with_header("content-type", media_type)
                .with_body(bytes);
        }

        request
    }

    fn handle_response<T>(
        &self,
        method: HttpMethod,
        url: String,
        response: HttpResponse,
    ) -> Result<T, CurveStoreError>
    where
        T: DeserializeOwned + Default,
    {
        if matches!(response.status, 204 | 404) {
            tracing::debug!(%method, %url, status = response.status, "no content");
            return Ok(T::default());
        }

        if !response.is_success() {
            let failure = RemoteFailure {
                method,
                status: response.status,
                detail: failure_detail(&response),
                url,
            };
            let error = CurveStoreError::from_status(failure);
            tracing::warn!(
                %method,
                status = response.status,
                code = error.code(),
                "call failed remotely"
            );
            return Err(error);
        }

        if response.body.is_empty() {
            return Ok(T::default());
        }

        // A success without a content type is read as JSON.
        let media_type = response
            .media_type()
            .unwrap_or_else(|| JSON_MEDIA_TYPE.to_owned());

        self.config
            .codecs()
            .for_media_type(&media_type)
            .and_then(|codec| codec.decode(&response.body))
            .map_err(|e| CurveStoreError::client(method, url, e.into()))
    }
}
