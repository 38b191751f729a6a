//! In-memory transport used by the behaviour tests in place of the network.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use curvestore_core::{
    ClientConfig, Credentials, HttpClient, HttpError, HttpRequest, HttpResponse,
    ResilienceConfig, ResilientClient,
};

pub const BASE_URL: &str = "https://curves.test/v1.0";
pub const API_KEY: &str = "test-key";

/// What the fake transport does with one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond(HttpResponse),
    Fail(HttpError),
    /// Answers after a delay.
    Slow(Duration, HttpResponse),
    /// Never completes; only cancellation ends the call.
    Hang,
}

type Handler = Box<dyn Fn(&HttpRequest) -> Reply + Send + Sync>;

/// Replays scripted replies in order, then falls back to the handler.
pub struct ScriptedHttpClient {
    script: Mutex<VecDeque<Reply>>,
    handler: Option<Handler>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn scripted(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(replies.into_iter().collect()),
            handler: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn responding(handler: impl Fn(&HttpRequest) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            handler: Some(Box::new(handler)),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let scripted = self.script.lock().expect("script lock").pop_front();
        let reply = scripted
            .or_else(|| self.handler.as_ref().map(|handler| handler(&request)))
            .unwrap_or_else(|| Reply::Fail(HttpError::non_retryable("script exhausted")));
        self.requests.lock().expect("requests lock").push(request);

        Box::pin(async move {
            match reply {
                Reply::Respond(response) => Ok(response),
                Reply::Fail(error) => Err(error),
                Reply::Slow(delay, response) => {
                    tokio::time::sleep(delay).await;
                    Ok(response)
                }
                Reply::Hang => std::future::pending().await,
            }
        })
    }
}

/// Client with an API key, the given resilience settings and the fake transport.
pub fn client(http: &Arc<ScriptedHttpClient>, resilience: ResilienceConfig) -> ResilientClient {
    let config = ClientConfig::new(BASE_URL, Credentials::ApiKey(String::from(API_KEY)))
        .expect("valid config")
        .with_resilience(resilience);
    ResilientClient::with_http_client(config, http.clone())
}

/// Ids carried by the `id=` parameters of a request url.
pub fn ids_in(request: &HttpRequest) -> Vec<i32> {
    let query = request.url.split_once('?').map(|(_, q)| q).unwrap_or_default();
    query
        .split('&')
        .filter_map(|pair| pair.strip_prefix("id="))
        .map(|id| id.parse().expect("numeric id"))
        .collect()
}
