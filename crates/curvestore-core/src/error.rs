use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::codec::CodecError;
use crate::http_client::{HttpError, HttpMethod};

/// Validation errors raised while building or partitioning extraction queries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ids list is present but empty; omit it to query by filter id")]
    EmptyIds,
    #[error("query must target curve ids or a filter id")]
    MissingSelection,
    #[error("time zone cannot be blank")]
    BlankTimeZone,

    #[error("range start '{start}' must be before end '{end}'")]
    InvertedRange { start: String, end: String },
    #[error("invalid ISO-8601 period '{value}'")]
    InvalidPeriod { value: String },
    #[error("invalid granularity '{value}'")]
    InvalidGranularity { value: String },

    #[error("last-N version selection requires n >= 1")]
    ZeroLastN,
    #[error("products list cannot be empty")]
    EmptyProducts,
    #[error("product label at index {index} is blank")]
    BlankProduct { index: usize },

    #[error("partition batch size must be greater than zero")]
    ZeroBatchSize,
}

/// Configuration errors raised while assembling a [`crate::ClientConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable '{name}' is not set")]
    MissingVariable { name: &'static str },
    #[error("base url cannot be empty")]
    EmptyBaseUrl,
    #[error("neither an api key nor client credentials are configured")]
    MissingCredentials,
}

/// Stable classification of [`CurveStoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidQuery,
    Validation,
    Conflict,
    Forbidden,
    Remote,
    Client,
    Cancelled,
}

impl ErrorKind {
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidQuery => "curvestore.invalid_query",
            Self::Validation => "curvestore.validation",
            Self::Conflict => "curvestore.conflict",
            Self::Forbidden => "curvestore.forbidden",
            Self::Remote => "curvestore.remote",
            Self::Client => "curvestore.client",
            Self::Cancelled => "curvestore.cancelled",
        }
    }
}

/// A classified non-success HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    pub method: HttpMethod,
    pub url: String,
    pub status: u16,
    pub detail: String,
}

impl Display for RemoteFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} returned {}: {}",
            self.method, self.url, self.status, self.detail
        )
    }
}

/// Failures raised on the client side before a response could be classified.
#[derive(Debug, Error)]
pub enum ClientFailure {
    #[error("transport failure: {0}")]
    Transport(#[source] HttpError),
    #[error("circuit breaker is open; call was not attempted")]
    CircuitOpen,
    #[error("bulkhead queue is full; call was rejected")]
    BulkheadRejected,
    #[error("codec failure: {0}")]
    Codec(#[from] CodecError),
    #[error("token acquisition failed: {0}")]
    Authentication(String),
    #[error("dispatch task aborted: {0}")]
    Aborted(String),
}

/// Error returned by every network-facing operation.
#[derive(Debug, Error)]
pub enum CurveStoreError {
    #[error(transparent)]
    InvalidQuery(#[from] ValidationError),

    #[error("request rejected as invalid: {0}")]
    Validation(RemoteFailure),

    #[error("optimistic concurrency conflict: {0}")]
    Conflict(RemoteFailure),

    #[error("access forbidden: {0}")]
    Forbidden(RemoteFailure),

    #[error("remote failure: {0}")]
    Remote(RemoteFailure),

    #[error("{method} {url} failed on the client side")]
    Client {
        method: HttpMethod,
        url: String,
        #[source]
        source: ClientFailure,
    },

    #[error("{method} {url} was cancelled")]
    Cancelled { method: HttpMethod, url: String },
}

impl CurveStoreError {
    /// Maps an unsuccessful status to its typed error.
    pub fn from_status(failure: RemoteFailure) -> Self {
        match failure.status {
            400 => Self::Validation(failure),
            409 | 412 => Self::Conflict(failure),
            403 => Self::Forbidden(failure),
            _ => Self::Remote(failure),
        }
    }

    pub(crate) fn client(method: HttpMethod, url: impl Into<String>, source: ClientFailure) -> Self {
        Self::Client {
            method,
            url: url.into(),
            source,
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidQuery(_) => ErrorKind::InvalidQuery,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Remote(_) => ErrorKind::Remote,
            Self::Client { .. } => ErrorKind::Client,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub const fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// The classified response, when the server answered.
    pub fn remote(&self) -> Option<&RemoteFailure> {
        match self {
            Self::Validation(failure)
            | Self::Conflict(failure)
            | Self::Forbidden(failure)
            | Self::Remote(failure) => Some(failure),
            _ => None,
        }
    }
}
