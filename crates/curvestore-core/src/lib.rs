//! Client core for a remote curve-store service.
//!
//! This crate contains:
//! - The extraction query model (ranges, version selections, fillers, one
//!   request type per curve kind)
//! - Id partitioning into server-sized batches
//! - A resilient HTTP client: codec negotiation, authentication, circuit
//!   breaker, retry and bulkhead, and typed error mapping
//! - A query facade that dispatches batches concurrently and merges results
//!
//! ```text
//! query ─▶ partition ─▶ [batch₁ … batchₙ] ─▶ ResilientClient ─▶ HTTP
//!                              │                  │
//!                              ▼                  ▼
//!                      PartitionOutcome   breaker ▸ retry ▸ bulkhead
//! ```

pub mod auth;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod http_client;
pub mod partition;
pub mod problem;
pub mod query;
pub mod resilience;
pub mod service;

pub use auth::{
    ClientCredentialsTokenProvider, Credentials, OAuthClientConfig, TokenError, TokenProvider,
};
pub use client::ResilientClient;
pub use codec::{
    Codec, CodecError, CodecRegistry, JsonCodec, MsgPackCodec, PayloadKind, WireCodec,
    ZstdMsgPackCodec,
};
pub use config::ClientConfig;
pub use error::{
    ClientFailure, ConfigError, CurveStoreError, ErrorKind, RemoteFailure, ValidationError,
};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};
pub use partition::{partition, partition_with, MAX_IDS_PER_QUERY};
pub use problem::ProblemDetails;
pub use query::{
    ActualQuery, AuctionQuery, BidAskQuery, DerivedQuery, ExtractionQuery, ExtractionRange,
    Filler, Granularity, MasQuery, Period, QueryBase, RelativeInterval, TimeSeriesRow,
    VersionSelection, VersionWindow, VersionedQuery,
};
pub use resilience::{
    Backoff, BulkheadConfig, CircuitBreakerConfig, CircuitState, RateQuota, ResilienceConfig,
    ResiliencePipeline, RetryConfig,
};
pub use service::{merge, PartitionOutcome, QueryService};
