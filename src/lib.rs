//! Async Rust SDK for the SentinelOne management API (v2.1).
#![cfg_attr(docsrs, feature(doc_cfg))]
// Allow large error types - refactoring to Box<Error> would be a breaking change
#![allow(clippy::result_large_err)]

/// Path prefix of every endpoint, appended to the console URL.
pub const API_PREFIX: &str = "/web/api/v2.1";

/// Default User-Agent header value.
pub(crate) const DEFAULT_CLIENT_HEADER: &str =
    concat!("sentinelone-rust/", env!("CARGO_PKG_VERSION"));

/// Default connection timeout (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Default request timeout (60 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

/// HTTP header name for request ID tracing.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Largest page the list endpoints accept; "return all" always uses it.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Page size used when the caller asks for a limited page without naming one.
pub const DEFAULT_LIMIT: u32 = 50;

pub(crate) const API_URL_ENV: &str = "SENTINELONE_API_URL";
pub(crate) const API_TOKEN_ENV: &str = "SENTINELONE_API_TOKEN";

mod agents;
mod api_token;
mod client;
mod core;
mod device_control;
mod errors;
pub mod filters;
mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod operations;
pub mod pagination;
mod parameters;
mod tags;
mod telemetry;
pub mod testing;
mod threats;

pub use agents::{AgentAction, AgentsClient};
pub use api_token::ApiToken;
pub use client::{Client, ClientBuilder, Config};
pub use device_control::{
    DeviceClass, DeviceControlClient, DeviceInterface, RuleAction, RuleDefinition, RuleMatch,
    RuleScope, RuleStatus, RuleUpdate,
};
pub use errors::{
    APIError, Error, ErrorDetail, Result, RetryMetadata, TransportError, TransportErrorKind,
    ValidationError,
};
pub use filters::{
    join_for_query, split_for_body, split_ids, BodyFilter, FilterSpec, FilterValue,
    NormalizedQuery, QueryValue, Target,
};
pub use http::{HeaderEntry, HeaderList, RequestOptions, RetryConfig};
#[cfg(feature = "mock")]
pub use mock::{MockPageSource, RecordedCall};
pub use operations::{
    AgentOperation, BatchPolicy, DeviceControlOperation, Operation, Resource, TagOperation,
    ThreatOperation,
};
pub use pagination::{
    fetch_all, ListResponse, PageMode, PageSource, Pagination, Paginator, Record,
};
pub use tags::{Tag, TagAction, TagsClient};
pub use telemetry::{HttpRequestMetrics, MetricsCallbacks, RequestContext};
pub use threats::{MitigationAction, ThreatsClient};
