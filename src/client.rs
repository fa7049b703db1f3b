use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use reqwest::{
    header::{HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT},
    Method,
};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
#[cfg(feature = "tracing")]
use tracing::Instrument;

use crate::{
    agents::AgentsClient,
    api_token::ApiToken,
    core::{unwrap_data, RetryState},
    device_control::DeviceControlClient,
    errors::{Error, Result, RetryMetadata, TransportError, TransportErrorKind},
    filters::{join_for_query, FilterSpec, NormalizedQuery},
    http::{parse_api_error_parts, request_id_from_headers, HeaderList, RequestOptions, RetryConfig},
    pagination::{BoxFuture, ListResponse, PageMode, PageSource, Paginator, Record},
    tags::TagsClient,
    telemetry::{HttpRequestMetrics, MetricsCallbacks, RequestContext, Telemetry},
    threats::ThreatsClient,
    API_PREFIX, API_TOKEN_ENV, API_URL_ENV, DEFAULT_CLIENT_HEADER, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT, REQUEST_ID_HEADER,
};

pub(crate) const SYSTEM_INFO_PATH: &str = "/system/info";

#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Console base URL, e.g. `https://usea1-partners.sentinelone.net`.
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    /// Overrides the `User-Agent` header.
    pub client_header: Option<String>,
    pub http_client: Option<reqwest::Client>,
    /// Override the connect timeout (defaults to 5s).
    pub connect_timeout: Option<Duration>,
    /// Override the request timeout (defaults to 60s).
    pub timeout: Option<Duration>,
    /// Retry/backoff policy (defaults to 3 attempts, exponential backoff + jitter).
    pub retry: Option<RetryConfig>,
    /// Default extra headers applied to all requests.
    pub default_headers: Option<HeaderList>,
    /// Optional metrics callbacks (HTTP latency and outcome).
    pub metrics: Option<MetricsCallbacks>,
    /// Safety ceiling for "return all" pagination; unbounded when unset.
    pub max_pages: Option<usize>,
}

impl Config {
    /// Reads `SENTINELONE_API_URL` and `SENTINELONE_API_TOKEN`.
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var(API_URL_ENV).ok(),
            api_token: std::env::var(API_TOKEN_ENV).ok(),
            ..Default::default()
        }
    }
}

/// Fluent alternative to filling in [`Config`] by hand.
#[derive(Clone, Debug, Default)]
pub struct ClientBuilder {
    cfg: Config,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.cfg.api_url = Some(api_url.into());
        self
    }

    pub fn api_token(mut self, api_token: impl Into<String>) -> Self {
        self.cfg.api_token = Some(api_token.into());
        self
    }

    pub fn client_header(mut self, value: impl Into<String>) -> Self {
        self.cfg.client_header = Some(value.into());
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.cfg.http_client = Some(client);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.connect_timeout = Some(timeout);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.cfg.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.cfg.retry = Some(retry);
        self
    }

    pub fn default_headers(mut self, headers: HeaderList) -> Self {
        self.cfg.default_headers = Some(headers);
        self
    }

    pub fn metrics(mut self, metrics: MetricsCallbacks) -> Self {
        self.cfg.metrics = Some(metrics);
        self
    }

    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.cfg.max_pages = Some(max_pages);
        self
    }

    pub fn build(self) -> Result<Client> {
        Client::new(self.cfg)
    }
}

#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    base_url: String,
    token: ApiToken,
    client_header: String,
    http: reqwest::Client,
    request_timeout: Duration,
    pub(crate) retry: RetryConfig,
    default_headers: Option<HeaderList>,
    telemetry: Telemetry,
    pub(crate) paginator: Paginator,
}

impl Client {
    pub fn new(cfg: Config) -> Result<Self> {
        let base = cfg
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config("api url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();
        reqwest::Url::parse(&base)
            .map_err(|err| Error::Config(format!("invalid api url: {err}")))?;

        let token = match cfg.api_token.as_deref() {
            Some(raw) if !raw.trim().is_empty() => ApiToken::parse(raw)?,
            _ => return Err(Error::Config("api token is required".to_string())),
        };

        let connect_timeout = cfg.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let request_timeout = cfg.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let retry = cfg.retry.unwrap_or_default();

        let http = match cfg.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .connect_timeout(connect_timeout)
                .build()
                .map_err(|err| TransportError {
                    kind: TransportErrorKind::Connect,
                    message: "failed to build http client".to_string(),
                    source: Some(err),
                    retries: None,
                })?,
        };

        let client_header = cfg
            .client_header
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CLIENT_HEADER.to_string());

        let paginator = match cfg.max_pages {
            Some(max) => Paginator::new().with_max_pages(max),
            None => Paginator::new(),
        };

        Ok(Self {
            inner: Arc::new(ClientInner {
                base_url: base,
                token,
                client_header,
                http,
                request_timeout,
                retry,
                default_headers: cfg.default_headers,
                telemetry: Telemetry::new(cfg.metrics),
                paginator,
            }),
        })
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Builds a client from `SENTINELONE_API_URL` / `SENTINELONE_API_TOKEN`.
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env())
    }

    pub fn agents(&self) -> AgentsClient {
        AgentsClient {
            inner: self.inner.clone(),
        }
    }

    pub fn threats(&self) -> ThreatsClient {
        ThreatsClient {
            inner: self.inner.clone(),
        }
    }

    pub fn device_control(&self) -> DeviceControlClient {
        DeviceControlClient {
            inner: self.inner.clone(),
        }
    }

    pub fn tags(&self) -> TagsClient {
        TagsClient {
            inner: self.inner.clone(),
        }
    }

    /// Console system info; doubles as a credential check.
    pub async fn system_info(&self) -> Result<Record> {
        self.inner
            .send_json(Method::GET, SYSTEM_INFO_PATH, None, None, RequestOptions::default())
            .await
    }

    /// Returns `Ok(())` when the token is accepted by the console.
    pub async fn verify_credentials(&self) -> Result<()> {
        self.system_info().await.map(|_| ())
    }

    /// Issues a raw request against a path under the API prefix.
    ///
    /// The body is returned as received; an empty body becomes `{}`.
    pub async fn request_json(
        &self,
        method: Method,
        path: &str,
        query: Option<&NormalizedQuery>,
        body: Option<&serde_json::Value>,
        options: RequestOptions,
    ) -> Result<serde_json::Value> {
        self.inner.send_json(method, path, query, body, options).await
    }

    /// Fetches a list endpoint with the client's pagination settings.
    pub async fn list(
        &self,
        path: &str,
        filters: &FilterSpec,
        mode: PageMode,
    ) -> Result<Vec<Record>> {
        self.inner.list(path, filters, mode).await
    }
}

impl PageSource for Client {
    fn fetch_page<'a>(
        &'a self,
        endpoint: &'a str,
        query: &'a NormalizedQuery,
    ) -> BoxFuture<'a, Result<ListResponse>> {
        self.inner.fetch_page(endpoint, query)
    }
}

impl PageSource for ClientInner {
    fn fetch_page<'a>(
        &'a self,
        endpoint: &'a str,
        query: &'a NormalizedQuery,
    ) -> BoxFuture<'a, Result<ListResponse>> {
        Box::pin(async move {
            let builder = self.request(Method::GET, endpoint)?.query(&query.to_pairs());
            let builder = self.with_headers(builder, None, &HeaderList::default())?;
            let builder = self.with_timeout(builder, None);
            let ctx = RequestContext::new(Method::GET.as_str(), endpoint);
            self.execute_json(builder, Method::GET, None, ctx).await
        })
    }
}

fn apply_header_list(
    mut builder: reqwest::RequestBuilder,
    headers: &HeaderList,
) -> Result<reqwest::RequestBuilder> {
    for entry in headers.iter() {
        if !entry.is_valid() {
            continue;
        }
        let name = HeaderName::from_bytes(entry.key.trim().as_bytes())
            .map_err(|err| Error::Config(format!("invalid header name: {err}")))?;
        let val = HeaderValue::from_str(entry.value.trim())
            .map_err(|err| Error::Config(format!("invalid header value: {err}")))?;
        builder = builder.header(name, val);
    }
    Ok(builder)
}

impl ClientInner {
    pub(crate) async fn list(
        &self,
        path: &str,
        filters: &FilterSpec,
        mode: PageMode,
    ) -> Result<Vec<Record>> {
        let query = join_for_query(filters);
        self.paginator.fetch_all(self, path, query, mode).await
    }

    /// Sends a request and unwraps the `data` member of the response.
    pub(crate) async fn mutate(
        &self,
        method: Method,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<Record> {
        let value = self
            .send_json(method, path, None, Some(body), RequestOptions::default())
            .await?;
        Ok(unwrap_data(value))
    }

    pub(crate) async fn send_json(
        &self,
        method: Method,
        path: &str,
        query: Option<&NormalizedQuery>,
        body: Option<&serde_json::Value>,
        options: RequestOptions,
    ) -> Result<serde_json::Value> {
        let mut builder = self.request(method.clone(), path)?;
        if let Some(query) = query {
            builder = builder.query(&query.to_pairs());
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder = self.with_headers(builder, options.request_id.as_deref(), &options.headers)?;
        builder = self.with_timeout(builder, options.timeout);
        let ctx = RequestContext::new(method.as_str(), path)
            .with_request_id(options.request_id.clone());
        let retry = options.retry.unwrap_or_else(|| self.retry.clone());
        let resp = self.send_with_retry(builder, method, retry, ctx).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| self.to_transport_error(err, None))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        serde_json::from_slice(&bytes).map_err(Error::Serialization)
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let url = reqwest::Url::parse(&format!("{}{}{}", self.base_url, API_PREFIX, path))
            .map_err(|err| Error::Config(format!("invalid path: {err}")))?;
        Ok(self.http.request(method, url))
    }

    fn with_headers(
        &self,
        mut builder: reqwest::RequestBuilder,
        request_id: Option<&str>,
        headers: &HeaderList,
    ) -> Result<reqwest::RequestBuilder> {
        builder = builder
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, self.client_header.as_str())
            .header(AUTHORIZATION, self.token.header_value());
        if let Some(req_id) = request_id {
            if !req_id.trim().is_empty() {
                builder = builder.header(REQUEST_ID_HEADER, req_id);
            }
        }
        if let Some(defaults) = &self.default_headers {
            builder = apply_header_list(builder, defaults)?;
        }
        apply_header_list(builder, headers)
    }

    fn with_timeout(
        &self,
        builder: reqwest::RequestBuilder,
        timeout: Option<Duration>,
    ) -> reqwest::RequestBuilder {
        builder.timeout(timeout.unwrap_or(self.request_timeout))
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        method: Method,
        retry: Option<RetryConfig>,
        ctx: RequestContext,
    ) -> Result<T> {
        let retry_cfg = retry.unwrap_or_else(|| self.retry.clone());
        let resp = self
            .send_with_retry(builder, method, retry_cfg, ctx)
            .await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| self.to_transport_error(err, None))?;
        serde_json::from_slice::<T>(&bytes).map_err(Error::Serialization)
    }

    async fn send_with_retry(
        &self,
        builder: reqwest::RequestBuilder,
        method: Method,
        retry: RetryConfig,
        ctx: RequestContext,
    ) -> Result<reqwest::Response> {
        let max_attempts = retry.max_attempts.max(1);
        let mut state = RetryState::new();
        let start = Instant::now();

        for attempt in 1..=max_attempts {
            let attempt_builder = builder
                .try_clone()
                .ok_or_else(|| Error::Config("request body is not cloneable for retry".into()))?;
            #[cfg(feature = "tracing")]
            let span = tracing::debug_span!(
                "sentinelone.http",
                method = %ctx.method,
                path = %ctx.path,
                attempt,
                max_attempts
            );
            // Entered span guards are !Send and page futures must be Send.
            #[cfg(feature = "tracing")]
            let result = attempt_builder.send().instrument(span.clone()).await;
            #[cfg(not(feature = "tracing"))]
            let result = attempt_builder.send().await;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        if self.telemetry.http_enabled() {
                            let mut http_ctx = ctx.clone();
                            if http_ctx.request_id.is_none() {
                                http_ctx.request_id = request_id_from_headers(resp.headers());
                            }
                            self.telemetry.record_http(HttpRequestMetrics {
                                latency: start.elapsed(),
                                status: Some(status.as_u16()),
                                error: None,
                                retries: state.metadata(),
                                context: http_ctx,
                            });
                        }
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            parent: &span,
                            status = %status,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "request completed"
                        );
                        return Ok(resp);
                    }
                    state.record_attempt(attempt);
                    state.record_status(status);

                    if retry.should_retry_status(&method, status) && attempt < max_attempts {
                        sleep(retry.backoff_delay(attempt)).await;
                        continue;
                    }

                    let retries = state.metadata();
                    let headers = resp.headers().clone();
                    if self.telemetry.http_enabled() {
                        let mut http_ctx = ctx.clone();
                        if http_ctx.request_id.is_none() {
                            http_ctx.request_id = request_id_from_headers(&headers);
                        }
                        self.telemetry.record_http(HttpRequestMetrics {
                            latency: start.elapsed(),
                            status: Some(status.as_u16()),
                            error: Some(format!("http {}", status.as_u16())),
                            retries: retries.clone(),
                            context: http_ctx,
                        });
                    }
                    #[cfg(feature = "tracing")]
                    tracing::warn!(parent: &span, status = %status, "request failed; returning error");
                    let body = resp.text().await.unwrap_or_default();
                    return Err(parse_api_error_parts(status, &headers, body, retries));
                }
                Err(err) => {
                    state.record_attempt(attempt);
                    state.record_error(&err);
                    if retry.should_retry_error(&method, &err) && attempt < max_attempts {
                        sleep(retry.backoff_delay(attempt)).await;
                        continue;
                    }

                    let retries = state.metadata();
                    if self.telemetry.http_enabled() {
                        self.telemetry.record_http(HttpRequestMetrics {
                            latency: start.elapsed(),
                            status: None,
                            error: Some(err.to_string()),
                            retries: retries.clone(),
                            context: ctx.clone(),
                        });
                    }
                    #[cfg(feature = "tracing")]
                    tracing::warn!(parent: &span, error = %err, "transport error");
                    return Err(self.to_transport_error(err, retries));
                }
            }
        }

        Err(Error::Transport(TransportError {
            kind: TransportErrorKind::Other,
            message: "request failed".to_string(),
            source: None,
            retries: state.metadata(),
        }))
    }

    fn to_transport_error(&self, err: reqwest::Error, retries: Option<RetryMetadata>) -> Error {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_request() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };

        TransportError {
            kind,
            message: err.to_string(),
            source: Some(err),
            retries,
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_api_url_and_token() {
        let err = Client::new(Config {
            api_token: Some("tok".into()),
            ..Default::default()
        })
        .err()
        .expect("missing url should fail");
        assert!(matches!(err, Error::Config(msg) if msg.contains("api url")));

        let err = Client::new(Config {
            api_url: Some("https://console.example.net".into()),
            api_token: Some("  ".into()),
            ..Default::default()
        })
        .err()
        .expect("blank token should fail");
        assert!(matches!(err, Error::Config(msg) if msg.contains("api token")));
    }

    #[test]
    fn rejects_invalid_url() {
        let err = ClientBuilder::new()
            .api_url("not a url")
            .api_token("tok")
            .build()
            .err()
            .expect("invalid url should fail");
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn builder_sets_page_ceiling_and_trims_url() {
        let client = Client::builder()
            .api_url("https://console.example.net/")
            .api_token("ApiToken tok")
            .max_pages(5)
            .build()
            .expect("client");
        assert_eq!(client.inner.base_url, "https://console.example.net");
        assert_eq!(client.inner.paginator.max_pages(), Some(5));
        assert_eq!(client.inner.token.as_str(), "tok");
        assert_eq!(client.inner.client_header, DEFAULT_CLIENT_HEADER);
    }
}
