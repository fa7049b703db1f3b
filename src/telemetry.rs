use std::{fmt, sync::Arc, time::Duration};

use crate::RetryMetadata;

/// User-provided callbacks for emitting metrics without taking on a tracing dependency.
#[derive(Clone, Default)]
pub struct MetricsCallbacks {
    pub http_request: Option<Arc<dyn Fn(HttpRequestMetrics) + Send + Sync>>,
}

impl fmt::Debug for MetricsCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsCallbacks")
            .field(
                "http_request",
                &self.http_request.as_ref().map(|_| "callback"),
            )
            .finish()
    }
}

/// Request metadata attached to telemetry events.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        if let Some(id) = request_id {
            if !id.trim().is_empty() {
                self.request_id = Some(id);
            }
        }
        self
    }
}

/// HTTP request latency and outcome.
#[derive(Clone, Debug)]
pub struct HttpRequestMetrics {
    pub latency: Duration,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub retries: Option<RetryMetadata>,
    pub context: RequestContext,
}

/// Owns the registered callbacks (if any).
#[derive(Clone, Default)]
pub(crate) struct Telemetry {
    callbacks: MetricsCallbacks,
}

impl Telemetry {
    pub fn new(callbacks: Option<MetricsCallbacks>) -> Self {
        Self {
            callbacks: callbacks.unwrap_or_default(),
        }
    }

    pub fn http_enabled(&self) -> bool {
        self.callbacks.http_request.is_some()
    }

    pub fn record_http(&self, metrics: HttpRequestMetrics) {
        if let Some(cb) = &self.callbacks.http_request {
            cb(metrics);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn http_callback_receives_metrics() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let callbacks = MetricsCallbacks {
            http_request: Some({
                let calls = calls.clone();
                Arc::new(move |metrics: HttpRequestMetrics| {
                    calls.lock().unwrap().push(metrics);
                })
            }),
        };
        let telemetry = Telemetry::new(Some(callbacks));
        assert!(telemetry.http_enabled());

        telemetry.record_http(HttpRequestMetrics {
            latency: Duration::from_millis(12),
            status: Some(200),
            error: None,
            retries: None,
            context: RequestContext::new("GET", "/agents")
                .with_request_id(Some("  ".into())),
        });

        let recorded = calls.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].context.path, "/agents");
        assert!(recorded[0].context.request_id.is_none());
    }

    #[test]
    fn disabled_without_callbacks() {
        let telemetry = Telemetry::new(None);
        assert!(!telemetry.http_enabled());
        assert_eq!(
            format!("{:?}", MetricsCallbacks::default()),
            "MetricsCallbacks { http_request: None }"
        );
    }
}
