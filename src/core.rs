//! Runtime-agnostic helpers shared by the HTTP client and the resource clients.
//!
//! - **Retry State**: [`RetryState`] for tracking HTTP retry attempts
//! - **Response shaping**: [`unwrap_data`] for mutation responses

use reqwest::StatusCode;

use crate::errors::RetryMetadata;

/// Tracks retry state across attempts.
#[derive(Default)]
pub(crate) struct RetryState {
    pub(crate) attempts: u32,
    pub(crate) last_status: Option<u16>,
    pub(crate) last_error: Option<String>,
}

impl RetryState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_attempt(&mut self, attempt: u32) {
        self.attempts = attempt;
    }

    pub(crate) fn record_status(&mut self, status: StatusCode) {
        self.last_status = Some(status.as_u16());
    }

    pub(crate) fn record_error(&mut self, err: &reqwest::Error) {
        self.last_error = Some(err.to_string());
    }

    pub(crate) fn metadata(&self) -> Option<RetryMetadata> {
        if self.attempts <= 1 {
            None
        } else {
            Some(RetryMetadata {
                attempts: self.attempts,
                last_status: self.last_status,
                last_error: self.last_error.clone(),
            })
        }
    }
}

/// Mutation endpoints answer `{"data": {...}}`; some answer a bare body.
///
/// Returns the `data` member unless it is missing, null, `false`, zero or `""`; the
/// whole body otherwise.
pub(crate) fn unwrap_data(body: serde_json::Value) -> serde_json::Value {
    match body {
        serde_json::Value::Object(mut map) => match map.remove("data") {
            Some(data) if !is_blank(&data) => data,
            Some(data) => {
                map.insert("data".to_string(), data);
                serde_json::Value::Object(map)
            }
            None => serde_json::Value::Object(map),
        },
        other => other,
    }
}

fn is_blank(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Bool(b) => !b,
        serde_json::Value::Number(n) => n.as_f64() == Some(0.0),
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    }
}
