//! Where readings come from: the HTTP sensor endpoint, or anything else that
//! can hand back a JSON array

use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;
use crate::sensors::reading::kind_of;

/// Characters of a rejected body kept for diagnostics
pub const PREVIEW_CHARS: usize = 200;

pub trait SensorSource: Send + Sync + 'static {
    /// One fetch of the full reading array, oldest first
    fn fetch(&self) -> impl Future<Output = Result<Vec<Value>, FetchError>> + Send;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSource {
    /// Client with a whole-request deadline, so a server that never answers
    /// fails the tick instead of stalling the loop
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("aqgrid/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl SensorSource for HttpSource {
    fn fetch(&self) -> impl Future<Output = Result<Vec<Value>, FetchError>> + Send {
        async move {
            let response = self
                .client
                .get(&self.endpoint)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await?;

            parse_body(content_type.as_deref(), &body)
        }
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

/// Check the content type and shape of a response body
pub fn parse_body(content_type: Option<&str>, body: &str) -> Result<Vec<Value>, FetchError> {
    let is_json = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false);
    if !is_json {
        return Err(FetchError::NotJson {
            content_type: content_type.map(str::to_string),
            preview: preview(body),
        });
    }

    let value: Value = serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;
    match value {
        Value::Array(items) => Ok(items),
        other => Err(FetchError::NotArray {
            kind: kind_of(&other),
            preview: preview(body),
        }),
    }
}

fn preview(body: &str) -> String {
    body.chars().take(PREVIEW_CHARS).collect()
}
