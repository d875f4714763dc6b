//! Asynchronous HTTP fetch backend.
//!
//! - One tokio task per request; `submit` never blocks
//! - Body streamed chunk by chunk with progress notifications
//! - 2xx stored as a `FetchRecord`, 404 as `NotFound`, anything else `Unknown`
//! - `cancel` fires the request's CancellationToken (best effort)

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::{Backend, CompletionSink, PendingRequest, RoutingBackend};
use crate::error::{RegistryError, Result};
use crate::handle::RequestHandle;
use crate::payload::FetchRecord;
use crate::status::ErrorStatus;
use crate::version::SLOTIO_VERSION;

/// Upper bound on the buffer reserved up front from `Content-Length`.
const MAX_PREALLOC: u64 = 8 * 1024 * 1024;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Parse a timeout in seconds. Non-finite and non-positive values fall back to the default.
fn parse_timeout(value: Option<&str>) -> Duration {
    value
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s > 0.0)
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
        .filter(|d| !d.is_zero())
        .unwrap_or(DEFAULT_TIMEOUT)
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
    /// Prefix for resources that are not absolute URLs.
    pub base_url: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: parse_timeout(std::env::var("SLOTIO_FETCH_TIMEOUT").ok().as_deref()),
            user_agent: format!("slotio/{}", SLOTIO_VERSION),
            base_url: None,
        }
    }
}

pub struct FetchBackend {
    client: reqwest::Client,
    runtime: Handle,
    config: FetchConfig,
    in_flight: Arc<DashMap<RequestHandle, CancellationToken>>,
}

impl FetchBackend {
    /// Build on the current tokio runtime.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| RegistryError::Runtime(e.to_string()))?;
        Self::with_runtime(config, runtime)
    }

    pub fn with_runtime(config: FetchConfig, runtime: Handle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| RegistryError::Client(e.to_string()))?;

        Ok(Self {
            client,
            runtime,
            config,
            in_flight: Arc::new(DashMap::new()),
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Requests spawned and not yet finished or cancelled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn resolve(&self, resource: &str) -> String {
        match &self.config.base_url {
            Some(base) if !RoutingBackend::is_remote(resource) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                resource.trim_start_matches('/')
            ),
            _ => resource.to_string(),
        }
    }
}

impl Backend for FetchBackend {
    fn name(&self) -> &'static str {
        "fetch"
    }

    fn submit(&self, request: PendingRequest) {
        let (handle, resource, sink) = request.into_parts();
        let url = self.resolve(&resource);
        let token = CancellationToken::new();
        self.in_flight.insert(handle, token.clone());

        let client = self.client.clone();
        let in_flight = Arc::clone(&self.in_flight);

        tracing::debug!(handle = %handle, url = %url, "Fetch started");

        self.runtime.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = fetch(&client, &url, &sink) => Some(result),
            };
            in_flight.remove(&handle);

            match outcome {
                None => {
                    tracing::debug!(handle = %handle, url = %url, "Fetch cancelled");
                    sink.abandon();
                }
                Some(Ok(record)) => sink.succeed(record),
                Some(Err(error)) => sink.fail(error),
            }
        });
    }

    fn cancel(&self, handle: RequestHandle) {
        if let Some((_, token)) = self.in_flight.remove(&handle) {
            token.cancel();
        }
    }
}

async fn fetch(
    client: &reqwest::Client,
    url: &str,
    sink: &CompletionSink,
) -> std::result::Result<FetchRecord, ErrorStatus> {
    let mut response = client.get(url).send().await.map_err(|e| {
        tracing::warn!(url = %url, error = %e, "Fetch request failed");
        ErrorStatus::Unknown
    })?;

    let status = response.status().as_u16();
    if !response.status().is_success() {
        let error = ErrorStatus::from_http_status(status);
        tracing::debug!(url = %url, status, error = %error, "Fetch returned error status");
        return Err(error);
    }

    let total = response.content_length();
    let mut body = BytesMut::with_capacity(total.unwrap_or(0).min(MAX_PREALLOC) as usize);
    let mut loaded = 0u64;

    loop {
        let chunk = response.chunk().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, loaded, "Fetch body failed");
            ErrorStatus::Unknown
        })?;
        let Some(chunk) = chunk else {
            break;
        };
        loaded += chunk.len() as u64;
        body.extend_from_slice(&chunk);
        sink.progress(loaded, total);
    }

    tracing::debug!(url = %url, status, len = loaded, "Fetch completed");
    Ok(FetchRecord::new(url, status, body.freeze()))
}
