//! Backends perform the actual I/O for a request.
//!
//! The registry hands each submission to its backend as a `PendingRequest`.
//! The backend reports the outcome through the request's `CompletionSink`,
//! either before `submit` returns (blocking backends) or later from any
//! thread (callback backends). Outcomes queue on a channel and are applied
//! by the registry on its owner thread, so each slot has a single writer.

mod deferred;
mod fetch;
mod fs;

use std::sync::Arc;

use tokio::sync::mpsc;

pub use deferred::DeferredBackend;
pub use fetch::{FetchBackend, FetchConfig};
pub use fs::FsBackend;

use crate::handle::RequestHandle;
use crate::payload::Payload;
use crate::status::ErrorStatus;

/// Capability that fulfils requests for a registry.
pub trait Backend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Begin fulfilling `request`. Must not block on network I/O unless the
    /// backend is documented as synchronous.
    fn submit(&self, request: PendingRequest);

    /// Release whatever the backend tracks for `handle`. Best effort: an
    /// operation already on the wire may still run to completion. Handles the
    /// backend does not track are ignored.
    fn cancel(&self, handle: RequestHandle);
}

#[derive(Debug)]
pub(crate) enum Outcome {
    Success(Payload),
    Failure(ErrorStatus),
}

#[derive(Debug)]
pub(crate) struct Completion {
    pub handle: RequestHandle,
    pub outcome: Outcome,
}

/// Single-use writer for a request's outcome.
///
/// `succeed` and `fail` consume the sink, so a request gets at most one
/// outcome. A sink dropped without an outcome reports `Failure`/`Unknown`.
#[derive(Debug)]
pub struct CompletionSink {
    handle: RequestHandle,
    tx: Option<mpsc::UnboundedSender<Completion>>,
}

impl CompletionSink {
    pub(crate) fn new(handle: RequestHandle, tx: mpsc::UnboundedSender<Completion>) -> Self {
        Self {
            handle,
            tx: Some(tx),
        }
    }

    pub fn handle(&self) -> RequestHandle {
        self.handle
    }

    pub fn succeed(mut self, payload: impl Into<Payload>) {
        self.deliver(Outcome::Success(payload.into()));
    }

    pub fn fail(mut self, error: ErrorStatus) {
        self.deliver(Outcome::Failure(error));
    }

    /// Progress notification. Accepted for every backend; does not change the slot.
    pub fn progress(&self, loaded: u64, total: Option<u64>) {
        tracing::trace!(handle = %self.handle, loaded, total = ?total, "Request progress");
    }

    /// Drop without reporting. For requests the registry already closed.
    pub fn abandon(mut self) {
        self.tx = None;
    }

    fn deliver(&mut self, outcome: Outcome) {
        if let Some(tx) = self.tx.take() {
            let completion = Completion {
                handle: self.handle,
                outcome,
            };
            if tx.send(completion).is_err() {
                tracing::debug!(handle = %self.handle, "Registry gone, dropping completion");
            }
        }
    }
}

impl Drop for CompletionSink {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::warn!(handle = %self.handle, "Completion sink dropped without outcome");
            self.deliver(Outcome::Failure(ErrorStatus::Unknown));
        }
    }
}

/// A submission handed to a backend.
#[derive(Debug)]
pub struct PendingRequest {
    handle: RequestHandle,
    resource: String,
    sink: CompletionSink,
}

impl PendingRequest {
    pub(crate) fn new(handle: RequestHandle, resource: String, sink: CompletionSink) -> Self {
        Self {
            handle,
            resource,
            sink,
        }
    }

    pub fn handle(&self) -> RequestHandle {
        self.handle
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn into_parts(self) -> (RequestHandle, String, CompletionSink) {
        (self.handle, self.resource, self.sink)
    }
}

/// Sends `http://` and `https://` resources to `remote`, everything else to `local`.
pub struct RoutingBackend {
    local: Arc<dyn Backend>,
    remote: Arc<dyn Backend>,
}

impl RoutingBackend {
    pub fn new(local: Arc<dyn Backend>, remote: Arc<dyn Backend>) -> Self {
        Self { local, remote }
    }

    pub fn is_remote(resource: &str) -> bool {
        has_prefix_ignore_case(resource, "http://") || has_prefix_ignore_case(resource, "https://")
    }
}

fn has_prefix_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

impl Backend for RoutingBackend {
    fn name(&self) -> &'static str {
        "routing"
    }

    fn submit(&self, request: PendingRequest) {
        if Self::is_remote(request.resource()) {
            self.remote.submit(request);
        } else {
            self.local.submit(request);
        }
    }

    // Handles are unique across both backends, so forwarding to each is safe.
    fn cancel(&self, handle: RequestHandle) {
        self.local.cancel(handle);
        self.remote.cancel(handle);
    }
}
