//! Host-driven callback backend.

use dashmap::DashMap;

use super::{Backend, CompletionSink, PendingRequest};
use crate::handle::RequestHandle;
use crate::payload::Payload;
use crate::status::ErrorStatus;

struct Parked {
    resource: String,
    sink: CompletionSink,
}

/// Parks every submission until the host reports its outcome.
///
/// Models an external event facility that delivers success, error and
/// progress callbacks on a later turn of its own loop. The completion
/// methods may be called from any thread.
#[derive(Default)]
pub struct DeferredBackend {
    parked: DashMap<RequestHandle, Parked>,
}

impl DeferredBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Success callback. Returns `false` if `handle` is not parked.
    pub fn complete_success(&self, handle: RequestHandle, payload: impl Into<Payload>) -> bool {
        match self.parked.remove(&handle) {
            Some((_, parked)) => {
                parked.sink.succeed(payload);
                true
            }
            None => false,
        }
    }

    /// Error callback carrying an HTTP-style status code.
    pub fn complete_failure(&self, handle: RequestHandle, http_status: u16) -> bool {
        self.complete_error(handle, ErrorStatus::from_http_status(http_status))
    }

    pub fn complete_error(&self, handle: RequestHandle, error: ErrorStatus) -> bool {
        match self.parked.remove(&handle) {
            Some((_, parked)) => {
                parked.sink.fail(error);
                true
            }
            None => false,
        }
    }

    /// Progress callback. Leaves the request parked.
    pub fn report_progress(&self, handle: RequestHandle, loaded: u64, total: Option<u64>) -> bool {
        match self.parked.get(&handle) {
            Some(parked) => {
                parked.sink.progress(loaded, total);
                true
            }
            None => false,
        }
    }

    /// Parked handles in ascending order.
    pub fn pending(&self) -> Vec<RequestHandle> {
        let mut handles: Vec<_> = self.parked.iter().map(|entry| *entry.key()).collect();
        handles.sort();
        handles
    }

    pub fn resource(&self, handle: RequestHandle) -> Option<String> {
        self.parked.get(&handle).map(|p| p.resource.clone())
    }
}

impl Backend for DeferredBackend {
    fn name(&self) -> &'static str {
        "deferred"
    }

    fn submit(&self, request: PendingRequest) {
        let (handle, resource, sink) = request.into_parts();
        tracing::debug!(handle = %handle, resource = %resource, "Request parked");
        self.parked.insert(handle, Parked { resource, sink });
    }

    fn cancel(&self, handle: RequestHandle) {
        if let Some((_, parked)) = self.parked.remove(&handle) {
            tracing::debug!(handle = %handle, resource = %parked.resource, "Parked request released");
            parked.sink.abandon();
        }
    }
}
