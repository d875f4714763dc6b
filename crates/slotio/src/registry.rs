//! RequestRegistry: the public face of the request table.
//!
//! One owner drives every call. Backends report outcomes through a channel;
//! each public call drains it first, so an outcome delivered from another
//! thread is visible no later than the next `status` check.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::backend::{Backend, Completion, CompletionSink, Outcome, PendingRequest};
use crate::error::{RegistryError, Result};
use crate::handle::RequestHandle;
use crate::slots::{RequestPool, RequestSlot, SLOT_BATCH};
use crate::status::{ErrorStatus, RequestStatus};

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Slots added whenever the free list is exhausted.
    pub batch_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            batch_size: SLOT_BATCH,
        }
    }
}

pub struct RequestRegistry {
    pool: RequestPool,
    backend: Arc<dyn Backend>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
}

impl RequestRegistry {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::with_config(backend, RegistryConfig::default())
    }

    pub fn with_config(backend: Arc<dyn Backend>, config: RegistryConfig) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            pool: RequestPool::new(config.batch_size),
            backend,
            completion_tx,
            completion_rx,
        }
    }

    /// Start a request for `resource` and return its handle immediately.
    ///
    /// Blocking backends finish before this returns, so the handle may already
    /// be `Success` or `Failure`.
    pub fn submit(&mut self, resource: &str) -> Result<RequestHandle> {
        if resource.is_empty() {
            return Err(RegistryError::EmptyResource);
        }

        let handle = self.pool.acquire();
        self.pool.get_mut(handle)?.begin(resource);

        tracing::debug!(
            handle = %handle,
            resource = %resource,
            backend = self.backend.name(),
            "Request submitted"
        );

        let sink = CompletionSink::new(handle, self.completion_tx.clone());
        self.backend
            .submit(PendingRequest::new(handle, resource.to_string(), sink));
        self.poll();

        Ok(handle)
    }

    pub fn status(&mut self, handle: RequestHandle) -> Result<RequestStatus> {
        self.poll();
        Ok(self.pool.get(handle)?.status())
    }

    /// Failure reason. Callable in any state; `None` unless the status is `Failure`.
    pub fn error_status(&mut self, handle: RequestHandle) -> Result<ErrorStatus> {
        self.poll();
        Ok(self.pool.get(handle)?.error_status())
    }

    /// Payload bytes of a successful request, empty for any other status.
    ///
    /// The borrow ends before the registry can be used again, so the view
    /// cannot outlive a `close` of the handle.
    pub fn data(&mut self, handle: RequestHandle) -> Result<&[u8]> {
        self.poll();
        let slot = self.pool.get(handle)?;
        Ok(slot.payload().map(|p| p.as_bytes()).unwrap_or(&[]))
    }

    /// Full slot state for inspection.
    pub fn slot(&mut self, handle: RequestHandle) -> Result<&RequestSlot> {
        self.poll();
        self.pool.get(handle)
    }

    /// Release the request and its payload, returning the slot to the pool.
    ///
    /// `RequestHandle::NULL` is a no-op. Closing a handle that is no longer
    /// live (including a second close) returns `InvalidHandle`.
    pub fn close(&mut self, handle: RequestHandle) -> Result<()> {
        if handle.is_null() {
            return Ok(());
        }
        self.poll();

        let status = match self.pool.get(handle) {
            Ok(slot) => slot.status(),
            Err(e) => {
                tracing::warn!(handle = %handle, "Close on invalid or already closed handle");
                return Err(e);
            }
        };

        self.backend.cancel(handle);
        self.pool.release(handle)?;

        tracing::debug!(handle = %handle, status = %status, "Request closed");
        Ok(())
    }

    /// Apply every outcome reported so far. Returns how many reached a slot.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completion_rx.try_recv() {
            if self.apply(completion) {
                applied += 1;
            }
        }
        applied
    }

    fn apply(&mut self, completion: Completion) -> bool {
        let Completion { handle, outcome } = completion;

        let Ok(slot) = self.pool.get_mut(handle) else {
            tracing::debug!(handle = %handle, "Discarding outcome for closed request");
            return false;
        };

        match outcome {
            Outcome::Success(payload) => {
                let len = payload.len();
                match slot.succeed(payload) {
                    Ok(()) => {
                        tracing::debug!(handle = %handle, len, "Request succeeded");
                        true
                    }
                    Err(_) => {
                        tracing::warn!(
                            handle = %handle,
                            status = %slot.status(),
                            "Ignoring outcome for request not in progress"
                        );
                        false
                    }
                }
            }
            Outcome::Failure(error) => {
                if slot.fail(error) {
                    tracing::debug!(handle = %handle, error = %slot.error_status(), "Request failed");
                    true
                } else {
                    tracing::warn!(
                        handle = %handle,
                        status = %slot.status(),
                        "Ignoring outcome for request not in progress"
                    );
                    false
                }
            }
        }
    }

    /// Total slots in storage, including the reserved index 0.
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Handles issued and not yet closed.
    pub fn outstanding(&self) -> usize {
        self.pool.outstanding()
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DeferredBackend;

    fn deferred() -> (Arc<DeferredBackend>, RequestRegistry) {
        let backend = Arc::new(DeferredBackend::new());
        let registry = RequestRegistry::new(backend.clone());
        (backend, registry)
    }

    #[test]
    fn submit_starts_in_progress() {
        let (_backend, mut registry) = deferred();
        assert_eq!(registry.backend().name(), "deferred");
        let handle = registry.submit("a.bin").unwrap();

        assert!(!handle.is_null());
        assert_eq!(registry.status(handle).unwrap(), RequestStatus::InProgress);
        assert_eq!(registry.error_status(handle).unwrap(), ErrorStatus::None);
        assert!(registry.data(handle).unwrap().is_empty());
    }

    #[test]
    fn empty_resource_is_rejected() {
        let (_backend, mut registry) = deferred();
        assert_eq!(registry.submit(""), Err(RegistryError::EmptyResource));
        assert_eq!(registry.outstanding(), 0);
    }

    #[test]
    fn success_callback_exposes_payload() {
        let (backend, mut registry) = deferred();
        let handle = registry.submit("a.bin").unwrap();

        assert!(backend.complete_success(handle, b"payload".to_vec()));

        assert_eq!(registry.status(handle).unwrap(), RequestStatus::Success);
        assert_eq!(registry.data(handle).unwrap(), b"payload");
        assert_eq!(registry.slot(handle).unwrap().resource(), Some("a.bin"));
    }

    #[test]
    fn progress_leaves_request_in_progress() {
        let (backend, mut registry) = deferred();
        let handle = registry.submit("a.bin").unwrap();

        assert!(backend.report_progress(handle, 5, Some(10)));
        assert!(backend.report_progress(handle, 10, None));

        assert_eq!(registry.poll(), 0);
        assert_eq!(registry.status(handle).unwrap(), RequestStatus::InProgress);
        assert_eq!(registry.error_status(handle).unwrap(), ErrorStatus::None);
        assert!(registry.data(handle).unwrap().is_empty());
        assert_eq!(backend.pending(), vec![handle]);
    }

    #[test]
    fn error_callback_maps_status_codes() {
        let (backend, mut registry) = deferred();
        let missing = registry.submit("missing").unwrap();
        let broken = registry.submit("broken").unwrap();

        backend.complete_failure(missing, 404);
        backend.complete_failure(broken, 503);

        assert_eq!(registry.status(missing).unwrap(), RequestStatus::Failure);
        assert_eq!(registry.error_status(missing).unwrap(), ErrorStatus::NotFound);
        assert_eq!(registry.error_status(broken).unwrap(), ErrorStatus::Unknown);
        assert!(registry.data(missing).unwrap().is_empty());
    }

    #[test]
    fn close_null_is_noop() {
        let (_backend, mut registry) = deferred();
        assert!(registry.close(RequestHandle::NULL).is_ok());

        let handle = registry.submit("a").unwrap();
        assert!(registry.close(RequestHandle::NULL).is_ok());
        assert_eq!(registry.outstanding(), 1);
        assert_eq!(registry.status(handle).unwrap(), RequestStatus::InProgress);
    }

    #[test]
    fn double_close_is_invalid_handle() {
        let (_backend, mut registry) = deferred();
        let handle = registry.submit("a").unwrap();

        registry.close(handle).unwrap();
        assert_eq!(registry.close(handle), Err(RegistryError::InvalidHandle(handle)));
        assert_eq!(registry.outstanding(), 0);

        let a = registry.submit("b").unwrap();
        let b = registry.submit("c").unwrap();
        assert_ne!(a.index(), b.index());
    }

    #[test]
    fn closed_handle_is_invalid_everywhere() {
        let (_backend, mut registry) = deferred();
        let handle = registry.submit("a").unwrap();
        registry.close(handle).unwrap();

        assert!(registry.status(handle).is_err());
        assert!(registry.error_status(handle).is_err());
        assert!(registry.data(handle).is_err());
    }

    #[test]
    fn close_in_progress_releases_backend_record() {
        let (backend, mut registry) = deferred();
        let handle = registry.submit("slow").unwrap();
        assert_eq!(backend.pending(), vec![handle]);

        registry.close(handle).unwrap();
        assert!(backend.pending().is_empty());
        assert_eq!(registry.poll(), 0);
    }

    #[test]
    fn late_outcome_for_reused_slot_is_discarded() {
        let (backend, mut registry) = deferred();
        let first = registry.submit("first").unwrap();

        // Backend still answers after the host closed the request.
        let tx = registry.completion_tx.clone();
        registry.close(first).unwrap();
        CompletionSink::new(first, tx).succeed(b"stale".to_vec());

        let second = registry.submit("second").unwrap();
        assert_eq!(second.index(), first.index());
        assert_eq!(registry.status(second).unwrap(), RequestStatus::InProgress);
        assert!(registry.data(second).unwrap().is_empty());
        assert_eq!(backend.pending(), vec![second]);
    }

    #[test]
    fn reused_slot_starts_clean() {
        let (backend, mut registry) = deferred();
        let first = registry.submit("first").unwrap();
        backend.complete_success(first, b"old".to_vec());
        assert_eq!(registry.status(first).unwrap(), RequestStatus::Success);
        registry.close(first).unwrap();

        let second = registry.submit("second").unwrap();
        assert_eq!(second.index(), first.index());
        assert_eq!(registry.status(second).unwrap(), RequestStatus::InProgress);
        assert_eq!(registry.error_status(second).unwrap(), ErrorStatus::None);
        assert!(registry.data(second).unwrap().is_empty());
    }

    #[test]
    fn dropped_backend_record_fails_request() {
        struct Forgetful;
        impl Backend for Forgetful {
            fn name(&self) -> &'static str {
                "forgetful"
            }
            fn submit(&self, _request: PendingRequest) {}
            fn cancel(&self, _handle: RequestHandle) {}
        }

        let mut registry = RequestRegistry::new(Arc::new(Forgetful));
        let handle = registry.submit("lost").unwrap();
        assert_eq!(registry.status(handle).unwrap(), RequestStatus::Failure);
        assert_eq!(registry.error_status(handle).unwrap(), ErrorStatus::Unknown);
    }

    #[test]
    fn grows_past_first_batch() {
        let backend = Arc::new(DeferredBackend::new());
        let mut registry =
            RequestRegistry::with_config(backend, RegistryConfig { batch_size: 4 });
        assert_eq!(registry.capacity(), 4);

        let handles: Vec<_> = (0..10).map(|i| registry.submit(&format!("r{i}")).unwrap()).collect();
        assert_eq!(registry.capacity(), 12);
        assert_eq!(registry.outstanding(), 10);

        let mut indices: Vec<_> = handles.iter().map(|h| h.index()).collect();
        indices.sort();
        indices.dedup();
        assert_eq!(indices.len(), 10);
        assert!(!indices.contains(&0));
    }
}
