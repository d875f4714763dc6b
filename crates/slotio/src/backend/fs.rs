//! Blocking filesystem backend.

use std::path::{Path, PathBuf};

use super::{Backend, PendingRequest};
use crate::handle::RequestHandle;
use crate::payload::Payload;
use crate::status::ErrorStatus;

/// Reads the whole file before `submit` returns.
///
/// The request is already `Success` or `Failure` when the registry hands the
/// handle back. A missing file maps to `NotFound`; every other I/O error
/// maps to `Unknown`.
#[derive(Debug, Clone, Default)]
pub struct FsBackend {
    root: Option<PathBuf>,
}

impl FsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative resources against `root`. Absolute paths are used as-is.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn resolve(&self, resource: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(resource),
            None => PathBuf::from(resource),
        }
    }
}

impl Backend for FsBackend {
    fn name(&self) -> &'static str {
        "fs"
    }

    fn submit(&self, request: PendingRequest) {
        let (handle, resource, sink) = request.into_parts();
        let path = self.resolve(&resource);

        match std::fs::read(&path) {
            Ok(buf) => {
                tracing::debug!(
                    handle = %handle,
                    path = %path.display(),
                    len = buf.len(),
                    "File read"
                );
                sink.succeed(Payload::Owned(buf));
            }
            Err(e) => {
                let error = ErrorStatus::from_io_error(&e);
                tracing::debug!(
                    handle = %handle,
                    path = %path.display(),
                    error = %e,
                    status = %error,
                    "File read failed"
                );
                sink.fail(error);
            }
        }
    }

    fn cancel(&self, _handle: RequestHandle) {}
}
