//! RequestSlot - per-request status, failure reason and payload.

use crate::payload::Payload;
use crate::status::{ErrorStatus, RequestStatus};

/// State of one request. Owned by the pool; callers see it only through handles.
///
/// `payload` is `Some` exactly when `status` is `Success`.
#[derive(Debug, Default)]
pub struct RequestSlot {
    generation: u32,
    in_use: bool,
    status: RequestStatus,
    error_status: ErrorStatus,
    payload: Option<Payload>,
    resource: Option<String>,
}

impl RequestSlot {
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn error_status(&self) -> ErrorStatus {
        self.error_status
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub(crate) fn occupy(&mut self) {
        self.in_use = true;
    }

    pub(crate) fn begin(&mut self, resource: &str) {
        self.status = RequestStatus::InProgress;
        self.error_status = ErrorStatus::None;
        self.payload = None;
        self.resource = Some(resource.to_string());
    }

    /// Record success. Returns the payload back if the slot is not in progress.
    pub(crate) fn succeed(&mut self, payload: Payload) -> Result<(), Payload> {
        if self.status != RequestStatus::InProgress {
            return Err(payload);
        }
        self.status = RequestStatus::Success;
        self.error_status = ErrorStatus::None;
        self.payload = Some(payload);
        Ok(())
    }

    /// Record failure. Returns `false` if the slot is not in progress.
    pub(crate) fn fail(&mut self, error: ErrorStatus) -> bool {
        if self.status != RequestStatus::InProgress {
            return false;
        }
        self.status = RequestStatus::Failure;
        // A failure always carries a reason.
        self.error_status = match error {
            ErrorStatus::None => ErrorStatus::Unknown,
            other => other,
        };
        true
    }

    /// Return to the free state and invalidate outstanding handles.
    pub(crate) fn reset(&mut self) {
        self.in_use = false;
        self.status = RequestStatus::NotStarted;
        self.error_status = ErrorStatus::None;
        self.payload = None;
        self.resource = None;
        self.generation = self.generation.wrapping_add(1);
    }
}
