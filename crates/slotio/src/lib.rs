//! slotio: handle registry for in-flight asynchronous I/O requests.

mod error;
mod handle;
mod payload;
mod registry;
mod status;
mod version;

pub mod backend;
pub mod slots;

pub use backend::{
    Backend, CompletionSink, DeferredBackend, FetchBackend, FetchConfig, FsBackend,
    PendingRequest, RoutingBackend,
};
pub use error::{RegistryError, Result};
pub use handle::RequestHandle;
pub use payload::{FetchRecord, Payload};
pub use registry::{RegistryConfig, RequestRegistry};
pub use slots::{RequestPool, RequestSlot, SLOT_BATCH};
pub use status::{ErrorStatus, RequestStatus};
pub use version::SLOTIO_VERSION;
