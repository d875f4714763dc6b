//! Slot storage for in-flight and completed requests.
//!
//! - `RequestPool` owns every `RequestSlot` and the free list
//! - Handles carry a generation so a released slot cannot be addressed again

mod pool;
mod slot;

pub use pool::{RequestPool, SLOT_BATCH};
pub use slot::RequestSlot;
