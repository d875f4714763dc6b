//! Request handles.

use serde::{Deserialize, Serialize};

/// Opaque identity of a request slot.
///
/// A handle pairs a slot index with the generation the slot had when the
/// handle was issued. Releasing a slot bumps its generation, so every handle
/// issued before the release goes stale and is rejected instead of silently
/// addressing whatever request reuses the slot next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestHandle {
    index: u32,
    generation: u32,
}

impl RequestHandle {
    /// The reserved "no request" handle. Never issued by a pool.
    pub const NULL: RequestHandle = RequestHandle {
        index: 0,
        generation: 0,
    };

    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_null(&self) -> bool {
        self.index == 0
    }

    /// Pack into a single integer: index in the upper 32 bits, generation in the lower.
    pub fn to_raw(self) -> u64 {
        (u64::from(self.index) << 32) | u64::from(self.generation)
    }

    pub fn from_raw(raw: u64) -> Self {
        Self {
            index: (raw >> 32) as u32,
            generation: raw as u32,
        }
    }
}

impl Default for RequestHandle {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.index, self.generation)
    }
}
