//! Version information for slotio.

/// slotio version from Cargo.toml
pub const SLOTIO_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!SLOTIO_VERSION.is_empty());
        assert_eq!(SLOTIO_VERSION.split('.').count(), 3);
    }
}
