use std::collections::HashSet;
use std::sync::Arc;

use slotio::{ErrorStatus, FsBackend, RequestHandle, RequestRegistry, RequestStatus, SLOT_BATCH};

fn fixture() -> (tempfile::TempDir, RequestRegistry) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), b"hello, slots").unwrap();
    std::fs::write(dir.path().join("empty.bin"), b"").unwrap();
    let registry = RequestRegistry::new(Arc::new(FsBackend::with_root(dir.path())));
    (dir, registry)
}

#[test]
fn existing_file_completes_inline() {
    let (_dir, mut registry) = fixture();
    let handle = registry.submit("hello.txt").unwrap();

    assert_eq!(registry.status(handle).unwrap(), RequestStatus::Success);
    assert_eq!(registry.error_status(handle).unwrap(), ErrorStatus::None);

    let data = registry.data(handle).unwrap();
    assert_eq!(data, b"hello, slots");
    assert_eq!(data.len(), 12);

    registry.close(handle).unwrap();
}

#[test]
fn missing_file_is_not_found() {
    let (_dir, mut registry) = fixture();
    let handle = registry.submit("nope.txt").unwrap();

    assert_eq!(registry.status(handle).unwrap(), RequestStatus::Failure);
    assert_eq!(registry.error_status(handle).unwrap(), ErrorStatus::NotFound);
    assert!(registry.data(handle).unwrap().is_empty());

    // Failed requests still hold their slot until closed.
    assert_eq!(registry.outstanding(), 1);
    registry.close(handle).unwrap();
    assert_eq!(registry.outstanding(), 0);
}

#[test]
fn empty_file_succeeds_with_empty_payload() {
    let (_dir, mut registry) = fixture();
    let handle = registry.submit("empty.bin").unwrap();

    assert_eq!(registry.status(handle).unwrap(), RequestStatus::Success);
    assert!(registry.data(handle).unwrap().is_empty());
    assert!(registry.slot(handle).unwrap().payload().is_some());
}

#[test]
fn more_requests_than_one_batch() {
    let (_dir, mut registry) = fixture();
    let handles: Vec<RequestHandle> = (0..SLOT_BATCH + 1)
        .map(|_| registry.submit("hello.txt").unwrap())
        .collect();

    let unique: HashSet<_> = handles.iter().copied().collect();
    assert_eq!(unique.len(), SLOT_BATCH + 1);
    assert!(handles.iter().all(|h| !h.is_null()));
    assert!(registry.capacity() > SLOT_BATCH);

    for handle in &handles {
        assert_eq!(registry.data(*handle).unwrap(), b"hello, slots");
    }
    for handle in handles {
        registry.close(handle).unwrap();
    }
    assert_eq!(registry.outstanding(), 0);
}

#[test]
fn reuse_after_close_does_not_leak_state() {
    let (_dir, mut registry) = fixture();
    let first = registry.submit("hello.txt").unwrap();
    registry.close(first).unwrap();

    let second = registry.submit("nope.txt").unwrap();
    assert_eq!(second.index(), first.index());
    assert_ne!(second, first);
    assert_eq!(registry.status(second).unwrap(), RequestStatus::Failure);
    assert!(registry.data(second).unwrap().is_empty());
    assert!(registry.status(first).is_err());
}

#[test]
fn close_null_on_busy_pool() {
    let (_dir, mut registry) = fixture();
    let handle = registry.submit("hello.txt").unwrap();

    registry.close(RequestHandle::NULL).unwrap();
    registry.close(RequestHandle::from_raw(0)).unwrap();

    assert_eq!(registry.data(handle).unwrap(), b"hello, slots");
}
