//! Buffer Pool Manager Tests
//!
//! Pin/unpin discipline, clock eviction and flush behaviour, observed
//! through an in-memory file that counts every call it receives.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use clockpool::storage::{FileHandle, MemFile, PagedFile};
use clockpool::{BufferPoolManager, Error, PageId};
use proptest::prelude::*;

const FRAMES: usize = 10;

fn create_bpm(pool_size: usize, pages: u32) -> (BufferPoolManager, Arc<MemFile>, FileHandle) {
    let mem = Arc::new(MemFile::with_pages(pages));
    let file = FileHandle::from_arc(Arc::clone(&mem));
    (BufferPoolManager::new(pool_size), mem, file)
}

/// Helper to write a string to page data.
fn copy_string(data: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    data[..bytes.len()].copy_from_slice(bytes);
    data[bytes.len()] = 0; // null terminator
}

/// Helper to read a null-terminated string from page data.
fn read_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).to_string()
}

// ============================================================================
// Pinning
// ============================================================================

#[test]
fn test_fetch_twice_same_frame() {
    let (bpm, mem, file) = create_bpm(FRAMES, 4);

    let a = bpm.fetch_page(&file, PageId::new(3)).unwrap();
    let b = bpm.fetch_page(&file, PageId::new(3)).unwrap();

    assert_eq!(a.frame_id(), b.frame_id());
    assert_eq!(bpm.pin_count(&file, PageId::new(3)), Some(2));
    assert_eq!(mem.counters().reads, 1);
}

#[test]
fn test_unpin_unpinned_page_leaves_state() {
    let (bpm, _mem, file) = create_bpm(FRAMES, 4);
    let page_id = PageId::new(1);

    bpm.fetch_page(&file, page_id).unwrap().release().unwrap();
    let before = bpm.dump();

    let err = bpm.unpin_page(&file, page_id, true).unwrap_err();
    assert!(matches!(err, Error::PageNotPinned { page, .. } if page == page_id));
    assert_eq!(bpm.dump(), before);
    assert_eq!(bpm.pin_count(&file, page_id), Some(0));
}

#[test]
fn test_unpin_not_resident() {
    let (bpm, _mem, file) = create_bpm(FRAMES, 4);
    let err = bpm.unpin_page(&file, PageId::new(0), false).unwrap_err();
    assert!(matches!(err, Error::PageNotResident { .. }));
}

#[test]
fn test_manual_pin_discipline() {
    let (bpm, _mem, file) = create_bpm(2, 4);

    // Hand the pins off and return them by key
    let p0 = bpm.fetch_page(&file, PageId::new(0)).unwrap().keep_pinned();
    let p1 = bpm.fetch_page(&file, PageId::new(1)).unwrap().keep_pinned();
    assert!(matches!(
        bpm.fetch_page(&file, PageId::new(2)),
        Err(Error::PoolExhausted)
    ));

    bpm.unpin_page(&file, p0, false).unwrap();
    bpm.unpin_page(&file, p1, false).unwrap();
    assert!(bpm.fetch_page(&file, PageId::new(2)).is_ok());
}

// ============================================================================
// Exhaustion
// ============================================================================

#[test]
fn test_pool_exhausted_on_fetch_and_allocate() {
    let (bpm, mem, file) = create_bpm(FRAMES, FRAMES as u32 + 1);

    let handles: Vec<_> = (0..FRAMES as u32)
        .map(|p| bpm.fetch_page(&file, PageId::new(p)).unwrap())
        .collect();

    assert!(matches!(
        bpm.fetch_page(&file, PageId::new(FRAMES as u32)),
        Err(Error::PoolExhausted)
    ));
    assert!(matches!(bpm.allocate_page(&file), Err(Error::PoolExhausted)));

    // The failed fetch did no I/O; the failed allocation still reserved a page
    assert_eq!(mem.counters().reads, FRAMES as u64);
    assert_eq!(mem.live_pages(), FRAMES + 2);

    drop(handles);
    assert!(bpm.fetch_page(&file, PageId::new(FRAMES as u32)).is_ok());
}

#[test]
fn test_pinned_frames_are_never_evicted() {
    let (bpm, mem, file) = create_bpm(2, 3);

    let mut a = bpm.fetch_page(&file, PageId::new(0)).unwrap();
    let mut b = bpm.fetch_page(&file, PageId::new(1)).unwrap();
    copy_string(a.write().as_mut_slice(), "page0");
    copy_string(b.write().as_mut_slice(), "page1");

    assert!(matches!(
        bpm.fetch_page(&file, PageId::new(2)),
        Err(Error::PoolExhausted)
    ));

    // Both pages are still in place, untouched and unwritten
    assert_eq!(bpm.pin_count(&file, PageId::new(0)), Some(1));
    assert_eq!(bpm.pin_count(&file, PageId::new(1)), Some(1));
    assert_eq!(read_string(a.read().as_slice()), "page0");
    assert_eq!(read_string(b.read().as_slice()), "page1");
    assert_eq!(mem.counters().writes, 0);
}

// ============================================================================
// Eviction and write-back
// ============================================================================

#[test]
fn test_dirty_eviction_writes_exactly_once() {
    let (bpm, mem, file) = create_bpm(2, 10);
    let target = PageId::new(0);

    {
        let mut handle = bpm.fetch_page(&file, target).unwrap();
        copy_string(handle.write().as_mut_slice(), "dirty data");
    }
    assert_eq!(mem.counters().writes, 0);

    // Cycle clean pages through until the dirty one is chosen
    let mut next = 1;
    while bpm.contains_page(&file, target) {
        drop(bpm.fetch_page(&file, PageId::new(next)).unwrap());
        next += 1;
    }

    assert_eq!(mem.counters().writes, 1);
    assert_eq!(read_string(&mem.stored_bytes(target).unwrap()), "dirty data");

    // Evicting the remaining clean pages writes nothing more
    for p in next..10 {
        drop(bpm.fetch_page(&file, PageId::new(p)).unwrap());
    }
    assert_eq!(mem.counters().writes, 1);
    assert!(bpm.stats().snapshot().evictions >= 8);
}

#[test]
fn test_round_trip_through_eviction() {
    let (bpm, mem, file) = create_bpm(1, 3);

    {
        let mut handle = bpm.fetch_page(&file, PageId::new(1)).unwrap();
        copy_string(handle.write().as_mut_slice(), "fresh");
    }

    drop(bpm.fetch_page(&file, PageId::new(2)).unwrap());
    assert!(!bpm.contains_page(&file, PageId::new(1)));

    let handle = bpm.fetch_page(&file, PageId::new(1)).unwrap();
    assert_eq!(read_string(handle.read().as_slice()), "fresh");
    assert_eq!(mem.counters().reads, 3);
}

#[test]
fn test_eviction_writes_back_to_owning_file() {
    let (bpm, mem_a, file_a) = create_bpm(1, 1);
    let mem_b = Arc::new(MemFile::with_pages(1));
    let file_b = FileHandle::from_arc(Arc::clone(&mem_b));

    {
        let mut handle = bpm.fetch_page(&file_a, PageId::new(0)).unwrap();
        copy_string(handle.write().as_mut_slice(), "from a");
    }

    // Same page number, other file: a miss that evicts file A's page
    let handle = bpm.fetch_page(&file_b, PageId::new(0)).unwrap();
    assert_eq!(read_string(handle.read().as_slice()), "");

    assert_eq!(mem_a.counters().writes, 1);
    assert_eq!(mem_b.counters().writes, 0);
    assert_eq!(read_string(&mem_a.stored_bytes(PageId::new(0)).unwrap()), "from a");
}

#[test]
fn test_failed_write_back_fails_fetch() {
    let (bpm, mem, file) = create_bpm(1, 2);
    bpm.fetch_page(&file, PageId::new(0)).unwrap().mark_dirty();
    mem.fail_writes(true);

    assert!(matches!(bpm.fetch_page(&file, PageId::new(1)), Err(Error::Io(_))));
    // The victim is still cached and dirty
    assert!(bpm.contains_page(&file, PageId::new(0)));
    assert!(bpm.dump().resident().all(|f| f.dirty));

    mem.fail_writes(false);
    assert!(bpm.fetch_page(&file, PageId::new(1)).is_ok());
    assert_eq!(mem.counters().writes, 2);
}

// ============================================================================
// Flush
// ============================================================================

#[test]
fn test_flush_file_stops_at_pinned_page() {
    let (bpm, mem, file) = create_bpm(3, 3);

    let mut frames = HashMap::new();
    for p in 0..3 {
        let mut handle = bpm.fetch_page(&file, PageId::new(p)).unwrap();
        handle.mark_dirty();
        frames.insert(p, handle.frame_id());
    }
    let pinned = bpm.fetch_page(&file, PageId::new(2)).unwrap();
    let pinned_frame = frames[&2];

    let err = bpm.flush_file(&file).unwrap_err();
    assert!(matches!(err, Error::PagePinned { page, .. } if page == PageId::new(2)));

    // Pages in frames before the pinned one were flushed and released,
    // pages after it were never reached
    for p in [0, 1] {
        let page_id = PageId::new(p);
        if frames[&p] < pinned_frame {
            assert!(!bpm.contains_page(&file, page_id));
            assert!(mem.stored_bytes(page_id).is_some());
        } else {
            assert!(bpm.contains_page(&file, page_id));
        }
    }
    let flushed = frames.values().filter(|&&f| f < pinned_frame).count() as u64;
    assert_eq!(mem.counters().writes, flushed);

    drop(pinned);
    bpm.flush_file(&file).unwrap();
    assert_eq!(bpm.resident_count(), 0);
    assert_eq!(mem.counters().writes, 3);
}

#[test]
fn test_flush_file_clean_pages_not_written() {
    let (bpm, mem, file) = create_bpm(FRAMES, 5);
    for p in 0..5 {
        drop(bpm.fetch_page(&file, PageId::new(p)).unwrap());
    }

    bpm.flush_file(&file).unwrap();

    assert_eq!(mem.counters().writes, 0);
    assert_eq!(bpm.resident_count(), 0);
}

// ============================================================================
// Allocation and disposal
// ============================================================================

#[test]
fn test_allocate_and_dispose() {
    let (bpm, mem, file) = create_bpm(FRAMES, 0);

    let (page_id, mut handle) = bpm.allocate_page(&file).unwrap();
    copy_string(handle.write().as_mut_slice(), "Hello, world!");
    drop(handle);

    let handle = bpm.fetch_page(&file, page_id).unwrap();
    assert_eq!(read_string(handle.read().as_slice()), "Hello, world!");
    drop(handle);

    bpm.dispose_page(&file, page_id).unwrap();
    assert!(!bpm.contains_page(&file, page_id));
    assert_eq!(mem.live_pages(), 0);

    let snapshot = bpm.stats().snapshot();
    assert_eq!(snapshot.pages_allocated, 1);
    assert_eq!(snapshot.pages_disposed, 1);
}

#[test]
fn test_dispose_forces_fresh_read() {
    let (bpm, mem, file) = create_bpm(FRAMES, 0);
    let page_id = {
        let (page_id, mut handle) = bpm.allocate_page(&file).unwrap();
        copy_string(handle.write().as_mut_slice(), "stale");
        page_id
    };

    bpm.dispose_page(&file, page_id).unwrap();

    // The file hands the slot out again, zeroed
    assert_eq!(mem.allocate_page().unwrap(), page_id);
    let reads_before = mem.counters().reads;

    let handle = bpm.fetch_page(&file, page_id).unwrap();
    assert_eq!(mem.counters().reads, reads_before + 1);
    assert_eq!(read_string(handle.read().as_slice()), "");
}

#[test]
fn test_stale_handle_keeps_off_refetched_page() {
    let (bpm, mem, file) = create_bpm(2, 3);
    let target = PageId::new(0);

    let stale = bpm.fetch_page(&file, target).unwrap();
    bpm.dispose_page(&file, target).unwrap();
    assert_eq!(mem.allocate_page().unwrap(), target);

    let live = bpm.fetch_page(&file, target).unwrap();
    drop(stale);
    assert_eq!(bpm.pin_count(&file, target), Some(1));

    // The live pin still protects the page from eviction
    for p in 1..3 {
        drop(bpm.fetch_page(&file, PageId::new(p)).unwrap());
    }
    assert!(bpm.contains_page(&file, target));

    drop(live);
    assert_eq!(bpm.pin_count(&file, target), Some(0));
}

#[test]
fn test_stale_handle_cannot_write_reused_frame() {
    let (bpm, mem, file) = create_bpm(1, 2);

    let mut stale = bpm.fetch_page(&file, PageId::new(0)).unwrap();
    bpm.dispose_page(&file, PageId::new(0)).unwrap();
    let other = bpm.fetch_page(&file, PageId::new(1)).unwrap();
    assert_eq!(other.frame_id(), stale.frame_id());

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        stale.write().as_mut_slice()[0] = 0xAA;
    }));
    assert!(result.is_err());
    assert_eq!(other.read().as_slice()[0], 0);

    drop(stale);
    drop(other);
    bpm.flush_file(&file).unwrap();
    assert_eq!(mem.stored_bytes(PageId::new(1)).unwrap()[0], 0);
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_page_pin_easy() {
    let (bpm, _mem, file) = create_bpm(2, 0);

    let (pid0, mut page0) = bpm.allocate_page(&file).unwrap();
    let (pid1, mut page1) = bpm.allocate_page(&file).unwrap();
    copy_string(page0.write().as_mut_slice(), "page0");
    copy_string(page1.write().as_mut_slice(), "page1");

    assert_eq!(bpm.pin_count(&file, pid0), Some(1));
    assert_eq!(bpm.pin_count(&file, pid1), Some(1));

    // All frames pinned - can't bring in a new page
    assert!(bpm.allocate_page(&file).is_err());
    let temp_pid = PageId::new(2);

    page0.release().unwrap();
    page1.release().unwrap();
    assert_eq!(bpm.pin_count(&file, pid0), Some(0));

    // Page 2 was reserved by the failed allocation; it can be fetched now
    // and the next allocation evicts the other page
    drop(bpm.fetch_page(&file, temp_pid).unwrap());
    drop(bpm.allocate_page(&file).unwrap());
    assert!(!bpm.contains_page(&file, pid0));
    assert!(!bpm.contains_page(&file, pid1));

    // Fetch the originals back - contents came back from the file
    let page0 = bpm.fetch_page(&file, pid0).unwrap();
    let page1 = bpm.fetch_page(&file, pid1).unwrap();
    assert_eq!(read_string(page0.read().as_slice()), "page0");
    assert_eq!(read_string(page1.read().as_slice()), "page1");
}

#[test]
fn test_page_pin_medium() {
    let (bpm, _mem, file) = create_bpm(FRAMES, 0);

    let (pid0, mut page0) = bpm.allocate_page(&file).unwrap();
    copy_string(page0.write().as_mut_slice(), "Hello");
    drop(page0);

    // Fill the pool with pinned pages
    let mut pages: Vec<_> = (0..FRAMES)
        .map(|_| bpm.allocate_page(&file).unwrap().1)
        .collect();
    for page in &pages {
        assert_eq!(bpm.pin_count(&file, page.page_id()), Some(1));
    }

    // Once the pool is full no page can come in
    assert!(matches!(bpm.fetch_page(&file, pid0), Err(Error::PoolExhausted)));

    // Release half of them
    for _ in 0..(FRAMES / 2) {
        let page = pages.remove(0);
        let pid = page.page_id();
        drop(page);
        assert_eq!(bpm.pin_count(&file, pid), Some(0));
    }

    // Room for FRAMES / 2 new pages, one of which is the original
    for _ in 0..((FRAMES / 2) - 1) {
        pages.push(bpm.allocate_page(&file).unwrap().1);
    }
    {
        let original = bpm.fetch_page(&file, pid0).unwrap();
        assert_eq!(read_string(original.read().as_slice()), "Hello");
    }

    // Take the last free frame; page 0 can't come back in
    let _last = bpm.allocate_page(&file).unwrap();
    assert!(pages.iter().all(|p| bpm.pin_count(&file, p.page_id()) == Some(1)));
    assert!(!bpm.contains_page(&file, pid0));
    assert!(matches!(bpm.fetch_page(&file, pid0), Err(Error::PoolExhausted)));
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Fetch(u32),
    Unpin(u32, bool),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u32..6).prop_map(Op::Fetch),
        (0u32..6, any::<bool>()).prop_map(|(p, d)| Op::Unpin(p, d)),
    ]
}

proptest! {
    /// Pin counts track a simple model and never go negative.
    #[test]
    fn prop_pin_counts_match_model(ops in prop::collection::vec(op_strategy(), 1..64)) {
        const POOL: usize = 3;
        let (bpm, _mem, file) = create_bpm(POOL, 6);
        let mut pins: HashMap<u32, u32> = HashMap::new();

        for op in ops {
            match op {
                Op::Fetch(p) => {
                    let held = pins.get(&p).copied().unwrap_or(0);
                    let pinned_pages = pins.values().filter(|&&n| n > 0).count();
                    let result = bpm.fetch_page(&file, PageId::new(p)).map(|h| h.keep_pinned());

                    if held == 0 && pinned_pages == POOL {
                        let exhausted = matches!(result, Err(Error::PoolExhausted));
                        prop_assert!(exhausted);
                    } else {
                        prop_assert!(result.is_ok());
                        *pins.entry(p).or_insert(0) += 1;
                    }
                }
                Op::Unpin(p, dirty) => {
                    let held = pins.get(&p).copied().unwrap_or(0);
                    let result = bpm.unpin_page(&file, PageId::new(p), dirty);

                    if held > 0 {
                        prop_assert!(result.is_ok());
                        pins.insert(p, held - 1);
                    } else {
                        let rejected = matches!(
                            result,
                            Err(Error::PageNotPinned { .. }) | Err(Error::PageNotResident { .. })
                        );
                        prop_assert!(rejected);
                    }
                }
            }

            for (&p, &n) in &pins {
                if n > 0 {
                    prop_assert_eq!(bpm.pin_count(&file, PageId::new(p)), Some(n));
                }
            }
            let pinned_frames = bpm.dump().frames.iter().filter(|f| f.pin_count > 0).count();
            prop_assert_eq!(pinned_frames, pins.values().filter(|&&n| n > 0).count());
        }
    }
}
