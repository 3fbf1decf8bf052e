/*!
 * Temporary Allocator Tests
 * Page chains, overflow sizing, and capacity convergence
 */

use corealloc::{allocate_in, free_all, AllocationRequest, FreeAllOutcome, TemporaryAllocator};
use pretty_assertions::assert_eq;

const KIB: usize = 1024;

#[test]
fn test_oversized_request_never_straddles_pages() {
    let temp = TemporaryAllocator::new();
    temp.get(16).unwrap();
    assert_eq!(temp.stats().base_reserved, 8 * KIB);

    // 10 KiB cannot fit the 8 KiB base page: exactly one overflow page
    // appears, big enough for the whole request.
    let big = temp.get(10 * KIB).unwrap();
    let stats = temp.stats();

    assert_eq!(stats.overflow_pages, 1);
    let page_capacity = stats.total_reserved - stats.base_reserved;
    assert!(page_capacity >= 10 * KIB);
    assert_eq!(page_capacity % (8 * KIB), 0);

    // Writable over the full request, in one contiguous span.
    unsafe { std::ptr::write_bytes(big.as_ptr(), 0x42, 10 * KIB) };
}

#[test]
fn test_free_all_merges_page_capacities() {
    let temp = TemporaryAllocator::new();
    temp.get(16).unwrap();
    temp.get(10 * KIB).unwrap();

    let before = temp.stats();
    temp.reset().unwrap();
    let after = temp.stats();

    assert_eq!(after.overflow_pages, 0);
    assert_eq!(after.total_used, 0);
    assert!(after.base_reserved >= before.total_reserved);
}

#[test]
fn test_workload_converges_to_zero_overflow_pages() {
    let temp = TemporaryAllocator::new();

    let frame = |temp: &TemporaryAllocator| {
        for _ in 0..16 {
            temp.get(KIB).unwrap();
        }
    };

    frame(&temp);
    let first_cycle_pages = temp.stats().overflow_pages;
    assert!(first_cycle_pages > 0);

    temp.reset().unwrap();
    frame(&temp);
    assert_eq!(temp.stats().overflow_pages, 0);
}

#[test]
fn test_front_end_cycle_over_temporary() {
    let temp = TemporaryAllocator::new();

    // Per-frame pattern: allocate through the front end, recycle with
    // free_all, repeat.
    for _ in 0..3 {
        for _ in 0..8 {
            let ptr = allocate_in(&temp, AllocationRequest::new(200)).unwrap();
            unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0x11, 200) };
        }
        assert_eq!(free_all(&temp), FreeAllOutcome::Done);
        assert_eq!(temp.stats().total_used, 0);
    }
}
