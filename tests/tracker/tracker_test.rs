/*!
 * Debug Tracker Tests
 * Live-allocation accounting, leak reporting, and corruption detection
 */

use corealloc::tracker;
use corealloc::{
    allocate, allocate_in, free, free_all, general, AllocOptions, AllocationRequest,
    PoolAllocator,
};
use serial_test::serial;

#[test]
#[serial]
fn test_live_count_tracks_allocate_and_free() {
    let baseline = tracker::global().live_count();

    let ptrs: Vec<_> = (0..10).map(|_| allocate(32).unwrap()).collect();
    assert_eq!(tracker::global().live_count(), baseline + 10);

    for ptr in ptrs.iter().take(4) {
        unsafe { free(ptr.as_ptr()) };
    }
    assert_eq!(tracker::global().live_count(), baseline + 6);

    for ptr in ptrs.iter().skip(4) {
        unsafe { free(ptr.as_ptr()) };
    }
    assert_eq!(tracker::global().live_count(), baseline);
}

#[test]
#[serial]
fn test_reallocation_never_changes_live_count() {
    let baseline = tracker::global().live_count();

    let ptr = allocate(64).unwrap();
    let moved = unsafe { corealloc::reallocate(ptr, 4096).unwrap() };
    assert_eq!(tracker::global().live_count(), baseline + 1);

    unsafe { free(moved.as_ptr()) };
    assert_eq!(tracker::global().live_count(), baseline);
}

#[test]
#[serial]
fn test_free_all_detaches_pool_allocations() {
    let baseline = tracker::global().live_count();

    let pool = PoolAllocator::new();
    for _ in 0..5 {
        allocate_in(&pool, AllocationRequest::new(64)).unwrap();
    }
    assert_eq!(tracker::global().live_count(), baseline + 5);

    free_all(&pool);
    assert_eq!(tracker::global().live_count(), baseline);
}

#[test]
#[serial]
fn test_leak_report_skips_exempt_allocations() {
    let baseline = corealloc::report_leaks();

    let leaked = allocate(128).unwrap();
    let exempt = allocate_in(
        general(),
        AllocationRequest::new(128)
            .with_options(AllocOptions::default().with_mark_leaked(true)),
    )
    .unwrap();

    // Only the unmarked allocation shows up.
    assert_eq!(corealloc::report_leaks(), baseline + 1);

    unsafe {
        free(leaked.as_ptr());
        free(exempt.as_ptr());
    }
    assert_eq!(corealloc::report_leaks(), baseline);
}

#[test]
#[serial]
fn test_report_leaks_at_exit_respects_flag() {
    corealloc::context::set_check_leaks_at_exit(false);
    let ptr = allocate(16).unwrap();
    assert_eq!(corealloc::report_leaks_at_exit(), 0);

    corealloc::context::set_check_leaks_at_exit(true);
    assert!(corealloc::report_leaks_at_exit() >= 1);

    corealloc::context::set_check_leaks_at_exit(false);
    unsafe { free(ptr.as_ptr()) };
}

#[test]
#[serial]
fn test_verify_heap_passes_on_healthy_allocations() {
    let ptrs: Vec<_> = (0..8).map(|_| allocate(48).unwrap()).collect();
    corealloc::verify_heap();

    for ptr in &ptrs {
        unsafe {
            corealloc::verify_ptr(*ptr);
            free(ptr.as_ptr());
        }
    }
}

#[test]
#[serial]
#[should_panic(expected = "freed-memory pattern")]
fn test_double_free_is_detected() {
    // Pool memory survives an individual free (it is a no-op), so the
    // second free reads the freed-pattern header rather than unmapped
    // heap memory.
    let pool = PoolAllocator::new();
    let ptr = allocate_in(&pool, AllocationRequest::new(64)).unwrap();

    unsafe {
        free(ptr.as_ptr());
        free(ptr.as_ptr());
    }
}

#[test]
#[serial]
fn test_overrun_is_detected_by_verification() {
    let ptr = allocate(32).unwrap();

    unsafe {
        // One byte past the end of the allocation.
        *ptr.as_ptr().add(32) = 0;
    }

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| unsafe {
        corealloc::verify_ptr(ptr)
    }));
    assert!(result.is_err(), "corrupted trailing guard went undetected");

    // Repair the guard byte so the allocation can be released normally
    // and the tracker stays healthy for the remaining tests.
    unsafe {
        *ptr.as_ptr().add(32) = corealloc::core::limits::NO_MANS_LAND_FILL;
        free(ptr.as_ptr());
    }
}

#[test]
#[serial]
fn test_stats_snapshot() {
    let before = tracker::global().stats();

    let ptr = allocate(8).unwrap();
    let after = tracker::global().stats();
    assert_eq!(after.live_allocations, before.live_allocations + 1);
    assert_eq!(after.total_allocations, before.total_allocations + 1);

    unsafe { free(ptr.as_ptr()) };
}
