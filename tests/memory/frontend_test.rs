/*!
 * Front-End Tests
 * Allocate/reallocate/free behavior over the general-purpose allocator
 */

use corealloc::{
    allocate, allocate_aligned, allocate_in, context, free, general, reallocate, AllocError,
    AllocOptions, AllocationRequest,
};
use pretty_assertions::assert_eq;

#[test]
fn test_allocate_returns_aligned_distinct_pointers() {
    let a = allocate(40).unwrap();
    let b = allocate(40).unwrap();

    assert_ne!(a, b);
    assert_eq!(a.as_ptr() as usize % std::mem::align_of::<usize>(), 0);

    unsafe {
        free(a.as_ptr());
        free(b.as_ptr());
    }
}

#[test]
fn test_reallocate_grow_preserves_payload() {
    let ptr = allocate(64).unwrap();
    unsafe {
        for i in 0..64 {
            *ptr.as_ptr().add(i) = i as u8;
        }

        // The general allocator cannot grow in place, so this relocates.
        let grown = reallocate(ptr, 256).unwrap();
        assert_ne!(grown, ptr);

        for i in 0..64 {
            assert_eq!(*grown.as_ptr().add(i), i as u8);
        }

        free(grown.as_ptr());
    }
}

#[test]
fn test_reallocate_shrink_keeps_pointer() {
    let ptr = allocate(100).unwrap();
    unsafe {
        let shrunk = reallocate(ptr, 50).unwrap();
        assert_eq!(shrunk, ptr);
        assert_eq!(corealloc::header_of(shrunk).size(), 50);
        free(shrunk.as_ptr());
    }
}

#[test]
fn test_reallocate_same_size_is_identity() {
    let ptr = allocate(32).unwrap();
    unsafe {
        let same = reallocate(ptr, 32).unwrap();
        assert_eq!(same, ptr);
        free(same.as_ptr());
    }
}

#[cfg(debug_assertions)]
#[test]
fn test_reallocate_preserves_id_and_bumps_generation() {
    let ptr = allocate(32).unwrap();
    unsafe {
        let id = corealloc::header_of(ptr).id();
        assert_eq!(corealloc::header_of(ptr).rid(), 0);

        let moved = reallocate(ptr, 128).unwrap();
        assert_eq!(corealloc::header_of(moved).id(), id);
        assert_eq!(corealloc::header_of(moved).rid(), 1);

        let shrunk = reallocate(moved, 16).unwrap();
        assert_eq!(shrunk, moved);
        assert_eq!(corealloc::header_of(shrunk).id(), id);
        assert_eq!(corealloc::header_of(shrunk).rid(), 2);

        free(shrunk.as_ptr());
    }
}

#[test]
fn test_zeroed_options_zero_the_region() {
    let ptr = allocate_in(
        general(),
        AllocationRequest::new(256).with_options(AllocOptions::zeroed()),
    )
    .unwrap();

    unsafe {
        for i in 0..256 {
            assert_eq!(*ptr.as_ptr().add(i), 0);
        }
        free(ptr.as_ptr());
    }
}

#[test]
fn test_ambient_zero_fill_flag() {
    context::set_zero_fill_by_default(true);
    let ptr = allocate(128).unwrap();
    context::set_zero_fill_by_default(false);

    unsafe {
        for i in 0..128 {
            assert_eq!(*ptr.as_ptr().add(i), 0);
        }
        free(ptr.as_ptr());
    }
}

#[cfg(debug_assertions)]
#[test]
fn test_fresh_memory_carries_uninit_pattern() {
    let ptr = allocate(64).unwrap();
    unsafe {
        for i in 0..64 {
            assert_eq!(*ptr.as_ptr().add(i), 0xCD);
        }
        free(ptr.as_ptr());
    }
}

#[test]
fn test_large_alignments_are_honored() {
    for exp in 3..=12 {
        let alignment = 1usize << exp;
        let ptr = allocate_aligned(100, alignment).unwrap();
        assert_eq!(ptr.as_ptr() as usize % alignment, 0);
        unsafe { free(ptr.as_ptr()) };
    }
}

#[test]
fn test_oversized_request_is_rejected() {
    let result = allocate(usize::MAX / 2);
    assert!(matches!(result, Err(AllocError::RequestTooLarge { .. })));
}

#[test]
fn test_allocation_logging_smoke() {
    let _ = env_logger::builder().is_test(true).try_init();

    context::set_log_all_allocations(true);
    let ptr = allocate(24).unwrap();
    let quiet = allocate_in(
        general(),
        AllocationRequest::new(24)
            .with_options(AllocOptions::default().with_suppress_log(true)),
    )
    .unwrap();
    context::set_log_all_allocations(false);

    unsafe {
        free(ptr.as_ptr());
        free(quiet.as_ptr());
    }
}

#[test]
fn test_randomized_lifecycle_stress() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0x51EE5);
    let mut live: Vec<(std::ptr::NonNull<u8>, usize, u8)> = Vec::new();

    for _ in 0..400 {
        match rng.gen_range(0u32..4) {
            0 | 1 => {
                let size = rng.gen_range(1usize..768);
                let tag = rng.gen::<u8>();
                let ptr = allocate(size).unwrap();
                unsafe { std::ptr::write_bytes(ptr.as_ptr(), tag, size) };
                live.push((ptr, size, tag));
            }
            2 if !live.is_empty() => {
                let index = rng.gen_range(0..live.len());
                let (ptr, size, tag) = live[index];
                let new_size = rng.gen_range(1usize..768);
                let resized = unsafe { reallocate(ptr, new_size).unwrap() };
                unsafe {
                    for i in 0..size.min(new_size) {
                        assert_eq!(*resized.as_ptr().add(i), tag);
                    }
                    std::ptr::write_bytes(resized.as_ptr(), tag, new_size);
                }
                live[index] = (resized, new_size, tag);
            }
            _ if !live.is_empty() => {
                let index = rng.gen_range(0..live.len());
                let (ptr, size, tag) = live.swap_remove(index);
                unsafe {
                    for i in 0..size {
                        assert_eq!(*ptr.as_ptr().add(i), tag);
                    }
                    free(ptr.as_ptr());
                }
            }
            _ => {}
        }
    }

    for (ptr, _, _) in live {
        unsafe { free(ptr.as_ptr()) };
    }
}

#[test]
fn test_scoped_default_allocator_routes_allocations() {
    let pool = corealloc::PoolAllocator::new();

    let ptr = context::with_default_allocator(&pool, || allocate(48).unwrap());

    // The request was served by the pool, not the general allocator.
    let stats = pool.stats();
    assert!(stats.has_current);
    assert!(stats.bytes_left < stats.nominal_block_size);

    // Freeing through the front end is a routine no-op for pool memory.
    unsafe { free(ptr.as_ptr()) };
    corealloc::free_all(&pool);
}

#[test]
fn test_threads_have_independent_defaults() {
    let handle = std::thread::spawn(|| {
        // A fresh thread starts on the general allocator even while the
        // spawning test manipulates its own default.
        let ptr = allocate(16).unwrap();
        unsafe { free(ptr.as_ptr()) };
    });

    let pool = corealloc::PoolAllocator::new();
    context::with_default_allocator(&pool, || {
        let ptr = allocate(16).unwrap();
        unsafe { free(ptr.as_ptr()) };
    });
    corealloc::free_all(&pool);

    handle.join().unwrap();
}
