/*!
 * corealloc
 *
 * Foundational memory-management layer: a pluggable allocator protocol,
 * header-encoded per-allocation metadata, three concrete allocator
 * strategies (general-purpose, pool, temporary), and a debug
 * instrumentation layer detecting overruns, use-after-free, and leaks.
 *
 * Callers go through the front-end entry points, which select an
 * allocator (explicit or ambient default), wrap raw blocks with the
 * header codec, and on debug builds register every allocation with the
 * global tracker.
 */

pub mod allocators;
pub mod context;
pub mod core;
pub mod frontend;
pub mod header;
pub mod protocol;
#[cfg(debug_assertions)]
pub mod tracker;

// Re-exports
pub use allocators::{
    general, GeneralAllocator, PoolAllocator, PoolStats, TemporaryAllocator, TemporaryStats,
};
pub use frontend::{
    allocate, allocate_aligned, allocate_in, free, free_all, reallocate, reallocate_with,
    report_leaks, report_leaks_at_exit, set_owner, verify_heap, verify_ptr,
};
pub use header::{header_of, AllocationHeader};
pub use protocol::{
    AllocError, AllocOptions, AllocResult, AllocationRequest, FreeAllOutcome, MemorySource,
    RawAllocator, ResizeOutcome, SystemSource,
};
