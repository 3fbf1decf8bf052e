/*!
 * Allocator Trait
 * The contract every concrete allocator implements
 */

use std::ptr::NonNull;

use super::types::{AllocResult, FreeAllOutcome, ResizeOutcome};

/// Raw-block allocator interface.
///
/// Implementations deal exclusively in untyped byte blocks; headers,
/// alignment, and debug instrumentation are applied on top by the front
/// end, which also records which allocator produced each block. Callers
/// therefore never need to remember where a pointer came from.
///
/// Object-safe so an allocator reference can be stored in allocation
/// headers and in the ambient context.
pub trait RawAllocator {
    /// Allocate at least `size` raw bytes.
    ///
    /// `size` is never zero when called through the front end (header
    /// overhead is always folded in), so distinct live pointers are
    /// guaranteed even for zero-sized user requests.
    fn allocate(&self, size: usize) -> AllocResult<NonNull<u8>>;

    /// Grow or shrink `block` in place, without moving it.
    ///
    /// On [`ResizeOutcome::Resized`] the block keeps its address - an
    /// implementation must never return any other address. Otherwise
    /// [`ResizeOutcome::MustMove`] tells the front end to allocate a new
    /// block and copy.
    fn resize(&self, block: NonNull<u8>, old_size: usize, new_size: usize) -> ResizeOutcome;

    /// Release a block previously returned by [`allocate`](Self::allocate).
    ///
    /// Allocators that only support bulk release treat this as a no-op;
    /// that is deliberate protocol behavior, not an error.
    ///
    /// # Safety
    ///
    /// `block` must have come from `allocate` on this same instance with
    /// exactly this `size`, and must not be freed twice.
    unsafe fn free(&self, block: NonNull<u8>, size: usize);

    /// Release everything this instance ever produced.
    fn free_all(&self) -> FreeAllOutcome;

    /// Whether [`free_all`](Self::free_all) is implemented.
    ///
    /// The front end consults this before a bulk release so it can detach
    /// debug-tracker entries while the headers are still readable.
    fn supports_free_all(&self) -> bool {
        false
    }

    /// Whether allocations from this allocator are exempt from the leak
    /// report. Bulk-freed allocators (pool, temporary) never see
    /// individual frees, so reporting their blocks as leaks is noise.
    fn leak_exempt(&self) -> bool {
        false
    }
}
