/*!
 * Front-End Entry Points
 *
 * The uniform allocate/reallocate/free surface every caller goes
 * through. Selects an allocator (explicit or ambient default), applies
 * header encoding and alignment, and drives the debug hooks: tracking,
 * guard patterns, and allocation-event logging.
 */

use std::panic::Location;
use std::ptr::{self, NonNull};

use log::{debug, error};

use crate::context;
use crate::core::limits::{CLEAN_LAND_FILL, DEFAULT_ALIGNMENT, MAX_ALIGNMENT, MAX_ALLOCATION_REQUEST};
use crate::header;
use crate::protocol::{
    AllocError, AllocOptions, AllocResult, AllocationRequest, FreeAllOutcome, RawAllocator,
    ResizeOutcome,
};

#[cfg(debug_assertions)]
use crate::core::limits::{DEAD_LAND_FILL, GUARD_BYTES, NO_MANS_LAND_FILL};
#[cfg(debug_assertions)]
use crate::tracker;

/// Allocates `size` bytes from the ambient default allocator at the
/// default alignment.
#[track_caller]
pub fn allocate(size: usize) -> AllocResult<NonNull<u8>> {
    let request = AllocationRequest::new(size);
    // SAFETY: the context setters maintain the liveness of the stored
    // default-allocator pointer.
    let allocator = unsafe { &*context::default_allocator_ptr() };
    allocate_in(allocator, request)
}

/// Allocates `size` bytes from the ambient default allocator at the
/// given alignment (power of two, at least pointer-sized).
#[track_caller]
pub fn allocate_aligned(size: usize, alignment: usize) -> AllocResult<NonNull<u8>> {
    let request = AllocationRequest::new(size).with_alignment(alignment);
    // SAFETY: as in allocate().
    let allocator = unsafe { &*context::default_allocator_ptr() };
    allocate_in(allocator, request)
}

/// Allocates per `request` from an explicit allocator.
///
/// The returned pointer is exactly aligned, never aliases another live
/// allocation (even for zero-sized requests), and carries a header
/// recording its provenance, so later reallocate/free calls need no
/// allocator argument.
pub fn allocate_in(
    allocator: &dyn RawAllocator,
    request: AllocationRequest,
) -> AllocResult<NonNull<u8>> {
    let mut options = request.options;
    options.zero_init |= context::zero_fill_by_default();
    if allocator.leak_exempt() {
        options.mark_leaked = true;
    }

    let alignment = resolve_alignment(request.alignment);
    let required = header::required_size(request.size, alignment)
        .filter(|&required| required <= MAX_ALLOCATION_REQUEST)
        .ok_or(AllocError::RequestTooLarge {
            requested: request.size,
            limit: MAX_ALLOCATION_REQUEST,
        })?;

    // SAFETY: erases the reference's lifetime into the stored raw pointer;
    // liveness of the owning allocator across free/reallocate is the
    // caller's contract. `&dyn` and `*const dyn` share representation.
    let allocator_ptr =
        unsafe { std::mem::transmute::<&dyn RawAllocator, *const dyn RawAllocator>(allocator) };
    let raw = allocator.allocate(required).map_err(|err| {
        error!(
            "allocation of {} bytes failed at {}:{}: {err}",
            request.size,
            request.location.file(),
            request.location.line()
        );
        err
    })?;

    // SAFETY: the allocator returned at least `required` writable bytes.
    let user = unsafe { header::encode(raw, required, request.size, alignment, allocator_ptr, options) };

    #[cfg(debug_assertions)]
    // SAFETY: `user` was just produced by encode.
    unsafe {
        let hdr = header::header_ptr(user);
        (*hdr).location = request.location;
        tracker::global().link(hdr);
    }

    if context::log_all_allocations() && !options.suppress_log {
        debug!(
            "allocated {} bytes (align {alignment}) at {}:{}",
            request.size,
            request.location.file(),
            request.location.line()
        );
    }

    Ok(user)
}

/// Resizes the allocation behind `ptr` to `new_size` bytes, relocating
/// if the owning allocator cannot resize in place. The first
/// `min(old, new)` bytes are preserved.
///
/// # Safety
///
/// `ptr` must be a live pointer from this layer's allocate/reallocate,
/// and its owning allocator must still be alive.
#[track_caller]
pub unsafe fn reallocate(ptr: NonNull<u8>, new_size: usize) -> AllocResult<NonNull<u8>> {
    reallocate_with(ptr, new_size, AllocOptions::default())
}

/// [`reallocate`] with explicit options.
///
/// # Safety
///
/// As for [`reallocate`].
#[track_caller]
pub unsafe fn reallocate_with(
    ptr: NonNull<u8>,
    new_size: usize,
    options: AllocOptions,
) -> AllocResult<NonNull<u8>> {
    let location = Location::caller();
    let hdr = header::header_ptr(ptr);
    #[cfg(debug_assertions)]
    tracker::global().verify_one(hdr);

    if (*hdr).size == new_size {
        return Ok(ptr);
    }

    let mut options = options;
    options.zero_init |= context::zero_fill_by_default();

    let alignment = (*hdr).alignment as usize;
    let old_size = (*hdr).size;
    let old_block_size = (*hdr).block_size;
    let allocator_ptr = (*hdr).allocator;
    let allocator = &*allocator_ptr;
    let raw = header::raw_block_of(hdr);

    let new_required = header::required_size(new_size, alignment)
        .filter(|&required| required <= MAX_ALLOCATION_REQUEST)
        .ok_or(AllocError::RequestTooLarge {
            requested: new_size,
            limit: MAX_ALLOCATION_REQUEST,
        })?;

    if context::log_all_allocations() && !options.suppress_log {
        debug!(
            "reallocated to {} bytes at {}:{}",
            new_size,
            location.file(),
            location.line()
        );
    }

    match allocator.resize(NonNull::new_unchecked(raw), old_block_size, new_required) {
        ResizeOutcome::Resized => {
            // Same address: update the header in place and refresh the
            // fills and trailing guard around the new extent.
            (*hdr).size = new_size;
            #[cfg(debug_assertions)]
            {
                (*hdr).rid += 1;
                (*hdr).location = location;
            }

            let user = ptr.as_ptr();
            if new_size > old_size {
                if options.zero_init {
                    ptr::write_bytes(user.add(old_size), 0, new_size - old_size);
                } else if cfg!(debug_assertions) {
                    ptr::write_bytes(user.add(old_size), CLEAN_LAND_FILL, new_size - old_size);
                }
            } else {
                #[cfg(debug_assertions)]
                ptr::write_bytes(user.add(new_size), DEAD_LAND_FILL, old_size - new_size);
            }
            #[cfg(debug_assertions)]
            ptr::write_bytes(user.add(new_size), NO_MANS_LAND_FILL, GUARD_BYTES);

            Ok(ptr)
        }
        ResizeOutcome::MustMove => {
            let new_raw = allocator.allocate(new_required)?;
            let new_user = header::encode(
                new_raw,
                new_required,
                new_size,
                alignment,
                allocator_ptr,
                options,
            );
            let new_hdr = header::header_ptr(new_user);

            // The logical allocation keeps its identity: same ID and
            // owner, next generation.
            (*new_hdr).owner = (*hdr).owner;
            #[cfg(debug_assertions)]
            {
                (*new_hdr).id = (*hdr).id;
                (*new_hdr).rid = (*hdr).rid + 1;
                (*new_hdr).leaked = (*hdr).leaked;
                (*new_hdr).location = location;
            }

            ptr::copy_nonoverlapping(ptr.as_ptr(), new_user.as_ptr(), old_size.min(new_size));

            #[cfg(debug_assertions)]
            {
                // One critical section: a concurrent tracker walk never
                // sees the allocation missing.
                tracker::global().swap(hdr, new_hdr);
                ptr::write_bytes(raw, DEAD_LAND_FILL, old_block_size);
            }

            allocator.free(NonNull::new_unchecked(raw), old_block_size);
            Ok(new_user)
        }
    }
}

/// Releases the allocation behind `ptr`. No-op on null.
///
/// On debug builds the whole raw block is overwritten with the freed
/// pattern before the allocator sees it, so use-after-free reads are
/// detectable even before the memory is reused, and a second free of the
/// same pointer trips the header verification assertion.
///
/// # Safety
///
/// A non-null `ptr` must be a live pointer from this layer's
/// allocate/reallocate, not freed before, and its owning allocator must
/// still be alive.
pub unsafe fn free(ptr: *mut u8) {
    let Some(user) = NonNull::new(ptr) else {
        return;
    };

    let hdr = header::header_ptr(user);
    #[cfg(debug_assertions)]
    tracker::global().verify_one(hdr);

    let allocator = &*(*hdr).allocator;
    let raw = header::raw_block_of(hdr);
    let block_size = (*hdr).block_size;

    #[cfg(debug_assertions)]
    {
        tracker::global().unlink(hdr);
        ptr::write_bytes(raw, DEAD_LAND_FILL, block_size);
    }

    allocator.free(NonNull::new_unchecked(raw), block_size);
}

/// Bulk-releases everything `allocator` produced, reporting
/// [`FreeAllOutcome::Unsupported`] explicitly when it cannot.
///
/// Debug tracking for the allocator's live allocations is detached
/// first, while the headers are still readable.
pub fn free_all(allocator: &dyn RawAllocator) -> FreeAllOutcome {
    if !allocator.supports_free_all() {
        return FreeAllOutcome::Unsupported;
    }

    #[cfg(debug_assertions)]
    {
        let data = allocator as *const dyn RawAllocator as *const ();
        tracker::global().unlink_all_for(data);
    }

    allocator.free_all()
}

/// Sets the owner back-reference of an allocation (used by containers;
/// null clears it). Preserved across reallocation.
///
/// # Safety
///
/// `ptr` must be a live pointer from this layer's allocate/reallocate.
pub unsafe fn set_owner(ptr: NonNull<u8>, owner: *const ()) {
    (*header::header_ptr(ptr)).owner = owner;
}

/// Walks every tracked allocation and verifies header integrity.
/// Compiled to nothing on release builds.
#[cfg(debug_assertions)]
pub fn verify_heap() {
    tracker::global().verify();
}

#[cfg(not(debug_assertions))]
pub fn verify_heap() {}

/// Verifies the header of a single allocation. Compiled to nothing on
/// release builds.
///
/// # Safety
///
/// `ptr` must point where an allocation from this layer lives or lived.
#[cfg(debug_assertions)]
pub unsafe fn verify_ptr(ptr: NonNull<u8>) {
    tracker::global().verify_one(header::header_ptr(ptr));
}

#[cfg(not(debug_assertions))]
pub unsafe fn verify_ptr(_ptr: NonNull<u8>) {}

/// Logs every live, non-exempt allocation and returns how many there
/// are. Advisory: never aborts. Returns 0 on release builds.
#[cfg(debug_assertions)]
pub fn report_leaks() -> usize {
    tracker::global().report_leaks()
}

#[cfg(not(debug_assertions))]
pub fn report_leaks() -> usize {
    0
}

/// Shutdown hook for embedders: produces the leak report if the ambient
/// check-leaks-at-exit flag is set.
pub fn report_leaks_at_exit() -> usize {
    if context::check_leaks_at_exit() {
        report_leaks()
    } else {
        0
    }
}

fn resolve_alignment(alignment: usize) -> usize {
    let alignment = if alignment == 0 {
        DEFAULT_ALIGNMENT
    } else {
        alignment
    };
    debug_assert!(
        alignment.is_power_of_two(),
        "alignment must be a power of two"
    );
    debug_assert!(
        alignment <= MAX_ALIGNMENT,
        "alignment beyond the supported maximum"
    );
    alignment.max(DEFAULT_ALIGNMENT)
}
