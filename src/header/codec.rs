/*!
 * Allocation Header Encoding
 * Layout of per-allocation metadata and the arithmetic that places it
 */

use std::mem;
#[cfg(debug_assertions)]
use std::panic::Location;
use std::ptr::{self, NonNull};

use crate::core::limits::{CLEAN_LAND_FILL, GUARD_BYTES};
#[cfg(debug_assertions)]
use crate::core::limits::{DEAD_LAND_FILL, DEFAULT_ALIGNMENT, NO_MANS_LAND_FILL};
use crate::core::types::is_aligned;
use crate::protocol::{AllocOptions, RawAllocator};

/// Metadata stored immediately before every user pointer.
///
/// The layout of a raw block is:
///
/// ```text
/// [..padding..][............header............][user bytes][guard]
/// ^ raw block   ^ raw + padding                 ^ user pointer (aligned)
/// ```
///
/// The user pointer is recovered from the header by a fixed offset (the
/// header size), and the raw block by further subtracting the stored
/// padding. The guard regions exist on debug builds only.
#[repr(C)]
pub struct AllocationHeader {
    /// Intrusive links for the debug tracker list.
    #[cfg(debug_assertions)]
    pub(crate) next: *mut AllocationHeader,
    #[cfg(debug_assertions)]
    pub(crate) prev: *mut AllocationHeader,

    /// Monotonic allocation ID, unique per tracker. Stable across
    /// reallocation, so a misbehaving allocation can be trapped by ID on
    /// every run.
    #[cfg(debug_assertions)]
    pub(crate) id: u64,

    /// Reallocation generation: how many times this logical allocation
    /// has been resized or relocated. Starts at 0.
    #[cfg(debug_assertions)]
    pub(crate) rid: u64,

    /// Source of the allocating (or most recent reallocating) call.
    #[cfg(debug_assertions)]
    pub(crate) location: &'static Location<'static>,

    /// The allocator that produced this block. Free and reallocate route
    /// through this, so callers never track provenance themselves.
    pub(crate) allocator: *const dyn RawAllocator,

    /// Optional back-reference to the object owning the block (used by
    /// containers); null is valid.
    pub(crate) owner: *const (),

    /// User-visible size (excludes header, padding, and guards).
    pub(crate) size: usize,

    /// Exact size of the raw block as requested from the allocator.
    /// Needed to release the block with the same extent it was reserved
    /// with; recomputing it from `size` would drift after in-place
    /// shrinks.
    pub(crate) block_size: usize,

    pub(crate) alignment: u16,
    /// Distance from the raw block to this header, in bytes.
    pub(crate) padding: u16,

    /// Leak-report exemption.
    #[cfg(debug_assertions)]
    pub(crate) leaked: bool,

    /// Self-check: always points at the user pointer this header fronts.
    #[cfg(debug_assertions)]
    pub(crate) check: *const u8,

    /// Reserves space so the bytes right before the user pointer belong
    /// to no live field; the front guard pattern is written over them.
    #[cfg(debug_assertions)]
    pub(crate) guard: [u8; GUARD_BYTES],
}

impl AllocationHeader {
    /// User-visible size of the allocation.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Alignment the allocation was made with.
    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment as usize
    }

    /// Owner back-reference; null when unset.
    #[inline]
    pub fn owner(&self) -> *const () {
        self.owner
    }

    /// Monotonic allocation ID.
    #[cfg(debug_assertions)]
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Reallocation generation.
    #[cfg(debug_assertions)]
    #[inline]
    pub fn rid(&self) -> u64 {
        self.rid
    }

    /// Source of the allocating call.
    #[cfg(debug_assertions)]
    #[inline]
    pub fn source_location(&self) -> &'static Location<'static> {
        self.location
    }
}

/// Minimal offset making `ptr + offset` a multiple of `alignment`.
///
/// `alignment` must be a power of two.
#[inline]
pub fn padding_for(ptr: *const u8, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    let addr = ptr as usize;
    ((addr + alignment - 1) & !(alignment - 1)) - addr
}

/// Like [`padding_for`], but the gap is guaranteed to hold at least
/// `header_size` bytes, extending by whole multiples of `alignment` as
/// needed. The result is still a valid alignment offset for `ptr`.
#[inline]
pub fn padding_for_with_header(ptr: *const u8, alignment: usize, header_size: usize) -> usize {
    let mut padding = padding_for(ptr, alignment);
    if padding < header_size {
        let shortfall = header_size - padding;
        padding += alignment * shortfall.div_ceil(alignment);
    }
    padding
}

/// Raw-block size needed to carve out `user_size` bytes at `alignment`,
/// worst case, including header and (debug) guard overhead. `None` on
/// arithmetic overflow.
pub(crate) fn required_size(user_size: usize, alignment: usize) -> Option<usize> {
    let header_size = mem::size_of::<AllocationHeader>();
    let mut required = user_size
        .checked_add(alignment)?
        .checked_add(header_size)?
        .checked_add(header_size % alignment)?;
    if cfg!(debug_assertions) {
        required = required.checked_add(GUARD_BYTES)?;
    }
    Some(required)
}

/// Places a header inside `raw` and returns the aligned user pointer.
///
/// Fills the user region per `options` (zeroed, or the uninitialized
/// pattern on debug builds) and writes the flanking guard patterns.
/// Debug bookkeeping fields (ID, links, source location) are left for
/// the caller to stamp.
///
/// # Safety
///
/// `raw` must point to at least `block_size` writable bytes, and
/// `block_size` must be at least `required_size(user_size, alignment)`.
pub(crate) unsafe fn encode(
    raw: NonNull<u8>,
    block_size: usize,
    user_size: usize,
    alignment: usize,
    allocator: *const dyn RawAllocator,
    options: AllocOptions,
) -> NonNull<u8> {
    let header_size = mem::size_of::<AllocationHeader>();
    let padding = padding_for_with_header(raw.as_ptr(), alignment, header_size);
    let header_offset = padding - header_size;

    let header = raw.as_ptr().add(header_offset) as *mut AllocationHeader;
    let user = raw.as_ptr().add(padding);
    debug_assert!(
        is_aligned(user as usize, alignment),
        "produced pointer not aligned"
    );

    header.write(AllocationHeader {
        #[cfg(debug_assertions)]
        next: ptr::null_mut(),
        #[cfg(debug_assertions)]
        prev: ptr::null_mut(),
        #[cfg(debug_assertions)]
        id: 0,
        #[cfg(debug_assertions)]
        rid: 0,
        #[cfg(debug_assertions)]
        location: Location::caller(),
        allocator,
        owner: ptr::null(),
        size: user_size,
        block_size,
        alignment: alignment as u16,
        padding: header_offset as u16,
        #[cfg(debug_assertions)]
        leaked: options.mark_leaked,
        #[cfg(debug_assertions)]
        check: user,
        #[cfg(debug_assertions)]
        guard: [NO_MANS_LAND_FILL; GUARD_BYTES],
    });

    if options.zero_init {
        ptr::write_bytes(user, 0, user_size);
    } else if cfg!(debug_assertions) {
        ptr::write_bytes(user, CLEAN_LAND_FILL, user_size);
    }

    #[cfg(debug_assertions)]
    {
        ptr::write_bytes(user.sub(GUARD_BYTES), NO_MANS_LAND_FILL, GUARD_BYTES);
        ptr::write_bytes(user.add(user_size), NO_MANS_LAND_FILL, GUARD_BYTES);
    }

    NonNull::new_unchecked(user)
}

/// Header of a user pointer, by fixed offset.
///
/// # Safety
///
/// `user` must have been produced by [`encode`].
#[inline]
pub(crate) unsafe fn header_ptr(user: NonNull<u8>) -> *mut AllocationHeader {
    (user.as_ptr() as *mut AllocationHeader).sub(1)
}

/// Read access to the header fronting a live allocation.
///
/// # Safety
///
/// `user` must be a live pointer returned by this layer's allocate or
/// reallocate entry points.
#[inline]
pub unsafe fn header_of<'a>(user: NonNull<u8>) -> &'a AllocationHeader {
    &*header_ptr(user)
}

/// Start of the raw block a header was carved from.
///
/// # Safety
///
/// `header` must point at a live, intact allocation header.
#[inline]
pub(crate) unsafe fn raw_block_of(header: *mut AllocationHeader) -> *mut u8 {
    (header as *mut u8).sub((*header).padding as usize)
}

/// Integrity check of a single header: freed-pattern scan, sane
/// alignment, self-check pointer, and both guard regions. Panics with a
/// diagnosis on any violation.
///
/// The freed-pattern scan runs over raw bytes before any field is read,
/// so a double free is diagnosed instead of interpreted.
///
/// # Safety
///
/// `header` must point at memory that held an allocation header at some
/// point (live or freed).
#[cfg(debug_assertions)]
pub(crate) unsafe fn check_header(header: *const AllocationHeader) {
    let bytes = header as *const u8;
    let header_size = mem::size_of::<AllocationHeader>();
    let all_dead = (0..header_size).all(|i| *bytes.add(i) == DEAD_LAND_FILL);
    assert!(
        !all_dead,
        "allocation header carries the freed-memory pattern: double free or use after free"
    );

    let h = &*header;
    assert!(h.alignment != 0, "header alignment is zero: corrupted");
    assert!(
        (h.alignment as usize) >= DEFAULT_ALIGNMENT,
        "header alignment below pointer size: corrupted"
    );
    assert!(
        (h.alignment as usize).is_power_of_two(),
        "header alignment not a power of two: corrupted"
    );

    let user = bytes.add(header_size);
    assert!(
        h.check == user,
        "header self-check pointer does not match: corrupted or foreign pointer"
    );

    for i in 0..GUARD_BYTES {
        assert!(
            *user.sub(GUARD_BYTES).add(i) == NO_MANS_LAND_FILL,
            "guard bytes before the allocation were overwritten: out-of-bounds write"
        );
        assert!(
            *user.add(h.size).add(i) == NO_MANS_LAND_FILL,
            "guard bytes after the allocation were overwritten: out-of-bounds write"
        );
    }
}
