/*!
 * Allocation Limits and Constants
 *
 * Centralized location for all allocation-layer limits, thresholds, and
 * fill patterns. Organized by domain for maintainability.
 *
 * ## Design Philosophy
 * - All values include rationale comments explaining WHY they exist
 * - Debug fill patterns follow the classic CRT debug-heap values so that
 *   memory dumps are immediately recognizable in a debugger
 */

// =============================================================================
// REQUEST LIMITS
// =============================================================================

/// Maximum size of a single allocation request, including header and
/// alignment overhead. Anything above this is a caller bug, not a
/// legitimate out-of-memory condition, and is rejected before touching
/// the raw source. Mirrors the maximum the platform layout machinery can
/// represent, minus a small slack for header overhead.
pub const MAX_ALLOCATION_REQUEST: usize = isize::MAX as usize - 31;

/// Default alignment applied when a request leaves alignment unset.
/// Matches pointer size: every allocation can hold a pointer.
pub const DEFAULT_ALIGNMENT: usize = std::mem::align_of::<usize>();

/// Largest alignment a header can record (the field is 16 bits wide).
/// 8 KiB covers page-aligned requests; anything bigger is exotic enough
/// to deserve a dedicated allocator.
pub const MAX_ALIGNMENT: usize = 8 * 1024;

// =============================================================================
// RAW SOURCE
// =============================================================================

/// Alignment of every block handed out by the raw memory source.
/// 16 bytes satisfies the strictest fundamental alignment on supported
/// targets; user-visible alignment above this is produced by header
/// padding, never by the source.
pub const SOURCE_ALIGNMENT: usize = 16;

// =============================================================================
// DEBUG FILL PATTERNS
// =============================================================================
//
// Non-zero, constant, odd, large, and atypical values:
// - Non-zero values help find bugs that assume zero-filled data
// - Constant values make memory filling deterministic (reproducible bugs)
// - Odd numbers catch code assuming a cleared lower bit (aligned pointers)
// - Large byte values form bad addresses and fail fast when dereferenced

/// Guard bytes written before and after every user region (debug builds).
pub const GUARD_BYTES: usize = 4;

/// Fill value for guard bytes ("no man's land"). A write that lands here
/// is an out-of-bounds access and is caught by header verification.
pub const NO_MANS_LAND_FILL: u8 = 0xFD;

/// Fill value for freed blocks. Reads of this pattern mean use-after-free;
/// a header full of it means double-free.
pub const DEAD_LAND_FILL: u8 = 0xDD;

/// Fill value for freshly allocated, uninitialized memory (when zero-fill
/// was not requested). Reads of this pattern mean use-before-init.
pub const CLEAN_LAND_FILL: u8 = 0xCD;

// =============================================================================
// POOL ALLOCATOR
// =============================================================================

/// Default nominal block size for pool allocators (64 KiB).
/// Big enough that typical workloads stay in one block per generation,
/// small enough that an idle pool is cheap to keep around.
pub const DEFAULT_POOL_BLOCK_SIZE: usize = 64 * 1024;

/// Default internal alignment of pool cursors. Offsets served out of a
/// block are always multiples of this.
pub const DEFAULT_POOL_ALIGNMENT: usize = 8;

// =============================================================================
// TEMPORARY ALLOCATOR
// =============================================================================

/// Page-size granularity of the temporary allocator (8 KiB). Base and
/// overflow page capacities are always rounded up to a multiple of this.
pub const TEMPORARY_PAGE_GRANULARITY: usize = 8 * 1024;
