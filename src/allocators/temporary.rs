/*!
 * Temporary Allocator
 *
 * Monotonic bump allocator for short-lived memory: a base page plus
 * overflow pages, recycled wholesale. After each recycle the base page is
 * re-reserved at the combined capacity of everything that was in use, so
 * steady-state workloads converge toward zero overflow pages per cycle.
 */

use std::cell::{Cell, RefCell};
use std::ptr::NonNull;
use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::limits::TEMPORARY_PAGE_GRANULARITY;
use crate::core::types::align_up;
use crate::protocol::{
    AllocError, AllocResult, FreeAllOutcome, MemorySource, RawAllocator, ResizeOutcome,
    SystemSource,
};

#[cfg(debug_assertions)]
use crate::core::limits::DEAD_LAND_FILL;

/// One bump page: storage plus used/reserved counters.
struct Page {
    ptr: Option<NonNull<u8>>,
    reserved: usize,
    used: usize,
}

impl Page {
    const fn empty() -> Self {
        Self {
            ptr: None,
            reserved: 0,
            used: 0,
        }
    }

    fn fits(&self, size: usize) -> bool {
        self.used + size <= self.reserved
    }
}

/// Temporary allocator statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporaryStats {
    pub base_reserved: usize,
    pub overflow_pages: usize,
    pub total_reserved: usize,
    pub total_used: usize,
}

/// Fast monotonic (bump) allocator.
///
/// The base page is sized lazily on first use; when it runs out,
/// overflow pages are appended at the tail, each big enough that no
/// allocation ever straddles a page boundary. Nothing is freed
/// individually - [`reset`](Self::reset) recycles everything at once.
///
/// NOT thread-safe: one instance per logical owner (thread, frame,
/// request). The classic use is a per-frame scratch allocator that is
/// reset at the top of every frame.
///
/// Note on free semantics: freeing an individual allocation is accepted
/// and ignored, same as the pool. When allocations were made through the
/// front end, recycle via `free_all` there rather than calling `reset`
/// directly, so debug tracking stays consistent.
pub struct TemporaryAllocator {
    base: RefCell<Page>,
    overflow: RefCell<Vec<Page>>,
    total_used: Cell<usize>,
    source: Arc<dyn MemorySource>,
}

impl TemporaryAllocator {
    pub fn new() -> Self {
        Self {
            base: RefCell::new(Page::empty()),
            overflow: RefCell::new(Vec::new()),
            total_used: Cell::new(0),
            source: Arc::new(SystemSource::new()),
        }
    }

    /// Replace the raw source pages are reserved from.
    pub fn with_source(mut self, source: Arc<dyn MemorySource>) -> Self {
        self.source = source;
        self
    }

    /// Bumps `size` bytes off the first page with room, appending a new
    /// overflow page when none has any.
    pub fn get(&self, size: usize) -> AllocResult<NonNull<u8>> {
        let size = size.max(1);

        let mut base = self.base.borrow_mut();
        if base.ptr.is_none() {
            // First use: size the base page to twice the request so the
            // very first cycle rarely overflows.
            let starting = Self::round_to_granularity(
                size.checked_mul(2)
                    .ok_or(AllocError::OutOfMemory { requested: size })?,
            );
            base.ptr = Some(self.source.reserve(starting)?);
            base.reserved = starting;
        }

        if base.fits(size) {
            return Ok(Self::bump(&mut base, size, &self.total_used));
        }

        let mut overflow = self.overflow.borrow_mut();
        for page in overflow.iter_mut() {
            if page.fits(size) {
                return Ok(Self::bump(page, size, &self.total_used));
            }
        }

        // No page has room: append exactly one page, large enough for the
        // request, at the tail.
        let last_reserved = overflow.last().map_or(base.reserved, |p| p.reserved);
        let capacity = Self::overflow_capacity(size, last_reserved)?;
        let ptr = self.source.reserve(capacity)?;
        overflow.push(Page {
            ptr: Some(ptr),
            reserved: capacity,
            used: 0,
        });
        let page = overflow.last_mut().expect("page was just pushed");
        Ok(Self::bump(page, size, &self.total_used))
    }

    /// Recycles every allocation at once. Overflow pages are released and
    /// their capacities folded into a single re-reserved base page.
    ///
    /// Failure to re-reserve the combined base page leaves the allocator
    /// empty but valid; the next `get` re-initializes it.
    pub fn reset(&self) -> AllocResult<()> {
        let mut base = self.base.borrow_mut();
        let mut overflow = self.overflow.borrow_mut();

        let mut target = base.reserved;
        for page in overflow.drain(..) {
            target += page.reserved;
            if let Some(ptr) = page.ptr {
                // SAFETY: the page was reserved from this source at this
                // capacity; nothing references it after a reset.
                unsafe { self.source.release(ptr, page.reserved) };
            }
        }

        self.total_used.set(0);

        if target != base.reserved {
            if let Some(ptr) = base.ptr.take() {
                // SAFETY: as above.
                unsafe { self.source.release(ptr, base.reserved) };
            }
            base.reserved = 0;
            base.used = 0;
            base.ptr = Some(self.source.reserve(target)?);
            base.reserved = target;
            return Ok(());
        }

        #[cfg(debug_assertions)]
        if let Some(ptr) = base.ptr {
            // SAFETY: the used region lies within the page.
            unsafe { std::ptr::write_bytes(ptr.as_ptr(), DEAD_LAND_FILL, base.used) };
        }
        base.used = 0;
        Ok(())
    }

    /// Returns every page, including the base, to the source.
    pub fn release(&self) {
        let mut base = self.base.borrow_mut();
        if let Some(ptr) = base.ptr.take() {
            // SAFETY: reserved from this source at this capacity.
            unsafe { self.source.release(ptr, base.reserved) };
        }
        base.reserved = 0;
        base.used = 0;

        for page in self.overflow.borrow_mut().drain(..) {
            if let Some(ptr) = page.ptr {
                // SAFETY: as above.
                unsafe { self.source.release(ptr, page.reserved) };
            }
        }
        self.total_used.set(0);
    }

    pub fn stats(&self) -> TemporaryStats {
        let base = self.base.borrow();
        let overflow = self.overflow.borrow();
        TemporaryStats {
            base_reserved: base.reserved,
            overflow_pages: overflow.len(),
            total_reserved: base.reserved + overflow.iter().map(|p| p.reserved).sum::<usize>(),
            total_used: self.total_used.get(),
        }
    }

    fn bump(page: &mut Page, size: usize, total_used: &Cell<usize>) -> NonNull<u8> {
        let ptr = page.ptr.expect("bump against an unreserved page");
        // SAFETY: used + size <= reserved, checked by the caller.
        let result = unsafe { NonNull::new_unchecked(ptr.as_ptr().add(page.used)) };
        page.used += size;
        total_used.set(total_used.get() + size);
        result
    }

    /// Capacity for a fresh overflow page: generous for the request and
    /// growing with the page chain, in page-granularity steps.
    fn overflow_capacity(size: usize, last_reserved: usize) -> AllocResult<usize> {
        let doubled = size
            .checked_mul(2)
            .ok_or(AllocError::OutOfMemory { requested: size })?
            .next_power_of_two();
        let grown = Self::heuristic_growth(last_reserved).next_power_of_two();
        Ok(Self::round_to_granularity(doubled.max(grown)))
    }

    /// Log-based growth curve for successive page capacities.
    fn heuristic_growth(reserved: usize) -> usize {
        if reserved == 0 {
            return TEMPORARY_PAGE_GRANULARITY;
        }
        let r = reserved as f64;
        (r * (r * 10.0).log2() / 3.0).ceil() as usize
    }

    fn round_to_granularity(size: usize) -> usize {
        align_up(size.max(1), TEMPORARY_PAGE_GRANULARITY)
    }
}

impl Default for TemporaryAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl RawAllocator for TemporaryAllocator {
    fn allocate(&self, size: usize) -> AllocResult<NonNull<u8>> {
        self.get(size)
    }

    fn resize(&self, _block: NonNull<u8>, _old_size: usize, _new_size: usize) -> ResizeOutcome {
        // Bumped allocations never resize in place; the front end copies.
        ResizeOutcome::MustMove
    }

    unsafe fn free(&self, _block: NonNull<u8>, _size: usize) {
        // Individual free is unsupported by design; memory returns on
        // reset/release.
    }

    fn free_all(&self) -> FreeAllOutcome {
        if let Err(err) = self.reset() {
            // Everything was still recycled; only the combined-capacity
            // re-reserve failed, and the next get() recovers lazily.
            warn!("temporary allocator could not re-reserve its base page: {err}");
        }
        FreeAllOutcome::Done
    }

    fn supports_free_all(&self) -> bool {
        true
    }

    fn leak_exempt(&self) -> bool {
        true
    }
}

impl Drop for TemporaryAllocator {
    fn drop(&mut self) {
        self.release();
    }
}
