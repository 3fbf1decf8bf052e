/*!
 * Pool Allocator
 *
 * Block-structured arena: requests are bumped out of a current block,
 * exhausted blocks are retained for the generation, and the whole pool is
 * recycled at once. Individual free is deliberately a no-op.
 */

use std::cell::{Cell, RefCell};
use std::ptr::NonNull;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::limits::{DEFAULT_POOL_ALIGNMENT, DEFAULT_POOL_BLOCK_SIZE};
use crate::core::types::align_up;
use crate::protocol::{
    AllocResult, FreeAllOutcome, MemorySource, RawAllocator, ResizeOutcome, SystemSource,
};

#[cfg(debug_assertions)]
use crate::core::limits::DEAD_LAND_FILL;

/// A raw block owned by the pool, with the capacity it was reserved at.
#[derive(Clone, Copy)]
struct RawBlock {
    ptr: NonNull<u8>,
    capacity: usize,
}

/// Pool statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    pub nominal_block_size: usize,
    pub has_current: bool,
    pub used_blocks: usize,
    pub unused_blocks: usize,
    pub obsolete_blocks: usize,
    pub bytes_left: usize,
}

/// Growable pool (arena) allocator.
///
/// Block lifecycle: Current (being bumped into) → Used (exhausted,
/// retained this generation) → Unused (after reset, reusable) or Obsolete
/// (undersized after the nominal block size grew; freed on the next
/// reset). Unused blocks are always recycled before new raw memory is
/// requested.
///
/// NOT thread-safe: one instance per logical owner. Interior mutability
/// keeps the allocation methods on `&self` so the pool can serve as an
/// allocator behind shared references.
///
/// Note on free semantics: freeing an individual allocation is accepted
/// and ignored - indistinguishable at the call site from a real free.
/// Memory comes back only on [`reset`](Self::reset) /
/// [`release`](Self::release). When allocations were made through the
/// front end, recycle via `free_all` there rather than calling `reset`
/// directly, so debug tracking stays consistent.
pub struct PoolAllocator {
    nominal_block_size: Cell<usize>,
    alignment: usize,
    current: Cell<Option<RawBlock>>,
    cursor: Cell<usize>,
    bytes_left: Cell<usize>,
    used: RefCell<Vec<RawBlock>>,
    unused: RefCell<Vec<RawBlock>>,
    obsolete: RefCell<Vec<RawBlock>>,
    source: Arc<dyn MemorySource>,
}

impl PoolAllocator {
    /// Pool with the default nominal block size.
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_POOL_BLOCK_SIZE)
    }

    /// Pool with a custom starting nominal block size.
    pub fn with_block_size(block_size: usize) -> Self {
        assert!(block_size > 0, "pool block size must be non-zero");
        Self {
            nominal_block_size: Cell::new(block_size),
            alignment: DEFAULT_POOL_ALIGNMENT,
            current: Cell::new(None),
            cursor: Cell::new(0),
            bytes_left: Cell::new(0),
            used: RefCell::new(Vec::new()),
            unused: RefCell::new(Vec::new()),
            obsolete: RefCell::new(Vec::new()),
            source: Arc::new(SystemSource::new()),
        }
    }

    /// Replace the raw source blocks are reserved from.
    pub fn with_source(mut self, source: Arc<dyn MemorySource>) -> Self {
        self.source = source;
        self
    }

    /// Set the internal cursor alignment (power of two).
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        assert!(alignment.is_power_of_two(), "pool alignment must be a power of two");
        self.alignment = alignment;
        self
    }

    /// Gets `size` bytes from the pool, growing the nominal block size if
    /// the request cannot fit in any block of the current generation.
    pub fn get(&self, size: usize) -> AllocResult<NonNull<u8>> {
        let padded = align_up(size.max(1), self.alignment);

        if self.bytes_left.get() < padded {
            self.ensure_block(padded)?;
        }

        let block = self.current.get().expect("pool has a current block after ensure");
        // SAFETY: cursor + padded <= capacity, upheld by ensure_block.
        let ptr = unsafe { NonNull::new_unchecked(block.ptr.as_ptr().add(self.cursor.get())) };
        self.cursor.set(self.cursor.get() + padded);
        self.bytes_left.set(self.bytes_left.get() - padded);
        Ok(ptr)
    }

    /// Recycles the pool without returning memory to the source: Current
    /// and Used become Unused, Obsolete blocks are freed, and a fresh
    /// Current is cycled in from Unused.
    pub fn reset(&self) {
        {
            let mut unused = self.unused.borrow_mut();
            if let Some(block) = self.current.take() {
                #[cfg(debug_assertions)]
                // SAFETY: the block spans its full capacity.
                unsafe {
                    std::ptr::write_bytes(block.ptr.as_ptr(), DEAD_LAND_FILL, block.capacity);
                }
                unused.push(block);
            }
            for block in self.used.borrow_mut().drain(..) {
                #[cfg(debug_assertions)]
                // SAFETY: the block spans its full capacity.
                unsafe {
                    std::ptr::write_bytes(block.ptr.as_ptr(), DEAD_LAND_FILL, block.capacity);
                }
                unused.push(block);
            }
        }

        for block in self.obsolete.borrow_mut().drain(..) {
            // SAFETY: obsolete blocks were reserved from this source at
            // this capacity and are not referenced anywhere else.
            unsafe { self.source.release(block.ptr, block.capacity) };
        }

        self.cursor.set(0);
        self.bytes_left.set(0);

        // Cycle a fresh Current from the recycled blocks. A pool that
        // never held a block stays empty until the next get().
        if let Some(block) = self.unused.borrow_mut().pop() {
            self.bytes_left.set(block.capacity);
            self.current.set(Some(block));
        }
    }

    /// Resets the pool and returns every block to the source.
    pub fn release(&self) {
        let mut blocks = self.unused.borrow_mut();
        if let Some(block) = self.current.take() {
            blocks.push(block);
        }
        blocks.extend(self.used.borrow_mut().drain(..));
        blocks.extend(self.obsolete.borrow_mut().drain(..));

        for block in blocks.drain(..) {
            // SAFETY: every block was reserved from this source at this
            // capacity; after release() nothing references them.
            unsafe { self.source.release(block.ptr, block.capacity) };
        }

        self.cursor.set(0);
        self.bytes_left.set(0);
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            nominal_block_size: self.nominal_block_size.get(),
            has_current: self.current.get().is_some(),
            used_blocks: self.used.borrow().len(),
            unused_blocks: self.unused.borrow().len(),
            obsolete_blocks: self.obsolete.borrow().len(),
            bytes_left: self.bytes_left.get(),
        }
    }

    /// Makes room for a request the current block cannot take.
    fn ensure_block(&self, padded: usize) -> AllocResult<()> {
        let starting = self.nominal_block_size.get();
        let mut nominal = starting;
        while nominal < padded {
            nominal *= 2;
        }
        if nominal != starting {
            self.obsolete_all(nominal);
        }
        self.cycle_new_block()
    }

    /// The nominal block size grew: every existing block is now too small
    /// to serve new minimum requests. Demote them all to Obsolete.
    fn obsolete_all(&self, new_nominal: usize) {
        self.nominal_block_size.set(new_nominal);

        let mut obsolete = self.obsolete.borrow_mut();
        if let Some(block) = self.current.take() {
            obsolete.push(block);
        }
        obsolete.extend(self.used.borrow_mut().drain(..));
        obsolete.extend(self.unused.borrow_mut().drain(..));

        self.cursor.set(0);
        self.bytes_left.set(0);
    }

    /// Retires the current block to Used and installs a new Current,
    /// recycled from Unused when possible.
    fn cycle_new_block(&self) -> AllocResult<()> {
        if let Some(block) = self.current.take() {
            self.used.borrow_mut().push(block);
        }

        let block = match self.unused.borrow_mut().pop() {
            Some(block) => block,
            None => {
                let capacity = self.nominal_block_size.get();
                let ptr = self.source.reserve(capacity)?;
                RawBlock { ptr, capacity }
            }
        };

        self.cursor.set(0);
        self.bytes_left.set(block.capacity);
        self.current.set(Some(block));
        Ok(())
    }
}

impl Default for PoolAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl RawAllocator for PoolAllocator {
    fn allocate(&self, size: usize) -> AllocResult<NonNull<u8>> {
        self.get(size)
    }

    fn resize(&self, _block: NonNull<u8>, _old_size: usize, _new_size: usize) -> ResizeOutcome {
        // Bumped blocks never resize in place; the front end copies.
        ResizeOutcome::MustMove
    }

    unsafe fn free(&self, _block: NonNull<u8>, _size: usize) {
        // Individual free is unsupported by design; memory returns on
        // reset/release.
    }

    fn free_all(&self) -> FreeAllOutcome {
        self.reset();
        FreeAllOutcome::Done
    }

    fn supports_free_all(&self) -> bool {
        true
    }

    fn leak_exempt(&self) -> bool {
        true
    }
}

impl Drop for PoolAllocator {
    fn drop(&mut self) {
        self.release();
    }
}
