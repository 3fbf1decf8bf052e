/*!
 * General-Purpose Allocator
 * Thin wrapper over the system heap
 */

use std::ptr::NonNull;

use crate::protocol::{
    AllocResult, FreeAllOutcome, MemorySource, RawAllocator, ResizeOutcome, SystemSource,
};

/// General-purpose heap-backed allocator.
///
/// Stateless over the thread-safe system heap, so concurrent calls from
/// any number of threads need no external locking. This is the allocator
/// behind every thread's initial ambient default.
#[derive(Debug, Default)]
pub struct GeneralAllocator {
    source: SystemSource,
}

static GENERAL: GeneralAllocator = GeneralAllocator::new();

/// The process-wide shared general-purpose allocator.
pub fn general() -> &'static GeneralAllocator {
    &GENERAL
}

impl GeneralAllocator {
    pub const fn new() -> Self {
        Self {
            source: SystemSource::new(),
        }
    }
}

impl RawAllocator for GeneralAllocator {
    fn allocate(&self, size: usize) -> AllocResult<NonNull<u8>> {
        self.source.reserve(size)
    }

    fn resize(&self, _block: NonNull<u8>, old_size: usize, new_size: usize) -> ResizeOutcome {
        // A heap block never grows in place. Shrinks succeed logically:
        // the block keeps its reserved extent and the caller keeps the
        // same pointer.
        if new_size <= old_size {
            ResizeOutcome::Resized
        } else {
            ResizeOutcome::MustMove
        }
    }

    unsafe fn free(&self, block: NonNull<u8>, size: usize) {
        self.source.release(block, size);
    }

    fn free_all(&self) -> FreeAllOutcome {
        FreeAllOutcome::Unsupported
    }
}
