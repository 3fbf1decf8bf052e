/*!
 * Allocator Protocol
 *
 * The one contract every concrete allocator implements, the raw
 * memory-source abstraction they draw from, and the request/option/error
 * types shared by the whole layer.
 */

mod source;
mod traits;
mod types;

pub use source::{MemorySource, SystemSource};
pub use traits::RawAllocator;
pub use types::{
    AllocError, AllocOptions, AllocResult, AllocationRequest, FreeAllOutcome, ResizeOutcome,
};
