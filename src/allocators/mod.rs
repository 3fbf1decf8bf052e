/*!
 * Concrete Allocators
 *
 * The three allocation strategies shipped with the layer. All of them
 * implement [`RawAllocator`](crate::protocol::RawAllocator) and are
 * driven through the front-end entry points.
 */

mod general;
mod pool;
mod temporary;

pub use general::{general, GeneralAllocator};
pub use pool::{PoolAllocator, PoolStats};
pub use temporary::{TemporaryAllocator, TemporaryStats};
