/*!
 * Header Codec
 *
 * Encodes and decodes the metadata header that sits immediately before
 * every user pointer. All offset pointer arithmetic in the crate lives
 * here; no other component computes header or raw-block offsets.
 */

mod codec;

pub use codec::{header_of, padding_for, padding_for_with_header, AllocationHeader};

pub(crate) use codec::{encode, header_ptr, raw_block_of, required_size};

#[cfg(debug_assertions)]
pub(crate) use codec::check_header;
