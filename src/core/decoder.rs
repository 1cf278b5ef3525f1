//! Decoding of `.nozomi` index files.
//!
//! An index file is a flat run of big-endian `u32` post identifiers in
//! upload order, with no header or trailer.

use std::collections::HashSet;

/// Size of one packed identifier in bytes
pub const ID_WIDTH: usize = 4;

/// Unordered set of post identifiers
pub type IdentifierSet = HashSet<u32>;

/// Decode an index buffer into its identifiers, in file order.
///
/// A trailing partial group (1-3 bytes) is ignored.
pub fn decode(buffer: &[u8]) -> Vec<u32> {
    buffer
        .chunks_exact(ID_WIDTH)
        .map(|group| u32::from_be_bytes([group[0], group[1], group[2], group[3]]))
        .collect()
}

/// Decode an index buffer straight into a set
pub fn decode_set(buffer: &[u8]) -> IdentifierSet {
    decode(buffer).into_iter().collect()
}
