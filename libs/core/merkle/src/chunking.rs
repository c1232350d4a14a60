//! Splits a contiguous byte string into Merkle-chunk boundaries, applying
//! the second-to-last-chunk rebalance rule: the last chunk must be between 32 KiB and 256 KiB; if the
//! straightforward 256-KiB chunking would leave a too-small remainder,
//! the final two chunks are rebalanced into two roughly equal halves.

pub const MAX_CHUNK_SIZE: usize = 256 * 1024;
pub const MIN_CHUNK_SIZE: usize = 32 * 1024;

/// Returns the chunk boundaries for a buffer of `total_len` bytes, as
/// `(start, end)` ranges covering `0..total_len` with no gaps or overlaps.
pub fn chunk_boundaries(total_len: usize) -> Vec<(usize, usize)> {
    let mut boundaries = Vec::new();
    let mut pos = 0usize;
    let mut remaining = total_len;

    while remaining >= MAX_CHUNK_SIZE {
        let mut chunk_size = MAX_CHUNK_SIZE;
        let next_chunk_size = remaining - chunk_size;
        if next_chunk_size > 0 && next_chunk_size < MIN_CHUNK_SIZE {
            // Rebalance: split the current remainder roughly in half so
            // neither resulting chunk dips below MIN_CHUNK_SIZE.
            chunk_size = remaining.div_ceil(2);
        }
        boundaries.push((pos, pos + chunk_size));
        pos += chunk_size;
        remaining -= chunk_size;
    }
    // Final chunk: whatever is left, including the `total_len == 0` case
    // (a single empty chunk), which the caller's hashing step handles.
    boundaries.push((pos, pos + remaining));
    boundaries
}
