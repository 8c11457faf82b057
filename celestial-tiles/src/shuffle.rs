//! Byte-plane transpose of fixed-size records.
//!
//! Tables are stored with all first bytes of every row together, then all
//! second bytes, and so on. Columns of similar values then produce long runs
//! of identical high bytes, which deflate compresses far better than the
//! natural row-major layout.

/// Restore row-major order in place.
///
/// For every byte position `p < record_size` and record `i < record_count`,
/// the byte that lands at `i * record_size + p` is the one found at
/// `p * record_count + i`. Bytes past `record_count * record_size` are left
/// untouched.
///
/// # Panics
/// If `buf` holds fewer than `record_count * record_size` bytes.
pub fn unshuffle(buf: &mut [u8], record_count: usize, record_size: usize) {
    let total = plane_len(buf, record_count, record_size);
    if total == 0 {
        return;
    }

    let planes = buf[..total].to_vec();
    for (p, plane) in planes.chunks_exact(record_count).enumerate() {
        for (i, &byte) in plane.iter().enumerate() {
            buf[i * record_size + p] = byte;
        }
    }
}

/// Group bytes by position within each record. The inverse of [`unshuffle`].
///
/// # Panics
/// If `buf` holds fewer than `record_count * record_size` bytes.
pub fn shuffle(buf: &mut [u8], record_count: usize, record_size: usize) {
    let total = plane_len(buf, record_count, record_size);
    if total == 0 {
        return;
    }

    let records = buf[..total].to_vec();
    for (i, record) in records.chunks_exact(record_size).enumerate() {
        for (p, &byte) in record.iter().enumerate() {
            buf[p * record_count + i] = byte;
        }
    }
}

fn plane_len(buf: &[u8], record_count: usize, record_size: usize) -> usize {
    let total = record_count
        .checked_mul(record_size)
        .expect("record_count * record_size overflows usize");
    assert!(
        total <= buf.len(),
        "shuffle span of {} bytes exceeds {}-byte buffer",
        total,
        buf.len()
    );
    total
}
