//! Typed copies between geometry arrays and raw segment bytes.
//!
//! Shared segments carry native-endian `f32` positions and `u32` indices;
//! both processes run on the same machine, so no byte swapping happens.

/// Copies `src` into `dst`. `dst` must be exactly `4 * src.len()` bytes.
pub fn write_f32s(dst: &mut [u8], src: &[f32]) {
    assert_eq!(dst.len(), std::mem::size_of_val(src));
    for (chunk, value) in dst.chunks_exact_mut(4).zip(src) {
        chunk.copy_from_slice(&value.to_ne_bytes());
    }
}

/// Reads `src` as native-endian `f32`s. `src` must be a multiple of 4 bytes.
pub fn read_f32s(src: &[u8]) -> Vec<f32> {
    assert_eq!(src.len() % 4, 0);
    src.chunks_exact(4)
        .map(|chunk| f32::from_ne_bytes(chunk.try_into().expect("chunk of 4")))
        .collect()
}

/// Copies `src` into `dst`. `dst` must be exactly `4 * src.len()` bytes.
pub fn write_u32s(dst: &mut [u8], src: &[u32]) {
    assert_eq!(dst.len(), std::mem::size_of_val(src));
    for (chunk, value) in dst.chunks_exact_mut(4).zip(src) {
        chunk.copy_from_slice(&value.to_ne_bytes());
    }
}

/// Reads `src` as native-endian `u32`s. `src` must be a multiple of 4 bytes.
pub fn read_u32s(src: &[u8]) -> Vec<u32> {
    assert_eq!(src.len() % 4, 0);
    src.chunks_exact(4)
        .map(|chunk| u32::from_ne_bytes(chunk.try_into().expect("chunk of 4")))
        .collect()
}
