//! Delta filter: element-wise difference against a reference element,
//! wrapping per byte lane.
//!
//! The reference element is the logical predecessor's last element (or the
//! super-chunk's delta-reference chunk, or zero) — never the byte ordering
//! produced by whichever worker happened to finish first, so delta streams
//! stay byte-identical across thread counts (§5).

/// `dest[i] = src[i] - src[i-1]` element-wise, with `src[-1]` taken from
/// `reference` (an element of `typesize` bytes, zero-filled if unset).
pub fn encode(typesize: usize, blocksize: usize, src: &[u8], dest: &mut [u8], reference: &[u8]) {
    debug_assert_eq!(reference.len(), typesize);
    let nelem = blocksize / typesize;

    let mut prev = reference.to_vec();
    for i in 0..nelem {
        let cur = &src[i * typesize..(i + 1) * typesize];
        let out = &mut dest[i * typesize..(i + 1) * typesize];
        for b in 0..typesize {
            out[b] = cur[b].wrapping_sub(prev[b]);
        }
        prev.copy_from_slice(cur);
    }
    let rem = blocksize % typesize;
    if rem > 0 {
        let start = blocksize - rem;
        dest[start..blocksize].copy_from_slice(&src[start..blocksize]);
    }
}

/// Inverse of [`encode`]: reconstructs absolute elements from deltas.
pub fn decode(typesize: usize, blocksize: usize, src: &[u8], dest: &mut [u8], reference: &[u8]) {
    debug_assert_eq!(reference.len(), typesize);
    let nelem = blocksize / typesize;

    let mut prev = reference.to_vec();
    for i in 0..nelem {
        let delta = &src[i * typesize..(i + 1) * typesize];
        let out = &mut dest[i * typesize..(i + 1) * typesize];
        for b in 0..typesize {
            out[b] = delta[b].wrapping_add(prev[b]);
        }
        prev.copy_from_slice(out);
    }
    let rem = blocksize % typesize;
    if rem > 0 {
        let start = blocksize - rem;
        dest[start..blocksize].copy_from_slice(&src[start..blocksize]);
    }
}
