//! Byte-wise shuffle: transpose a block of `typesize`-byte elements so all
//! first bytes come first, then all second bytes, and so on.

/// Shuffle `src` into `dest`. Trailing bytes that don't form a whole element
/// (`blocksize % typesize`) are copied through unshuffled.
pub fn shuffle(typesize: usize, blocksize: usize, src: &[u8], dest: &mut [u8]) {
    debug_assert_eq!(src.len(), blocksize);
    debug_assert_eq!(dest.len(), blocksize);

    let nelem = blocksize / typesize;
    let rem = blocksize % typesize;

    for j in 0..typesize {
        for i in 0..nelem {
            dest[j * nelem + i] = src[i * typesize + j];
        }
    }

    if rem > 0 {
        let start = blocksize - rem;
        dest[start..blocksize].copy_from_slice(&src[start..blocksize]);
    }
}

/// Inverse of [`shuffle`].
pub fn unshuffle(typesize: usize, blocksize: usize, src: &[u8], dest: &mut [u8]) {
    debug_assert_eq!(src.len(), blocksize);
    debug_assert_eq!(dest.len(), blocksize);

    let nelem = blocksize / typesize;
    let rem = blocksize % typesize;

    for i in 0..nelem {
        for j in 0..typesize {
            dest[i * typesize + j] = src[j * nelem + i];
        }
    }

    if rem > 0 {
        let start = blocksize - rem;
        dest[start..blocksize].copy_from_slice(&src[start..blocksize]);
    }
}
