//! Shuffle / bit-shuffle / delta preconditioners (C2).

mod bitshuffle;
mod delta;
mod shuffle;

use crate::error::Result;

/// Filter selector a caller asks for. `Shuffle`/`BitShuffle` may be silently
/// downgraded to `None` by [`resolve`] when the geometry doesn't fit (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    None,
    Shuffle,
    BitShuffle,
    Delta,
}

/// Applies the selection policy from §4.2: shuffle/bitshuffle silently
/// degrade to `None` when typesize/blocksize don't satisfy their geometry
/// constraints, rather than erroring.
pub fn resolve(requested: Filter, typesize: usize, blocksize: usize) -> Filter {
    match requested {
        Filter::Shuffle => {
            if (2..=255).contains(&typesize) && blocksize % typesize == 0 {
                Filter::Shuffle
            } else {
                Filter::None
            }
        }
        Filter::BitShuffle => {
            if (2..=255).contains(&typesize)
                && blocksize % typesize == 0
                && (blocksize / typesize) % 8 == 0
            {
                Filter::BitShuffle
            } else {
                Filter::None
            }
        }
        other => other,
    }
}

/// Runs the forward filter for one block. `reference` is only consulted for
/// `Filter::Delta` and must be `typesize` bytes.
pub fn apply(
    filter: Filter,
    typesize: usize,
    blocksize: usize,
    src: &[u8],
    dest: &mut [u8],
    reference: &[u8],
) -> Result<()> {
    match filter {
        Filter::None => {
            dest.copy_from_slice(src);
            Ok(())
        }
        Filter::Shuffle => {
            shuffle::shuffle(typesize, blocksize, src, dest);
            Ok(())
        }
        Filter::BitShuffle => bitshuffle::bitshuffle(typesize, blocksize, src, dest),
        Filter::Delta => {
            delta::encode(typesize, blocksize, src, dest, reference);
            Ok(())
        }
    }
}

/// Runs the inverse filter for one block.
pub fn unapply(
    filter: Filter,
    typesize: usize,
    blocksize: usize,
    src: &[u8],
    dest: &mut [u8],
    reference: &[u8],
) -> Result<()> {
    match filter {
        Filter::None => {
            dest.copy_from_slice(src);
            Ok(())
        }
        Filter::Shuffle => {
            shuffle::unshuffle(typesize, blocksize, src, dest);
            Ok(())
        }
        Filter::BitShuffle => bitshuffle::bitunshuffle(typesize, blocksize, src, dest),
        Filter::Delta => {
            delta::decode(typesize, blocksize, src, dest, reference);
            Ok(())
        }
    }
}

/// Header flag bits set for a resolved filter.
pub fn flag_bits(filter: Filter) -> u8 {
    match filter {
        Filter::None => 0,
        Filter::Shuffle => crate::constants::BLOSC_DOSHUFFLE,
        Filter::BitShuffle => crate::constants::BLOSC_DOBITSHUFFLE,
        Filter::Delta => crate::constants::BLOSC_DODELTA,
    }
}

/// Recovers the filter a stream was written with from its header flags.
/// Shuffle and bitshuffle are mutually exclusive by construction (checked at
/// header-parse time); delta rides alongside either as an independent bit.
pub fn from_flags(flags: u8) -> Filter {
    use crate::constants::{BLOSC_DOBITSHUFFLE, BLOSC_DODELTA, BLOSC_DOSHUFFLE};
    if flags & BLOSC_DODELTA != 0 {
        Filter::Delta
    } else if flags & BLOSC_DOBITSHUFFLE != 0 {
        Filter::BitShuffle
    } else if flags & BLOSC_DOSHUFFLE != 0 {
        Filter::Shuffle
    } else {
        Filter::None
    }
}
