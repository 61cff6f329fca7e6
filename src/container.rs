//! Container format (C4): the 16-byte header, the block offset table, and
//! the blocksize heuristic.

use crate::constants::{
    BLOCKSIZE_CAP_HIGH, BLOCKSIZE_CAP_LOW, BLOCKSIZE_CAP_MID, BLOSC_MAX_BUFFERSIZE,
    BLOSC_MIN_HEADER_LENGTH, BLOSC_VERSION_FORMAT, CODEC_ID_SHIFT, INT_MAX,
};
use crate::error::{Error, Result};

/// Parsed 16-byte header (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub versionlz: u8,
    pub flags: u8,
    pub typesize: u8,
    pub nbytes: u32,
    pub blocksize: u32,
    pub cbytes: u32,
}

impl Header {
    pub fn write(&self, buf: &mut [u8]) {
        assert!(buf.len() >= BLOSC_MIN_HEADER_LENGTH);
        buf[0] = self.version;
        buf[1] = self.versionlz;
        buf[2] = self.flags;
        buf[3] = self.typesize;
        buf[4..8].copy_from_slice(&self.nbytes.to_le_bytes());
        buf[8..12].copy_from_slice(&self.blocksize.to_le_bytes());
        buf[12..16].copy_from_slice(&self.cbytes.to_le_bytes());
    }

    pub fn read(buf: &[u8]) -> Result<Header> {
        if buf.len() < BLOSC_MIN_HEADER_LENGTH {
            return Err(Error::CorruptInput("buffer shorter than header".into()));
        }
        let header = Header {
            version: buf[0],
            versionlz: buf[1],
            flags: buf[2],
            typesize: buf[3],
            nbytes: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            blocksize: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            cbytes: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
        };
        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> Result<()> {
        if self.version != BLOSC_VERSION_FORMAT {
            return Err(Error::CorruptInput(format!(
                "unsupported format version {}",
                self.version
            )));
        }
        if self.typesize == 0 {
            return Err(Error::CorruptInput("typesize 0 is reserved".into())); // I6
        }
        if self.nbytes as usize > BLOSC_MAX_BUFFERSIZE {
            return Err(Error::CorruptInput("nbytes exceeds maximum".into())); // I1
        }
        if self.blocksize == 0 {
            return Err(Error::CorruptInput("blocksize must be positive".into())); // I2
        }
        use crate::constants::{BLOSC_DOBITSHUFFLE, BLOSC_DODELTA, BLOSC_DOSHUFFLE, BLOSC_MEMCPYED};
        let shuffle = self.flags & BLOSC_DOSHUFFLE != 0;
        let bitshuffle = self.flags & BLOSC_DOBITSHUFFLE != 0;
        let delta = self.flags & BLOSC_DODELTA != 0;
        let memcpy = self.flags & BLOSC_MEMCPYED != 0;
        if [shuffle, bitshuffle, delta].iter().filter(|b| **b).count() > 1 {
            return Err(Error::CorruptInput(
                "shuffle, bitshuffle and delta flags are mutually exclusive".into(), // I5
            ));
        }
        if memcpy && (shuffle || bitshuffle || delta) {
            return Err(Error::CorruptInput(
                "memcpy flag excludes filter flags".into(), // I5
            ));
        }
        Ok(())
    }
}

/// Derived per-call block geometry (§3 `BlockLayout`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    pub nbytes: usize,
    pub blocksize: usize,
    pub nblocks: usize,
}

impl BlockLayout {
    /// `ceil(nbytes/blocksize)` blocks, with the last one possibly short.
    pub fn new(nbytes: usize, blocksize: usize) -> BlockLayout {
        let nblocks = if nbytes == 0 {
            0
        } else {
            nbytes.div_ceil(blocksize)
        };
        BlockLayout {
            nbytes,
            blocksize,
            nblocks,
        }
    }

    /// Logical `(offset, length)` of block `i` within the uncompressed
    /// buffer; the last block may be shorter than `blocksize` (§3 I4).
    pub fn block_range(&self, i: usize) -> (usize, usize) {
        let start = i * self.blocksize;
        let len = (self.nbytes - start).min(self.blocksize);
        (start, len)
    }

    /// Blocks whose logical range intersects `[start, start+len)`.
    pub fn blocks_covering(&self, start: usize, len: usize) -> std::ops::Range<usize> {
        if len == 0 {
            return 0..0;
        }
        let first = start / self.blocksize;
        let last = (start + len - 1) / self.blocksize;
        first..(last + 1).min(self.nblocks)
    }
}

/// Blocksize auto-heuristic (§4.4): caller-forced size honored verbatim
/// (power of two, within bounds); `0` picks a clevel-dependent default.
pub fn resolve_blocksize(
    requested: usize,
    nbytes: usize,
    typesize: usize,
    clevel: i32,
) -> Result<usize> {
    if requested != 0 {
        if requested > nbytes && nbytes > 0 {
            return Err(Error::InvalidArgument(
                "forced blocksize exceeds nbytes".into(),
            ));
        }
        if requested > (i32::MAX as usize) {
            return Err(Error::InvalidArgument("forced blocksize too large".into()));
        }
        if !requested.is_power_of_two() {
            return Err(Error::InvalidArgument(
                "forced blocksize must be a power of two".into(),
            ));
        }
        return Ok(requested);
    }

    if nbytes == 0 {
        return Ok(typesize.max(1).next_power_of_two());
    }

    let cap = match clevel {
        0..=3 => BLOCKSIZE_CAP_LOW,
        4..=6 => BLOCKSIZE_CAP_MID,
        _ => BLOCKSIZE_CAP_HIGH,
    };

    let mut blocksize = largest_power_of_two_leq(nbytes).min(largest_power_of_two_leq(cap));
    let min_size = typesize.max(1).next_power_of_two();
    if blocksize < min_size {
        blocksize = min_size;
    }
    Ok(blocksize)
}

fn largest_power_of_two_leq(n: usize) -> usize {
    if n == 0 {
        return 1;
    }
    1usize << (usize::BITS - 1 - n.leading_zeros())
}

pub fn offset_table_len(nblocks: usize) -> usize {
    4 * nblocks
}

pub fn write_offset(buf: &mut [u8], header_len: usize, index: usize, offset: i32) {
    let at = header_len + index * 4;
    buf[at..at + 4].copy_from_slice(&offset.to_le_bytes());
}

pub fn read_offset(buf: &[u8], header_len: usize, index: usize) -> Result<i32> {
    let at = header_len + index * 4;
    if at + 4 > buf.len() {
        return Err(Error::CorruptInput("offset table truncated".into()));
    }
    Ok(i32::from_le_bytes(buf[at..at + 4].try_into().unwrap()))
}

/// `cbuffer_sizes`: readable from the first 16 bytes alone.
pub fn cbuffer_sizes(buf: &[u8]) -> Result<(usize, usize, usize)> {
    let h = Header::read(buf)?;
    Ok((h.nbytes as usize, h.cbytes as usize, h.blocksize as usize))
}

/// `cbuffer_metainfo`.
pub fn cbuffer_metainfo(buf: &[u8]) -> Result<(u8, u8)> {
    let h = Header::read(buf)?;
    Ok((h.typesize, h.flags))
}

/// `cbuffer_versions`.
pub fn cbuffer_versions(buf: &[u8]) -> Result<(u8, u8)> {
    let h = Header::read(buf)?;
    Ok((h.version, h.versionlz))
}

/// `cbuffer_complib`: the compressor library name, read off the library id
/// embedded in the first non-memcpy block's length prefix (§6). A stream
/// made entirely of memcpy blocks carries no codec id anywhere and has no
/// well-defined answer.
pub fn cbuffer_complib(buf: &[u8]) -> Result<&'static str> {
    let h = Header::read(buf)?;
    let nbytes = h.nbytes as usize;
    let blocksize = h.blocksize as usize;
    let cbytes = h.cbytes as usize;
    let layout = BlockLayout::new(nbytes, blocksize);

    for i in 0..layout.nblocks {
        let (_, block_len) = layout.block_range(i);
        let lo = read_offset(buf, BLOSC_MIN_HEADER_LENGTH, i)? as usize;
        let hi = if i + 1 < layout.nblocks {
            read_offset(buf, BLOSC_MIN_HEADER_LENGTH, i + 1)? as usize
        } else {
            cbytes
        };
        if hi < lo || hi > buf.len() {
            return Err(Error::CorruptInput("block offset out of bounds".into()));
        }
        let framed_len = hi - lo;
        if framed_len == block_len {
            continue; // memcpy block, carries no codec id
        }
        if framed_len < 4 {
            return Err(Error::CorruptInput("block shorter than length prefix".into()));
        }
        let prefix = u32::from_le_bytes(buf[lo..lo + 4].try_into().unwrap());
        let lib_id = (prefix >> CODEC_ID_SHIFT) as u8;
        return crate::codec::by_library_id(lib_id).map(|c| c.name());
    }
    Err(Error::CodecUnavailable(
        "stream contains only memcpy blocks; codec cannot be determined".into(),
    ))
}
