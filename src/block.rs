//! Block pipeline (C3): one block, forward and reverse.
//!
//! A block is self-describing without any extra wire bits: its framed
//! length either equals its logical length (memcpy — the filter was never
//! applied, decode just copies) or is strictly shorter (compressed — a
//! uint32 prefix followed by codec output). A fitting codec result always
//! shrinks the block, so the two cases never collide (§4.3).

use crate::codec::{self, Codec};
use crate::constants::{CODEC_ID_SHIFT, CSIZE_MASK};
use crate::error::{Error, Result};
use crate::filter::{self, Filter};

/// Encodes one block. `reference` is the delta filter's predecessor element
/// (ignored for other filters) and must be `typesize` bytes.
pub fn encode_block(
    codec: &dyn Codec,
    clevel: i32,
    filter: Filter,
    typesize: usize,
    block: &[u8],
    reference: &[u8],
) -> Result<Vec<u8>> {
    let logical_len = block.len();
    let resolved = filter::resolve(filter, typesize, logical_len);

    let mut pre = vec![0u8; logical_len];
    filter::apply(resolved, typesize, logical_len, block, &mut pre, reference)?;

    if logical_len < 5 {
        return Ok(block.to_vec());
    }

    let mut codec_out = vec![0u8; logical_len - 4];
    let csize = codec.compress(clevel, &pre, &mut codec_out)?;

    if csize == 0 || csize + 4 >= logical_len {
        return Ok(block.to_vec());
    }

    let prefix = ((codec.library_id() as u32) << CODEC_ID_SHIFT) | (csize as u32 & CSIZE_MASK);
    let mut framed = Vec::with_capacity(4 + csize);
    framed.extend_from_slice(&prefix.to_le_bytes());
    framed.extend_from_slice(&codec_out[..csize]);
    Ok(framed)
}

/// Decodes one block. `framed` is exactly the bytes stored for this block
/// (the scheduler slices them out using the offset table); `logical_len` is
/// this block's expected decompressed length.
pub fn decode_block(
    framed: &[u8],
    logical_len: usize,
    filter: Filter,
    typesize: usize,
    reference: &[u8],
) -> Result<Vec<u8>> {
    if framed.len() == logical_len {
        // Memcpy block: filter was never applied.
        return Ok(framed.to_vec());
    }

    if framed.len() < 4 {
        return Err(Error::CorruptInput("block shorter than length prefix".into()));
    }
    let prefix = u32::from_le_bytes(framed[0..4].try_into().unwrap());
    let lib_id = (prefix >> CODEC_ID_SHIFT) as u8;
    let csize = (prefix & CSIZE_MASK) as usize;
    if framed.len() != 4 + csize {
        return Err(Error::CorruptInput("block length prefix mismatch".into()));
    }

    let decoder = codec::by_library_id(lib_id)?;
    let mut decompressed = vec![0u8; logical_len];
    let n = decoder.decompress(&framed[4..], &mut decompressed)?;
    if n != logical_len {
        return Err(Error::CorruptInput(
            "decompressed block size mismatch".into(),
        ));
    }

    let resolved = filter::resolve(filter, typesize, logical_len);
    let mut out = vec![0u8; logical_len];
    filter::unapply(resolved, typesize, logical_len, &decompressed, &mut out, reference)?;
    Ok(out)
}
