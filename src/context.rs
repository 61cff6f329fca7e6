//! Context (C6): the full compress/decompress/getitem pipeline, plus the
//! explicit `Context` and legacy-shaped global API built on top of it.
//!
//! `Context` holds no process state — codec, blocksize, thread count are all
//! explicit fields — so distinct `Context`s on disjoint buffers run safely
//! from multiple callers at once. The global functions instead serialize
//! through one process-wide [`GlobalState`], matching the classic single
//! "current compressor" API.

use std::sync::{Mutex, OnceLock};

use tracing::{debug, trace};

use crate::codec::{self, Codec, CodecId};
use crate::constants::{BLOSC_BLOSCLZ, BLOSC_MAX_TYPESIZE, MEMCPY_NBYTES_PER_TYPESIZE};
use crate::container::{self, BlockLayout, Header};
use crate::error::{Error, Result};
use crate::filter::{self, Filter};
use crate::scheduler::Scheduler;

/// Per-caller compression context. `Send + Sync`: nothing here is shared
/// mutable state except each context's own thread pool.
pub struct Context {
    codec_id: CodecId,
    clevel: i32,
    filter: Filter,
    typesize: usize,
    forced_blocksize: usize,
    scheduler: Scheduler,
}

impl Context {
    pub fn new(
        typesize: usize,
        clevel: i32,
        filter: Filter,
        codec_name: &str,
        blocksize: usize,
        nthreads: usize,
    ) -> Result<Context> {
        if typesize == 0 || typesize > BLOSC_MAX_TYPESIZE {
            return Err(Error::InvalidArgument(format!(
                "typesize {typesize} out of range"
            )));
        }
        let codec_id = codec::by_name(codec_name)?;
        Ok(Context {
            codec_id,
            clevel: clevel.clamp(0, 9),
            filter,
            typesize,
            forced_blocksize: blocksize,
            scheduler: Scheduler::new(nthreads),
        })
    }

    pub fn nthreads(&self) -> usize {
        self.scheduler.nthreads()
    }

    pub fn set_nthreads(&mut self, n: usize) -> usize {
        self.scheduler.set_nthreads(n)
    }

    pub fn typesize(&self) -> usize {
        self.typesize
    }

    /// Worst case a compressed stream of `nbytes` can ever take: every block
    /// either shrinks under compression or falls back to exactly its
    /// logical length via memcpy, so this never needs a second, larger pass.
    pub fn max_compressed_len(&self, nbytes: usize) -> Result<usize> {
        if nbytes > crate::constants::BLOSC_MAX_BUFFERSIZE {
            return Err(Error::InvalidArgument("source buffer too large".into()));
        }
        let blocksize =
            container::resolve_blocksize(self.forced_blocksize, nbytes, self.typesize, self.clevel)?;
        let layout = BlockLayout::new(nbytes, blocksize);
        Ok(crate::constants::BLOSC_MIN_HEADER_LENGTH
            + container::offset_table_len(layout.nblocks)
            + nbytes)
    }

    /// `compress_ctx`: compresses `src` into `dst`, returning the number of
    /// bytes written, or `Ok(0)` if `dst` is too small to hold the result.
    pub fn compress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        self.compress_with_reference(src, None, dst)
    }

    /// Like [`Context::compress`] but lets a caller seed block 0's delta
    /// filter reference instead of starting from zero, so a chunk appended
    /// after another one can delta against that chunk's tail (§4.9).
    pub(crate) fn compress_with_reference(
        &self,
        src: &[u8],
        initial_reference: Option<&[u8]>,
        dst: &mut [u8],
    ) -> Result<usize> {
        let compressed = compress_with(
            src,
            self.typesize,
            self.clevel,
            self.filter,
            self.codec_id,
            self.forced_blocksize,
            initial_reference,
            &self.scheduler,
        )?;
        if compressed.len() > dst.len() {
            return Ok(0);
        }
        dst[..compressed.len()].copy_from_slice(&compressed);
        Ok(compressed.len())
    }

    /// `decompress_ctx`: decompresses `src` into `dst`, returning the number
    /// of bytes written. Never writes past `dst.len()`.
    pub fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        decompress_with(src, None, dst, &self.scheduler)
    }

    /// Like [`Context::decompress`] but seeds block 0's delta reference the
    /// same way [`Context::compress_with_reference`] did when the stream was
    /// written, so a chunk delta-filtered against an external reference
    /// decodes back correctly (§4.9).
    pub(crate) fn decompress_with_reference(
        &self,
        src: &[u8],
        initial_reference: Option<&[u8]>,
        dst: &mut [u8],
    ) -> Result<usize> {
        decompress_with(src, initial_reference, dst, &self.scheduler)
    }

    /// `getitem`: single-threaded partial decompression of `nitems` elements
    /// starting at element `start`, written into `dst`.
    pub fn getitem(&self, src: &[u8], start: usize, nitems: usize, dst: &mut [u8]) -> Result<usize> {
        getitem_with(src, start, nitems, dst)
    }
}

fn compress_with(
    src: &[u8],
    typesize: usize,
    clevel: i32,
    requested_filter: Filter,
    codec_id: CodecId,
    forced_blocksize: usize,
    initial_reference: Option<&[u8]>,
    scheduler: &Scheduler,
) -> Result<Vec<u8>> {
    let nbytes = src.len();
    if nbytes > crate::constants::BLOSC_MAX_BUFFERSIZE {
        return Err(Error::InvalidArgument("source buffer too large".into()));
    }

    let blocksize = container::resolve_blocksize(forced_blocksize, nbytes, typesize, clevel)?;
    let layout = BlockLayout::new(nbytes, blocksize);
    let force_memcpy =
        clevel == 0 || nbytes < typesize.max(1).saturating_mul(MEMCPY_NBYTES_PER_TYPESIZE);
    let filter = if force_memcpy {
        Filter::None
    } else {
        filter::resolve(requested_filter, typesize, blocksize)
    };

    if force_memcpy {
        trace!(nbytes, typesize, clevel, "whole buffer stored via memcpy");
    }

    let codec: &'static dyn Codec = codec::by_id(codec_id)?;
    let src_owned: std::sync::Arc<[u8]> = src.to_vec().into();
    let references = delta_references(&src_owned, &layout, typesize, filter, initial_reference);

    let framed = scheduler.run_blocks(layout.nblocks, {
        let src_owned = std::sync::Arc::clone(&src_owned);
        let references = references.clone();
        move |i| {
            let (start, len) = layout.block_range(i);
            let block = &src_owned[start..start + len];
            if force_memcpy {
                return Ok(block.to_vec());
            }
            crate::block::encode_block(codec, clevel, filter, typesize, block, &references[i])
        }
    })?;

    let offset_table_len = container::offset_table_len(layout.nblocks);
    let header_len = crate::constants::BLOSC_MIN_HEADER_LENGTH;
    let body_start = header_len + offset_table_len;
    let body_len: usize = framed.iter().map(Vec::len).sum();
    let cbytes = body_start + body_len;

    let mut out = vec![0u8; cbytes];
    let mut flags = filter::flag_bits(filter);
    if force_memcpy {
        flags |= crate::constants::BLOSC_MEMCPYED;
    }
    let header = Header {
        version: crate::constants::BLOSC_VERSION_FORMAT,
        versionlz: 1,
        flags,
        typesize: typesize as u8,
        nbytes: nbytes as u32,
        blocksize: blocksize as u32,
        cbytes: cbytes as u32,
    };
    header.write(&mut out[..header_len]);

    let mut cursor = body_start;
    for (i, block_bytes) in framed.iter().enumerate() {
        container::write_offset(&mut out, header_len, i, cursor as i32);
        out[cursor..cursor + block_bytes.len()].copy_from_slice(block_bytes);
        cursor += block_bytes.len();
    }

    debug!(nbytes, cbytes, ratio = nbytes as f64 / cbytes.max(1) as f64, "compressed");
    Ok(out)
}

fn decompress_with(
    src: &[u8],
    initial_reference: Option<&[u8]>,
    dst: &mut [u8],
    scheduler: &Scheduler,
) -> Result<usize> {
    let header = Header::read(src)?;
    let nbytes = header.nbytes as usize;
    let typesize = header.typesize as usize;
    let blocksize = header.blocksize as usize;
    if dst.len() < nbytes {
        return Err(Error::InvalidArgument(
            "destination buffer smaller than decompressed size".into(),
        ));
    }
    if (header.cbytes as usize) > src.len() {
        return Err(Error::CorruptInput("cbytes exceeds source length".into()));
    }

    let layout = BlockLayout::new(nbytes, blocksize);
    let filter = filter::from_flags(header.flags);
    let header_len = crate::constants::BLOSC_MIN_HEADER_LENGTH;
    let ranges = block_byte_ranges(src, header_len, &layout, header.cbytes as usize)?;

    if filter == Filter::Delta {
        // Each block's reference is the tail of the block decoded just
        // before it, so delta streams decode strictly in order. Block 0
        // seeds from `initial_reference` when the stream was compressed
        // against one, zero otherwise.
        let mut reference = match initial_reference {
            Some(r) if r.len() >= typesize => r[r.len() - typesize..].to_vec(),
            _ => vec![0u8; typesize.max(1)],
        };
        for i in 0..layout.nblocks {
            let (start, len) = layout.block_range(i);
            let (lo, hi) = ranges[i];
            let framed = src.get(lo..hi).ok_or_else(|| {
                Error::CorruptInput("block offset out of bounds".into())
            })?;
            let decoded =
                crate::block::decode_block(framed, len, filter, typesize, &reference)?;
            dst[start..start + len].copy_from_slice(&decoded);
            if len >= typesize {
                reference.copy_from_slice(&decoded[len - typesize..len]);
            }
        }
        return Ok(nbytes);
    }

    let zero_reference = vec![0u8; typesize.max(1)];
    let decoded = scheduler.run_blocks(layout.nblocks, {
        let src_owned: std::sync::Arc<[u8]> = src.to_vec().into();
        let ranges = ranges.clone();
        let zero_reference = zero_reference.clone();
        move |i| {
            let (_, len) = layout.block_range(i);
            let (lo, hi) = ranges[i];
            let framed = src_owned.get(lo..hi).ok_or_else(|| {
                Error::CorruptInput("block offset out of bounds".into())
            })?;
            crate::block::decode_block(framed, len, filter, typesize, &zero_reference)
        }
    })?;

    for (i, block_bytes) in decoded.iter().enumerate() {
        let (start, len) = layout.block_range(i);
        if block_bytes.len() != len {
            return Err(Error::CorruptInput("decoded block has wrong length".into()));
        }
        dst[start..start + len].copy_from_slice(block_bytes);
    }
    Ok(nbytes)
}

fn getitem_with(src: &[u8], start: usize, nitems: usize, dst: &mut [u8]) -> Result<usize> {
    let header = Header::read(src)?;
    let nbytes = header.nbytes as usize;
    let typesize = header.typesize as usize;
    let blocksize = header.blocksize as usize;
    let filter = filter::from_flags(header.flags);

    let byte_start = start * typesize;
    let byte_len = nitems * typesize;
    if byte_start + byte_len > nbytes {
        return Err(Error::InvalidArgument(
            "getitem range exceeds decompressed length".into(),
        ));
    }
    if dst.len() < byte_len {
        return Err(Error::InvalidArgument(
            "destination buffer smaller than requested range".into(),
        ));
    }

    let layout = BlockLayout::new(nbytes, blocksize);
    let header_len = crate::constants::BLOSC_MIN_HEADER_LENGTH;
    let ranges = block_byte_ranges(src, header_len, &layout, header.cbytes as usize)?;

    let out = &mut dst[..byte_len];
    let mut reference = vec![0u8; typesize.max(1)];
    let covering = layout.blocks_covering(byte_start, byte_len);
    // Delta needs every predecessor decoded in order to rebuild the
    // reference chain even when only a slice of the output is wanted.
    let first_needed = if filter == Filter::Delta { 0 } else { covering.start };
    for i in first_needed..covering.end {
        let (block_start, block_len) = layout.block_range(i);
        let (lo, hi) = ranges[i];
        let framed = src
            .get(lo..hi)
            .ok_or_else(|| Error::CorruptInput("block offset out of bounds".into()))?;
        let decoded = crate::block::decode_block(framed, block_len, filter, typesize, &reference)?;
        if filter == Filter::Delta && block_len >= typesize {
            reference.copy_from_slice(&decoded[block_len - typesize..block_len]);
        }
        if i >= covering.start {
            let lo_overlap = block_start.max(byte_start);
            let hi_overlap = (block_start + block_len).min(byte_start + byte_len);
            if lo_overlap < hi_overlap {
                out[lo_overlap - byte_start..hi_overlap - byte_start]
                    .copy_from_slice(&decoded[lo_overlap - block_start..hi_overlap - block_start]);
            }
        }
    }
    Ok(byte_len)
}

/// Reference element for each block's delta filter at *compress* time: pure
/// index arithmetic over the original buffer, so it never depends on which
/// worker finishes first (§5). `initial_reference` seeds block 0, letting a
/// caller (e.g. a super-chunk appending a chunk after another one) delta
/// against bytes outside `src` entirely; it falls back to zero when absent.
fn delta_references(
    src: &[u8],
    layout: &BlockLayout,
    typesize: usize,
    filter: Filter,
    initial_reference: Option<&[u8]>,
) -> std::sync::Arc<Vec<Vec<u8>>> {
    let mut refs = Vec::with_capacity(layout.nblocks);
    for i in 0..layout.nblocks {
        if filter != Filter::Delta {
            refs.push(vec![0u8; typesize.max(1)]);
            continue;
        }
        if i == 0 {
            let reference = match initial_reference {
                Some(r) if r.len() >= typesize => r[r.len() - typesize..].to_vec(),
                _ => vec![0u8; typesize.max(1)],
            };
            refs.push(reference);
            continue;
        }
        let (prev_start, prev_len) = layout.block_range(i - 1);
        let tail_start = prev_start + prev_len - typesize;
        refs.push(src[tail_start..tail_start + typesize].to_vec());
    }
    std::sync::Arc::new(refs)
}

/// Resolves each block's `(start, end)` byte range in `src`, bounds-checked
/// against `cbytes` so a corrupted offset table can never drive a slice
/// past the end of the source (§8 scenario: corrupted offset table).
fn block_byte_ranges(
    src: &[u8],
    header_len: usize,
    layout: &BlockLayout,
    cbytes: usize,
) -> Result<Vec<(usize, usize)>> {
    let mut starts = Vec::with_capacity(layout.nblocks);
    for i in 0..layout.nblocks {
        let offset = container::read_offset(src, header_len, i)?;
        if offset < 0 || offset as usize > cbytes {
            return Err(Error::CorruptInput("block offset out of bounds".into()));
        }
        starts.push(offset as usize);
    }
    let mut ranges = Vec::with_capacity(layout.nblocks);
    for i in 0..layout.nblocks {
        let lo = starts[i];
        let hi = if i + 1 < layout.nblocks {
            starts[i + 1]
        } else {
            cbytes
        };
        if hi < lo || hi > cbytes {
            return Err(Error::CorruptInput("block offset out of bounds".into()));
        }
        ranges.push((lo, hi));
    }
    Ok(ranges)
}

/// Process-wide defaults for the legacy global API (§6): one codec, one
/// forced blocksize, one thread pool, guarded by a single mutex per call.
struct GlobalState {
    codec_id: CodecId,
    blocksize: usize,
    scheduler: Scheduler,
}

fn global() -> &'static Mutex<GlobalState> {
    static STATE: OnceLock<Mutex<GlobalState>> = OnceLock::new();
    STATE.get_or_init(|| {
        Mutex::new(GlobalState {
            codec_id: BLOSC_BLOSCLZ,
            blocksize: 0,
            scheduler: Scheduler::new(crate::scheduler::default_nthreads()),
        })
    })
}

/// `blosc_init`: no-op beyond ensuring the global state exists (C-blosc
/// historically needed this to create its mutexes; kept for API parity).
pub fn init() {
    let _ = global();
}

/// `blosc_destroy` / `blosc_free_resources`: tears down and recreates the
/// global thread pool, releasing its worker threads.
pub fn destroy() {
    let mut state = global().lock().unwrap();
    state.scheduler = Scheduler::new(1);
}

pub fn free_resources() -> i32 {
    destroy();
    0
}

pub fn set_nthreads(n: i32) -> i32 {
    if n <= 0 {
        return Error::InvalidArgument("nthreads must be positive".into()).as_legacy_code();
    }
    let mut state = global().lock().unwrap();
    state.scheduler.set_nthreads(n as usize) as i32
}

pub fn set_compressor(name: &str) -> i32 {
    match codec::by_name(name) {
        Ok(id) => {
            let mut state = global().lock().unwrap();
            let previous = state.codec_id;
            state.codec_id = id;
            previous as i32
        }
        Err(e) => e.as_legacy_code(),
    }
}

pub fn set_blocksize(n: usize) {
    let mut state = global().lock().unwrap();
    state.blocksize = n;
}

/// `blosc_compress`: compresses using the current global codec/blocksize,
/// writing into `dst` and returning the number of bytes written (`Ok(0)` if
/// `dst` doesn't fit the result).
pub fn compress(
    clevel: i32,
    filter: Filter,
    typesize: usize,
    src: &[u8],
    dst: &mut [u8],
) -> Result<usize> {
    let state = global().lock().unwrap();
    let compressed = compress_with(
        src,
        typesize,
        clevel,
        filter,
        state.codec_id,
        state.blocksize,
        None,
        &state.scheduler,
    )?;
    if compressed.len() > dst.len() {
        return Ok(0);
    }
    dst[..compressed.len()].copy_from_slice(&compressed);
    Ok(compressed.len())
}

/// `blosc_decompress`.
pub fn decompress(src: &[u8], dst: &mut [u8]) -> Result<usize> {
    let state = global().lock().unwrap();
    decompress_with(src, None, dst, &state.scheduler)
}

/// `blosc_getitem`.
pub fn getitem(src: &[u8], start: usize, nitems: usize, dst: &mut [u8]) -> Result<usize> {
    getitem_with(src, start, nitems, dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i % 256) as u8).collect()
    }

    /// Compresses `src` into a freshly sized buffer, trimmed to the bytes
    /// actually written, for tests that don't care about dst reuse.
    fn compress_owned(ctx: &Context, src: &[u8]) -> Vec<u8> {
        let mut dst = vec![0u8; ctx.max_compressed_len(src.len()).unwrap()];
        let n = ctx.compress(src, &mut dst).unwrap();
        dst.truncate(n);
        dst
    }

    #[test]
    fn compress_decompress_roundtrip_no_filter() {
        let ctx = Context::new(4, 5, Filter::None, "blosclz", 0, 1).unwrap();
        let src = ramp(16_384);
        let compressed = compress_owned(&ctx, &src);
        let mut dst = vec![0u8; src.len()];
        let n = ctx.decompress(&compressed, &mut dst).unwrap();
        assert_eq!(n, src.len());
        assert_eq!(dst, src);
    }

    #[test]
    fn compress_decompress_roundtrip_with_shuffle_multithreaded() {
        let ctx = Context::new(4, 5, Filter::Shuffle, "blosclz", 1024, 4).unwrap();
        let src: Vec<u8> = (0..20_000u32).flat_map(|i| i.to_le_bytes()).collect();
        let compressed = compress_owned(&ctx, &src);
        let mut dst = vec![0u8; src.len()];
        ctx.decompress(&compressed, &mut dst).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn compress_decompress_roundtrip_with_delta() {
        let ctx = Context::new(4, 5, Filter::Delta, "blosclz", 256, 4).unwrap();
        let src: Vec<u8> = (0..5000u32).flat_map(|i| i.to_le_bytes()).collect();
        let compressed = compress_owned(&ctx, &src);
        let mut dst = vec![0u8; src.len()];
        ctx.decompress(&compressed, &mut dst).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn thread_count_does_not_change_decompressed_content() {
        let src: Vec<u8> = (0..50_000u32).flat_map(|i| i.to_le_bytes()).collect();
        let encoder = Context::new(4, 5, Filter::Shuffle, "zstd", 0, 4).unwrap();
        let compressed = compress_owned(&encoder, &src);

        for nthreads in [1, 2, 8] {
            let ctx = Context::new(4, 5, Filter::Shuffle, "zstd", 0, nthreads).unwrap();
            let mut dst = vec![0u8; src.len()];
            ctx.decompress(&compressed, &mut dst).unwrap();
            assert_eq!(dst, src, "mismatch at nthreads={nthreads}");
        }
    }

    #[test]
    fn small_buffer_falls_back_to_whole_memcpy() {
        let ctx = Context::new(4, 5, Filter::Shuffle, "blosclz", 0, 1).unwrap();
        let src = ramp(8); // well under typesize*100
        let compressed = compress_owned(&ctx, &src);
        let (_, flags) = container::cbuffer_metainfo(&compressed).unwrap();
        assert_ne!(flags & crate::constants::BLOSC_MEMCPYED, 0);
        let mut dst = vec![0u8; src.len()];
        ctx.decompress(&compressed, &mut dst).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn getitem_returns_the_requested_slice() {
        let ctx = Context::new(4, 5, Filter::Shuffle, "blosclz", 0, 1).unwrap();
        let src: Vec<u8> = (0..1024u32).flat_map(|i| i.to_le_bytes()).collect();
        let compressed = compress_owned(&ctx, &src);

        let mut got = vec![0u8; 40];
        let n = ctx.getitem(&compressed, 100, 10, &mut got).unwrap();
        assert_eq!(n, 40);
        assert_eq!(got, &src[400..440]);
    }

    #[test]
    fn compress_reports_zero_when_destination_too_small() {
        let ctx = Context::new(4, 5, Filter::None, "blosclz", 0, 1).unwrap();
        let src = ramp(4096);
        let mut dst = vec![0u8; 4];
        assert_eq!(ctx.compress(&src, &mut dst).unwrap(), 0);
    }

    #[test]
    fn decompress_rejects_undersized_destination() {
        let ctx = Context::new(4, 5, Filter::None, "blosclz", 0, 1).unwrap();
        let src = ramp(4096);
        let compressed = compress_owned(&ctx, &src);
        let mut dst = vec![0u8; 10];
        assert!(ctx.decompress(&compressed, &mut dst).is_err());
    }

    #[test]
    fn corrupted_offset_table_errors_without_panicking() {
        let ctx = Context::new(4, 5, Filter::None, "blosclz", 0, 1).unwrap();
        let src = ramp(4096);
        let mut compressed = compress_owned(&ctx, &src);
        // Corrupt the first offset entry to point past cbytes.
        let header_len = crate::constants::BLOSC_MIN_HEADER_LENGTH;
        let bogus = (compressed.len() as i32) + 10_000;
        compressed[header_len..header_len + 4].copy_from_slice(&bogus.to_le_bytes());
        let mut dst = vec![0u8; src.len()];
        assert!(ctx.decompress(&compressed, &mut dst).is_err());
    }
}
