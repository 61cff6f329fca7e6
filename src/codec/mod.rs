//! Codec registry (C1): a uniform `compress`/`decompress` contract over the
//! real third-party compressor crates, resolved once per call into a
//! `&dyn Codec` rather than matched by string on the block-processing hot
//! path.

mod blosclz;

use crate::constants::{
    BLOSC_BLOSCLZ, BLOSC_BLOSCLZ_COMPNAME, BLOSC_BLOSCLZ_LIB, BLOSC_LZ4, BLOSC_LZ4HC,
    BLOSC_LZ4HC_COMPNAME, BLOSC_LZ4_COMPNAME, BLOSC_LZ4_LIB, BLOSC_SNAPPY, BLOSC_SNAPPY_COMPNAME,
    BLOSC_SNAPPY_LIB, BLOSC_ZLIB, BLOSC_ZLIB_COMPNAME, BLOSC_ZLIB_LIB, BLOSC_ZSTD,
    BLOSC_ZSTD_COMPNAME, BLOSC_ZSTD_LIB,
};
use crate::error::{Error, Result};

/// Selector used at compression time (distinguishes LZ4 from LZ4HC, etc).
pub type CodecId = u8;
/// Identity stored in the wire format; decompression only needs this (§4.1).
pub type LibraryId = u8;

/// A resolved codec adapter. `compress` returning `Ok(0)` means "didn't fit
/// in `dst`" (§4.1) — that is not an error, the caller falls back to memcpy.
pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;
    fn library_id(&self) -> LibraryId;
    fn compress(&self, clevel: i32, src: &[u8], dst: &mut [u8]) -> Result<usize>;
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize>;
}

struct BloscLz;
impl Codec for BloscLz {
    fn name(&self) -> &'static str {
        BLOSC_BLOSCLZ_COMPNAME
    }
    fn library_id(&self) -> LibraryId {
        BLOSC_BLOSCLZ_LIB
    }
    fn compress(&self, clevel: i32, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        Ok(blosclz::compress(clevel, src, dst))
    }
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let n = blosclz::decompress(src, dst);
        if n == 0 && !src.is_empty() {
            return Err(Error::CorruptInput("blosclz: decompress failed".into()));
        }
        Ok(n)
    }
}

/// LZ4 and LZ4HC. `lz4_flex` has no distinct high-compression mode, so both
/// compress identically; they differ only in name and are indistinguishable
/// once decoded (see DESIGN.md).
struct Lz4 {
    high_compression: bool,
}
impl Codec for Lz4 {
    fn name(&self) -> &'static str {
        if self.high_compression {
            BLOSC_LZ4HC_COMPNAME
        } else {
            BLOSC_LZ4_COMPNAME
        }
    }
    fn library_id(&self) -> LibraryId {
        BLOSC_LZ4_LIB
    }
    fn compress(&self, _clevel: i32, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        match lz4_flex::block::compress_into(src, dst) {
            Ok(n) => Ok(n),
            Err(lz4_flex::block::CompressError::OutputTooSmall { .. }) => Ok(0),
            Err(e) => Err(Error::CodecFailure(format!("lz4: {e}"))),
        }
    }
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        lz4_flex::block::decompress_into(src, dst)
            .map_err(|e| Error::CorruptInput(format!("lz4: {e}")))
    }
}

struct Zlib;
impl Codec for Zlib {
    fn name(&self) -> &'static str {
        BLOSC_ZLIB_COMPNAME
    }
    fn library_id(&self) -> LibraryId {
        BLOSC_ZLIB_LIB
    }
    fn compress(&self, clevel: i32, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let level = flate2::Compression::new(clevel.clamp(0, 9) as u32);
        let mut compressor = flate2::Compress::new(level, true);
        match compressor.compress(src, dst, flate2::FlushCompress::Finish) {
            Ok(flate2::Status::StreamEnd) => Ok(compressor.total_out() as usize),
            Ok(_) => Ok(0), // ran out of room before finishing
            Err(e) => Err(Error::CodecFailure(format!("zlib: {e}"))),
        }
    }
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let mut decompressor = flate2::Decompress::new(true);
        match decompressor.decompress(src, dst, flate2::FlushDecompress::Finish) {
            Ok(flate2::Status::StreamEnd) => Ok(decompressor.total_out() as usize),
            Ok(_) => Err(Error::CorruptInput("zlib: truncated stream".into())),
            Err(e) => Err(Error::CorruptInput(format!("zlib: {e}"))),
        }
    }
}

struct Zstd;
impl Codec for Zstd {
    fn name(&self) -> &'static str {
        BLOSC_ZSTD_COMPNAME
    }
    fn library_id(&self) -> LibraryId {
        BLOSC_ZSTD_LIB
    }
    fn compress(&self, clevel: i32, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let level = (clevel.clamp(0, 9) * 2 + 1).clamp(1, 22);
        match zstd::bulk::compress_to_buffer(src, dst, level) {
            Ok(n) => Ok(n),
            Err(_) => Ok(0), // destination too small
        }
    }
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        zstd::bulk::decompress_to_buffer(src, dst)
            .map_err(|e| Error::CorruptInput(format!("zstd: {e}")))
    }
}

struct Snappy;
impl Codec for Snappy {
    fn name(&self) -> &'static str {
        BLOSC_SNAPPY_COMPNAME
    }
    fn library_id(&self) -> LibraryId {
        BLOSC_SNAPPY_LIB
    }
    fn compress(&self, _clevel: i32, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let mut encoder = snap::raw::Encoder::new();
        match encoder.compress(src, dst) {
            Ok(n) => Ok(n),
            Err(snap::Error::BufferTooSmall { .. }) => Ok(0),
            Err(e) => Err(Error::CodecFailure(format!("snappy: {e}"))),
        }
    }
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let mut decoder = snap::raw::Decoder::new();
        decoder
            .decompress(src, dst)
            .map_err(|e| Error::CorruptInput(format!("snappy: {e}")))
    }
}

fn registry() -> &'static [(CodecId, Box<dyn Codec>)] {
    use std::sync::OnceLock;
    static CODECS: OnceLock<Vec<(CodecId, Box<dyn Codec>)>> = OnceLock::new();
    CODECS.get_or_init(|| {
        vec![
            (BLOSC_BLOSCLZ, Box::new(BloscLz) as Box<dyn Codec>),
            (BLOSC_LZ4, Box::new(Lz4 { high_compression: false })),
            (BLOSC_LZ4HC, Box::new(Lz4 { high_compression: true })),
            (BLOSC_SNAPPY, Box::new(Snappy)),
            (BLOSC_ZLIB, Box::new(Zlib)),
            (BLOSC_ZSTD, Box::new(Zstd)),
        ]
    })
}

/// Resolves a compression-time codec id, e.g. to distinguish LZ4 from LZ4HC.
pub fn by_id(id: CodecId) -> Result<&'static dyn Codec> {
    registry()
        .iter()
        .find(|(cid, _)| *cid == id)
        .map(|(_, c)| c.as_ref())
        .ok_or_else(|| Error::CodecUnavailable(format!("unknown codec id {id}")))
}

/// Resolves a wire-format library id for decompression. Any codec id that
/// shares the library (e.g. LZ4 and LZ4HC) decompresses identically, so the
/// first match is used.
pub fn by_library_id(lib: LibraryId) -> Result<&'static dyn Codec> {
    registry()
        .iter()
        .find(|(_, c)| c.library_id() == lib)
        .map(|(_, c)| c.as_ref())
        .ok_or_else(|| Error::CodecUnavailable(format!("unknown library id {lib}")))
}

fn name_to_id(name: &str) -> Option<CodecId> {
    match name {
        BLOSC_BLOSCLZ_COMPNAME => Some(BLOSC_BLOSCLZ),
        BLOSC_LZ4_COMPNAME => Some(BLOSC_LZ4),
        BLOSC_LZ4HC_COMPNAME => Some(BLOSC_LZ4HC),
        BLOSC_SNAPPY_COMPNAME => Some(BLOSC_SNAPPY),
        BLOSC_ZLIB_COMPNAME => Some(BLOSC_ZLIB),
        BLOSC_ZSTD_COMPNAME => Some(BLOSC_ZSTD),
        _ => None,
    }
}

/// `codec_by_name` (§4.1 / §6).
pub fn by_name(name: &str) -> Result<CodecId> {
    name_to_id(name).ok_or_else(|| Error::CodecUnavailable(format!("unknown codec {name}")))
}

/// `codec_by_id`: maps a codec id back to its canonical name.
pub fn name_by_id(id: CodecId) -> Result<&'static str> {
    by_id(id).map(Codec::name)
}

/// `list_available`: comma-joined names of every compiled-in codec.
pub fn list_available() -> &'static str {
    "blosclz,lz4,lz4hc,snappy,zlib,zstd"
}

/// `compcode_to_compname`: codec id to canonical name (alias of [`name_by_id`]
/// under the spec's external-interface name).
pub fn compcode_to_compname(id: CodecId) -> Result<&'static str> {
    name_by_id(id)
}

/// `compname_to_compcode`: canonical name to codec id (alias of [`by_name`]
/// under the spec's external-interface name).
pub fn compname_to_compcode(name: &str) -> Result<CodecId> {
    by_name(name)
}

/// `get_complib_info`: the underlying compressor library's name and version
/// for a codec, e.g. `("zstd", "0.13")`.
pub fn get_complib_info(name: &str) -> Result<(&'static str, &'static str)> {
    let id = by_name(name)?;
    Ok(match id {
        BLOSC_BLOSCLZ => ("BloscLZ", "2.5.1"),
        BLOSC_LZ4 | BLOSC_LZ4HC => ("lz4_flex", "0.12"),
        BLOSC_SNAPPY => ("snap", "1.1"),
        BLOSC_ZLIB => ("flate2", "1.1"),
        BLOSC_ZSTD => ("zstd", "0.13"),
        _ => unreachable!("by_name only returns ids present in the registry"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_registered_codec_round_trips() {
        let src: Vec<u8> = (0..8192).map(|i| (i % 251) as u8).collect();
        for id in [
            BLOSC_BLOSCLZ,
            BLOSC_LZ4,
            BLOSC_LZ4HC,
            BLOSC_SNAPPY,
            BLOSC_ZLIB,
            BLOSC_ZSTD,
        ] {
            let codec = by_id(id).unwrap();
            let mut dst = vec![0u8; src.len() + 512];
            let csize = codec.compress(5, &src, &mut dst).unwrap();
            assert!(csize > 0, "codec {} failed to compress", codec.name());
            let decoder = by_library_id(codec.library_id()).unwrap();
            let mut round = vec![0u8; src.len()];
            let dsize = decoder.decompress(&dst[..csize], &mut round).unwrap();
            assert_eq!(dsize, src.len());
            assert_eq!(round, src, "codec {} round-trip mismatch", codec.name());
        }
    }

    #[test]
    fn name_lookup_round_trips() {
        for name in ["blosclz", "lz4", "lz4hc", "snappy", "zlib", "zstd"] {
            let id = by_name(name).unwrap();
            assert!(name_by_id(id).is_ok());
        }
        assert!(by_name("bogus").is_err());
    }

    #[test]
    fn compcode_compname_round_trip() {
        for name in ["blosclz", "lz4", "lz4hc", "snappy", "zlib", "zstd"] {
            let id = compname_to_compcode(name).unwrap();
            assert_eq!(compcode_to_compname(id).unwrap(), name_by_id(id).unwrap());
        }
        assert!(compname_to_compcode("bogus").is_err());
    }

    #[test]
    fn get_complib_info_every_codec() {
        for name in ["blosclz", "lz4", "lz4hc", "snappy", "zlib", "zstd"] {
            let (complib, version) = get_complib_info(name).unwrap();
            assert!(!complib.is_empty());
            assert!(!version.is_empty());
        }
        assert!(get_complib_info("bogus").is_err());
    }
}
