//! Format constants. Mirrors the subset of `c-blosc2/include/blosc2.h` this
//! crate's container format actually uses.

/// Current container format version (byte 0 of the header).
pub const BLOSC_VERSION_FORMAT: u8 = 2;

/// Minimum header length: version, versionlz, flags, typesize, nbytes,
/// blocksize, cbytes.
pub const BLOSC_MIN_HEADER_LENGTH: usize = 16;

pub const INT_MAX: usize = i32::MAX as usize;

/// Maximum source buffer size to be compressed.
pub const BLOSC_MAX_BUFFERSIZE: usize = INT_MAX - BLOSC_MIN_HEADER_LENGTH;

/// Maximum typesize; cannot be larger than 255 (stored in one byte).
pub const BLOSC_MAX_TYPESIZE: usize = u8::MAX as usize;

pub const BLOSC_MIN_BUFFERSIZE: usize = 32;

/// Blocksize caps for the auto-heuristic, keyed by clevel tier (§4.4).
pub const BLOCKSIZE_CAP_LOW: usize = 64 * 1024;
pub const BLOCKSIZE_CAP_MID: usize = 256 * 1024;
pub const BLOCKSIZE_CAP_HIGH: usize = 1024 * 1024;

/// Header flag bits (header byte 2).
pub const BLOSC_DOSHUFFLE: u8 = 0x1;
pub const BLOSC_MEMCPYED: u8 = 0x2;
pub const BLOSC_DOBITSHUFFLE: u8 = 0x4;
pub const BLOSC_DODELTA: u8 = 0x8;

/// Codec ids (fixed per §4.1).
pub const BLOSC_BLOSCLZ: u8 = 0;
pub const BLOSC_LZ4: u8 = 1;
pub const BLOSC_LZ4HC: u8 = 2;
pub const BLOSC_SNAPPY: u8 = 3;
pub const BLOSC_ZLIB: u8 = 4;
pub const BLOSC_ZSTD: u8 = 5;

/// Library ids (stored in the per-block frame, §6): LZ4 and LZ4HC decode
/// identically and so share one library id; the codec id above only matters
/// at compression time.
pub const BLOSC_BLOSCLZ_LIB: u8 = 0;
pub const BLOSC_LZ4_LIB: u8 = 1;
pub const BLOSC_SNAPPY_LIB: u8 = 2;
pub const BLOSC_ZLIB_LIB: u8 = 3;
pub const BLOSC_ZSTD_LIB: u8 = 4;

pub const BLOSC_BLOSCLZ_COMPNAME: &str = "blosclz";
pub const BLOSC_LZ4_COMPNAME: &str = "lz4";
pub const BLOSC_LZ4HC_COMPNAME: &str = "lz4hc";
pub const BLOSC_SNAPPY_COMPNAME: &str = "snappy";
pub const BLOSC_ZLIB_COMPNAME: &str = "zlib";
pub const BLOSC_ZSTD_COMPNAME: &str = "zstd";

/// Memcpy-block heuristic threshold: below this, every block is stored raw
/// rather than attempting compression at all. Inferred from upstream, kept
/// verbatim so streams produced by this crate stay self-consistent.
pub const MEMCPY_NBYTES_PER_TYPESIZE: usize = 100;

/// Codec id is packed into the top 3 bits of the per-block uint32 length
/// prefix; the remaining 29 bits hold `csize` (§6).
pub const CSIZE_MASK: u32 = (1 << 29) - 1;
pub const CODEC_ID_SHIFT: u32 = 29;
