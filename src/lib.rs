//! Blocked, shuffled, multi-threaded compression for binary numeric data.
//!
//! A compressed stream is a 16-byte header, a block offset table, and a run
//! of self-describing framed blocks (see [`container`]). Each block is
//! independently filtered ([`filter`]) and compressed ([`codec`]), dispatched
//! across a persistent worker pool ([`scheduler`]) and assembled by
//! [`context`], which also exposes the explicit [`Context`] and the
//! legacy-shaped global API.

pub mod block;
pub mod codec;
pub mod constants;
pub mod container;
pub mod context;
pub mod error;
pub mod filter;
pub mod schunk;
pub mod scheduler;

pub use context::Context;
pub use error::{Error, Result};
pub use filter::Filter;
pub use schunk::SuperChunk;

pub use codec::{
    compcode_to_compname, compname_to_compcode, get_complib_info, list_available as list_compressors,
};
pub use container::{cbuffer_complib, cbuffer_metainfo, cbuffer_sizes, cbuffer_versions};
pub use context::{
    compress, decompress, destroy, free_resources, getitem, init, set_blocksize, set_compressor,
    set_nthreads,
};
