//! Super-chunk (C9): an in-memory, ordered collection of independently
//! compressed chunks that share one set of compression defaults, plus an
//! optional delta-reference chunk. No file persistence and no pointer
//! graph — chunks are owned outright by the super-chunk that holds them.

use crate::container;
use crate::context::Context;
use crate::error::Result;
use crate::filter::Filter;

/// Owns a sequence of standalone compressed streams. Each stream is a
/// complete container produced by [`Context::compress`] and can be handed to
/// any other context with matching typesize — super-chunks are just
/// bookkeeping on top of the same per-stream format.
pub struct SuperChunk {
    context: Context,
    chunks: Vec<Vec<u8>>,
    delta_ref: Option<Vec<u8>>,
}

impl SuperChunk {
    pub fn new(
        typesize: usize,
        clevel: i32,
        filter: Filter,
        codec_name: &str,
        blocksize: usize,
        nthreads: usize,
    ) -> Result<SuperChunk> {
        Ok(SuperChunk {
            context: Context::new(typesize, clevel, filter, codec_name, blocksize, nthreads)?,
            chunks: Vec::new(),
            delta_ref: None,
        })
    }

    /// Compresses `src` with the shared defaults and appends it, returning
    /// its index. When a delta-reference chunk is set (§4.9), the new
    /// chunk's first block filters against that reference's tail instead of
    /// zero, so it continues the reference's sequence rather than its own.
    pub fn append_chunk(&mut self, src: &[u8]) -> Result<usize> {
        let reference = self.delta_ref()?;
        let mut dst = vec![0u8; self.context.max_compressed_len(src.len())?];
        let n = self
            .context
            .compress_with_reference(src, reference.as_deref(), &mut dst)?;
        dst.truncate(n);
        self.chunks.push(dst);
        Ok(self.chunks.len() - 1)
    }

    /// Replaces the optional delta-reference chunk used by chunks that
    /// filter with [`Filter::Delta`] against external context rather than
    /// their own predecessor block.
    pub fn set_delta_ref(&mut self, src: &[u8]) -> Result<()> {
        let mut dst = vec![0u8; self.context.max_compressed_len(src.len())?];
        let n = self.context.compress(src, &mut dst)?;
        dst.truncate(n);
        self.delta_ref = Some(dst);
        Ok(())
    }

    pub fn delta_ref(&self) -> Result<Option<Vec<u8>>> {
        match &self.delta_ref {
            Some(compressed) => {
                let (nbytes, ..) = container::cbuffer_sizes(compressed)?;
                let mut dst = vec![0u8; nbytes];
                self.context.decompress(compressed, &mut dst)?;
                Ok(Some(dst))
            }
            None => Ok(None),
        }
    }

    pub fn decompress_chunk(&self, index: usize) -> Result<Vec<u8>> {
        let compressed = self.chunks.get(index).ok_or_else(|| {
            crate::error::Error::InvalidArgument(format!("no chunk at index {index}"))
        })?;
        let (nbytes, ..) = container::cbuffer_sizes(compressed)?;
        let mut dst = vec![0u8; nbytes];
        let reference = self.delta_ref()?;
        self.context
            .decompress_with_reference(compressed, reference.as_deref(), &mut dst)?;
        Ok(dst)
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Total decompressed size across every chunk.
    pub fn nbytes(&self) -> Result<usize> {
        let mut total = 0;
        for chunk in &self.chunks {
            let (nbytes, ..) = container::cbuffer_sizes(chunk)?;
            total += nbytes;
        }
        Ok(total)
    }

    /// Total compressed size across every chunk.
    pub fn cbytes(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }
}
