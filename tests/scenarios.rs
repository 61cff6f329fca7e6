//! End-to-end scenarios exercising the public API surface the way a caller
//! outside this crate would: build a `Context`, compress, decompress,
//! `getitem`, and check the container accessors agree with a full parse.

use blosc_rs::container::cbuffer_sizes;
use blosc_rs::{Context, Filter};

fn u32_ramp(n: u32) -> Vec<u8> {
    (0..n).flat_map(|i| i.to_le_bytes()).collect()
}

fn f64_ramp(n: u64) -> Vec<u8> {
    (0..n).flat_map(|i| (i as f64).to_le_bytes()).collect()
}

fn compress_owned(ctx: &Context, src: &[u8]) -> Vec<u8> {
    let mut dst = vec![0u8; ctx.max_compressed_len(src.len()).unwrap()];
    let n = ctx.compress(src, &mut dst).unwrap();
    dst.truncate(n);
    dst
}

#[test]
fn random_buffers_across_sizes_and_typesizes_round_trip() {
    use rand::Rng;
    let mut rng = rand::thread_rng();

    let typesizes = [1usize, 2, 4, 8];
    let filters = [Filter::None, Filter::Shuffle, Filter::BitShuffle, Filter::Delta];

    for _ in 0..20 {
        let typesize = typesizes[rng.gen_range(0..typesizes.len())];
        let nelems = rng.gen_range(0..500);
        let filter = filters[rng.gen_range(0..filters.len())];
        let src: Vec<u8> = (0..nelems * typesize).map(|_| rng.gen::<u8>()).collect();

        let ctx = Context::new(typesize, rng.gen_range(0..=9), filter, "blosclz", 0, 2).unwrap();
        let compressed = compress_owned(&ctx, &src);
        let mut dst = vec![0u8; src.len()];
        ctx.decompress(&compressed, &mut dst).unwrap();
        assert_eq!(dst, src, "typesize={typesize} nelems={nelems} filter={filter:?}");
    }
}

#[test]
fn random_byte_flips_in_a_compressed_block_never_panic() {
    use rand::Rng;
    let mut rng = rand::thread_rng();

    let src: Vec<u8> = (0..20_000u32).flat_map(|i| i.to_le_bytes()).collect();
    let ctx = Context::new(4, 5, Filter::Shuffle, "blosclz", 0, 1).unwrap();
    let compressed = compress_owned(&ctx, &src);

    for _ in 0..50 {
        let mut corrupted = compressed.clone();
        let idx = rng.gen_range(16..corrupted.len());
        corrupted[idx] ^= 0xFF;
        let mut dst = vec![0u8; src.len()];
        // Must never panic; either it errors or it happens to still decode
        // (flipped a byte that round-trips harmlessly through the codec).
        let _ = ctx.decompress(&corrupted, &mut dst);
    }
}

#[test]
fn scenario_small_uint32_stream_compresses_and_round_trips() {
    let src = u32_ramp(256); // 1024 bytes
    let ctx = Context::new(4, 5, Filter::Shuffle, "blosclz", 0, 1).unwrap();

    let compressed = compress_owned(&ctx, &src);
    assert!(compressed.len() < 200, "got {} bytes", compressed.len());

    let mut dst = vec![0u8; src.len()];
    ctx.decompress(&compressed, &mut dst).unwrap();
    assert_eq!(dst, src);
}

#[test]
fn scenario_getitem_matches_a_slice_of_the_original() {
    let src = u32_ramp(256);
    let ctx = Context::new(4, 5, Filter::Shuffle, "blosclz", 0, 1).unwrap();
    let compressed = compress_owned(&ctx, &src);

    let mut got = vec![0u8; 40];
    let n = ctx.getitem(&compressed, 100, 10, &mut got).unwrap();
    assert_eq!(n, 40);
    assert_eq!(got, &src[400..440]);
}

#[test]
fn scenario_corrupted_offset_table_errors_and_never_touches_dst() {
    let src = u32_ramp(2048);
    let ctx = Context::new(4, 5, Filter::Shuffle, "blosclz", 0, 1).unwrap();
    let mut compressed = compress_owned(&ctx, &src);

    let header_len = 16;
    let bogus = compressed.len() as i32 + 1_000_000;
    compressed[header_len..header_len + 4].copy_from_slice(&bogus.to_le_bytes());

    let sentinel = vec![0xAAu8; src.len()];
    let mut dst = sentinel.clone();
    let result = ctx.decompress(&compressed, &mut dst);
    assert!(result.is_err());
    assert_eq!(dst, sentinel, "destination must be untouched on corruption");
}

#[test]
fn scenario_large_float64_ramp_cross_thread_count_determinism() {
    let src = f64_ramp(256_000); // 2 MiB of float64
    let encoder = Context::new(8, 3, Filter::BitShuffle, "zstd", 0, 4).unwrap();
    let compressed = compress_owned(&encoder, &src);

    let decoder = Context::new(8, 3, Filter::BitShuffle, "zstd", 0, 1).unwrap();
    let mut dst = vec![0u8; src.len()];
    decoder.decompress(&compressed, &mut dst).unwrap();
    assert_eq!(dst, src);
}

#[test]
fn scenario_truncated_stream_is_rejected() {
    let src = u32_ramp(4096);
    let ctx = Context::new(4, 5, Filter::Shuffle, "blosclz", 0, 1).unwrap();
    let compressed = compress_owned(&ctx, &src);
    let truncated = &compressed[..compressed.len() / 2];

    let mut dst = vec![0u8; src.len()];
    assert!(ctx.decompress(truncated, &mut dst).is_err());
}

#[test]
fn scenario_oversized_nbytes_field_is_rejected_not_overrun() {
    let src = u32_ramp(64);
    let ctx = Context::new(4, 5, Filter::None, "blosclz", 0, 1).unwrap();
    let mut compressed = compress_owned(&ctx, &src);
    // nbytes lives at header bytes [4..8].
    let huge: u32 = 0xFFFF_FFF0;
    compressed[4..8].copy_from_slice(&huge.to_le_bytes());

    let mut dst = vec![0u8; src.len()];
    assert!(ctx.decompress(&compressed, &mut dst).is_err());
}

#[test]
fn cbuffer_sizes_on_header_prefix_matches_full_parse() {
    let src = u32_ramp(10_000);
    let ctx = Context::new(4, 7, Filter::Shuffle, "zstd", 0, 2).unwrap();
    let compressed = compress_owned(&ctx, &src);

    let (nbytes, cbytes, blocksize) = cbuffer_sizes(&compressed[..16]).unwrap();
    assert_eq!(nbytes, src.len());
    assert_eq!(cbytes, compressed.len());
    assert!(blocksize > 0);
}

#[test]
fn every_codec_filter_typesize_combination_round_trips() {
    let codecs = ["blosclz", "lz4", "lz4hc", "snappy", "zlib", "zstd"];
    let filters = [Filter::None, Filter::Shuffle, Filter::BitShuffle, Filter::Delta];
    let typesizes = [1usize, 2, 4, 8];

    for &codec in &codecs {
        for &filter in &filters {
            for &typesize in &typesizes {
                let nelems = 2048 / typesize.max(1);
                let src: Vec<u8> = (0..nelems * typesize).map(|i| (i % 251) as u8).collect();
                let ctx = Context::new(typesize, 5, filter, codec, 0, 2).unwrap();
                let compressed = compress_owned(&ctx, &src);
                let mut dst = vec![0u8; src.len()];
                ctx.decompress(&compressed, &mut dst).unwrap();
                assert_eq!(
                    dst, src,
                    "mismatch for codec={codec} filter={filter:?} typesize={typesize}"
                );
            }
        }
    }
}

#[test]
fn concurrent_contexts_on_disjoint_buffers_match_serial_results() {
    use std::thread;

    let buffers: Vec<Vec<u8>> = (0..8).map(|i| u32_ramp(1000 + i * 37)).collect();
    let handles: Vec<_> = buffers
        .iter()
        .cloned()
        .map(|buf| {
            thread::spawn(move || {
                let ctx = Context::new(4, 5, Filter::Shuffle, "blosclz", 0, 1).unwrap();
                let compressed = compress_owned(&ctx, &buf);
                let mut dst = vec![0u8; buf.len()];
                ctx.decompress(&compressed, &mut dst).unwrap();
                (buf, dst)
            })
        })
        .collect();

    for h in handles {
        let (src, dst) = h.join().unwrap();
        assert_eq!(src, dst);
    }
}
