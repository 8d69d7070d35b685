use criterion::{BenchmarkId, Criterion};
use heapless::Vec;
use picomqtt::network::application::mqtt::codec::{
    decode_remaining_length, encode_remaining_length,
};
use std::hint::black_box;

pub fn bench_remaining_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("remaining_length");
    for len in [0usize, 127, 16_383, 2_097_151, 268_435_455] {
        group.bench_with_input(BenchmarkId::new("encode", len), &len, |b, &len| {
            b.iter(|| {
                let mut buf: Vec<u8, 4> = Vec::new();
                encode_remaining_length(&mut buf, black_box(len)).expect("Failed to encode");
                buf
            })
        });

        let mut encoded: Vec<u8, 4> = Vec::new();
        encode_remaining_length(&mut encoded, len).expect("Failed to encode");
        group.bench_with_input(BenchmarkId::new("decode", len), &encoded, |b, encoded| {
            b.iter(|| decode_remaining_length(black_box(encoded)).expect("Failed to decode"))
        });
    }
    group.finish();
}
