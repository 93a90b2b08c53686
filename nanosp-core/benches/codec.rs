//! Framing throughput
//!
//! Measures encode and decode of a message with an SP header entry, the
//! common case for request/reply traffic.

use bytes::{Bytes, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nanosp_core::codec::{encode_message, MessageDecoder};
use nanosp_core::message::{Ancillary, Message};

const MESSAGE_SIZES: &[usize] = &[64, 1024, 16 * 1024];

fn request(size: usize) -> Message {
    Message::from_parts(
        Bytes::from(vec![0xAB; size]),
        vec![Ancillary::sp_header(Bytes::from_static(&[0x80, 0, 0, 1]))],
    )
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/encode");
    for &size in MESSAGE_SIZES {
        let msg = request(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &msg, |b, msg| {
            let mut buf = BytesMut::with_capacity(size + 64);
            b.iter(|| {
                buf.clear();
                encode_message(black_box(msg), &mut buf);
            });
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/decode");
    for &size in MESSAGE_SIZES {
        let mut wire = BytesMut::new();
        encode_message(&request(size), &mut wire);
        let wire = wire.freeze();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &wire, |b, wire| {
            let mut decoder = MessageDecoder::new(None);
            b.iter(|| {
                let mut buf = BytesMut::from(&wire[..]);
                black_box(decoder.decode(&mut buf).unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
