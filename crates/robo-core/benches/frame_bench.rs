//! Criterion benchmarks for Sphero frame extraction.
//!
//! Measures how long the protocol engine takes to cut and decode frames from
//! a burst of location acknowledgements, both as one chunk and as the small
//! fragments a Bluetooth serial link typically delivers.
//!
//! Run with:
//! ```bash
//! cargo bench --package robo-core --bench frame_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use robo_core::protocol::checksum::inverted_sum;
use robo_core::{Command, Protocol, SpheroProtocol};

fn location_frame() -> Vec<u8> {
    let mut f = vec![0xFF, 0xFF, 0x00, 0x10, 0x0B];
    f.extend_from_slice(&[0x00, 0x0A, 0x00, 0x14, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03]);
    let chk = inverted_sum(&f[2..]);
    f.push(chk);
    f
}

fn burst(frames: usize) -> Vec<u8> {
    let one = location_frame();
    one.iter().copied().cycle().take(one.len() * frames).collect()
}

fn bench_decode_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_burst");
    let bytes = burst(64);

    for chunk in [1usize, 8, 20, bytes.len()] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                let mut proto = SpheroProtocol::new();
                let mut count = 0;
                for piece in bytes.chunks(chunk) {
                    count += proto.on_bytes(black_box(piece)).len();
                }
                count
            })
        });
    }

    group.finish();
}

fn bench_encode_commands(c: &mut Criterion) {
    c.bench_function("encode_stop", |b| b.iter(|| black_box(Command::Stop).encode()));
    c.bench_function("encode_get_location", |b| {
        b.iter(|| black_box(Command::GetLocation).encode())
    });
}

criterion_group!(benches, bench_decode_burst, bench_encode_commands);
criterion_main!(benches);
