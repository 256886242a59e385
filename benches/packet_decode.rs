//! Benchmarks for telemetry packet decoding
//!
//! Covers the per-datagram work of the UDP receiver and the live relay path:
//! - Raw 16-byte decode
//! - Hex payload decode
//! - Decode of oversized datagrams (trailing bytes ignored)

use apex_laps::TelemetryPacket;
use apex_laps::test_utils::sample_packets;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_raw_decode(c: &mut Criterion) {
    let buffers: Vec<[u8; 16]> = sample_packets(256).iter().map(TelemetryPacket::to_bytes).collect();

    let mut group = c.benchmark_group("packet_decode");
    group.throughput(Throughput::Elements(buffers.len() as u64));

    group.bench_function("raw_16_bytes", |b| {
        b.iter(|| {
            for buffer in &buffers {
                black_box(TelemetryPacket::decode(black_box(buffer)).expect("valid packet"));
            }
        })
    });

    let oversized: Vec<Vec<u8>> = buffers
        .iter()
        .map(|buffer| {
            let mut bytes = buffer.to_vec();
            bytes.extend_from_slice(&[0xAA; 48]);
            bytes
        })
        .collect();

    group.bench_function("oversized_datagram", |b| {
        b.iter(|| {
            for buffer in &oversized {
                black_box(TelemetryPacket::decode(black_box(buffer)).expect("valid packet"));
            }
        })
    });

    group.finish();
}

fn bench_hex_decode(c: &mut Criterion) {
    let payloads: Vec<String> =
        sample_packets(256).iter().map(|packet| hex::encode(packet.to_bytes())).collect();

    let mut group = c.benchmark_group("packet_decode_hex");
    group.throughput(Throughput::Elements(payloads.len() as u64));

    group.bench_function("relay_payload", |b| {
        b.iter(|| {
            for payload in &payloads {
                black_box(TelemetryPacket::decode_hex(black_box(payload)).expect("valid hex"));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_raw_decode, bench_hex_decode);
criterion_main!(benches);
