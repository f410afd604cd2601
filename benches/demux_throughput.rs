//! Benchmarks for program stream and TTA demuxing
//!
//! Measures classification plus a full read pass over synthetic files.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mediasplice_demux::{
    container::tta::MAGIC, open_reader, FileStatus, MemorySink, PsConfig, Reader,
};
use std::io::Cursor;

fn pts_bytes(pts: u64) -> [u8; 5] {
    [
        0x21 | (((pts >> 29) & 0x0e) as u8),
        (pts >> 22) as u8,
        (((pts >> 14) & 0xfe) as u8) | 1,
        (pts >> 7) as u8,
        (((pts << 1) & 0xfe) as u8) | 1,
    ]
}

fn pes(id: u8, sub_id: Option<u8>, pts: u64, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![0x81, 0x80, 5];
    body.extend_from_slice(&pts_bytes(pts));
    if let Some(sub_id) = sub_id {
        body.extend_from_slice(&[sub_id, 0x01, 0x00, 0x01]);
    }
    body.extend_from_slice(payload);

    let mut packet = vec![0x00, 0x00, 0x01, id];
    packet.extend_from_slice(&(body.len() as u16).to_be_bytes());
    packet.extend_from_slice(&body);
    packet
}

const PACK_HEADER: [u8; 14] = [
    0x00, 0x00, 0x01, 0xba, 0x44, 0x00, 0x04, 0x00, 0x04, 0x01, 0x01, 0x89, 0xc3, 0xf8,
];

fn mpeg2_sequence() -> Vec<u8> {
    let mut data = vec![
        0x00, 0x00, 0x01, 0xb3, 0x2d, 0x02, 0x40, 0x33, 0xff, 0xff, 0xe0, 0x00,
    ];
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xb5, 0x14, 0x8a, 0x00, 0x01, 0x00, 0x00]);
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x00, 0x0f, 0xff, 0xf8]);
    data
}

fn ac3_frame() -> Vec<u8> {
    let mut data = vec![0x0b, 0x77, 0x00, 0x00, 0x14, 0x40, 0xe1, 0x00];
    data.extend_from_slice(&[0x55; 24]);
    data
}

/// Program stream with `packs` packs of one video and one AC-3 packet each
fn program_stream(packs: usize) -> Vec<u8> {
    let mut data = Vec::new();
    let video_payload = [0x44u8; 2000];
    for i in 0..packs {
        let pts = 180_000 + i as u64 * 3600;
        data.extend_from_slice(&PACK_HEADER);
        if i == 0 {
            let mut first = mpeg2_sequence();
            first.extend_from_slice(&video_payload);
            data.extend(pes(0xe0, None, pts, &first));
        } else {
            data.extend(pes(0xe0, None, pts, &video_payload));
        }
        data.extend(pes(0xbd, Some(0x80), pts, &ac3_frame()));
    }
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xb9]);
    data
}

fn tta_file(frames: usize, frame_len: usize) -> Vec<u8> {
    let sample_rate = 44100u32;
    let frame_samples = (256.0 * f64::from(sample_rate) / 245.0) as u32;
    let mut data = MAGIC.to_vec();
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&2u16.to_le_bytes());
    data.extend_from_slice(&16u16.to_le_bytes());
    data.extend_from_slice(&sample_rate.to_le_bytes());
    data.extend_from_slice(&(frame_samples * frames as u32).to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    for _ in 0..frames {
        data.extend_from_slice(&(frame_len as u32).to_le_bytes());
    }
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend(std::iter::repeat(0xa5).take(frames * frame_len));
    data
}

fn demux_all(data: &[u8]) -> usize {
    let mut reader = open_reader(Cursor::new(data.to_vec()), PsConfig::default()).unwrap();
    let sinks: Vec<MemorySink> = (0..reader.tracks().len()).map(|_| MemorySink::new()).collect();
    for (i, sink) in sinks.iter().enumerate() {
        reader.set_sink(i, Box::new(sink.clone())).unwrap();
    }
    while reader.read().unwrap() == FileStatus::MoreData {}
    reader.finish();
    sinks.iter().map(MemorySink::total_bytes).sum()
}

fn bench_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification");

    for packs in [16usize, 256] {
        let data = program_stream(packs);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("mpeg_ps", packs), &data, |b, data| {
            b.iter(|| {
                let reader = open_reader(Cursor::new(black_box(data).clone()), PsConfig::default())
                    .unwrap();
                black_box(reader.tracks().len())
            });
        });
    }

    group.finish();
}

fn bench_read_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_pass");

    let ps = program_stream(512);
    group.throughput(Throughput::Bytes(ps.len() as u64));
    group.bench_with_input(BenchmarkId::new("mpeg_ps", "512_packs"), &ps, |b, data| {
        b.iter(|| demux_all(black_box(data)));
    });

    let tta = tta_file(256, 4096);
    group.throughput(Throughput::Bytes(tta.len() as u64));
    group.bench_with_input(BenchmarkId::new("tta", "256_frames"), &tta, |b, data| {
        b.iter(|| demux_all(black_box(data)));
    });

    group.finish();
}

criterion_group!(benches, bench_classification, bench_read_pass);
criterion_main!(benches);
