use rand::Rng;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use ndarray::Array3;
use specdecode::averaging::{average_window, AveragingMode, N_PRODUCTS};
use specdecode::codec::{
    decode_10plus6_bytes, decode_4into5_bytes, decode_shared_lz_signed, encode_10plus6_slice,
    encode_4into5_slice, encode_shared_lz_signed,
};
use specdecode::framing::{crc16, decode_frames, FrameHeader, FILLER};
use specdecode::packets::collate;

// 200 frames of 512 payload bytes separated by a little filler.
fn stream() -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let mut dat = Vec::new();
    for seq in 0..200u16 {
        let payload: Vec<u8> = (0..512).map(|_| rng.gen()).collect();
        let header = FrameHeader {
            version: 0,
            packet_type: 0,
            has_secondary_header: false,
            apid: 0x210,
            group_flags: 3,
            sequence_count: seq,
            declared_length: 511,
        }
        .encode();
        let mut covered = header.to_vec();
        covered.extend_from_slice(&payload);

        dat.extend_from_slice(&[0xec, 0xa0]);
        dat.extend_from_slice(&covered);
        dat.extend_from_slice(&crc16(&covered).to_be_bytes());
        dat.extend_from_slice(&[FILLER; 3]);
    }
    dat
}

fn bench_synchronization(c: &mut Criterion) {
    let data = stream();
    let mut group = c.benchmark_group("synchronize");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("decode_frames", |b| {
        b.iter(|| {
            let (frames, stats) = decode_frames(&data[..]).unwrap();
            assert_eq!(stats.frames, 200);
            frames
        });
    });
    group.bench_function("decode_and_collate", |b| {
        b.iter(|| {
            let (frames, _) = decode_frames(&data[..]).unwrap();
            collate(frames).count()
        });
    });
    group.finish();
}

fn bench_codecs(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let values: Vec<i32> = (0..4096)
        .map(|_| rng.gen_range(-(1 << 24)..(1 << 24)))
        .collect();
    let ten = encode_10plus6_slice(&values);
    let four = encode_4into5_slice(&values);
    let shared = encode_shared_lz_signed(&values);

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(values.len() as u64));
    group.bench_function("encode_shared_lz", |b| {
        b.iter(|| encode_shared_lz_signed(&values));
    });
    group.bench_function("decode_10plus6", |b| {
        b.iter(|| decode_10plus6_bytes(&ten, values.len()).unwrap());
    });
    group.bench_function("decode_4into5", |b| {
        b.iter(|| decode_4into5_bytes(&four, values.len()).unwrap());
    });
    group.bench_function("decode_shared_lz", |b| {
        b.iter(|| decode_shared_lz_signed(&shared, values.len()).unwrap());
    });
    group.finish();
}

fn bench_averaging(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let navg2 = 64;
    let window = Array3::from_shape_fn((navg2, N_PRODUCTS, 2048), |_| rng.gen_range(0..1 << 20));
    let accepted: Vec<usize> = (0..navg2).filter(|i| i % 7 != 0).collect();

    let mut group = c.benchmark_group("average_window");
    for mode in [AveragingMode::Int32, AveragingMode::Int64, AveragingMode::Float32] {
        group.bench_function(format!("{mode:?}"), |b| {
            b.iter(|| average_window(&window.view(), &accepted, navg2, 4, mode));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_synchronization, bench_codecs, bench_averaging);
criterion_main!(benches);
