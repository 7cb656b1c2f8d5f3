use std::hint::black_box;

use bencher::{GET_DEVICE, GET_STATUS, POST_WIFI, TestCase};
use button_http::buffer::Buffer;
use button_http::codec::RequestParser;
use button_http::codec::body::{MAX_CHUNK_OVERHEAD, frame_chunk};
use button_http::protocol::Progress;
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::small("get_status", GET_STATUS),
        TestCase::large("get_device", GET_DEVICE),
        TestCase::small("post_wifi", POST_WIFI),
    ]
}

fn benchmark_request_parser(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("request_parser");

    for case in create_test_cases() {
        group.throughput(Throughput::Bytes(case.len()));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter_batched_ref(
                RequestParser::new,
                |parser| {
                    let mut progress = Progress::NeedMore;
                    let request = case.request();
                    for &byte in request {
                        progress = parser.feed(byte, request.len()).expect("fixture should be a valid request");
                    }
                    assert!(progress.is_complete());
                    black_box(parser.path());
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn benchmark_chunk_framing(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("frame_chunk");

    for size in [16usize, 256, 1400] {
        let payload = vec![b'x'; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter_batched_ref(
                || {
                    let mut chunk = Buffer::new(payload.len() + MAX_CHUNK_OVERHEAD);
                    chunk.append(payload);
                    chunk
                },
                |chunk| black_box(frame_chunk(chunk)),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(parser, benchmark_request_parser, benchmark_chunk_framing);
criterion_main!(parser);
