use criterion::{black_box, criterion_group, criterion_main, Criterion};
use devhost_shmem::map::{MapFactory, MapOptions};
use devhost_shmem::SegmentedSharedMemory;

fn bench_write_read_roundtrip(c: &mut Criterion) {
    let factory = MapFactory::new();
    let options = MapOptions {
        name: "bench-map".to_string(),
        capacity_bytes: 8 * 1024 * 1024,
        unix_file_path: None,
        use_file_backed_on_unix: false,
        delete_file_on_dispose: false,
    };
    let handle = factory.create(&options).expect("create map");
    let allocator = SegmentedSharedMemory::new(handle);
    let segment = allocator.allocate_segment("bench-session", 2 * 1024 * 1024).expect("allocate");
    segment.init_header("bench-session").expect("init header");

    let payload = vec![0xABu8; 512];

    c.bench_function("session_segment_write_read_512b", |b| {
        b.iter(|| {
            let (written, _frame_id) = segment.try_write_frame(black_box(&payload));
            if !written {
                while segment.try_read_frame().unwrap().is_some() {}
                segment.try_write_frame(black_box(&payload));
            }
            black_box(segment.try_read_frame().unwrap());
        });
    });
}

criterion_group!(benches, bench_write_read_roundtrip);
criterion_main!(benches);
