use std::io::Cursor;

use arcio::reader::ArcReader;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn build_archive(records: usize) -> Vec<u8> {
    let mut archive = String::new();
    archive.push_str("filedesc://bench 0.0.0.0 20060305082251 text/plain 76\n");
    archive.push_str(
        "1 0 InternetArchive\nURL IP-address Archive-date Content-type Archive-length\n",
    );
    archive.push('\n');
    let body = "0123456789".repeat(32);
    for i in 0..records {
        archive.push_str(&format!(
            "http://example.com/page/{i} 192.168.1.2 20060305082252 text/html {}\n{body}\n",
            body.len()
        ));
    }
    archive.into_bytes()
}

fn bench_sequential_read(c: &mut Criterion) {
    let archive = build_archive(200);
    let mut group = c.benchmark_group("reader");
    group.throughput(Throughput::Bytes(archive.len() as u64));

    group.bench_function("sequential_200_records", |b| {
        b.iter(|| {
            let mut reader = ArcReader::open(Cursor::new(archive.clone())).unwrap();
            let mut count = 0usize;
            while let Some(record) = reader.next_record().unwrap() {
                black_box(&record);
                count += 1;
            }
            assert_eq!(count, 201);
        })
    });

    group.bench_function("sequential_200_records_sha1", |b| {
        b.iter(|| {
            let mut reader = ArcReader::open(Cursor::new(archive.clone())).unwrap();
            reader.set_block_digest_algorithm(Some("sha1")).unwrap();
            while let Some(record) = reader.next_record().unwrap() {
                black_box(record.computed_block_digest);
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_sequential_read);
criterion_main!(benches);
