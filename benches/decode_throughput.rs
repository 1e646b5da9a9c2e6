use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use csv_reconcile::{ChunkSource, KeySpec, MemorySource, compile, decode_rows};

fn generate_orders(rows: usize) -> Vec<u8> {
    let mut buf = String::from("id,ordered_at,ship_time,status\n");
    for i in 0..rows {
        let status = match i % 3 {
            0 => "shipped",
            1 => "pending",
            _ => "processing",
        };
        let day = (i % 28) + 1;
        let hour = (i % 23) + 1;
        buf.push_str(&format!("{i},2024-01-{day:02},{hour:02}:00:00,{status}\n"));
    }
    buf.into_bytes()
}

fn split_into_chunks(bytes: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    bytes.chunks(chunk_size).map(|chunk| chunk.to_vec()).collect()
}

fn bench_decode(c: &mut Criterion) {
    let bytes = generate_orders(50_000);
    let mut group = c.benchmark_group("decode_rows");

    for &chunk_size in &[4 * 1024usize, 64 * 1024] {
        let chunks = split_into_chunks(&bytes, chunk_size);
        group.bench_function(format!("chunk_{}k", chunk_size / 1024), |b| {
            b.iter_batched(
                || MemorySource::new("orders.csv", chunks.clone()),
                |source| {
                    let rows = decode_rows(Box::new(source))
                        .map(|row| row.expect("row"))
                        .count();
                    assert_eq!(rows, 50_000);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let first = generate_orders(20_000);
    // Second snapshot: drop the tail, change every third status.
    let second = {
        let text = String::from_utf8(generate_orders(20_000)).expect("utf8");
        let mut out = String::new();
        for (idx, line) in text.lines().enumerate() {
            if idx > 15_000 {
                break;
            }
            if idx > 0 && idx % 3 == 0 {
                out.push_str(&line.replace("processing", "archived"));
            } else {
                out.push_str(line);
            }
            out.push('\n');
        }
        out.into_bytes()
    };

    c.bench_function("compile_two_snapshots", |b| {
        b.iter_batched(
            || {
                let sources: Vec<Box<dyn ChunkSource>> = vec![
                    Box::new(MemorySource::from_bytes("a.csv", first.clone())),
                    Box::new(MemorySource::from_bytes("b.csv", second.clone())),
                ];
                sources
            },
            |sources| {
                compile(sources, &KeySpec::column("id")).expect("compile");
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_decode, bench_compile);
criterion_main!(benches);
