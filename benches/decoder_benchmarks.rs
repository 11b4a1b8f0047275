use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use pg_sniff_proxy::decoder::Decoder;

fn query_frame(sql: &str) -> Vec<u8> {
    let mut payload = sql.as_bytes().to_vec();
    payload.push(0);
    let mut wire = vec![b'Q'];
    wire.extend_from_slice(&((payload.len() + 4) as u32).to_be_bytes());
    wire.extend_from_slice(&payload);
    wire
}

fn parse_execute_frames(statement: &str, portal: &str, query: &str) -> Vec<u8> {
    let mut out = Vec::new();

    let mut parse_payload = statement.as_bytes().to_vec();
    parse_payload.push(0);
    parse_payload.extend_from_slice(query.as_bytes());
    parse_payload.push(0);
    parse_payload.extend_from_slice(&0u16.to_be_bytes());
    out.push(b'P');
    out.extend_from_slice(&((parse_payload.len() + 4) as u32).to_be_bytes());
    out.extend_from_slice(&parse_payload);

    let mut bind_payload = portal.as_bytes().to_vec();
    bind_payload.push(0);
    bind_payload.extend_from_slice(statement.as_bytes());
    bind_payload.push(0);
    bind_payload.extend_from_slice(&0u16.to_be_bytes());
    bind_payload.extend_from_slice(&0u16.to_be_bytes());
    out.push(b'B');
    out.extend_from_slice(&((bind_payload.len() + 4) as u32).to_be_bytes());
    out.extend_from_slice(&bind_payload);

    let mut execute_payload = portal.as_bytes().to_vec();
    execute_payload.push(0);
    execute_payload.extend_from_slice(&0u32.to_be_bytes());
    out.push(b'E');
    out.extend_from_slice(&((execute_payload.len() + 4) as u32).to_be_bytes());
    out.extend_from_slice(&execute_payload);

    out
}

fn decoder_benchmark_comparison(c: &mut Criterion) {
    let cases: Vec<(&str, Vec<u8>)> = vec![
        ("simple_query", query_frame("SELECT 1;")),
        (
            "wide_query",
            query_frame(
                "SELECT t1.col1, t1.col2, t2.col1 FROM table_1 t1 INNER JOIN table_2 t2 ON t1.id = t2.id WHERE t1.status = 'active'",
            ),
        ),
        (
            "parse_bind_execute",
            parse_execute_frames("s1", "p1", "SELECT * FROM accounts WHERE id = $1"),
        ),
    ];

    for (name, wire) in cases {
        let mut group = c.benchmark_group(format!("decoder/{name}"));
        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.sample_size(100);

        group.bench_function("parse_client_message", |b| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                decoder.parse_client_message(std::hint::black_box(&wire))
            })
        });

        group.finish();
    }
}

fn decoder_fragmented_stream_benchmark(c: &mut Criterion) {
    let wire = query_frame("SELECT * FROM accounts WHERE balance > 1000;");

    let mut group = c.benchmark_group("decoder/fragmented_delivery");
    group.throughput(Throughput::Bytes(wire.len() as u64));

    group.bench_function("byte_at_a_time", |b| {
        b.iter(|| {
            let mut decoder = Decoder::new();
            for byte in std::hint::black_box(&wire) {
                decoder.parse_client_message(std::slice::from_ref(byte));
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    decoder_benchmark_comparison,
    decoder_fragmented_stream_benchmark
);
criterion_main!(benches);
