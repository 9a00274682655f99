//! Drain buffer and request building benchmarks.
//!
//! - Store/drain cycles at batch sizes 1, 64, 1024
//! - Concurrent store from several producer threads while one thread drains
//! - Operator command to JSON-RPC text
//!
//! Run with: cargo bench --bench message_buffer
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use deribit_terminal::protocol::Command;
use deribit_terminal::transport::MessageBuffer;
use deribit_terminal::ConnectionId;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const BATCH_SIZES: &[usize] = &[1, 64, 1024];
const PRODUCERS: usize = 4;
const MESSAGES_PER_PRODUCER: usize = 256;

const TICK: &str = r#"{"jsonrpc":"2.0","method":"subscription","params":{"channel":"deribit_price_index.btc_usd","data":{"timestamp":1550588002899,"price":3937.89,"index_name":"btc_usd"}}}"#;

// ============================================================================
// Benchmark: Store Then Drain
// ============================================================================

fn bench_store_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_drain");

    for &batch in BATCH_SIZES {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            let buffer = MessageBuffer::new();
            let id = ConnectionId::new(0);
            b.iter(|| {
                for _ in 0..batch {
                    buffer.store(id, TICK.to_string());
                }
                black_box(buffer.drain(id))
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Contended Store
// ============================================================================

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    group.sample_size(20);
    group.throughput(Throughput::Elements((PRODUCERS * MESSAGES_PER_PRODUCER) as u64));

    group.bench_function("producers_and_drainer", |b| {
        b.iter(|| {
            let buffer = Arc::new(MessageBuffer::new());

            let producers: Vec<_> = (0..PRODUCERS)
                .map(|p| {
                    let buffer = Arc::clone(&buffer);
                    thread::spawn(move || {
                        let id = ConnectionId::new(p as u32 % 2);
                        for _ in 0..MESSAGES_PER_PRODUCER {
                            buffer.store(id, TICK.to_string());
                        }
                    })
                })
                .collect();

            let mut drained = 0;
            while producers.iter().any(|p| !p.is_finished()) {
                drained += buffer.drain(ConnectionId::new(0)).len();
                drained += buffer.drain(ConnectionId::new(1)).len();
            }
            for producer in producers {
                producer.join().expect("producer thread");
            }
            drained += buffer.drain(ConnectionId::new(0)).len();
            drained += buffer.drain(ConnectionId::new(1)).len();

            assert_eq!(drained, PRODUCERS * MESSAGES_PER_PRODUCER);
        });
    });

    group.finish();
}

// ============================================================================
// Benchmark: Command Building
// ============================================================================

fn bench_command(c: &mut Criterion) {
    c.bench_function("command_to_json", |b| {
        b.iter(|| {
            let command = Command::parse(black_box("sell BTC-PERPETUAL hedge 20 64250.5"))
                .expect("parse")
                .expect("command");
            black_box(command.to_request().to_json().expect("json"))
        });
    });
}

criterion_group!(benches, bench_store_drain, bench_contended, bench_command);
criterion_main!(benches);
