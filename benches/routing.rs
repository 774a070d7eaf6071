use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tracing_router::infrastructure::mocks::{MemoryWriter, MockClock};
use tracing_router::{
    natural_cmp, Formatter, Level, LogConfig, LogEvent, LogWriter, MessageRouter, RouterError,
    RoutedMessage, TraceFormat, TraceService, TraceSpec,
};

fn service(spec: &str) -> Arc<TraceService> {
    TraceService::builder()
        .with_config(
            LogConfig::builder()
                .with_trace_specification(spec)
                .with_copy_system_streams(false)
                .build()
                .unwrap(),
        )
        .with_clock(Arc::new(MockClock::new()))
        .with_console_writer(Arc::new(MemoryWriter::new()))
        .with_message_writer(Arc::new(NullWriter))
        .with_trace_writer(Arc::new(NullWriter))
        .build()
        .unwrap()
}

/// Writer that discards everything, so benchmarks measure routing only.
struct NullWriter;

impl LogWriter for NullWriter {
    fn write_record(&self, _level: Level, _text: &str) -> std::io::Result<()> {
        Ok(())
    }
}

/// Router that accepts every message without keeping it.
struct PassRouter;

impl MessageRouter for PassRouter {
    fn route(&self, message: &RoutedMessage) -> Result<bool, RouterError> {
        black_box(message);
        Ok(true)
    }
}

/// Benchmark rendering of the trace layouts
fn bench_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatting");
    let clock = MockClock::new();

    for format in [
        TraceFormat::Basic,
        TraceFormat::Enhanced,
        TraceFormat::Advanced,
    ] {
        let formatter = Formatter::new(format, false);
        let event = Arc::new(
            LogEvent::new(Level::Info, "com.acme.orders.Service", "Order {0} shipped to {1}", clock.now())
                .with_param(42)
                .with_param("Berlin")
                .with_correlation_id("uow-17"),
        );
        group.bench_with_input(
            BenchmarkId::new("trace_line", format!("{:?}", format)),
            &event,
            |b, event| {
                b.iter(|| {
                    let routed = formatter.route(Arc::clone(event));
                    black_box(formatter.trace_line(&routed))
                })
            },
        );
    }

    group.finish();
}

/// Benchmark trace specification matching
fn bench_trace_spec(c: &mut Criterion) {
    let mut group = c.benchmark_group("trace_spec");
    let spec =
        TraceSpec::parse("*=info:com.acme.db=all:com.acme.web=fine:noisy::dep=off").unwrap();

    group.bench_function("is_loggable_hit", |b| {
        b.iter(|| spec.is_loggable(black_box("com.acme.db.Pool"), black_box(Level::Finest)))
    });
    group.bench_function("is_loggable_default", |b| {
        b.iter(|| spec.is_loggable(black_box("other::module"), black_box(Level::Fine)))
    });
    group.bench_function("natural_cmp", |b| {
        b.iter(|| {
            natural_cmp(
                black_box("trace_26.01.15_10.00.00.9.log"),
                black_box("trace_26.01.15_10.00.00.10.log"),
            )
        })
    });

    group.finish();
}

/// Benchmark single-threaded routing throughput
fn bench_single_threaded_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_threaded");
    group.throughput(Throughput::Elements(1000));

    for spec in ["*=info", "*=all"] {
        group.bench_with_input(BenchmarkId::new("publish", spec), &spec, |b, spec| {
            let service = service(spec);
            service.set_message_router(Arc::new(PassRouter));
            let clock = MockClock::new();

            b.iter(|| {
                for i in 0..1000 {
                    let level = if i % 4 == 0 { Level::Info } else { Level::Fine };
                    service.publish_log_record(LogEvent::new(level, "bench", "message", clock.now()));
                }
            })
        });
    }

    group.finish();
}

/// Benchmark multi-threaded routing throughput
fn bench_concurrent_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");

    for num_threads in [2, 4, 8].iter() {
        group.throughput(Throughput::Elements((*num_threads as u64) * 1000));

        group.bench_with_input(
            BenchmarkId::new("threads", num_threads),
            num_threads,
            |b, &num_threads| {
                let service = service("*=all");

                b.iter(|| {
                    let mut handles = vec![];

                    for i in 0..num_threads {
                        let service = Arc::clone(&service);
                        let handle = std::thread::spawn(move || {
                            let clock = MockClock::new();
                            let logger = format!("worker{}", i);
                            for _ in 0..1000 {
                                service.publish_log_record(LogEvent::new(
                                    Level::Fine,
                                    logger.as_str(),
                                    "tick",
                                    clock.now(),
                                ));
                            }
                        });
                        handles.push(handle);
                    }

                    for handle in handles {
                        handle.join().unwrap();
                    }
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_formatting,
    bench_trace_spec,
    bench_single_threaded_routing,
    bench_concurrent_routing,
);
criterion_main!(benches);
