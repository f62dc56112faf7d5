use criterion::{criterion_group, criterion_main, Criterion};
use jaeger_client::trace::{ConstSampler, NullReporter, StartSpanOptions, Tracer};

fn tracer(sampled: bool) -> Tracer {
    Tracer::builder("bench")
        .with_sampler(ConstSampler::new(sampled))
        .with_reporter(NullReporter)
        .build()
        .unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("span");
    for (name, sampled) in [("sampled", true), ("not_sampled", false)] {
        let tracer = tracer(sampled);
        group.bench_function(format!("start_finish/{name}"), |b| {
            b.iter(|| {
                let span = tracer.start_span("span", StartSpanOptions::default()).unwrap();
                span.finish();
            })
        });
        group.bench_function(format!("with_child_and_tags/{name}"), |b| {
            b.iter(|| {
                let parent = tracer.start_span("parent", StartSpanOptions::default()).unwrap();
                let child = tracer
                    .start_span(
                        "child",
                        StartSpanOptions::default()
                            .child_of(parent.context())
                            .with_tag("component", "bench"),
                    )
                    .unwrap();
                child.set_tag("http.status_code", 200);
                child.set_baggage_item("user", "bench");
                child.finish();
                parent.finish();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
