//! Benchmarks for the shape and enumeration checkers over large traces.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tracecheck::{check_site_shape, check_traceenum_requirements, PlateNesting};
use tracecheck_model::{DenseTensor, DistributionSpec, Enumerate, Frame, GraphType, Site, Trace};

fn site(i: usize) -> Site {
    let frames = vec![
        Frame::sequential("time", 100, i / 10),
        Frame::plate("outer", 4, Some(-2)),
        Frame::plate("inner", 3, Some(-1)),
    ];
    let mut site = Site::sample(
        format!("x{i}"),
        DistributionSpec::new("Categorical", vec![4, 3], vec![]),
    )
    .with_frames(frames)
    .with_log_prob(DenseTensor::zeros(vec![2, 4, 3]));
    if i % 2 == 0 {
        site = site.enumerated(Enumerate::Parallel);
    }
    site
}

fn build_trace(len: usize) -> Trace {
    let mut trace = Trace::new(GraphType::Flat);
    for i in 0..len {
        assert!(trace.add_node(site(i)).is_ok());
    }
    trace
}

fn bench_site_shape(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_site_shape");
    group.throughput(Throughput::Elements(1));

    let s = site(0);
    group.bench_function("three_frames", |b| {
        b.iter(|| black_box(check_site_shape(black_box(&s), PlateNesting::Bounded(2))));
    });

    group.finish();
}

fn bench_enumeration(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_traceenum_requirements");

    for len in [16, 128, 1024].iter() {
        group.throughput(Throughput::Elements(*len as u64));
        let trace = build_trace(*len);
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, _| {
            b.iter(|| black_box(check_traceenum_requirements(&trace, &trace)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_site_shape, bench_enumeration);
criterion_main!(benches);
