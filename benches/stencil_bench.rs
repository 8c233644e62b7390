use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use halo_stencil::prelude::*;
use halo_stencil::stencil::sweep_interior;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use std::thread;

fn noisy_grid(rows: usize, cols: usize, seed: u64) -> Grid {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut g = Grid::initial(rows, cols).unwrap();
    for v in g.as_mut_slice() {
        *v += rng.r#gen::<f64>();
    }
    g
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");
    for &n in &[64usize, 256, 1024] {
        let src = noisy_grid(n, n, 42);
        let mut dst = src.clone();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| sweep_interior(black_box(src.as_slice()), dst.as_mut_slice(), n, n))
        });
    }
    group.finish();
}

fn bench_substrates(c: &mut Criterion) {
    let mut group = c.benchmark_group("substrates");
    group.sample_size(10);
    let grid = noisy_grid(512, 512, 7);
    let iterations = 20;

    group.bench_function("serial", |b| {
        b.iter(|| serial::run(grid.clone(), iterations, DebugLevel::Silent, None).unwrap())
    });
    for &workers in &[2usize, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("threads", workers),
            &workers,
            |b, &workers| {
                b.iter(|| {
                    shared_memory::run(grid.clone(), iterations, workers, DebugLevel::Silent, None)
                        .unwrap()
                })
            },
        );
        group.bench_with_input(BenchmarkId::new("ranks", workers), &workers, |b, &workers| {
            b.iter(|| {
                thread::scope(|s| {
                    for comm in LocalComm::universe(workers) {
                        let grid = &grid;
                        s.spawn(move || {
                            let coord = (comm.rank() == comm.coordinator()).then(|| Coordinator {
                                grid: grid.clone(),
                                iterations,
                                debug_level: DebugLevel::Silent,
                                sink: None,
                            });
                            message_passing::run(&comm, coord).unwrap()
                        });
                    }
                })
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sweep, bench_substrates);
criterion_main!(benches);
