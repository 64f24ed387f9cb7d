use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pdkernel::host::DEFAULT_WORK_GROUP;
use pdkernel::{DiphaSource, HostUnit, KernelSpec, Scheduler, SchedulerConfig};
use std::path::PathBuf;

const N_DIAGRAMS: usize = 8;

fn write_diagrams(dir: &std::path::Path, n_points: usize) -> Vec<PathBuf> {
    (0..N_DIAGRAMS)
        .map(|i| {
            let path = dir.join(format!("pd{i}.dipha"));
            pdkernel::app::generate(&path, n_points, 1, 0.05, 2525365464_u64 + i as u64)
                .unwrap();
            path
        })
        .collect()
}

fn help_setup_criterion_benchmark(c: &mut Criterion, name: &str, spec: KernelSpec) {
    let dir = tempfile::tempdir().unwrap();
    let mut group = c.benchmark_group(name);
    for n_points in [64usize, 256, 1024] {
        let files = write_diagrams(dir.path(), n_points);
        // the symmetric matrix has N (N + 1) / 2 distinct cells
        let n_pairs = (N_DIAGRAMS * (N_DIAGRAMS + 1) / 2 * n_points * n_points) as u64;
        group.throughput(Throughput::Elements(n_pairs));

        for n_units in [1usize, 4] {
            let mut config = SchedulerConfig::new(spec, 1, 2.0);
            config.symmetric = true;
            let units = (0..n_units)
                .map(|i| HostUnit::new(i, DEFAULT_WORK_GROUP))
                .collect();
            let mut scheduler =
                Scheduler::new(config, [files.clone(), files.clone()], units, DiphaSource)
                    .unwrap();
            group.bench_with_input(
                BenchmarkId::new(format!("{n_units}-units"), n_points),
                &n_points,
                |b, _| b.iter(|| scheduler.run()),
            );
        }
    }
    group.finish();
}

fn criterion_benchmark(c: &mut Criterion) {
    help_setup_criterion_benchmark(c, "heat", KernelSpec::Heat { sigma: 0.1 });
    help_setup_criterion_benchmark(
        c,
        "pwgk",
        KernelSpec::WeightedGaussian {
            sigma: 0.1,
            power: 1.0,
            weight: 1.0,
        },
    );
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
