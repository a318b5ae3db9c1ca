use criterion::{black_box, criterion_group, criterion_main, Criterion};
use taxi_dispatch::{Job, JobKind, Priority, PriorityPolicy};

fn chain_of_jobs(n: usize) -> Vec<Job> {
    let mut jobs = Vec::with_capacity(n);
    let mut previous = None;
    for _ in 0..n {
        let mut job = Job::new(JobKind::Respawn).trunk(true);
        if let Some(handle) = previous {
            job = job.depends_on([handle]);
        }
        previous = Some(job.handle());
        jobs.push(job);
    }
    jobs
}

fn wide_forest(n_trees: usize, depth: usize) -> Vec<Job> {
    let mut jobs = Vec::with_capacity(n_trees * depth);
    for _ in 0..n_trees {
        let mut previous = None;
        for _ in 0..depth {
            let mut job = Job::new(JobKind::Respawn).trunk(true);
            if let Some(handle) = previous {
                job = job.depends_on([handle]);
            }
            previous = Some(job.handle());
            jobs.push(job);
        }
    }
    jobs
}

fn sort_by_priority(jobs: &[Job]) {
    let mut priorities: Vec<Priority> = jobs.iter().map(|_| Priority(black_box(3))).collect();
    priorities.sort();
    black_box(priorities);
}

fn bench_forest_and_priority_assignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("priority_assignment");

    for size in [100usize, 1_000, 10_000] {
        group.bench_function(format!("chain_{size}"), |b| {
            b.iter_batched(
                || chain_of_jobs(size),
                |mut jobs| {
                    let forest = taxi_dispatch::job::build_forest(&jobs).unwrap();
                    taxi_dispatch::priority::assign_priorities(
                        &mut jobs,
                        &forest,
                        PriorityPolicy::Tree,
                    )
                    .unwrap();
                    black_box(jobs);
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.bench_function("wide_forest_200x20", |b| {
        b.iter_batched(
            || wide_forest(200, 20),
            |mut jobs| {
                let forest = taxi_dispatch::job::build_forest(&jobs).unwrap();
                taxi_dispatch::priority::assign_priorities(&mut jobs, &forest, PriorityPolicy::Tree)
                    .unwrap();
                black_box(jobs);
            },
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_priority_sort(c: &mut Criterion) {
    c.bench_function("priority_total_order_sort_10k", |b| {
        let jobs = chain_of_jobs(10_000);
        b.iter(|| sort_by_priority(&jobs));
    });
}

criterion_group!(
    benches,
    bench_forest_and_priority_assignment,
    bench_priority_sort
);
criterion_main!(benches);
