//! Benchmarks for merging task reports into job results

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dataflow_accumulators::accumulator::{Histogram, LongCounter};
use dataflow_accumulators::cli::LineStatsPlan;
use dataflow_accumulators::{
    AccumulatorRegistry, JobConfig, JobId, KindRegistry, LocalJobExecutor, MergeCoordinator,
    TaskAttempt, TaskId, TaskReport,
};
use std::hint::black_box;

fn task_report(job_id: JobId, task: u32) -> TaskReport {
    let mut registry = AccumulatorRegistry::new(TaskAttempt::first(job_id, TaskId::new(task)));
    registry
        .register("num-lines", LongCounter::with_total(i64::from(task)))
        .unwrap();
    let histogram = registry.register("words-per-line", Histogram::new()).unwrap();
    for bin in 0..32 {
        histogram.add((bin * task as i32) % 64);
    }
    registry.snapshot().unwrap()
}

/// Coordinator merge cost as the number of tasks grows
fn bench_coordinator_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("coordinator_merge");

    for tasks in [4u32, 64, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(tasks), &tasks, |b, &tasks| {
            let job_id = JobId::new();
            let reports: Vec<_> = (0..tasks).map(|task| task_report(job_id, task)).collect();

            b.iter(|| {
                let mut coordinator =
                    MergeCoordinator::new(job_id, tasks as usize, KindRegistry::with_builtins())
                        .unwrap();
                for report in reports.iter().cloned() {
                    coordinator.receive(report).unwrap();
                }
                black_box(coordinator.result().unwrap())
            });
        });
    }

    group.finish();
}

/// Encoding and decoding of report frames
fn bench_report_frames(c: &mut Criterion) {
    let report = task_report(JobId::new(), 7);
    let frame = report.encode().unwrap();

    c.bench_function("report_encode", |b| b.iter(|| black_box(report.encode().unwrap())));
    c.bench_function("report_decode", |b| {
        b.iter(|| black_box(TaskReport::decode(&frame).unwrap()))
    });
}

/// Full line statistics job through the local executor
fn bench_line_stats_job(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let text: String = (0..2_000)
        .map(|i| format!("line {i} with some words in it\n"))
        .collect();

    let mut group = c.benchmark_group("line_stats_job");
    for tasks in [1usize, 4, 16] {
        let plan = LineStatsPlan::new(&text, tasks);
        let executor = LocalJobExecutor::new(
            JobConfig {
                parallelism: tasks,
                ..JobConfig::default()
            },
            KindRegistry::with_builtins(),
        )
        .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(tasks), &tasks, |b, _| {
            b.to_async(&runtime).iter(|| {
                let plan = plan.clone();
                let executor = executor.clone();
                async move {
                    let outcome = executor
                        .execute(move |task_id| Box::new(plan.task(task_id)))
                        .await
                        .unwrap();
                    black_box(outcome.accumulator_results().unwrap())
                }
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_coordinator_merge,
    bench_report_frames,
    bench_line_stats_job
);
criterion_main!(benches);
