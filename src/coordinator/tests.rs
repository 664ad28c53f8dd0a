use super::*;
use crate::accumulator::{
    AccumulatorKind, AccumulatorSnapshot, Average, DoubleCounter, DoubleMaximum, Histogram,
    KindRegistry, LongCounter,
};
use crate::registry::AccumulatorRegistry;
use indexmap::IndexMap;
use serde_json::json;
use std::collections::BTreeMap;

fn coordinator(expected: usize) -> MergeCoordinator {
    MergeCoordinator::new(JobId::new(), expected, KindRegistry::with_builtins()).unwrap()
}

fn attempt(coordinator: &MergeCoordinator, task: u32) -> TaskAttempt {
    TaskAttempt::first(coordinator.job_id(), TaskId::new(task))
}

/// Report in which the task added 1 to "num-lines" `adds` times
fn counter_report(attempt: TaskAttempt, adds: usize) -> TaskReport {
    let mut registry = AccumulatorRegistry::new(attempt);
    let lines = registry.register("num-lines", LongCounter::new()).unwrap();
    for _ in 0..adds {
        lines.add(1);
    }
    registry.snapshot().unwrap()
}

fn histogram_report(attempt: TaskAttempt, bins: &[i32]) -> TaskReport {
    let mut registry = AccumulatorRegistry::new(attempt);
    let dist = registry.register("len-dist", Histogram::new()).unwrap();
    for bin in bins {
        dist.add(*bin);
    }
    registry.snapshot().unwrap()
}

#[test]
fn test_zero_expected_tasks_rejected() {
    let err = MergeCoordinator::new(JobId::new(), 0, KindRegistry::with_builtins()).unwrap_err();
    assert!(matches!(err, AccumulatorError::InvalidConfiguration { .. }));
}

#[test]
fn test_three_tasks_counting_lines() {
    let mut coordinator = coordinator(3);

    for task in 0..2 {
        let report = counter_report(attempt(&coordinator, task), 5);
        let disposition = coordinator.receive(report).unwrap();
        assert_eq!(
            disposition,
            ReportDisposition::Merged {
                contributors: task as usize + 1,
                expected: 3
            }
        );
        assert!(matches!(
            coordinator.result(),
            Err(AccumulatorError::NotAvailable { .. })
        ));
    }

    let last = counter_report(attempt(&coordinator, 2), 5);
    assert_eq!(
        coordinator.receive(last).unwrap(),
        ReportDisposition::Finalized
    );

    assert_eq!(coordinator.phase(), CoordinatorPhase::Finalized);
    let result = coordinator.result().unwrap();
    assert_eq!(result.get_accumulator_result::<i64>("num-lines").unwrap(), 15);
    assert_eq!(result.contributors("num-lines").unwrap(), 3);

    // Stable under repeated reads
    let again = coordinator.result().unwrap();
    assert_eq!(again.get_accumulator_result::<i64>("num-lines").unwrap(), 15);
}

#[test]
fn test_histogram_distribution_merge() {
    let mut coordinator = coordinator(2);
    coordinator
        .receive(histogram_report(attempt(&coordinator, 0), &[3, 3, 5]))
        .unwrap();
    coordinator
        .receive(histogram_report(attempt(&coordinator, 1), &[3, 7, 7, 7, 7]))
        .unwrap();

    let dist: BTreeMap<i32, u64> = coordinator
        .result()
        .unwrap()
        .get_accumulator_result("len-dist")
        .unwrap();
    assert_eq!(dist, BTreeMap::from([(3, 3), (5, 1), (7, 4)]));
}

#[test]
fn test_kind_mismatch_fails_job() {
    let mut coordinator = coordinator(2);
    let first = attempt(&coordinator, 0);
    let second = attempt(&coordinator, 1);

    let mut registry = AccumulatorRegistry::new(first);
    registry.register("x", LongCounter::with_total(1)).unwrap();
    coordinator.receive(registry.snapshot().unwrap()).unwrap();

    let mut registry = AccumulatorRegistry::new(second);
    registry.register("x", Histogram::new()).unwrap();
    let err = coordinator.receive(registry.snapshot().unwrap()).unwrap_err();

    assert!(matches!(err, AccumulatorError::KindMismatch { .. }));
    assert_eq!(coordinator.phase(), CoordinatorPhase::Failed);

    let unavailable = coordinator.result().unwrap_err();
    assert!(unavailable.to_string().contains("job did not complete"));
}

#[test]
fn test_unknown_kind_fails_job() {
    let mut coordinator = coordinator(1);
    let mut entries = IndexMap::new();
    entries.insert(
        "top".to_string(),
        AccumulatorSnapshot {
            kind: AccumulatorKind::from_static("custom.topk"),
            state: json!([]),
        },
    );
    let report = TaskReport::new(attempt(&coordinator, 0), entries);

    let err = coordinator.receive(report).unwrap_err();
    assert!(matches!(err, AccumulatorError::UnknownKind { .. }));
    assert_eq!(coordinator.phase(), CoordinatorPhase::Failed);
}

#[test]
fn test_duplicate_report_from_same_task_is_discarded() {
    let mut coordinator = coordinator(2);
    let first = attempt(&coordinator, 0);

    coordinator.receive(counter_report(first, 5)).unwrap();
    let disposition = coordinator
        .receive(counter_report(first.retry(), 5))
        .unwrap();

    assert_eq!(
        disposition,
        ReportDisposition::Discarded(DiscardReason::DuplicateTask)
    );
    assert_eq!(coordinator.contributors(), 1);
    assert_eq!(coordinator.phase(), CoordinatorPhase::Collecting);
}

#[test]
fn test_failed_attempt_never_contributes() {
    let mut coordinator = coordinator(1);
    let failed = attempt(&coordinator, 0);

    coordinator.task_failed(failed, "panicked in process");
    let disposition = coordinator.receive(counter_report(failed, 100)).unwrap();
    assert_eq!(
        disposition,
        ReportDisposition::Discarded(DiscardReason::FailedAttempt)
    );

    // The replacement attempt counts exactly once
    let disposition = coordinator
        .receive(counter_report(failed.retry(), 5))
        .unwrap();
    assert_eq!(disposition, ReportDisposition::Finalized);
    assert_eq!(
        coordinator
            .result()
            .unwrap()
            .get_accumulator_result::<i64>("num-lines")
            .unwrap(),
        5
    );
}

#[test]
fn test_late_report_after_finalization_is_discarded() {
    let mut coordinator = coordinator(1);
    let first = attempt(&coordinator, 0);
    coordinator.receive(counter_report(first, 2)).unwrap();

    let late = coordinator
        .receive(counter_report(first.retry(), 40))
        .unwrap();
    assert_eq!(
        late,
        ReportDisposition::Discarded(DiscardReason::NotCollecting)
    );
    assert_eq!(
        coordinator
            .result()
            .unwrap()
            .get_accumulator_result::<i64>("num-lines")
            .unwrap(),
        2
    );
}

#[test]
fn test_foreign_and_out_of_range_reports_discarded() {
    let mut coordinator = coordinator(2);

    let foreign = TaskAttempt::first(JobId::new(), TaskId::new(0));
    assert_eq!(
        coordinator.receive(counter_report(foreign, 1)).unwrap(),
        ReportDisposition::Discarded(DiscardReason::WrongJob)
    );

    let out_of_range = attempt(&coordinator, 7);
    assert_eq!(
        coordinator.receive(counter_report(out_of_range, 1)).unwrap(),
        ReportDisposition::Discarded(DiscardReason::UnknownTask)
    );
    assert_eq!(coordinator.contributors(), 0);
}

#[test]
fn test_cancel_discards_further_reports() {
    let mut coordinator = coordinator(2);
    coordinator
        .receive(counter_report(attempt(&coordinator, 0), 1))
        .unwrap();

    coordinator.cancel().unwrap();
    assert_eq!(coordinator.phase(), CoordinatorPhase::Failed);

    let disposition = coordinator
        .receive(counter_report(attempt(&coordinator, 1), 1))
        .unwrap();
    assert_eq!(
        disposition,
        ReportDisposition::Discarded(DiscardReason::NotCollecting)
    );
    assert!(coordinator.result().is_err());
    assert_eq!(
        coordinator.status().failure.as_deref(),
        Some("job was cancelled")
    );
}

#[test]
fn test_fail_job_after_finalization_is_invalid() {
    let mut coordinator = coordinator(1);
    coordinator
        .receive(counter_report(attempt(&coordinator, 0), 1))
        .unwrap();

    let err = coordinator.fail_job("deadline elapsed").unwrap_err();
    assert!(matches!(
        err,
        AccumulatorError::InvalidTransition {
            from: CoordinatorPhase::Finalized,
            to: CoordinatorPhase::Failed
        }
    ));
    assert!(coordinator.result().is_ok());
}

#[test]
fn test_fail_job_is_idempotent() {
    let mut coordinator = coordinator(1);
    coordinator.fail_job("deadline elapsed").unwrap();
    coordinator.fail_job("again").unwrap();

    assert_eq!(
        coordinator.status().failure.as_deref(),
        Some("deadline elapsed")
    );
}

#[test]
fn test_transport_failure_fails_job() {
    let mut coordinator = coordinator(2);
    let lost = attempt(&coordinator, 1);

    coordinator
        .transport_failed(lost, "connection reset")
        .unwrap();
    assert_eq!(coordinator.phase(), CoordinatorPhase::Failed);
}

#[test]
fn test_double_counter_and_average_merge() {
    let mut coordinator = coordinator(2);

    for (task, values) in [(0, [1.5, 2.5]), (1, [4.0, 8.0])] {
        let mut registry = AccumulatorRegistry::new(attempt(&coordinator, task));
        let sum = registry.register("sum", DoubleCounter::new()).unwrap();
        let mean = registry.register("mean", Average::default()).unwrap();
        for value in values {
            sum.add(value);
            mean.add(value);
        }
        coordinator.receive(registry.snapshot().unwrap()).unwrap();
    }

    let result = coordinator.result().unwrap();
    assert_eq!(result.get_accumulator_result::<f64>("sum").unwrap(), 16.0);
    assert_eq!(result.get_accumulator_result::<f64>("mean").unwrap(), 4.0);
}

#[test]
fn test_double_counter_overflow_to_infinity_finalizes() {
    let mut coordinator = coordinator(2);

    let mut registry = AccumulatorRegistry::new(attempt(&coordinator, 0));
    let sum = registry.register("sum", DoubleCounter::new()).unwrap();
    sum.add(f64::MAX);
    sum.add(f64::MAX);
    assert_eq!(sum.result(), f64::INFINITY);
    let mean = registry.register("mean", Average::default()).unwrap();
    mean.add(f64::MAX);
    coordinator.receive(registry.snapshot().unwrap()).unwrap();

    let mut registry = AccumulatorRegistry::new(attempt(&coordinator, 1));
    registry.register("sum", DoubleCounter::with_total(1.0)).unwrap();
    registry.register("mean", Average::default()).unwrap().add(f64::MAX);
    let disposition = coordinator.receive(registry.snapshot().unwrap()).unwrap();

    assert_eq!(disposition, ReportDisposition::Finalized);
    let result = coordinator.result().unwrap();
    assert_eq!(result.get_value("sum").unwrap(), &json!("inf"));
    assert_eq!(result.get_numeric_result::<f64>("sum").unwrap(), f64::INFINITY);
    assert_eq!(result.get_numeric_result::<f64>("mean").unwrap(), f64::INFINITY);
}

#[test]
fn test_nan_only_maximum_survives_merge() {
    let mut coordinator = coordinator(1);

    let mut registry = AccumulatorRegistry::new(attempt(&coordinator, 0));
    registry
        .register("peak", DoubleMaximum::default())
        .unwrap()
        .add(f64::NAN);
    coordinator.receive(registry.snapshot().unwrap()).unwrap();

    let result = coordinator.result().unwrap();
    assert!(result.get_numeric_result::<f64>("peak").unwrap().is_nan());
}

#[test]
fn test_undecodable_state_is_fatal() {
    let mut coordinator = coordinator(2);
    let mut entries = IndexMap::new();
    entries.insert(
        "sum".to_string(),
        AccumulatorSnapshot {
            kind: AccumulatorKind::from_static("counter.double"),
            state: json!({ "total": null }),
        },
    );
    let report = TaskReport::new(attempt(&coordinator, 0), entries);

    let err = coordinator.receive(report).unwrap_err();
    assert!(matches!(err, AccumulatorError::Serialization { .. }));
    assert!(err.is_fatal_to_job());
    assert_eq!(coordinator.phase(), CoordinatorPhase::Failed);
}

#[test]
fn test_names_absent_from_some_reports() {
    let mut coordinator = coordinator(2);

    let mut registry = AccumulatorRegistry::new(attempt(&coordinator, 0));
    registry.register("a", LongCounter::with_total(1)).unwrap();
    registry.register("b", LongCounter::with_total(2)).unwrap();
    coordinator.receive(registry.snapshot().unwrap()).unwrap();

    let mut registry = AccumulatorRegistry::new(attempt(&coordinator, 1));
    registry.register("b", LongCounter::with_total(3)).unwrap();
    coordinator.receive(registry.snapshot().unwrap()).unwrap();

    let result = coordinator.result().unwrap();
    assert_eq!(result.get_accumulator_result::<i64>("a").unwrap(), 1);
    assert_eq!(result.contributors("a").unwrap(), 1);
    assert_eq!(result.get_accumulator_result::<i64>("b").unwrap(), 5);
    assert_eq!(result.contributors("b").unwrap(), 2);
}

#[test]
fn test_merge_order_does_not_change_result() {
    let job_id = JobId::new();
    let reports: Vec<TaskReport> = (0..4u32)
        .map(|task| {
            let mut registry =
                AccumulatorRegistry::new(TaskAttempt::first(job_id, TaskId::new(task)));
            let lines = registry.register("num-lines", LongCounter::new()).unwrap();
            let dist = registry.register("len-dist", Histogram::new()).unwrap();
            for i in 0..=task {
                lines.add(i64::from(i) * 3);
                dist.add((i % 3) as i32);
            }
            registry.snapshot().unwrap()
        })
        .collect();

    let run = |order: &[usize]| {
        let mut coordinator =
            MergeCoordinator::new(job_id, reports.len(), KindRegistry::with_builtins()).unwrap();
        for index in order {
            coordinator.receive(reports[*index].clone()).unwrap();
        }
        coordinator.result().unwrap().to_json()
    };

    let forward = run(&[0, 1, 2, 3]);
    assert_eq!(forward, run(&[3, 2, 1, 0]));
    assert_eq!(forward, run(&[2, 0, 3, 1]));
    assert_eq!(forward, run(&[1, 3, 0, 2]));
}

#[test]
fn test_audit_log_records_lifecycle() {
    let mut coordinator = coordinator(1);
    let first = attempt(&coordinator, 0);
    coordinator.task_failed(first, "boom");
    coordinator.receive(counter_report(first, 1)).unwrap();
    coordinator.receive(counter_report(first.retry(), 1)).unwrap();

    let types: Vec<_> = coordinator
        .events()
        .iter()
        .map(|e| e.event_type.clone())
        .collect();

    assert_eq!(
        types,
        vec![
            CoordinatorEventType::AttemptFailed { attempt: first },
            CoordinatorEventType::ReportDiscarded {
                attempt: first,
                reason: DiscardReason::FailedAttempt
            },
            CoordinatorEventType::ReportMerged {
                attempt: first.retry()
            },
            CoordinatorEventType::PhaseTransition {
                from: CoordinatorPhase::Collecting,
                to: CoordinatorPhase::Finalizing
            },
            CoordinatorEventType::PhaseTransition {
                from: CoordinatorPhase::Finalizing,
                to: CoordinatorPhase::Finalized
            },
        ]
    );
}

#[tokio::test]
async fn test_outcome_follows_coordinator() {
    let mut coordinator = coordinator(1);
    let outcome = coordinator.outcome();
    assert!(matches!(
        outcome.accumulator_results(),
        Err(AccumulatorError::NotAvailable { .. })
    ));

    coordinator
        .receive(counter_report(attempt(&coordinator, 0), 3))
        .unwrap();

    assert_eq!(outcome.phase(), CoordinatorPhase::Finalized);
    assert_eq!(outcome.get_accumulator_result::<i64>("num-lines").unwrap(), 3);
}

mod actor {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_submissions_are_serialized() {
        let coordinator = coordinator(8);
        let job_id = coordinator.job_id();
        let handle = CoordinatorHandle::spawn(coordinator);

        let submissions = (0..8u32).map(|task| {
            let handle = handle.clone();
            tokio::spawn(async move {
                let report = counter_report(TaskAttempt::first(job_id, TaskId::new(task)), 5);
                handle.submit(report).await
            })
        });
        for submitted in futures::future::join_all(submissions).await {
            assert!(submitted.unwrap().unwrap().is_merged());
        }

        let result = handle.outcome().wait().await.unwrap();
        assert_eq!(result.get_accumulator_result::<i64>("num-lines").unwrap(), 40);
        assert_eq!(result.contributors("num-lines").unwrap(), 8);
    }

    #[tokio::test]
    async fn test_submit_frame_round_trip() {
        let coordinator = coordinator(1);
        let first = attempt(&coordinator, 0);
        let handle = CoordinatorHandle::spawn(coordinator);

        let frame = counter_report(first, 4).encode().unwrap();
        let disposition = handle.submit_frame(first, frame).await.unwrap();
        assert_eq!(disposition, ReportDisposition::Finalized);

        let value: i64 = handle
            .outcome()
            .get_accumulator_result("num-lines")
            .unwrap();
        assert_eq!(value, 4);
    }

    #[tokio::test]
    async fn test_corrupt_frame_is_transport_failure() {
        let coordinator = coordinator(2);
        let first = attempt(&coordinator, 0);
        let handle = CoordinatorHandle::spawn(coordinator);

        let err = handle
            .submit_frame(first, b"\x00garbage".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, AccumulatorError::TransportFailure { .. }));

        let err = handle.outcome().wait().await.unwrap_err();
        assert!(err.to_string().contains("job did not complete"));
    }

    #[tokio::test]
    async fn test_corrupt_frame_after_finalize_keeps_results() {
        let coordinator = coordinator(1);
        let first = attempt(&coordinator, 0);
        let late = attempt(&coordinator, 1);
        let handle = CoordinatorHandle::spawn(coordinator);

        let frame = counter_report(first, 3).encode().unwrap();
        handle.submit_frame(first, frame).await.unwrap();

        let err = handle
            .submit_frame(late, b"\x00garbage".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, AccumulatorError::TransportFailure { .. }));

        let result = handle.outcome().wait().await.unwrap();
        assert_eq!(result.get_accumulator_result::<i64>("num-lines").unwrap(), 3);
    }

    #[tokio::test]
    async fn test_cancel_through_handle() {
        let coordinator = coordinator(2);
        let handle = CoordinatorHandle::spawn(coordinator);

        handle.cancel().await.unwrap();
        assert_eq!(handle.outcome().phase(), CoordinatorPhase::Failed);

        let events = handle.events().await.unwrap();
        assert!(events.iter().any(|e| matches!(
            e.event_type,
            CoordinatorEventType::JobFailed { .. }
        )));
    }
}
