mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{finished, running, settings, CommitMode, FakeBackend};
use student_import::models::ImportResults;
use student_import::services::{ProgressTracker, TrackingStrategy, PACED_PHASES};
use student_import::{AppError, ImportBackend, ImportJob};
use tokio::sync::watch;

/// 收集所有进度百分比，直到任务终结
async fn collect_percents(mut rx: watch::Receiver<ImportJob>) -> Vec<u8> {
    let mut seen = vec![rx.borrow_and_update().progress_percent];
    while rx.changed().await.is_ok() {
        let job = rx.borrow_and_update().clone();
        seen.push(job.progress_percent);
        if job.is_terminal() {
            break;
        }
    }
    seen
}

fn tracker(backend: &Arc<FakeBackend>) -> ProgressTracker {
    let backend: Arc<dyn ImportBackend> = backend.clone();
    ProgressTracker::new(backend, settings())
}

#[tokio::test(start_paused = true)]
async fn test_polled_progress_never_goes_backwards() {
    let backend = FakeBackend::new(CommitMode::WithJob("abc".to_string()));
    backend.script_polls([
        running(40.0, "处理中"),
        running(25.0, "服务端回退"),
        running(70.0, "处理中"),
        running(65.0, "服务端回退"),
        finished(8),
    ]);

    let mut handle = tracker(&backend).spawn(TrackingStrategy::Polling {
        job_id: "abc".to_string(),
        fallback: ImportResults::default(),
    });
    let collector = tokio::spawn(collect_percents(handle.subscribe()));

    let results = handle.outcome().await.unwrap();
    assert_eq!(results.successful_imports, 8);

    let seen = collector.await.unwrap();
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "进度回退: {:?}", seen);
    assert_eq!(seen.last(), Some(&100));
    assert!(!seen.contains(&25));
}

#[tokio::test(start_paused = true)]
async fn test_paced_completion_walks_fixed_phases() {
    let backend = FakeBackend::new(CommitMode::Synchronous);
    let results = ImportResults {
        total_rows: 3,
        successful_imports: 3,
        ..Default::default()
    };

    let mut handle = tracker(&backend).spawn(TrackingStrategy::PacedCompletion {
        results: results.clone(),
    });
    let collector = tokio::spawn(collect_percents(handle.subscribe()));

    assert_eq!(handle.outcome().await.unwrap(), results);

    let mut expected: Vec<u8> = PACED_PHASES.iter().map(|(p, _)| *p).collect();
    expected.push(100);
    let seen: Vec<u8> = collector
        .await
        .unwrap()
        .into_iter()
        .filter(|p| *p > 0)
        .collect();
    assert_eq!(seen, expected);
    assert_eq!(FakeBackend::count(&backend.status_calls), 0);
}

#[tokio::test(start_paused = true)]
async fn test_paced_completion_takes_one_step_per_phase() {
    let backend = FakeBackend::new(CommitMode::Synchronous);
    let started = tokio::time::Instant::now();

    let mut handle = tracker(&backend).spawn(TrackingStrategy::PacedCompletion {
        results: ImportResults::default(),
    });
    handle.outcome().await.unwrap();

    let elapsed = started.elapsed();
    let expected = Duration::from_millis(600) * PACED_PHASES.len() as u32;
    assert!(elapsed >= expected && elapsed < expected + Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_polls_are_sequential_under_latency() {
    let backend = FakeBackend::new(CommitMode::WithJob("abc".to_string()));
    // 每次请求比轮询间隔还慢
    backend.set_poll_latency(Duration::from_millis(2500));
    backend.script_polls([
        running(10.0, "a"),
        running(30.0, "b"),
        running(60.0, "c"),
        finished(1),
    ]);

    let mut handle = tracker(&backend).spawn(TrackingStrategy::Polling {
        job_id: "abc".to_string(),
        fallback: ImportResults::default(),
    });
    handle.outcome().await.unwrap();

    assert_eq!(FakeBackend::count(&backend.status_calls), 4);
    assert_eq!(FakeBackend::count(&backend.max_polls_in_flight), 1);
}

#[tokio::test(start_paused = true)]
async fn test_completion_without_results_uses_commit_response() {
    let backend = FakeBackend::new(CommitMode::WithJob("abc".to_string()));
    backend.script_polls([common::PollScript::Status(student_import::models::JobStatus {
        progress: 100.0,
        completed: true,
        ..Default::default()
    })]);

    let fallback = ImportResults {
        total_rows: 12,
        successful_imports: 12,
        ..Default::default()
    };
    let mut handle = tracker(&backend).spawn(TrackingStrategy::Polling {
        job_id: "abc".to_string(),
        fallback: fallback.clone(),
    });

    assert_eq!(handle.outcome().await.unwrap(), fallback);
    assert_eq!(handle.snapshot().results, Some(fallback));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_publishing() {
    let backend = FakeBackend::new(CommitMode::WithJob("abc".to_string()));
    backend.script_polls([running(10.0, "a"), running(20.0, "b"), finished(1)]);

    let mut handle = tracker(&backend).spawn(TrackingStrategy::Polling {
        job_id: "abc".to_string(),
        fallback: ImportResults::default(),
    });
    let rx = handle.subscribe();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    handle.cancel();
    let frozen = rx.borrow().clone();
    assert_eq!(frozen.progress_percent, 10);

    assert!(matches!(handle.outcome().await, Err(AppError::Cancelled)));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(*rx.borrow(), frozen);
    assert_eq!(FakeBackend::count(&backend.status_calls), 1);
}
