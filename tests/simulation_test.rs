use std::io::Write;
use std::time::Duration;

use circuit_scheduler::{Application, BatchPlan, RunOptions};
use scheduler_config::AppConfig;
use scheduler_dispatcher::StrategyKind;
use scheduler_domain::Complexity;
use scheduler_testing_utils::TaskBuilder;

fn options(strategy: StrategyKind) -> RunOptions {
    RunOptions {
        strategy,
        batch: BatchPlan::Mixed {
            simple: 0,
            medium: 0,
            complex: 0,
        },
    }
}

#[tokio::test]
async fn test_end_to_end_round_robin_run() {
    let app = Application::new(AppConfig::default(), options(StrategyKind::RoundRobin));
    let tasks = TaskBuilder::new().build_with_durations(&[120, 60, 90]);

    let outcome = app
        .run_with_tasks(tasks.clone(), std::future::pending())
        .await
        .unwrap();

    assert!(!outcome.stopped);
    assert_eq!(outcome.report.algorithm, "Round Robin (RR)");
    assert_eq!(outcome.report.task_count, 3);
    assert_eq!(outcome.report.completed_count, 3);
    assert!(outcome.report.end_time.is_some());
    assert!(tasks.iter().all(|t| t.is_completed()));
    assert!(!app.scheduler().is_simulation_running());
}

#[tokio::test]
async fn test_shutdown_signal_stops_run() {
    let app = Application::new(AppConfig::default(), options(StrategyKind::Fcfs));
    let tasks = TaskBuilder::new().build_with_durations(&[5_000, 5_000]);

    let outcome = app
        .run_with_tasks(tasks.clone(), tokio::time::sleep(Duration::from_millis(150)))
        .await
        .unwrap();

    assert!(outcome.stopped);
    assert_eq!(outcome.report.completed_count, 0);
    assert_eq!(outcome.report.throughput, 0.0);
    assert_eq!(outcome.report.cpu_utilization, 0.0);
    assert!(tasks.iter().all(|t| !t.is_completed()));
}

#[tokio::test]
async fn test_empty_batch_fails_to_start() {
    let app = Application::new(AppConfig::default(), options(StrategyKind::Sjf));
    let result = app.run(std::future::pending()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_messages_are_forwarded() {
    let app = Application::new(AppConfig::default(), options(StrategyKind::Fcfs));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = app.forward_messages(move |message| {
        let _ = tx.send(message);
    });

    app.run_with_tasks(
        TaskBuilder::new().build_with_durations(&[20]),
        std::future::pending(),
    )
    .await
    .unwrap();

    // 丢弃应用后转发任务输出完剩余消息自行结束
    drop(app);
    tokio::time::timeout(Duration::from_secs(1), printer)
        .await
        .expect("转发任务应在控制器丢弃后结束")
        .unwrap();

    let mut seen = Vec::new();
    while let Ok(message) = rx.try_recv() {
        seen.push(message);
    }
    assert!(seen.iter().any(|m| m.contains("模拟完成")));
}

#[test]
fn test_run_options_from_config_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[simulation]
default_strategy = "round_robin"

[simulation.round_robin]
quantum_ms = 50
context_switch_ms = 5

[batch]
name_prefix = "Board"
simple = 4
medium = 0
complex = 1
"#
    )
    .unwrap();

    let config = AppConfig::load(file.path().to_str()).unwrap();
    let options = RunOptions::from_config(&config).unwrap();

    assert_eq!(options.strategy, StrategyKind::RoundRobin);
    assert_eq!(
        options.batch,
        BatchPlan::Mixed {
            simple: 4,
            medium: 0,
            complex: 1
        }
    );
}

#[tokio::test]
async fn test_generated_batch_uses_configured_prefix() {
    let mut config = AppConfig::default();
    config.batch.name_prefix = "Board".to_string();
    let app = Application::new(
        config,
        RunOptions {
            strategy: StrategyKind::Fcfs,
            batch: BatchPlan::Homogeneous {
                complexity: Complexity::Medium,
                count: 2,
            },
        },
    );

    let batch = app.generate_batch();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].name(), "Board_Medium_1");
    assert!(batch.iter().all(|t| Complexity::Medium.contains(t.estimated_duration())));
}
