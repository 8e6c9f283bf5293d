use std::time::Duration;

use chrono::Utc;
use scheduler_dispatcher::metrics::{
    average_turnaround_time, average_waiting_time, cpu_utilization,
    standard_deviation_waiting_time, throughput,
};
use scheduler_dispatcher::{FirstComeFirstServedStrategy, SchedulerMetrics, SchedulerStrategy};
use scheduler_domain::Complexity;
use scheduler_testing_utils::{TaskBuilder, TaskSnapshotBuilder};

#[test]
fn test_zero_completed_tasks_yield_zero() {
    let tasks = vec![
        TaskSnapshotBuilder::new(1).interrupted(20).build(),
        TaskSnapshotBuilder::new(2).build(),
    ];
    let total = Duration::from_secs(5);

    assert_eq!(average_waiting_time(&tasks), 0.0);
    assert_eq!(average_turnaround_time(&tasks), 0.0);
    assert_eq!(throughput(&tasks, total), 0.0);
    assert_eq!(cpu_utilization(&tasks, total), 0.0);
    assert_eq!(standard_deviation_waiting_time(&tasks), 0.0);
    assert!(!standard_deviation_waiting_time(&tasks).is_nan());
}

#[test]
fn test_back_to_back_execution_is_full_utilization() {
    let n = 4;
    let e = 250;
    let tasks: Vec<_> = (0..n)
        .map(|i| TaskSnapshotBuilder::new(i + 1).completed(i * e, e).build())
        .collect();
    let total = Duration::from_millis(n * e);

    let cpu = cpu_utilization(&tasks, total);
    assert!((cpu - 100.0).abs() < 1e-9, "{cpu}");
    assert_eq!(throughput(&tasks, total), 4.0);
    // 等待时间 0, 250, 500, 750
    assert_eq!(average_waiting_time(&tasks), 375.0);
    let expected_sd = 78_125.0f64.sqrt();
    assert!((standard_deviation_waiting_time(&tasks) - expected_sd).abs() < 1e-6);
}

#[tokio::test]
async fn test_per_complexity_breakdown() {
    let builder = TaskBuilder::new();
    let simple = builder.build_with_durations(&[30, 30]);
    let medium = TaskBuilder::with_allocator(builder.allocator().clone())
        .with_complexity(Complexity::Medium)
        .with_duration_ms(40)
        .build();

    let mut all = simple.clone();
    all.push(medium.clone());
    let metrics = SchedulerMetrics::new(all.clone());

    let strategy = FirstComeFirstServedStrategy::new();
    strategy.schedule(all).unwrap();
    strategy.wait_until_idle().await;

    assert_eq!(metrics.completed_count_for(Complexity::Simple), 2);
    assert_eq!(metrics.completed_count_for(Complexity::Medium), 1);
    assert_eq!(metrics.completed_count_for(Complexity::Complex), 0);
    assert_eq!(metrics.average_waiting_time_for(Complexity::Complex), 0.0);
    assert!(
        metrics.average_turnaround_time_for(Complexity::Medium)
            >= metrics.average_turnaround_time_for(Complexity::Simple)
    );

    let report = metrics.report("FCFS");
    let complex = report
        .by_complexity
        .iter()
        .find(|row| row.complexity == Complexity::Complex)
        .unwrap();
    assert_eq!(complex.task_count, 0);
    assert_eq!(report.task_count, 3);
}

#[tokio::test]
async fn test_sequential_run_utilization_is_high() {
    let tasks = TaskBuilder::new().build_with_durations(&[100, 100, 100]);
    let mut metrics = SchedulerMetrics::new(tasks.clone());

    let strategy = FirstComeFirstServedStrategy::new();
    strategy.schedule(tasks).unwrap();
    strategy.wait_until_idle().await;
    metrics.mark_end();

    let cpu = metrics.cpu_utilization();
    assert!(cpu > 70.0 && cpu <= 100.0, "{cpu}");
    assert!(metrics.total_execution_time() >= Duration::from_millis(300));
    assert!(metrics.end_time().unwrap() <= Utc::now());

    let json = serde_json::to_value(metrics.report("FCFS")).unwrap();
    assert_eq!(json["completed_count"], 3);
    assert_eq!(json["by_complexity"].as_array().unwrap().len(), 3);
}
