use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scheduler_domain::{Complexity, Task, TaskSnapshot};

/// 一次模拟运行的性能指标
///
/// 持有运行开始时的任务集合（共享句柄）以及运行的起止时间。任务集合在构造后不再增减，
/// 各项指标在调用时根据任务的当前状态重新计算。
#[derive(Debug, Clone)]
pub struct SchedulerMetrics {
    tasks: Vec<Task>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
}

impl SchedulerMetrics {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self::starting_at(tasks, Utc::now())
    }

    pub fn starting_at(tasks: Vec<Task>, start_time: DateTime<Utc>) -> Self {
        Self {
            tasks,
            start_time,
            end_time: None,
        }
    }

    /// 记录运行结束时间，只生效一次
    pub fn mark_end(&mut self) -> bool {
        self.mark_end_at(Utc::now())
    }

    pub fn mark_end_at(&mut self, end_time: DateTime<Utc>) -> bool {
        if self.end_time.is_some() {
            return false;
        }
        self.end_time = Some(end_time);
        true
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// 运行开始时的任务快照，供历史表格使用
    pub fn tasks(&self) -> Vec<TaskSnapshot> {
        self.tasks.iter().map(Task::snapshot).collect()
    }

    /// 整个运行的时长；尚未结束时计算到当前时刻
    pub fn total_execution_time(&self) -> Duration {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_completed()).count()
    }

    pub fn throughput(&self) -> f64 {
        throughput(&self.tasks(), self.total_execution_time())
    }

    pub fn average_waiting_time(&self) -> f64 {
        average_waiting_time(&self.tasks())
    }

    pub fn average_turnaround_time(&self) -> f64 {
        average_turnaround_time(&self.tasks())
    }

    pub fn cpu_utilization(&self) -> f64 {
        cpu_utilization(&self.tasks(), self.total_execution_time())
    }

    pub fn standard_deviation_waiting_time(&self) -> f64 {
        standard_deviation_waiting_time(&self.tasks())
    }

    pub fn average_waiting_time_for(&self, complexity: Complexity) -> f64 {
        average_waiting_time(&of_complexity(&self.tasks(), complexity))
    }

    pub fn average_turnaround_time_for(&self, complexity: Complexity) -> f64 {
        average_turnaround_time(&of_complexity(&self.tasks(), complexity))
    }

    pub fn completed_count_for(&self, complexity: Complexity) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.complexity() == complexity && t.is_completed())
            .count()
    }

    /// 基于同一份快照计算全部指标
    pub fn report(&self, algorithm: impl Into<String>) -> MetricsReport {
        let snapshots = self.tasks();
        let total = self.total_execution_time();

        let by_complexity = Complexity::ALL
            .iter()
            .map(|&complexity| {
                let subset = of_complexity(&snapshots, complexity);
                ComplexityBreakdown {
                    complexity,
                    task_count: subset.len(),
                    completed_count: subset.iter().filter(|t| t.is_completed()).count(),
                    average_waiting_time_ms: average_waiting_time(&subset),
                    average_turnaround_time_ms: average_turnaround_time(&subset),
                }
            })
            .collect();

        MetricsReport {
            algorithm: algorithm.into(),
            task_count: snapshots.len(),
            completed_count: snapshots.iter().filter(|t| t.is_completed()).count(),
            start_time: self.start_time,
            end_time: self.end_time,
            total_execution_time_ms: total.as_millis() as u64,
            throughput: throughput(&snapshots, total),
            average_waiting_time_ms: average_waiting_time(&snapshots),
            average_turnaround_time_ms: average_turnaround_time(&snapshots),
            cpu_utilization: cpu_utilization(&snapshots, total),
            standard_deviation_waiting_time_ms: standard_deviation_waiting_time(&snapshots),
            by_complexity,
        }
    }
}

fn of_complexity(tasks: &[TaskSnapshot], complexity: Complexity) -> Vec<TaskSnapshot> {
    tasks
        .iter()
        .filter(|t| t.complexity == complexity)
        .cloned()
        .collect()
}

fn completed(tasks: &[TaskSnapshot]) -> impl Iterator<Item = &TaskSnapshot> {
    tasks.iter().filter(|t| t.is_completed())
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// 每秒完成的任务数
pub fn throughput(tasks: &[TaskSnapshot], total: Duration) -> f64 {
    let seconds = total.as_secs_f64();
    if seconds <= 0.0 {
        return 0.0;
    }
    completed(tasks).count() as f64 / seconds
}

/// 已完成任务的平均等待时间（毫秒）
pub fn average_waiting_time(tasks: &[TaskSnapshot]) -> f64 {
    mean(completed(tasks).map(|t| t.waiting_time_ms as f64))
}

/// 已完成任务的平均周转时间（毫秒）
pub fn average_turnaround_time(tasks: &[TaskSnapshot]) -> f64 {
    mean(completed(tasks).map(|t| t.turnaround_time_ms as f64))
}

/// 已完成任务执行时间之和占运行总时长的百分比，不做截断
pub fn cpu_utilization(tasks: &[TaskSnapshot], total: Duration) -> f64 {
    let total_ms = total.as_secs_f64() * 1000.0;
    if total_ms <= 0.0 {
        return 0.0;
    }
    let busy: f64 = completed(tasks).map(|t| t.execution_time_ms as f64).sum();
    busy * 100.0 / total_ms
}

/// 已完成任务等待时间的总体标准差（毫秒）
pub fn standard_deviation_waiting_time(tasks: &[TaskSnapshot]) -> f64 {
    let avg = average_waiting_time(tasks);
    let variance = mean(completed(tasks).map(|t| {
        let diff = t.waiting_time_ms as f64 - avg;
        diff * diff
    }));
    variance.sqrt()
}

/// 按复杂度分组的统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityBreakdown {
    pub complexity: Complexity,
    pub task_count: usize,
    pub completed_count: usize,
    pub average_waiting_time_ms: f64,
    pub average_turnaround_time_ms: f64,
}

/// 一次运行的指标汇总，可序列化输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub algorithm: String,
    pub task_count: usize,
    pub completed_count: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_execution_time_ms: u64,
    pub throughput: f64,
    pub average_waiting_time_ms: f64,
    pub average_turnaround_time_ms: f64,
    pub cpu_utilization: f64,
    pub standard_deviation_waiting_time_ms: f64,
    pub by_complexity: Vec<ComplexityBreakdown>,
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===== 性能指标: {} =====", self.algorithm)?;
        writeln!(f, "任务总数: {}", self.task_count)?;
        writeln!(f, "已完成任务: {}", self.completed_count)?;
        writeln!(f, "总执行时间: {} ms", self.total_execution_time_ms)?;
        writeln!(f, "吞吐量: {:.2} 任务/秒", self.throughput)?;
        writeln!(f, "平均等待时间: {:.2} ms", self.average_waiting_time_ms)?;
        writeln!(f, "平均周转时间: {:.2} ms", self.average_turnaround_time_ms)?;
        writeln!(f, "CPU利用率: {:.2}%", self.cpu_utilization)?;
        writeln!(
            f,
            "等待时间标准差: {:.2} ms",
            self.standard_deviation_waiting_time_ms
        )?;
        writeln!(f, "----- 按复杂度 -----")?;
        writeln!(
            f,
            "{:<10} {:>6} {:>6} {:>14} {:>14}",
            "复杂度", "任务", "完成", "平均等待(ms)", "平均周转(ms)"
        )?;
        for row in &self.by_complexity {
            writeln!(
                f,
                "{:<10} {:>6} {:>6} {:>14.2} {:>14.2}",
                row.complexity.display_name(),
                row.task_count,
                row.completed_count,
                row.average_waiting_time_ms,
                row.average_turnaround_time_ms
            )?;
        }
        Ok(())
    }
}
