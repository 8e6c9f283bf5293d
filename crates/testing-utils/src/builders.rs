//! 测试数据构建器

use std::time::Duration;

use chrono::{DateTime, Utc};
use scheduler_domain::{Complexity, Task, TaskId, TaskIdAllocator, TaskSnapshot, TaskState};

/// 构建预计耗时固定的任务，便于断言执行顺序与耗时
///
/// 每个构建器持有独立的ID分配器，从 1 开始编号。
pub struct TaskBuilder {
    ids: TaskIdAllocator,
    name: Option<String>,
    complexity: Complexity,
    duration: Duration,
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self::with_allocator(TaskIdAllocator::new())
    }

    pub fn with_allocator(ids: TaskIdAllocator) -> Self {
        Self {
            ids,
            name: None,
            complexity: Complexity::Simple,
            duration: Duration::from_millis(100),
        }
    }

    pub fn allocator(&self) -> &TaskIdAllocator {
        &self.ids
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration = Duration::from_millis(ms.max(1));
        self
    }

    /// 按当前设置构建一个任务；未指定名称时使用 `test_task_<id>`
    pub fn build(&self) -> Task {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("test_task_{}", self.ids.peek()));
        Task::with_estimated_duration(&self.ids, name, self.complexity, self.duration)
            .expect("测试任务的耗时必须大于0")
    }

    /// 为每个耗时构建一个任务，顺序与参数一致
    pub fn build_with_durations(&self, durations_ms: &[u64]) -> Vec<Task> {
        durations_ms
            .iter()
            .map(|&ms| {
                Task::with_estimated_duration(
                    &self.ids,
                    format!("test_task_{}", self.ids.peek()),
                    self.complexity,
                    Duration::from_millis(ms),
                )
                .expect("测试任务的耗时必须大于0")
            })
            .collect()
    }
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 构建任务快照，用于直接测试指标计算
pub struct TaskSnapshotBuilder {
    snapshot: TaskSnapshot,
}

impl TaskSnapshotBuilder {
    pub fn new(id: TaskId) -> Self {
        let now = Utc::now();
        Self {
            snapshot: TaskSnapshot {
                id,
                name: format!("snapshot_{id}"),
                complexity: Complexity::Simple,
                state: TaskState::Created,
                estimated_duration_ms: 1_000,
                executed_ms: 0,
                created_at: now,
                started_at: None,
                finished_at: None,
                waiting_time_ms: 0,
                execution_time_ms: 0,
                turnaround_time_ms: 0,
                progress: 0.0,
                dispatch_count: 0,
            },
        }
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.snapshot.complexity = complexity;
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.snapshot.created_at = created_at;
        self
    }

    /// 标记为已完成，并按给定的等待与执行时长填充时间字段
    pub fn completed(mut self, waiting_ms: u64, execution_ms: u64) -> Self {
        let started = self.snapshot.created_at + chrono::Duration::milliseconds(waiting_ms as i64);
        let finished = started + chrono::Duration::milliseconds(execution_ms as i64);
        let s = &mut self.snapshot;
        s.state = TaskState::Completed;
        s.estimated_duration_ms = execution_ms;
        s.executed_ms = execution_ms;
        s.started_at = Some(started);
        s.finished_at = Some(finished);
        s.waiting_time_ms = waiting_ms;
        s.execution_time_ms = execution_ms;
        s.turnaround_time_ms = waiting_ms + execution_ms;
        s.progress = 100.0;
        s.dispatch_count = 1;
        self
    }

    pub fn interrupted(mut self, waiting_ms: u64) -> Self {
        let started = self.snapshot.created_at + chrono::Duration::milliseconds(waiting_ms as i64);
        let s = &mut self.snapshot;
        s.state = TaskState::Interrupted;
        s.started_at = Some(started);
        s.waiting_time_ms = waiting_ms;
        s.dispatch_count = 1;
        self
    }

    pub fn build(self) -> TaskSnapshot {
        self.snapshot
    }
}
