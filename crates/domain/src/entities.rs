use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use scheduler_errors::SchedulerResult;

use crate::value_objects::{validate_duration, Complexity, TaskId, TaskIdAllocator, TaskState};

/// 模拟工作时单次休眠的上限，决定了取消信号的响应粒度
pub const WORK_SLICE: Duration = Duration::from_millis(100);

/// 一次派发结束时任务所处的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskOutcome {
    Completed,
    /// 时间片用完但仍有剩余工作
    Preempted,
    Paused,
    Interrupted,
    /// 任务正在被其他派发执行，本次未运行
    Skipped,
}

#[derive(Debug)]
struct TaskRuntime {
    state: TaskState,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    executed: Duration,
    dispatch_count: u32,
    cancel: Option<CancellationToken>,
    /// 本次派发的取消信号来自 `pause()`，而非中断
    pause_requested: bool,
}

#[derive(Debug)]
struct TaskInner {
    id: TaskId,
    name: String,
    complexity: Complexity,
    estimated_duration: Duration,
    created_at: DateTime<Utc>,
    runtime: Mutex<TaskRuntime>,
    resumed: Notify,
}

/// 电路仿真任务
///
/// `Task` 是共享句柄，克隆后指向同一个任务。身份字段在构造后不可变；
/// 运行时字段（状态、开始/结束时间、已执行时长）只由当前执行它的调度策略修改，
/// 或由操作员通过 [`Task::pause`] / [`Task::interrupt`] 修改。
#[derive(Debug, Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    pub fn new(ids: &TaskIdAllocator, name: impl Into<String>, complexity: Complexity) -> Self {
        Self::build(ids.allocate(), name.into(), complexity, complexity.sample_duration())
    }

    /// 使用固定的预计耗时创建任务，不要求落在复杂度区间内
    pub fn with_estimated_duration(
        ids: &TaskIdAllocator,
        name: impl Into<String>,
        complexity: Complexity,
        estimated_duration: Duration,
    ) -> SchedulerResult<Self> {
        let estimated_duration = validate_duration(estimated_duration)?;
        Ok(Self::build(ids.allocate(), name.into(), complexity, estimated_duration))
    }

    fn build(id: TaskId, name: String, complexity: Complexity, estimated_duration: Duration) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id,
                name,
                complexity,
                estimated_duration,
                created_at: Utc::now(),
                runtime: Mutex::new(TaskRuntime {
                    state: TaskState::Created,
                    started_at: None,
                    finished_at: None,
                    executed: Duration::ZERO,
                    dispatch_count: 0,
                    cancel: None,
                    pause_requested: false,
                }),
                resumed: Notify::new(),
            }),
        }
    }

    fn runtime(&self) -> MutexGuard<'_, TaskRuntime> {
        self.inner
            .runtime
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }
    pub fn name(&self) -> &str {
        &self.inner.name
    }
    pub fn complexity(&self) -> Complexity {
        self.inner.complexity
    }
    pub fn estimated_duration(&self) -> Duration {
        self.inner.estimated_duration
    }
    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.runtime().started_at
    }
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.runtime().finished_at
    }
    pub fn state(&self) -> TaskState {
        self.runtime().state
    }
    pub fn is_completed(&self) -> bool {
        self.state() == TaskState::Completed
    }
    /// 累计已模拟执行的工作量
    pub fn executed_time(&self) -> Duration {
        self.runtime().executed
    }
    pub fn remaining_time(&self) -> Duration {
        self.inner
            .estimated_duration
            .saturating_sub(self.runtime().executed)
    }
    pub fn dispatch_count(&self) -> u32 {
        self.runtime().dispatch_count
    }

    pub fn waiting_time(&self) -> Duration {
        match self.runtime().started_at {
            Some(started) => span(self.inner.created_at, started),
            None => Duration::ZERO,
        }
    }
    pub fn execution_time(&self) -> Duration {
        let rt = self.runtime();
        match (rt.started_at, rt.finished_at) {
            (Some(started), Some(finished)) => span(started, finished),
            _ => Duration::ZERO,
        }
    }
    pub fn turnaround_time(&self) -> Duration {
        match self.runtime().finished_at {
            Some(finished) => span(self.inner.created_at, finished),
            None => Duration::ZERO,
        }
    }
    /// 完成百分比（0-100）
    pub fn progress(&self) -> f64 {
        let rt = self.runtime();
        progress_of(&rt, self.inner.estimated_duration)
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        let rt = self.runtime();
        let created_at = self.inner.created_at;
        TaskSnapshot {
            id: self.inner.id,
            name: self.inner.name.clone(),
            complexity: self.inner.complexity,
            state: rt.state,
            estimated_duration_ms: millis(self.inner.estimated_duration),
            executed_ms: millis(rt.executed),
            created_at,
            started_at: rt.started_at,
            finished_at: rt.finished_at,
            waiting_time_ms: rt
                .started_at
                .map(|s| millis(span(created_at, s)))
                .unwrap_or(0),
            execution_time_ms: match (rt.started_at, rt.finished_at) {
                (Some(s), Some(f)) => millis(span(s, f)),
                _ => 0,
            },
            turnaround_time_ms: rt
                .finished_at
                .map(|f| millis(span(created_at, f)))
                .unwrap_or(0),
            progress: progress_of(&rt, self.inner.estimated_duration),
            dispatch_count: rt.dispatch_count,
        }
    }

    /// 运行任务直到完成，或被取消/暂停
    pub async fn run(&self, cancel: CancellationToken) -> TaskOutcome {
        self.run_for(self.inner.estimated_duration, cancel).await
    }

    /// 运行至多 `budget` 时长的工作
    ///
    /// 工作以不超过 [`WORK_SLICE`] 的休眠片段模拟，每个片段结束前都会响应取消信号。
    /// 剩余工作耗尽时任务进入 `Completed`；预算用完但仍有剩余时回到 `Ready`。
    pub async fn run_for(&self, budget: Duration, cancel: CancellationToken) -> TaskOutcome {
        let target = {
            let mut rt = self.runtime();
            if !rt.state.is_dispatchable() {
                return match rt.state {
                    TaskState::Completed => TaskOutcome::Completed,
                    TaskState::Interrupted => TaskOutcome::Interrupted,
                    TaskState::Paused => TaskOutcome::Paused,
                    _ => TaskOutcome::Skipped,
                };
            }
            if cancel.is_cancelled() {
                rt.state = TaskState::Interrupted;
                return TaskOutcome::Interrupted;
            }
            rt.state = TaskState::Running;
            if rt.started_at.is_none() {
                rt.started_at = Some(Utc::now());
            }
            rt.dispatch_count += 1;
            rt.cancel = Some(cancel.clone());
            rt.pause_requested = false;
            budget.min(self.inner.estimated_duration.saturating_sub(rt.executed))
        };

        debug!(
            "[任务 {}] 开始执行: {} ({}), 本次预算 {} ms",
            self.inner.id,
            self.inner.name,
            self.inner.complexity,
            target.as_millis()
        );

        let mut ran = Duration::ZERO;
        let mut last_decile = (self.progress() / 10.0) as u32;
        while ran < target {
            let step = WORK_SLICE.min(target - ran);
            let slice_started = Instant::now();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let partial = slice_started.elapsed().min(step);
                    return self.on_cancelled(partial);
                }
                _ = tokio::time::sleep(step) => {}
            }
            ran += step;

            let percent = {
                let mut rt = self.runtime();
                rt.executed += step;
                progress_of(&rt, self.inner.estimated_duration)
            };
            let decile = (percent / 10.0) as u32;
            if decile > last_decile {
                last_decile = decile;
                debug!("[任务 {}] 进度: {}%", self.inner.id, percent as u32);
            }
        }

        self.finish_dispatch()
    }

    fn on_cancelled(&self, partial: Duration) -> TaskOutcome {
        let mut rt = self.runtime();
        rt.executed = (rt.executed + partial).min(self.inner.estimated_duration);
        rt.cancel = None;
        let paused = std::mem::take(&mut rt.pause_requested);
        match rt.state {
            TaskState::Interrupted => {
                info!("[任务 {}] 仿真被中断", self.inner.id);
                TaskOutcome::Interrupted
            }
            // 暂停后可能已被立即恢复为 Ready，两种情况都交回调度策略重新派发
            TaskState::Paused | TaskState::Ready if paused => {
                debug!("[任务 {}] 已暂停", self.inner.id);
                TaskOutcome::Paused
            }
            TaskState::Paused => TaskOutcome::Paused,
            _ => {
                rt.state = TaskState::Interrupted;
                info!("[任务 {}] 仿真被中断", self.inner.id);
                TaskOutcome::Interrupted
            }
        }
    }

    fn finish_dispatch(&self) -> TaskOutcome {
        let mut rt = self.runtime();
        rt.cancel = None;
        rt.pause_requested = false;
        match rt.state {
            TaskState::Paused => return TaskOutcome::Paused,
            TaskState::Interrupted => return TaskOutcome::Interrupted,
            _ => {}
        }
        if rt.executed >= self.inner.estimated_duration {
            let finished = Utc::now();
            rt.finished_at = Some(finished);
            rt.state = TaskState::Completed;
            let elapsed = rt.started_at.map(|s| span(s, finished)).unwrap_or_default();
            info!(
                "[任务 {}] 仿真完成，耗时 {} ms",
                self.inner.id,
                elapsed.as_millis()
            );
            TaskOutcome::Completed
        } else {
            rt.state = TaskState::Ready;
            TaskOutcome::Preempted
        }
    }

    /// 暂停正在运行的任务；非运行状态下无操作
    pub fn pause(&self) -> bool {
        let mut rt = self.runtime();
        if rt.state != TaskState::Running {
            return false;
        }
        rt.state = TaskState::Paused;
        if let Some(token) = rt.cancel.take() {
            rt.pause_requested = true;
            token.cancel();
        }
        true
    }

    /// 恢复已暂停的任务，使其可被重新调度
    pub fn resume(&self) -> bool {
        {
            let mut rt = self.runtime();
            if rt.state != TaskState::Paused {
                return false;
            }
            rt.state = TaskState::Ready;
        }
        self.inner.resumed.notify_waiters();
        true
    }

    /// 中断任务，可重复调用；已完成的任务保持完成状态
    pub fn interrupt(&self) {
        let mut rt = self.runtime();
        if let Some(token) = rt.cancel.take() {
            token.cancel();
        }
        if rt.state != TaskState::Completed {
            rt.state = TaskState::Interrupted;
        }
        drop(rt);
        self.inner.resumed.notify_waiters();
    }

    /// 等待任务离开 `Paused` 状态；若 `cancel` 先触发则返回 `false`
    pub async fn wait_until_resumed(&self, cancel: &CancellationToken) -> bool {
        loop {
            let notified = self.inner.resumed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.state() != TaskState::Paused {
                return true;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                _ = &mut notified => {}
            }
        }
    }
}

fn span(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or(Duration::ZERO)
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

fn progress_of(rt: &TaskRuntime, estimated: Duration) -> f64 {
    if rt.finished_at.is_some() {
        return 100.0;
    }
    if rt.started_at.is_none() || estimated.is_zero() {
        return 0.0;
    }
    (rt.executed.as_secs_f64() * 100.0 / estimated.as_secs_f64()).min(100.0)
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Task {}

impl Hash for Task {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 默认按创建时间排序，创建时间相同时按ID
impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner
            .created_at
            .cmp(&other.inner.created_at)
            .then_with(|| self.inner.id.cmp(&other.inner.id))
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Task[{}: {}, {}, {}ms]",
            self.inner.id,
            self.inner.name,
            self.inner.complexity,
            self.inner.estimated_duration.as_millis()
        )
    }
}

/// 任务在某一时刻的只读快照，供观察者、历史表格和指标计算使用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub complexity: Complexity,
    pub state: TaskState,
    pub estimated_duration_ms: u64,
    pub executed_ms: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub waiting_time_ms: u64,
    pub execution_time_ms: u64,
    pub turnaround_time_ms: u64,
    pub progress: f64,
    pub dispatch_count: u32,
}

impl TaskSnapshot {
    pub fn is_completed(&self) -> bool {
        self.state == TaskState::Completed
    }
}
