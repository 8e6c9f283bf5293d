use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use scheduler_config::RoundRobinConfig;
use scheduler_domain::{SchedulerError, SchedulerResult, Task, TaskOutcome, TaskState};

mod fcfs;
mod round_robin;
mod sjf;

pub use fcfs::FirstComeFirstServedStrategy;
pub use round_robin::{RoundRobinStats, RoundRobinStrategy, CONTEXT_SWITCH, QUANTUM};
pub use sjf::ShortestJobFirstStrategy;

/// 调度算法的公共接口
///
/// `schedule` 在后台启动一次运行后立即返回；`is_running` 反映后台运行是否存活。
#[async_trait]
pub trait SchedulerStrategy: Send + Sync {
    fn schedule(&self, tasks: Vec<Task>) -> SchedulerResult<()>;

    fn name(&self) -> &str;

    fn description(&self) -> String;

    /// 停止派发新任务并通知正在执行的任务取消
    fn interrupt(&self);

    fn is_running(&self) -> bool;

    /// 等待当前运行结束，未在运行时立即返回
    async fn wait_until_idle(&self);
}

/// 单个策略实例的运行控制：存活标志与本次运行的取消令牌
#[derive(Debug)]
pub(crate) struct RunControl {
    running: watch::Sender<bool>,
    cancel: Mutex<CancellationToken>,
}

impl RunControl {
    pub(crate) fn new() -> Self {
        let (running, _) = watch::channel(false);
        Self {
            running,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// 标记一次运行开始并返回其取消令牌
    pub(crate) fn begin(&self, strategy: &str) -> SchedulerResult<CancellationToken> {
        let started = self.running.send_if_modified(|running| {
            if *running {
                false
            } else {
                *running = true;
                true
            }
        });
        if !started {
            return Err(SchedulerError::invalid_state(format!(
                "{strategy} 已有正在进行的调度"
            )));
        }
        let token = CancellationToken::new();
        *self.cancel_slot() = token.clone();
        Ok(token)
    }

    pub(crate) fn finish(&self) {
        self.running.send_replace(false);
    }

    pub(crate) fn interrupt(&self) {
        self.cancel_slot().cancel();
    }

    pub(crate) fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    pub(crate) async fn wait_until_idle(&self) {
        let mut rx = self.running.subscribe();
        let _ = rx.wait_for(|running| !*running).await;
    }

    fn cancel_slot(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 运行结束（包括 panic 展开）时清除存活标志
pub(crate) struct RunGuard(pub(crate) Arc<RunControl>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// 为一次后台运行做准备：检查运行时并标记开始
pub(crate) fn prepare_run(
    control: &RunControl,
    strategy: &str,
    tasks: &[Task],
) -> SchedulerResult<Option<CancellationToken>> {
    if tasks.is_empty() {
        warn!("{} 的任务列表为空，不进行调度", strategy);
        return Ok(None);
    }
    if tokio::runtime::Handle::try_current().is_err() {
        return Err(SchedulerError::Internal(format!(
            "{strategy} 必须在 tokio 运行时中调度"
        )));
    }
    control.begin(strategy).map(Some)
}

/// 在独立的 worker 上执行一次派发，worker 的异常只影响该任务本身
pub(crate) async fn execute_on_worker(
    task: &Task,
    budget: Option<Duration>,
    cancel: CancellationToken,
) -> SchedulerResult<TaskOutcome> {
    let worker_task = task.clone();
    let handle = tokio::spawn(async move {
        match budget {
            Some(budget) => worker_task.run_for(budget, cancel).await,
            None => worker_task.run(cancel).await,
        }
    });
    handle.await.map_err(|e| {
        task.interrupt();
        SchedulerError::task_execution(task.id(), e.to_string())
    })
}

/// FCFS 与 SJF 共用的非抢占式顺序派发：按给定顺序逐个运行到结束
pub(crate) async fn dispatch_sequentially(
    strategy: &'static str,
    order: Vec<Task>,
    cancel: CancellationToken,
) -> usize {
    let mut completed = 0;

    'tasks: for task in order {
        loop {
            if cancel.is_cancelled() {
                info!("{} 调度已停止，剩余任务不再派发", strategy);
                abandon_paused(&task);
                break 'tasks;
            }
            match task.state() {
                TaskState::Completed | TaskState::Interrupted => {
                    debug!("跳过已结束的任务: {}", task);
                    continue 'tasks;
                }
                TaskState::Paused => {
                    debug!("任务 {} 已暂停，等待恢复", task.id());
                    if !task.wait_until_resumed(&cancel).await {
                        info!("{} 调度已停止，暂停中的任务 {} 被中断", strategy, task.id());
                        abandon_paused(&task);
                        break 'tasks;
                    }
                    continue;
                }
                TaskState::Created | TaskState::Ready | TaskState::Running => {}
            }

            info!("{} 执行任务: {}", strategy, task);
            counter!("scheduler_tasks_dispatched_total", "strategy" => strategy).increment(1);

            match execute_on_worker(&task, None, cancel.child_token()).await {
                Ok(TaskOutcome::Completed) => {
                    completed += 1;
                    counter!("scheduler_tasks_completed_total", "strategy" => strategy)
                        .increment(1);
                    metrics::histogram!("scheduler_task_execution_ms", "strategy" => strategy)
                        .record(task.execution_time().as_millis() as f64);
                    info!("任务 {} 已完成", task.id());
                    continue 'tasks;
                }
                Ok(TaskOutcome::Paused) | Ok(TaskOutcome::Preempted) => continue,
                Ok(TaskOutcome::Interrupted) => {
                    counter!("scheduler_tasks_interrupted_total", "strategy" => strategy)
                        .increment(1);
                    warn!("任务 {} 被中断", task.id());
                    continue 'tasks;
                }
                Ok(TaskOutcome::Skipped) => {
                    warn!("任务 {} 正在其他调度中运行，跳过", task.id());
                    continue 'tasks;
                }
                Err(e) => {
                    error!("执行任务 {} 时出错: {}", task.id(), e);
                    continue 'tasks;
                }
            }
        }
    }

    completed
}

/// 运行停止时，本次运行持有的暂停任务直接中断，避免下一次运行一直等待它恢复
pub(crate) fn abandon_paused(task: &Task) {
    if task.state() == TaskState::Paused {
        task.interrupt();
    }
}

/// 可选的调度算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Fcfs,
    Sjf,
    RoundRobin,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [StrategyKind::Fcfs, StrategyKind::Sjf, StrategyKind::RoundRobin];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Fcfs => "fcfs",
            StrategyKind::Sjf => "sjf",
            StrategyKind::RoundRobin => "round_robin",
        }
    }

    pub fn build(&self, round_robin: &RoundRobinConfig) -> Arc<dyn SchedulerStrategy> {
        match self {
            StrategyKind::Fcfs => Arc::new(FirstComeFirstServedStrategy::new()),
            StrategyKind::Sjf => Arc::new(ShortestJobFirstStrategy::new()),
            StrategyKind::RoundRobin => Arc::new(RoundRobinStrategy::with_timing(
                Duration::from_millis(round_robin.quantum_ms),
                Duration::from_millis(round_robin.context_switch_ms),
            )),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fcfs" | "first_come_first_served" => Ok(StrategyKind::Fcfs),
            "sjf" | "shortest_job_first" => Ok(StrategyKind::Sjf),
            "rr" | "round_robin" => Ok(StrategyKind::RoundRobin),
            other => Err(SchedulerError::validation_error(format!(
                "未知的调度算法: {other}"
            ))),
        }
    }
}
