use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use scheduler_domain::{SchedulerResult, Task, TaskOutcome, TaskState};

use super::{
    abandon_paused, execute_on_worker, prepare_run, RunControl, RunGuard, SchedulerStrategy,
};

/// 默认时间片
pub const QUANTUM: Duration = Duration::from_millis(100);
/// 默认上下文切换开销
pub const CONTEXT_SWITCH: Duration = Duration::from_millis(10);

const NAME: &str = "Round Robin (RR)";

/// 队首任务处于暂停状态时的最小让出间隔
const PAUSED_POLL: Duration = Duration::from_millis(5);

/// 一次轮转调度运行的统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoundRobinStats {
    /// 检查过的非暂停任务次数
    pub cycles: u64,
    /// 实际派发的时间片数
    pub slices: u64,
    pub completed: u64,
    pub total: u64,
}

impl RoundRobinStats {
    /// 完成任务数占比（百分比）
    pub fn efficiency(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 * 100.0 / self.total as f64
    }
}

/// 时间片轮转：固定时间片抢占，每次派发后计入上下文切换开销
#[derive(Debug)]
pub struct RoundRobinStrategy {
    quantum: Duration,
    context_switch: Duration,
    control: Arc<RunControl>,
    stats: Arc<Mutex<Option<RoundRobinStats>>>,
}

impl RoundRobinStrategy {
    pub fn new() -> Self {
        Self::with_timing(QUANTUM, CONTEXT_SWITCH)
    }

    pub fn with_timing(quantum: Duration, context_switch: Duration) -> Self {
        Self {
            quantum: quantum.max(Duration::from_millis(1)),
            context_switch,
            control: Arc::new(RunControl::new()),
            stats: Arc::new(Mutex::new(None)),
        }
    }

    pub fn quantum(&self) -> Duration {
        self.quantum
    }

    pub fn context_switch(&self) -> Duration {
        self.context_switch
    }

    /// 最近一次运行结束时的统计；运行中或从未运行时为 `None`
    pub fn last_run_stats(&self) -> Option<RoundRobinStats> {
        *self
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RoundRobinStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// 轮转调度主循环，就绪队列只由本循环持有和修改
async fn run_round_robin(
    tasks: Vec<Task>,
    quantum: Duration,
    context_switch: Duration,
    cancel: CancellationToken,
) -> RoundRobinStats {
    let mut stats = RoundRobinStats {
        total: tasks.len() as u64,
        ..Default::default()
    };
    let mut ready: VecDeque<Task> = tasks.into();

    while let Some(task) = ready.pop_front() {
        if cancel.is_cancelled() {
            info!("RR 调度已停止，就绪队列中还有 {} 个任务", ready.len() + 1);
            ready.push_front(task);
            break;
        }

        if task.state() == TaskState::Paused {
            ready.push_back(task);
            if !idle(context_switch.max(PAUSED_POLL), &cancel).await {
                break;
            }
            continue;
        }
        stats.cycles += 1;

        match task.state() {
            TaskState::Completed => {
                debug!("任务 {} 已完成，移出就绪队列", task.id());
                continue;
            }
            TaskState::Interrupted => {
                debug!("任务 {} 已中断，移出就绪队列", task.id());
                continue;
            }
            TaskState::Paused | TaskState::Created | TaskState::Ready | TaskState::Running => {}
        }

        let slice = quantum.min(task.remaining_time());
        debug!(
            "RR 第 {} 轮: 任务 {} 运行 {} ms，剩余 {} ms",
            stats.cycles,
            task.id(),
            slice.as_millis(),
            task.remaining_time().as_millis()
        );
        stats.slices += 1;
        counter!("scheduler_tasks_dispatched_total", "strategy" => "round_robin").increment(1);

        match execute_on_worker(&task, Some(slice), cancel.child_token()).await {
            Ok(TaskOutcome::Completed) => {
                stats.completed += 1;
                counter!("scheduler_tasks_completed_total", "strategy" => "round_robin")
                    .increment(1);
                histogram!("scheduler_task_execution_ms", "strategy" => "round_robin")
                    .record(task.execution_time().as_millis() as f64);
                info!("任务 {} 已完成 ({}/{})", task.id(), stats.completed, stats.total);
            }
            Ok(TaskOutcome::Preempted) | Ok(TaskOutcome::Paused) => ready.push_back(task),
            Ok(TaskOutcome::Interrupted) => {
                counter!("scheduler_tasks_interrupted_total", "strategy" => "round_robin")
                    .increment(1);
                warn!("任务 {} 被中断", task.id());
            }
            Ok(TaskOutcome::Skipped) => {
                warn!("任务 {} 正在其他调度中运行，稍后重试", task.id());
                ready.push_back(task);
            }
            Err(e) => error!("执行任务 {} 时出错: {}", task.id(), e),
        }

        counter!("scheduler_rr_context_switches_total").increment(1);
        if !idle(context_switch, &cancel).await {
            info!("RR 调度在上下文切换时被停止");
            break;
        }
    }

    ready.iter().for_each(abandon_paused);
    stats
}

/// 可取消的等待；被取消时返回 `false`
async fn idle(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[async_trait]
impl SchedulerStrategy for RoundRobinStrategy {
    fn schedule(&self, tasks: Vec<Task>) -> SchedulerResult<()> {
        let Some(cancel) = prepare_run(&self.control, NAME, &tasks)? else {
            return Ok(());
        };
        info!(
            "RR 开始调度 {} 个任务，时间片 {} ms，上下文切换 {} ms",
            tasks.len(),
            self.quantum.as_millis(),
            self.context_switch.as_millis()
        );

        let slot = Arc::clone(&self.stats);
        *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        let (quantum, context_switch) = (self.quantum, self.context_switch);
        let guard = RunGuard(Arc::clone(&self.control));
        tokio::spawn(async move {
            let _guard = guard;
            let stats = run_round_robin(tasks, quantum, context_switch, cancel).await;
            info!(
                "RR 调度结束: {} 轮, {} 个时间片, 完成 {}/{} ({:.1}%)",
                stats.cycles,
                stats.slices,
                stats.completed,
                stats.total,
                stats.efficiency()
            );
            *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(stats);
        });
        Ok(())
    }

    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> String {
        format!(
            "每个任务每次最多运行 {}ms 的时间片，未完成的任务回到就绪队列末尾；\
             每次派发后计入 {}ms 的上下文切换开销。抢占式，响应公平，但切换开销会降低CPU利用率。",
            self.quantum.as_millis(),
            self.context_switch.as_millis()
        )
    }

    fn interrupt(&self) {
        info!("RR 收到中断请求");
        self.control.interrupt();
    }

    fn is_running(&self) -> bool {
        self.control.is_running()
    }

    async fn wait_until_idle(&self) {
        self.control.wait_until_idle().await;
    }
}
