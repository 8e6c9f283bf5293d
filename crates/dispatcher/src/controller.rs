use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use scheduler_domain::{
    BatchFactory, Complexity, SchedulerError, SchedulerResult, Task, TaskId, TaskIdAllocator,
    TaskSnapshot, TaskState,
};

use crate::events::{EventBus, EventKind, SchedulerEvent, Subscription};
use crate::metrics::{MetricsReport, SchedulerMetrics};
use crate::strategies::SchedulerStrategy;

/// 运行期间推送任务进度的间隔
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);
/// 停止模拟后等待策略退出的时长
const STOP_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskStatusSummary {
    pub created: usize,
    pub ready: usize,
    pub running: usize,
    pub paused: usize,
    pub completed: usize,
    pub interrupted: usize,
}

impl TaskStatusSummary {
    pub fn total(&self) -> usize {
        self.created + self.ready + self.running + self.paused + self.completed + self.interrupted
    }
    pub fn active(&self) -> usize {
        self.created + self.ready + self.running + self.paused
    }
    pub fn finished(&self) -> usize {
        self.completed + self.interrupted
    }
}

#[derive(Default)]
struct SchedulerState {
    strategy: Option<Arc<dyn SchedulerStrategy>>,
    tasks: Vec<Task>,
    running: bool,
    run_id: u64,
    metrics: Option<SchedulerMetrics>,
}

struct SchedulerInner {
    state: RwLock<SchedulerState>,
    events: EventBus,
    batches: BatchFactory,
    run_state: watch::Sender<bool>,
}

/// 调度控制器
///
/// 持有任务列表和当前调度算法，负责模拟的启动与停止、指标快照以及事件发布。
/// 克隆得到的句柄共享同一个控制器。运行期间不允许清空任务或切换算法。
#[derive(Clone)]
pub struct ProcessScheduler {
    inner: Arc<SchedulerInner>,
}

impl ProcessScheduler {
    pub fn new() -> Self {
        Self::with_batch_factory(BatchFactory::new(TaskIdAllocator::shared()))
    }

    pub fn with_batch_factory(batches: BatchFactory) -> Self {
        let (run_state, _) = watch::channel(false);
        Self {
            inner: Arc::new(SchedulerInner {
                state: RwLock::new(SchedulerState::default()),
                events: EventBus::new(),
                batches,
                run_state,
            }),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        self.inner.events.subscribe()
    }

    pub fn subscribe_to(&self, kind: EventKind) -> Subscription {
        self.inner.events.subscribe_to(kind)
    }

    fn emit_message(&self, message: impl Into<String>) {
        self.inner
            .events
            .publish(SchedulerEvent::Message(message.into()));
    }

    fn emit_tasks(&self, tasks: &[Task]) {
        self.inner.events.publish(SchedulerEvent::TasksUpdated(
            tasks.iter().map(Task::snapshot).collect(),
        ));
    }

    fn emit_state(&self, running: bool) {
        self.inner
            .events
            .publish(SchedulerEvent::SimulationState(running));
    }

    pub async fn set_strategy(&self, strategy: Arc<dyn SchedulerStrategy>) -> SchedulerResult<()> {
        let name = strategy.name().to_string();
        {
            let mut state = self.inner.state.write().await;
            if state.running {
                return Err(SchedulerError::invalid_state("模拟运行中，无法切换调度算法"));
            }
            state.strategy = Some(strategy);
        }
        info!("调度算法已切换为: {}", name);
        self.emit_message(format!("调度算法已切换为: {name}"));
        Ok(())
    }

    /// 添加任务，运行期间同样允许（新到达的任务不参与当前运行）
    pub async fn add_task(&self, task: Task) {
        self.add_tasks(vec![task]).await;
    }

    pub async fn add_tasks(&self, tasks: Vec<Task>) {
        if tasks.is_empty() {
            return;
        }
        let count = tasks.len();
        let snapshot = {
            let mut state = self.inner.state.write().await;
            state.tasks.extend(tasks);
            state.tasks.clone()
        };
        debug!("添加了 {} 个任务，当前共 {} 个", count, snapshot.len());
        self.emit_message(format!("已添加 {count} 个任务"));
        self.emit_tasks(&snapshot);
    }

    pub async fn clear_tasks(&self) -> SchedulerResult<()> {
        {
            let mut state = self.inner.state.write().await;
            if state.running {
                return Err(SchedulerError::invalid_state("模拟运行中，无法清空任务列表"));
            }
            state.tasks.clear();
        }
        info!("任务列表已清空");
        self.emit_message("任务列表已清空");
        self.emit_tasks(&[]);
        Ok(())
    }

    /// 生成同一复杂度的一批任务，不会加入任务列表
    pub fn generate_homogeneous_batch(&self, complexity: Complexity, count: usize) -> Vec<Task> {
        self.inner.batches.homogeneous(complexity, count)
    }

    /// 按简单、中等、复杂的顺序生成混合任务，不会加入任务列表
    pub fn generate_heterogeneous_batch(
        &self,
        simple: usize,
        medium: usize,
        complex: usize,
    ) -> Vec<Task> {
        self.inner.batches.heterogeneous(simple, medium, complex)
    }

    pub async fn start_simulation(&self) -> SchedulerResult<()> {
        let (strategy, run_id, tasks) = {
            let mut state = self.inner.state.write().await;
            let strategy = state
                .strategy
                .clone()
                .ok_or_else(|| SchedulerError::invalid_state("尚未选择调度算法"))?;
            if state.tasks.is_empty() {
                return Err(SchedulerError::invalid_state("任务列表为空"));
            }
            if state.running {
                return Err(SchedulerError::invalid_state("模拟已在运行中"));
            }

            let tasks = state.tasks.clone();
            let metrics = SchedulerMetrics::new(tasks.clone());
            strategy.schedule(tasks.clone())?;

            state.metrics = Some(metrics);
            state.running = true;
            state.run_id += 1;
            self.inner.run_state.send_replace(true);
            (strategy, state.run_id, tasks)
        };

        info!(
            "开始模拟 #{}: {} 个任务，调度算法 {}",
            run_id,
            tasks.len(),
            strategy.name()
        );
        self.emit_message(format!("开始模拟，调度算法: {}", strategy.name()));
        self.emit_state(true);

        let this = self.clone();
        tokio::spawn(async move {
            this.watch_run(strategy, run_id, tasks).await;
        });
        Ok(())
    }

    /// 等待策略运行结束并收尾，运行期间定期推送任务进度
    async fn watch_run(&self, strategy: Arc<dyn SchedulerStrategy>, run_id: u64, tasks: Vec<Task>) {
        let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
        ticker.tick().await;
        let idle = strategy.wait_until_idle();
        tokio::pin!(idle);
        loop {
            tokio::select! {
                _ = &mut idle => break,
                _ = ticker.tick() => self.emit_tasks(&tasks),
            }
        }
        self.finish_run(strategy.name(), run_id).await;
    }

    async fn finish_run(&self, algorithm: &str, run_id: u64) {
        let mut state = self.inner.state.write().await;
        if !state.running || state.run_id != run_id {
            debug!("模拟 #{} 已被停止，跳过收尾", run_id);
            return;
        }
        state.running = false;
        if let Some(metrics) = state.metrics.as_mut() {
            metrics.mark_end();
            info!("模拟 #{} 完成\n{}", run_id, metrics.report(algorithm));
        }

        self.emit_message("模拟完成");
        self.emit_state(false);
        self.emit_tasks(&state.tasks);
        // 完成事件先进入订阅通道，再唤醒 wait_for_completion 的等待方
        self.inner.run_state.send_replace(false);
    }

    /// 停止当前模拟；未运行时无操作，可重复调用
    pub async fn stop_simulation(&self) {
        let strategy = {
            let mut state = self.inner.state.write().await;
            if !state.running {
                debug!("当前没有运行中的模拟");
                return;
            }
            state.running = false;
            if let Some(metrics) = state.metrics.as_mut() {
                metrics.mark_end();
            }
            self.inner.run_state.send_replace(false);
            state.strategy.clone()
        };

        if let Some(strategy) = &strategy {
            strategy.interrupt();
        }
        info!("模拟已停止");
        self.emit_message("模拟已停止");
        self.emit_state(false);

        if let Some(strategy) = strategy {
            if tokio::time::timeout(STOP_GRACE, strategy.wait_until_idle())
                .await
                .is_err()
            {
                warn!("调度算法 {} 未能在 {:?} 内退出", strategy.name(), STOP_GRACE);
            }
        }
        let tasks = self.tasks().await;
        self.emit_tasks(&tasks);
    }

    /// 等待当前运行结束（自然完成或被停止），未运行时立即返回
    pub async fn wait_for_completion(&self) {
        let mut rx = self.inner.run_state.subscribe();
        let _ = rx.wait_for(|running| !*running).await;
    }

    async fn find_task(&self, id: TaskId) -> SchedulerResult<Task> {
        self.inner
            .state
            .read()
            .await
            .tasks
            .iter()
            .find(|t| t.id() == id)
            .cloned()
            .ok_or_else(|| SchedulerError::task_not_found(id))
    }

    /// 暂停运行中的任务，返回是否发生了状态变化
    pub async fn pause_task(&self, id: TaskId) -> SchedulerResult<bool> {
        let task = self.find_task(id).await?;
        let changed = task.pause();
        if changed {
            info!("任务 {} 已暂停", id);
            self.emit_message(format!("任务 {id} 已暂停"));
            self.emit_tasks(&self.tasks().await);
        }
        Ok(changed)
    }

    pub async fn resume_task(&self, id: TaskId) -> SchedulerResult<bool> {
        let task = self.find_task(id).await?;
        let changed = task.resume();
        if changed {
            info!("任务 {} 已恢复", id);
            self.emit_message(format!("任务 {id} 已恢复"));
            self.emit_tasks(&self.tasks().await);
        }
        Ok(changed)
    }

    pub async fn interrupt_task(&self, id: TaskId) -> SchedulerResult<()> {
        let task = self.find_task(id).await?;
        if task.state() == TaskState::Completed {
            return Err(SchedulerError::invalid_state(format!("任务 {id} 已完成")));
        }
        task.interrupt();
        info!("任务 {} 已中断", id);
        self.emit_message(format!("任务 {id} 已中断"));
        self.emit_tasks(&self.tasks().await);
        Ok(())
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.inner.state.read().await.tasks.clone()
    }

    pub async fn task_snapshots(&self) -> Vec<TaskSnapshot> {
        self.inner
            .state
            .read()
            .await
            .tasks
            .iter()
            .map(Task::snapshot)
            .collect()
    }

    pub async fn task_summary(&self) -> TaskStatusSummary {
        let state = self.inner.state.read().await;
        let mut summary = TaskStatusSummary::default();
        for task in &state.tasks {
            match task.state() {
                TaskState::Created => summary.created += 1,
                TaskState::Ready => summary.ready += 1,
                TaskState::Running => summary.running += 1,
                TaskState::Paused => summary.paused += 1,
                TaskState::Completed => summary.completed += 1,
                TaskState::Interrupted => summary.interrupted += 1,
            }
        }
        summary
    }

    pub async fn current_strategy_name(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .await
            .strategy
            .as_ref()
            .map(|s| s.name().to_string())
    }

    pub fn is_simulation_running(&self) -> bool {
        *self.inner.run_state.borrow()
    }

    /// 最近一次运行的指标，首次运行前为 `None`
    pub async fn metrics(&self) -> Option<SchedulerMetrics> {
        self.inner.state.read().await.metrics.clone()
    }

    pub async fn metrics_report(&self) -> Option<MetricsReport> {
        let state = self.inner.state.read().await;
        let algorithm = state
            .strategy
            .as_ref()
            .map(|s| s.name().to_string())
            .unwrap_or_default();
        state.metrics.as_ref().map(|m| m.report(algorithm))
    }
}

impl Default for ProcessScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessScheduler")
            .field("running", &self.is_simulation_running())
            .field("events", &self.inner.events)
            .finish()
    }
}
