use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use scheduler_domain::{SchedulerResult, Task};

use super::{dispatch_sequentially, prepare_run, RunControl, RunGuard, SchedulerStrategy};

const NAME: &str = "Shortest Job First (SJF)";

/// 静态最短作业优先：运行开始时按预计耗时排序一次，之后不再调整
#[derive(Debug)]
pub struct ShortestJobFirstStrategy {
    control: Arc<RunControl>,
}

impl ShortestJobFirstStrategy {
    pub fn new() -> Self {
        Self {
            control: Arc::new(RunControl::new()),
        }
    }

    /// 预计耗时升序，相同时按ID
    pub fn order(mut tasks: Vec<Task>) -> Vec<Task> {
        tasks.sort_by_key(|task| (task.estimated_duration(), task.id()));
        tasks
    }
}

impl Default for ShortestJobFirstStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchedulerStrategy for ShortestJobFirstStrategy {
    fn schedule(&self, tasks: Vec<Task>) -> SchedulerResult<()> {
        let Some(cancel) = prepare_run(&self.control, NAME, &tasks)? else {
            return Ok(());
        };
        let order = Self::order(tasks);
        debug!(
            "SJF 派发顺序: {:?}",
            order.iter().map(|t| t.id()).collect::<Vec<_>>()
        );
        info!("SJF 开始调度 {} 个任务", order.len());

        let guard = RunGuard(Arc::clone(&self.control));
        tokio::spawn(async move {
            let _guard = guard;
            let total = order.len();
            let completed = dispatch_sequentially("sjf", order, cancel).await;
            info!("SJF 调度结束，完成 {}/{} 个任务", completed, total);
        });
        Ok(())
    }

    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> String {
        "在运行开始时按预计耗时从短到长排序，依次执行到结束。非抢占式，\
         能够降低平均等待时间，但长任务可能长时间得不到执行。"
            .to_string()
    }

    fn interrupt(&self) {
        info!("SJF 收到中断请求");
        self.control.interrupt();
    }

    fn is_running(&self) -> bool {
        self.control.is_running()
    }

    async fn wait_until_idle(&self) {
        self.control.wait_until_idle().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use scheduler_domain::{Complexity, TaskIdAllocator};

    use super::*;

    #[test]
    fn test_order_by_estimated_duration_then_id() {
        let ids = TaskIdAllocator::new();
        let make = |ms| {
            Task::with_estimated_duration(&ids, "t", Complexity::Simple, Duration::from_millis(ms))
                .unwrap()
        };
        let tasks = vec![make(500), make(100), make(300), make(100)];

        let order: Vec<u64> = ShortestJobFirstStrategy::order(tasks)
            .iter()
            .map(|t| t.id())
            .collect();

        assert_eq!(order, vec![2, 4, 3, 1]);
    }
}
