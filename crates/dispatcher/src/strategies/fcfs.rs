use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use scheduler_domain::{SchedulerResult, Task};

use super::{dispatch_sequentially, prepare_run, RunControl, RunGuard, SchedulerStrategy};

const NAME: &str = "First-Come, First-Served (FCFS)";

/// 先来先服务：按提交顺序逐个运行到结束，不抢占
#[derive(Debug)]
pub struct FirstComeFirstServedStrategy {
    control: Arc<RunControl>,
}

impl FirstComeFirstServedStrategy {
    pub fn new() -> Self {
        Self {
            control: Arc::new(RunControl::new()),
        }
    }
}

impl Default for FirstComeFirstServedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchedulerStrategy for FirstComeFirstServedStrategy {
    fn schedule(&self, tasks: Vec<Task>) -> SchedulerResult<()> {
        let Some(cancel) = prepare_run(&self.control, NAME, &tasks)? else {
            return Ok(());
        };
        info!("FCFS 开始调度 {} 个任务", tasks.len());

        let guard = RunGuard(Arc::clone(&self.control));
        tokio::spawn(async move {
            let _guard = guard;
            let total = tasks.len();
            let completed = dispatch_sequentially("fcfs", tasks, cancel).await;
            info!("FCFS 调度结束，完成 {}/{} 个任务", completed, total);
        });
        Ok(())
    }

    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> String {
        "按任务到达的顺序依次执行，每个任务运行到结束后才调度下一个。非抢占式，实现简单，\
         但长任务会让后面的短任务长时间等待（护航效应）。"
            .to_string()
    }

    fn interrupt(&self) {
        info!("FCFS 收到中断请求");
        self.control.interrupt();
    }

    fn is_running(&self) -> bool {
        self.control.is_running()
    }

    async fn wait_until_idle(&self) {
        self.control.wait_until_idle().await;
    }
}
