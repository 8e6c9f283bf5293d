use std::future::Future;

use anyhow::{Context, Result};
use scheduler_config::AppConfig;
use scheduler_dispatcher::{
    EventKind, MetricsReport, ProcessScheduler, SchedulerEvent, StrategyKind,
};
use scheduler_domain::{BatchFactory, Complexity, Task, TaskIdAllocator};
use tracing::{info, warn};

/// 本次模拟要生成的任务批次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPlan {
    /// 按简单、中等、复杂的数量生成混合批次
    Mixed {
        simple: usize,
        medium: usize,
        complex: usize,
    },
    /// 生成同一复杂度的批次
    Homogeneous { complexity: Complexity, count: usize },
}

impl BatchPlan {
    pub fn total(&self) -> usize {
        match *self {
            BatchPlan::Mixed {
                simple,
                medium,
                complex,
            } => simple + medium + complex,
            BatchPlan::Homogeneous { count, .. } => count,
        }
    }
}

/// 一次模拟运行的选项，命令行参数覆盖配置文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub strategy: StrategyKind,
    pub batch: BatchPlan,
}

impl RunOptions {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let strategy = config
            .simulation
            .default_strategy
            .parse::<StrategyKind>()
            .context("配置中的调度算法无效")?;
        Ok(Self {
            strategy,
            batch: BatchPlan::Mixed {
                simple: config.batch.simple,
                medium: config.batch.medium,
                complex: config.batch.complex,
            },
        })
    }
}

/// 运行结果
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: MetricsReport,
    /// 是否因关闭信号提前停止
    pub stopped: bool,
}

/// 主应用程序：按配置装配控制器并驱动一次完整的模拟
pub struct Application {
    config: AppConfig,
    options: RunOptions,
    scheduler: ProcessScheduler,
}

impl Application {
    pub fn new(config: AppConfig, options: RunOptions) -> Self {
        let batches =
            BatchFactory::with_prefix(TaskIdAllocator::shared(), config.batch.name_prefix.clone());
        info!(
            "初始化应用程序: 调度算法 {}, 任务数 {}",
            options.strategy,
            options.batch.total()
        );
        Self {
            config,
            options,
            scheduler: ProcessScheduler::with_batch_factory(batches),
        }
    }

    pub fn scheduler(&self) -> &ProcessScheduler {
        &self.scheduler
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// 按运行选项生成任务批次
    pub fn generate_batch(&self) -> Vec<Task> {
        match self.options.batch {
            BatchPlan::Mixed {
                simple,
                medium,
                complex,
            } => self
                .scheduler
                .generate_heterogeneous_batch(simple, medium, complex),
            BatchPlan::Homogeneous { complexity, count } => {
                self.scheduler.generate_homogeneous_batch(complexity, count)
            }
        }
    }

    /// 生成批次并运行，直到模拟结束或 `shutdown` 完成
    pub async fn run<F>(&self, shutdown: F) -> Result<RunOutcome>
    where
        F: Future<Output = ()>,
    {
        let tasks = self.generate_batch();
        self.run_with_tasks(tasks, shutdown).await
    }

    pub async fn run_with_tasks<F>(&self, tasks: Vec<Task>, shutdown: F) -> Result<RunOutcome>
    where
        F: Future<Output = ()>,
    {
        let strategy = self.options.strategy.build(&self.config.simulation.round_robin);
        info!("{}: {}", strategy.name(), strategy.description());
        self.scheduler
            .set_strategy(strategy)
            .await
            .context("设置调度算法失败")?;
        self.scheduler.add_tasks(tasks).await;

        self.scheduler
            .start_simulation()
            .await
            .context("启动模拟失败")?;

        let stopped = tokio::select! {
            _ = self.scheduler.wait_for_completion() => false,
            _ = shutdown => {
                warn!("收到关闭信号，停止模拟");
                self.scheduler.stop_simulation().await;
                true
            }
        };

        let report = self
            .scheduler
            .metrics_report()
            .await
            .context("模拟结束后没有可用的性能指标")?;
        Ok(RunOutcome { report, stopped })
    }

    /// 把控制器的提示信息转发给 `sink`，直到控制器被丢弃
    pub fn forward_messages<S>(&self, mut sink: S) -> tokio::task::JoinHandle<()>
    where
        S: FnMut(String) + Send + 'static,
    {
        let mut subscription = self.scheduler.subscribe_to(EventKind::Message);
        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                if let SchedulerEvent::Message(message) = event {
                    sink(message);
                }
            }
        })
    }
}
