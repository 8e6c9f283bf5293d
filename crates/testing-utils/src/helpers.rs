//! 测试辅助工具

use std::future::Future;
use std::time::Duration;

use scheduler_dispatcher::{ProcessScheduler, SchedulerEvent, Subscription};
use tokio::time::{sleep, timeout, Instant};

/// 测试环境辅助
pub struct TestEnv;

impl TestEnv {
    /// 在超时前反复检查条件，满足时返回 `true`
    pub async fn wait_for<F, Fut>(condition: F, limit: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        Self::wait_for_with_interval(condition, limit, Duration::from_millis(10)).await
    }

    pub async fn wait_for_with_interval<F, Fut>(
        mut condition: F,
        limit: Duration,
        poll_interval: Duration,
    ) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let start = Instant::now();
        while start.elapsed() < limit {
            if condition().await {
                return true;
            }
            sleep(poll_interval).await;
        }
        condition().await
    }

    /// 等待控制器的当前运行结束，超时返回 `false`
    pub async fn wait_for_simulation(scheduler: &ProcessScheduler, limit: Duration) -> bool {
        timeout(limit, scheduler.wait_for_completion()).await.is_ok()
    }

    /// 初始化测试日志（每个测试二进制调用一次即可）
    pub fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("debug")
            .try_init();
    }
}

/// 收集一个订阅收到的全部事件
pub struct EventRecorder {
    subscription: Subscription,
    events: Vec<SchedulerEvent>,
}

impl EventRecorder {
    pub fn new(subscription: Subscription) -> Self {
        Self {
            subscription,
            events: Vec::new(),
        }
    }

    pub fn attach(scheduler: &ProcessScheduler) -> Self {
        Self::new(scheduler.subscribe())
    }

    /// 取出当前已到达的事件，不等待
    pub fn drain(&mut self) -> &[SchedulerEvent] {
        while let Some(event) = self.subscription.try_recv() {
            self.events.push(event);
        }
        &self.events
    }

    /// 等待满足条件的事件出现；已收到的事件也会被检查
    pub async fn wait_for<P>(&mut self, mut predicate: P, limit: Duration) -> Option<SchedulerEvent>
    where
        P: FnMut(&SchedulerEvent) -> bool,
    {
        self.drain();
        if let Some(found) = self.events.iter().find(|&e| predicate(e)) {
            return Some(found.clone());
        }
        let deadline = Instant::now() + limit;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = timeout(remaining, self.subscription.recv()).await.ok()??;
            self.events.push(event.clone());
            if predicate(&event) {
                return Some(event);
            }
        }
    }

    pub async fn wait_for_message(&mut self, text: &str, limit: Duration) -> bool {
        self.wait_for(
            |e| matches!(e, SchedulerEvent::Message(m) if m.contains(text)),
            limit,
        )
        .await
        .is_some()
    }

    pub fn messages(&mut self) -> Vec<String> {
        self.drain()
            .iter()
            .filter_map(|e| match e {
                SchedulerEvent::Message(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    /// 运行状态切换序列
    pub fn state_changes(&mut self) -> Vec<bool> {
        self.drain()
            .iter()
            .filter_map(|e| match e {
                SchedulerEvent::SimulationState(running) => Some(*running),
                _ => None,
            })
            .collect()
    }
}
