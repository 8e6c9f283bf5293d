use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use scheduler_domain::TaskSnapshot;

/// 控制器发布的状态变化通知
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SchedulerEvent {
    /// 面向操作员的提示信息
    Message(String),
    /// 运行状态切换
    SimulationState(bool),
    /// 任务列表或任务状态发生变化
    TasksUpdated(Vec<TaskSnapshot>),
}

impl SchedulerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SchedulerEvent::Message(_) => EventKind::Message,
            SchedulerEvent::SimulationState(_) => EventKind::SimulationState,
            SchedulerEvent::TasksUpdated(_) => EventKind::TasksUpdated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    SimulationState,
    TasksUpdated,
}

pub type SubscriptionId = u64;

struct Subscriber {
    id: SubscriptionId,
    filter: Option<EventKind>,
    sender: mpsc::UnboundedSender<SchedulerEvent>,
}

/// 事件总线：每个订阅者一个无界通道，发布方从不阻塞
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// 订阅所有事件
    pub fn subscribe(&self) -> Subscription {
        self.register(None)
    }

    /// 只订阅某一类事件
    pub fn subscribe_to(&self, kind: EventKind) -> Subscription {
        self.register(Some(kind))
    }

    fn register(&self, filter: Option<EventKind>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().push(Subscriber { id, filter, sender });
        debug!("新增事件订阅者 {} (过滤: {:?})", id, filter);
        Subscription { id, receiver }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        before != subscribers.len()
    }

    /// 向匹配的订阅者发送事件，并移除接收端已关闭的订阅者
    pub fn publish(&self, event: SchedulerEvent) {
        let kind = event.kind();
        self.lock().retain(|subscriber| {
            if subscriber.filter.is_some_and(|filter| filter != kind) {
                return !subscriber.sender.is_closed();
            }
            subscriber.sender.send(event.clone()).is_ok()
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// 一个订阅者的接收端，丢弃后自动从总线移除
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<SchedulerEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<SchedulerEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SchedulerEvent> {
        self.receiver.try_recv().ok()
    }
}
