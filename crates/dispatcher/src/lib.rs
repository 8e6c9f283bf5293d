//! 调度核心：三种调度算法、调度控制器、性能指标与事件总线

pub mod controller;
pub mod events;
pub mod metrics;
pub mod strategies;

pub use crate::controller::{ProcessScheduler, TaskStatusSummary};
pub use crate::events::{EventBus, EventKind, SchedulerEvent, Subscription, SubscriptionId};
pub use crate::metrics::{ComplexityBreakdown, MetricsReport, SchedulerMetrics};
pub use crate::strategies::{
    FirstComeFirstServedStrategy, RoundRobinStats, RoundRobinStrategy, SchedulerStrategy,
    ShortestJobFirstStrategy, StrategyKind, CONTEXT_SWITCH, QUANTUM,
};
