use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use scheduler_errors::{SchedulerError, SchedulerResult};

/// 电路仿真任务的复杂度等级，每个等级对应一个预计耗时区间（毫秒）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Complexity {
    #[serde(rename = "SIMPLE")]
    Simple,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "COMPLEX")]
    Complex,
}

impl Complexity {
    pub const ALL: [Complexity; 3] = [Complexity::Simple, Complexity::Medium, Complexity::Complex];

    pub fn display_name(&self) -> &'static str {
        match self {
            Complexity::Simple => "Simple",
            Complexity::Medium => "Medium",
            Complexity::Complex => "Complex",
        }
    }
    pub fn min_duration_ms(&self) -> u64 {
        match self {
            Complexity::Simple => 1_000,
            Complexity::Medium => 5_000,
            Complexity::Complex => 15_000,
        }
    }
    pub fn max_duration_ms(&self) -> u64 {
        match self {
            Complexity::Simple => 5_000,
            Complexity::Medium => 15_000,
            Complexity::Complex => 30_000,
        }
    }
    /// 在 `[min, max]` 区间内均匀采样预计耗时
    pub fn sample_duration(&self) -> Duration {
        let ms = rand::rng().random_range(self.min_duration_ms()..=self.max_duration_ms());
        Duration::from_millis(ms)
    }
    pub fn contains(&self, duration: Duration) -> bool {
        let ms = duration.as_millis() as u64;
        ms >= self.min_duration_ms() && ms <= self.max_duration_ms()
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Complexity {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(Complexity::Simple),
            "medium" => Ok(Complexity::Medium),
            "complex" => Ok(Complexity::Complex),
            other => Err(SchedulerError::validation_error(format!(
                "未知的复杂度等级: {other}"
            ))),
        }
    }
}

/// 任务生命周期状态
///
/// `Created -> Ready -> Running -> {Completed | Interrupted | Paused}`，
/// `Paused -> Ready` 为恢复；轮转调度下任务会在 `Ready` 与 `Running` 之间往返。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskState {
    #[serde(rename = "CREATED")]
    Created,
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "PAUSED")]
    Paused,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "INTERRUPTED")]
    Interrupted,
}

impl TaskState {
    pub fn display_name(&self) -> &'static str {
        match self {
            TaskState::Created => "Created",
            TaskState::Ready => "Ready",
            TaskState::Running => "Running",
            TaskState::Paused => "Paused",
            TaskState::Completed => "Completed",
            TaskState::Interrupted => "Interrupted",
        }
    }
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Interrupted)
    }
    pub fn is_active(&self) -> bool {
        matches!(self, TaskState::Running)
    }
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, TaskState::Created | TaskState::Ready)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

pub type TaskId = u64;

/// 任务ID分配器：单调递增，从不复用
///
/// 克隆出的分配器共享同一个计数器。
#[derive(Debug, Clone)]
pub struct TaskIdAllocator {
    next: Arc<AtomicU64>,
}

static SHARED_ALLOCATOR: OnceLock<TaskIdAllocator> = OnceLock::new();

impl TaskIdAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }
    pub fn starting_at(first: TaskId) -> Self {
        Self {
            next: Arc::new(AtomicU64::new(first)),
        }
    }
    /// 进程级共享分配器，首次调用时初始化
    pub fn shared() -> Self {
        SHARED_ALLOCATOR.get_or_init(TaskIdAllocator::new).clone()
    }
    pub fn allocate(&self) -> TaskId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
    pub fn peek(&self) -> TaskId {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for TaskIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_duration(duration: Duration) -> SchedulerResult<Duration> {
    if duration.is_zero() {
        return Err(SchedulerError::validation_error("预计耗时必须大于0"));
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampled_duration_within_range() {
        for complexity in Complexity::ALL {
            for _ in 0..200 {
                let duration = complexity.sample_duration();
                assert!(complexity.contains(duration), "{complexity}: {duration:?}");
            }
        }
    }

    #[test]
    fn test_complexity_from_str() {
        assert_eq!("simple".parse::<Complexity>().unwrap(), Complexity::Simple);
        assert_eq!(" MEDIUM ".parse::<Complexity>().unwrap(), Complexity::Medium);
        assert_eq!("Complex".parse::<Complexity>().unwrap(), Complexity::Complex);
        assert!("huge".parse::<Complexity>().is_err());
    }

    #[test]
    fn test_task_state_flags() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Interrupted.is_terminal());
        assert!(!TaskState::Paused.is_terminal());
        assert!(TaskState::Created.is_dispatchable());
        assert!(TaskState::Ready.is_dispatchable());
        assert!(!TaskState::Paused.is_dispatchable());
        assert!(TaskState::Running.is_active());
    }

    #[test]
    fn test_allocator_is_monotonic_and_shared_between_clones() {
        let allocator = TaskIdAllocator::new();
        let clone = allocator.clone();

        let a = allocator.allocate();
        let b = clone.allocate();
        let c = allocator.allocate();

        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(allocator.peek(), 4);
    }

    #[test]
    fn test_allocator_unique_across_threads() {
        let allocator = TaskIdAllocator::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let allocator = allocator.clone();
                std::thread::spawn(move || (0..250).map(|_| allocator.allocate()).collect::<Vec<_>>())
            })
            .collect();

        let mut ids: Vec<TaskId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_value(TaskState::Interrupted).unwrap(),
            serde_json::json!("INTERRUPTED")
        );
        let complexity: Complexity = serde_json::from_str("\"COMPLEX\"").unwrap();
        assert_eq!(complexity, Complexity::Complex);
    }

    #[test]
    fn test_validate_duration() {
        assert!(validate_duration(Duration::ZERO).is_err());
        assert!(validate_duration(Duration::from_millis(1)).is_ok());
    }
}
