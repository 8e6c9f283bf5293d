//! # 批量任务生成
//!
//! 按复杂度批量构造任务。生成的任务名称确定且带序号：`<前缀>_<复杂度>_<序号>`，
//! 序号从1开始。工厂本身不持有任务列表，调用方负责把生成的批次交给调度控制器。

use tracing::debug;

use crate::entities::Task;
use crate::value_objects::{Complexity, TaskIdAllocator};

pub const DEFAULT_BATCH_PREFIX: &str = "Circuit";

#[derive(Debug, Clone)]
pub struct BatchFactory {
    ids: TaskIdAllocator,
    prefix: String,
}

impl BatchFactory {
    pub fn new(ids: TaskIdAllocator) -> Self {
        Self::with_prefix(ids, DEFAULT_BATCH_PREFIX)
    }
    pub fn with_prefix(ids: TaskIdAllocator, prefix: impl Into<String>) -> Self {
        Self {
            ids,
            prefix: prefix.into(),
        }
    }
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
    pub fn task_name(&self, complexity: Complexity, index: usize) -> String {
        format!("{}_{}_{}", self.prefix, complexity.display_name(), index)
    }

    /// 生成 `count` 个相同复杂度的任务
    pub fn homogeneous(&self, complexity: Complexity, count: usize) -> Vec<Task> {
        debug!("生成同构批次: {} x {}", count, complexity);
        (1..=count)
            .map(|i| Task::new(&self.ids, self.task_name(complexity, i), complexity))
            .collect()
    }

    /// 按简单、中等、复杂的顺序生成异构批次
    pub fn heterogeneous(&self, simple: usize, medium: usize, complex: usize) -> Vec<Task> {
        debug!(
            "生成异构批次: simple={}, medium={}, complex={}",
            simple, medium, complex
        );
        let mut batch = Vec::with_capacity(simple + medium + complex);
        for (complexity, count) in Complexity::ALL.into_iter().zip([simple, medium, complex]) {
            batch.extend(self.homogeneous(complexity, count));
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::TaskState;

    #[test]
    fn test_homogeneous_batch_names_and_tier() {
        let factory = BatchFactory::new(TaskIdAllocator::new());
        let batch = factory.homogeneous(Complexity::Medium, 3);

        let names: Vec<&str> = batch.iter().map(|t| t.name()).collect();
        assert_eq!(names, ["Circuit_Medium_1", "Circuit_Medium_2", "Circuit_Medium_3"]);
        assert!(batch.iter().all(|t| t.complexity() == Complexity::Medium));
        assert!(batch.iter().all(|t| t.state() == TaskState::Created));
        assert!(batch
            .iter()
            .all(|t| Complexity::Medium.contains(t.estimated_duration())));
    }

    #[test]
    fn test_heterogeneous_batch_order() {
        let factory = BatchFactory::with_prefix(TaskIdAllocator::new(), "Sim");
        let batch = factory.heterogeneous(2, 1, 1);

        let names: Vec<&str> = batch.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            ["Sim_Simple_1", "Sim_Simple_2", "Sim_Medium_1", "Sim_Complex_1"]
        );
        assert!(batch.windows(2).all(|w| w[0].id() < w[1].id()));
    }

    #[test]
    fn test_empty_batch() {
        let factory = BatchFactory::new(TaskIdAllocator::new());
        assert!(factory.homogeneous(Complexity::Simple, 0).is_empty());
        assert!(factory.heterogeneous(0, 0, 0).is_empty());
    }
}
