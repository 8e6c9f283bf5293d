//! # Scheduler Testing Utils
//!
//! 调度模拟器各 crate 共用的测试工具：
//!
//! - **任务构建器**：固定耗时、独立ID分配器的任务与快照
//! - **事件记录器**：收集控制器发布的事件
//! - **等待辅助**：带超时的条件等待
//!
//! ```toml
//! [dev-dependencies]
//! scheduler-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;

pub use builders::*;
pub use helpers::*;
