pub mod app;

pub use app::{Application, BatchPlan, RunOptions, RunOutcome};
