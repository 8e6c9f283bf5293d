pub mod app_config;
pub mod logging;
pub mod simulation;

pub use app_config::*;
pub use logging::*;
pub use simulation::*;
