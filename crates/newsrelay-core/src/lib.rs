pub mod config;
pub mod cycle;
pub mod error;
pub mod publisher;
pub mod retry;
pub mod scheduler;
pub mod source;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use config::AppConfig;
pub use cycle::{CycleReport, CycleState, NewsCycle};
pub use error::{Error, Result};
pub use scheduler::SchedulerService;
