//! Long-running scheduling loop.

pub mod scheduler;

pub use scheduler::{DailyScheduler, SchedulerState};
