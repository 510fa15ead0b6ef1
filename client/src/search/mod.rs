//! Product search coordination
//!
//! This module provides:
//! - `SearchCoordinator`, which debounces query input and reconciles
//!   out-of-order responses by generation
//! - `Scheduler`, the timer/task abstraction it runs on, and `TokioScheduler`

mod coordinator;
pub mod scheduler;

pub use coordinator::{SearchCoordinator, SearchView};
pub use scheduler::{Scheduler, Task, TimerCallback, TimerHandle, TokioScheduler};
