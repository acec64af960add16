//! # autocron Core
//!
//! The persistent cron scheduler: job storage, trigger computation, alarm
//! management, constraint gating and execution supervision.
//!
//! ## Flow
//!
//! ```text
//! CronService ──> JobStore ──> Scheduler ──> AlarmService
//!                                               │ AlarmFired
//!                                               v
//! CronEngine ──> Dispatcher ──> ConstraintScheduler (optional)
//!                    │ Dispatched
//!                    v
//!              ExecutionCoordinator ──> ProcessExecutor
//!                    │ terminal
//!                    v
//!              Scheduler::arm_next_trigger_for
//! ```

pub mod clock;
pub mod completion;
pub mod coordinator;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod summary;
pub mod trigger;

pub use clock::{CronClock, CronSchedule};
pub use completion::{CompletionRegistry, Resolution};
pub use coordinator::ExecutionCoordinator;
pub use dispatcher::Dispatcher;
pub use engine::CronEngine;
pub use error::{CronError, CronResult};
pub use scheduler::{Scheduler, SchedulerPolicy};
pub use service::{Collaborators, CronService};
pub use store::{FileTextStore, JobStore, MemoryTextStore};
pub use summary::{detail_line, summary_line};
pub use trigger::{Advance, Trigger, TriggerInput, TriggerState, Triggers};
