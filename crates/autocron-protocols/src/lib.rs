//! # autocron Protocols
//!
//! Core protocol definitions for the autocron scheduler.
//! Contains shared data types and the interfaces of the external
//! collaborators - no scheduling logic.
//!
//! ## Collaborators
//!
//! - [`AlarmService`] - wakes the scheduler at (or shortly after) an instant
//! - [`ConstraintScheduler`] - holds work until device conditions allow it
//! - [`ProcessExecutor`] - starts and terminates job scripts
//! - [`TextStore`] - durable text blob holding the serialized job list
//! - [`ConditionProbe`] - samples the current device conditions
//!
//! Every asynchronous callback from a collaborator is delivered as a
//! [`CronEvent`] over the channel created by [`event_channel`].

pub mod alarm;
pub mod constraint;
pub mod error;
pub mod event;
pub mod executor;
pub mod store;
pub mod types;

pub use alarm::{AlarmHandle, AlarmKey, AlarmKind, AlarmRequest, AlarmService};
pub use constraint::{ConditionProbe, ConstraintScheduler, WorkHandle, WorkStatus};
pub use error::{
    AlarmError, ConstraintError, ExecutorError, ScheduleError, StoreError, ValidationError,
};
pub use event::{event_channel, CronEvent, EventReceiver, EventSender};
pub use executor::{ExecutionHandle, ExecutionReport, ProcessExecutor};
pub use store::TextStore;
pub use types::*;
