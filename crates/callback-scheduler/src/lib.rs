//! Deferred-callback scheduler
//!
//! This crate runs zero-argument closures after a requested delay:
//! - One background worker thread per [`Scheduler`], spawned on first use
//! - Tasks run one at a time, in expiration order, never before they expire
//! - Any number of threads may submit concurrently; a running task may
//!   submit more work to the same scheduler
//! - Dropping the scheduler abandons queued tasks and joins the worker
//!
//! ```ignore
//! use callback_scheduler::Scheduler;
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new();
//! scheduler.schedule(|| println!("later"), Duration::from_millis(100));
//! scheduler.schedule(|| println!("sooner"), Duration::from_millis(10));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod scheduler;
pub mod task;

pub use config::SchedulerConfig;
pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{Scheduler, SchedulerStats};
pub use task::{DeferredTask, Work};
