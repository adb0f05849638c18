//! Coordination harness for the strand primitives.
//!
//! Spawns tasks, wires them to a primitive, awaits them, and reports one
//! line per experiment:
//!
//! ```text
//!   HarnessConfig ──▶ run(spawner, config, experiments)
//!                          │
//!        ┌─────────────────┼──────────────────┐
//!        ▼                 ▼                  ▼
//!   spawn tasks ──▶ primitive under test ──▶ join tasks
//!                                             │
//!                                             ▼
//!                                   Report { expected, observed }
//! ```
//!
//! Tasks are started through the [`Spawner`] trait; [`ThreadSpawner`] runs
//! each on its own named OS thread. [`TaskHandle::join`] is the "await".
//!
//! # Example
//!
//! ```
//! use strand_harness::{run, Experiment, HarnessConfig, ThreadSpawner};
//!
//! let reports = run(
//!     &ThreadSpawner::new(),
//!     &HarnessConfig::default(),
//!     &[Experiment::AtomicCounter, Experiment::AsyncSum],
//! )
//! .unwrap();
//!
//! assert!(reports.iter().all(|r| r.passed()));
//! assert_eq!(reports[0].observed, "40000");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod experiments;
pub mod logging;
mod report;
mod spawn;

pub use config::HarnessConfig;
pub use error::HarnessError;
pub use experiments::{run, Experiment, PROMISE_MESSAGE};
pub use report::Report;
pub use spawn::{spawn_with_result, Spawner, TaskHandle, ThreadSpawner};
