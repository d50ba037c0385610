//! Training-loop observer hooks
//!
//! Three passive observers that attach to a host training loop's epoch
//! boundaries:
//! - [`ModelSaver`] - persists model weights under best / periodic / last
//!   policies, optionally with the optimizer state alongside
//! - [`TrainingPlot`] - renders per-epoch metric curves to PNG files,
//!   with an optional validation overlay
//! - [`LrScheduler`] - adjusts the optimizer learning rate from a custom
//!   rule, a multiplicative factor, or an epoch table
//!
//! The host is represented by the [`ModelHandle`] / [`OptimizerHandle`]
//! traits and drives the hooks through [`Hook`] (or [`HookSet`] for
//! several at once). Everything runs synchronously on the host's thread;
//! disk failures propagate back to the host, which decides whether to
//! halt the run.
//!
//! # Example
//!
//! ```
//! use vigia::{LrSchedule, LrScheduler};
//!
//! let schedule = LrSchedule::table([(5, 0.01), (10, 0.001)])?;
//! let decision = schedule.decide(5, 0.1);
//! assert!(decision.changed);
//! assert_eq!(decision.lr, 0.01);
//!
//! let _hook = LrScheduler::new(schedule);
//! # Ok::<(), vigia::HookError>(())
//! ```

pub mod config;
pub mod error;
pub mod hook;
pub mod plot;
pub mod saver;
pub mod schedule;
pub mod style;
pub mod validate;

pub use config::{PlotConfig, SaverConfig, ScheduleConfig};
pub use error::{HookError, Result};
pub use hook::{val_name, EpochMetrics, Hook, HookSet, ModelHandle, OptimizerHandle, VAL_PREFIX};
pub use plot::TrainingPlot;
pub use saver::ModelSaver;
pub use schedule::{LrDecision, LrSchedule, LrScheduler};
pub use style::{StyleOverrides, StyleValue};
