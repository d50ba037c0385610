//! Declarative configuration for the three hooks
//!
//! Serde-deserializable mirrors of the hook constructors, for hosts that
//! wire their training run from a config file. Count-like fields accept
//! floats and are validated to be whole and non-negative at build time,
//! and the schedule config enforces that exactly one strategy is set.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{HookError, Result};
use crate::plot::TrainingPlot;
use crate::saver::ModelSaver;
use crate::schedule::{LrSchedule, LrScheduler};
use crate::style::StyleOverrides;
use crate::validate;

fn default_monitor() -> String {
    "val_loss".to_string()
}

fn default_true() -> bool {
    true
}

fn default_start_from() -> f64 {
    5.0
}

/// Checkpoint saver configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaverConfig {
    /// Output directory; defaults to the process working directory
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Monitored metric name
    #[serde(default = "default_monitor")]
    pub monitor: String,
    /// Periodic save interval; whole and positive
    #[serde(default)]
    pub each_n: Option<f64>,
    /// Write `last` checkpoint every epoch
    #[serde(default = "default_true")]
    pub save_last: bool,
    /// Also persist optimizer state
    #[serde(default)]
    pub include_optimizer: bool,
}

impl SaverConfig {
    /// Validate and build the saver hook
    pub fn build(self) -> Result<ModelSaver> {
        let mut saver = match self.directory {
            Some(dir) => ModelSaver::with_directory(dir)?,
            None => ModelSaver::new()?,
        };
        saver = saver
            .monitor(self.monitor)
            .save_last(self.save_last)
            .include_optimizer(self.include_optimizer);
        if let Some(raw) = self.each_n {
            let n = validate::whole_non_negative("each_n", raw)?;
            saver = saver.each_n(n)?;
        }
        Ok(saver)
    }
}

/// Metric plotter configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlotConfig {
    /// Warm-up epoch threshold; whole and non-negative
    #[serde(default = "default_start_from")]
    pub start_from: f64,
    /// Output directory; defaults to the process working directory
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Chart style overrides, validated against the known parameters
    #[serde(default)]
    pub style: StyleOverrides,
}

impl PlotConfig {
    /// Validate and build the plot hook
    pub fn build(self) -> Result<TrainingPlot> {
        let start_from = validate::whole_non_negative("start_from", self.start_from)?;
        let plot = match self.directory {
            Some(dir) => TrainingPlot::with_directory(start_from, dir)?,
            None => TrainingPlot::new(start_from)?,
        };
        plot.style(self.style)
    }
}

/// Learning rate schedule configuration
///
/// Exactly one of `factor` / `epochs` must be set. Custom rules are
/// closures and therefore only available through [`LrSchedule::custom`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Multiplicative per-epoch factor
    #[serde(default)]
    pub factor: Option<f64>,
    /// Explicit epoch-to-rate table
    #[serde(default)]
    pub epochs: Option<BTreeMap<usize, f64>>,
}

impl ScheduleConfig {
    /// Validate and build the scheduler hook
    pub fn build(self) -> Result<LrScheduler> {
        let schedule = match (self.factor, self.epochs) {
            (Some(factor), None) => LrSchedule::per_epoch_factor(factor)?,
            (None, Some(epochs)) => LrSchedule::table(epochs)?,
            _ => return Err(HookError::StrategyConflict),
        };
        Ok(LrScheduler::new(schedule))
    }
}
