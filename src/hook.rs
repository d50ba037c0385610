//! Host-framework seam
//!
//! This module defines the contract between a host training loop and the
//! observers in this crate:
//! - `EpochMetrics` - metric name to value mapping for one epoch
//! - `ModelHandle` / `OptimizerHandle` - live handles to the trained model
//! - `Hook` - the trait all observers implement
//! - `HookSet` - ordered dispatcher for multiple hooks
//!
//! All dispatch is synchronous on the caller's thread. Epoch indices are
//! expected to be monotonically increasing across a run; this is a host
//! guarantee and is not checked here.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

/// Name prefix marking a metric as the validation counterpart of another.
pub const VAL_PREFIX: &str = "val_";

/// Returns the validation counterpart name for a metric.
pub fn val_name(metric: &str) -> String {
    format!("{VAL_PREFIX}{metric}")
}

/// Metric values reported by the host for a single epoch.
///
/// Iteration order is the sorted metric-name order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EpochMetrics(BTreeMap<String, f64>);

impl EpochMetrics {
    /// Create an empty metrics mapping
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Record a metric value for this epoch
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    /// Look up a metric value by name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Check whether a metric is present
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Iterate metric names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate (name, value) pairs in sorted order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of metrics
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if no metrics are present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for EpochMetrics {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Live handle to the optimizer being trained.
pub trait OptimizerHandle {
    /// Current learning rate
    fn learning_rate(&self) -> f64;

    /// Overwrite the learning rate
    fn set_learning_rate(&mut self, lr: f64);

    /// Read-only snapshot of the optimizer's internal weight tensors,
    /// as (name, flat buffer) pairs. Used for optional state persistence.
    fn state_tensors(&self) -> Vec<(String, Vec<f32>)>;
}

/// Live handle to the model being trained.
pub trait ModelHandle {
    /// Persist all model weights to the given path using the host
    /// framework's native serialization.
    fn save_weights(&self, path: &Path) -> Result<()>;

    /// File extension the host reserves for weight files
    fn weights_extension(&self) -> &str {
        "safetensors"
    }

    /// The model's optimizer
    fn optimizer(&self) -> &dyn OptimizerHandle;

    /// The model's optimizer, mutable
    fn optimizer_mut(&mut self) -> &mut dyn OptimizerHandle;
}

/// Trait for training-loop observers
///
/// The host invokes `on_epoch_begin` before each epoch's training steps
/// and `on_epoch_end` after them. Both default to no-ops, so an observer
/// only implements the event it cares about. Errors (typically disk
/// failures) propagate to the host loop, which decides whether to halt
/// the run; no hook retries.
pub trait Hook {
    /// Called before each epoch's training steps
    fn on_epoch_begin(&mut self, _epoch: usize, _model: &mut dyn ModelHandle) -> Result<()> {
        Ok(())
    }

    /// Called after each epoch with that epoch's metrics
    fn on_epoch_end(
        &mut self,
        _epoch: usize,
        _metrics: &EpochMetrics,
        _model: &mut dyn ModelHandle,
    ) -> Result<()> {
        Ok(())
    }

    /// Hook name for logging
    fn name(&self) -> &'static str {
        "Hook"
    }
}

/// Ordered collection of hooks, dispatched in registration order.
///
/// Dispatch stops at the first hook that returns an error; hooks after it
/// do not run for that event.
#[derive(Default)]
pub struct HookSet {
    hooks: Vec<Box<dyn Hook>>,
}

impl HookSet {
    /// Create an empty hook set
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Register a hook
    pub fn add<H: Hook + 'static>(&mut self, hook: H) {
        self.hooks.push(Box::new(hook));
    }

    /// Number of registered hooks
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Check if no hooks are registered
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Fire epoch begin on every hook
    pub fn on_epoch_begin(&mut self, epoch: usize, model: &mut dyn ModelHandle) -> Result<()> {
        for hook in &mut self.hooks {
            hook.on_epoch_begin(epoch, model)?;
        }
        Ok(())
    }

    /// Fire epoch end on every hook
    pub fn on_epoch_end(
        &mut self,
        epoch: usize,
        metrics: &EpochMetrics,
        model: &mut dyn ModelHandle,
    ) -> Result<()> {
        for hook in &mut self.hooks {
            hook.on_epoch_end(epoch, metrics, model)?;
        }
        Ok(())
    }
}
