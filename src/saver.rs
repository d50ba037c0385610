//! Checkpoint saver hook
//!
//! Persists model weights at epoch end under three independent policies:
//! best monitored metric so far, every N epochs, and always-last. Weight
//! serialization is delegated to the host model; the optional optimizer
//! state sidecar is a bincode snapshot written next to the weights file.

use std::path::PathBuf;

use log::warn;

use crate::error::{HookError, Result};
use crate::hook::{EpochMetrics, Hook, ModelHandle};
use crate::validate;

const DEFAULT_MONITOR: &str = "val_loss";
const FALLBACK_MONITOR: &str = "loss";
const OPTIMIZER_SUFFIX: &str = "opt";

/// Saves model checkpoints on epoch end
///
/// Policies are independent and may all fire in the same epoch:
/// - best: monitored metric strictly below the best seen so far writes
///   `<dir>/best.<ext>` (lower is better; there is no maximize mode)
/// - periodic: `epoch % each_n == 0` writes `<dir>/<epoch>.<ext>`
/// - last: writes `<dir>/last.<ext>` every epoch
///
/// If the monitored metric is missing from an epoch's metrics, the saver
/// warns and permanently switches to `val_loss` when present, else to
/// `loss`.
///
/// # Example
///
/// ```no_run
/// use vigia::ModelSaver;
///
/// let saver = ModelSaver::with_directory("checkpoints")?
///     .monitor("val_loss")
///     .each_n(5)?
///     .include_optimizer(true);
/// # Ok::<(), vigia::HookError>(())
/// ```
pub struct ModelSaver {
    directory: PathBuf,
    monitor: String,
    best: f64,
    each_n: Option<usize>,
    save_last: bool,
    include_optimizer: bool,
}

impl ModelSaver {
    /// Create a saver writing into the process working directory
    pub fn new() -> Result<Self> {
        Self::build(None)
    }

    /// Create a saver writing into an existing directory
    pub fn with_directory(directory: impl Into<PathBuf>) -> Result<Self> {
        Self::build(Some(directory.into()))
    }

    fn build(directory: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            directory: validate::existing_dir(directory)?,
            monitor: DEFAULT_MONITOR.to_string(),
            best: f64::INFINITY,
            each_n: None,
            save_last: true,
            include_optimizer: false,
        })
    }

    /// Set the monitored metric name (default `val_loss`)
    pub fn monitor(mut self, name: impl Into<String>) -> Self {
        self.monitor = name.into();
        self
    }

    /// Save a periodic checkpoint every `n` epochs (`n` must be positive)
    pub fn each_n(mut self, n: usize) -> Result<Self> {
        if n == 0 {
            return Err(HookError::ZeroInterval);
        }
        self.each_n = Some(n);
        Ok(self)
    }

    /// Toggle the unconditional last-epoch checkpoint (default on)
    pub fn save_last(mut self, save: bool) -> Self {
        self.save_last = save;
        self
    }

    /// Also persist the optimizer's internal weight tensors alongside
    /// each weights write (default off)
    pub fn include_optimizer(mut self, include: bool) -> Self {
        self.include_optimizer = include;
        self
    }

    /// Best monitored value seen so far
    pub fn best(&self) -> f64 {
        self.best
    }

    /// Currently monitored metric name (may have been substituted)
    pub fn monitored(&self) -> &str {
        &self.monitor
    }

    /// Substitute the monitor when the metrics mapping does not carry it.
    /// The substitution is sticky: all later epochs use the new name.
    fn resolve_monitor(&mut self, metrics: &EpochMetrics) {
        if metrics.contains(&self.monitor) {
            return;
        }

        if self.monitor != DEFAULT_MONITOR {
            warn!(
                "monitored metric '{}' not found, trying to change monitor to '{DEFAULT_MONITOR}'",
                self.monitor
            );
        }

        if metrics.contains(DEFAULT_MONITOR) {
            warn!("monitor changed to '{DEFAULT_MONITOR}'");
            self.monitor = DEFAULT_MONITOR.to_string();
        } else {
            warn!("cannot change monitor to '{DEFAULT_MONITOR}', changed to '{FALLBACK_MONITOR}'");
            self.monitor = FALLBACK_MONITOR.to_string();
        }
    }

    fn write_checkpoint(&self, name: &str, model: &dyn ModelHandle) -> Result<()> {
        let base = self.directory.join(name);
        let weights_path = base.with_extension(model.weights_extension());
        model.save_weights(&weights_path)?;

        if self.include_optimizer {
            let state = model.optimizer().state_tensors();
            let bytes = bincode::serialize(&state)
                .map_err(|e| HookError::Serialize(e.to_string()))?;
            std::fs::write(base.with_extension(OPTIMIZER_SUFFIX), bytes)?;
        }

        Ok(())
    }
}

impl Hook for ModelSaver {
    fn on_epoch_end(
        &mut self,
        epoch: usize,
        metrics: &EpochMetrics,
        model: &mut dyn ModelHandle,
    ) -> Result<()> {
        self.resolve_monitor(metrics);

        match metrics.get(&self.monitor) {
            Some(current) if current < self.best => {
                self.write_checkpoint("best", model)?;
                self.best = current;
            }
            Some(_) => {}
            None => {
                // even the fallback metric is absent; the best policy is
                // skipped for this epoch, periodic/last still run
                warn!("metric '{}' absent, skipping best-checkpoint check", self.monitor);
            }
        }

        if let Some(n) = self.each_n {
            if epoch % n == 0 {
                self.write_checkpoint(&epoch.to_string(), model)?;
            }
        }

        if self.save_last {
            self.write_checkpoint("last", model)?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "ModelSaver"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::testing::MockModel;

    fn metrics(pairs: &[(&str, f64)]) -> EpochMetrics {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_rejects_missing_directory() {
        let result = ModelSaver::with_directory("/definitely/not/here");
        assert!(matches!(result, Err(HookError::MissingDirectory(_))));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let dir = tempfile::tempdir().unwrap();
        let result = ModelSaver::with_directory(dir.path()).unwrap().each_n(0);
        assert!(matches!(result, Err(HookError::ZeroInterval)));
    }

    #[test]
    fn test_best_written_on_strict_improvement() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver =
            ModelSaver::with_directory(dir.path()).unwrap().save_last(false);
        let mut model = MockModel::new(0.1);

        saver.on_epoch_end(0, &metrics(&[("val_loss", 0.5)]), &mut model).unwrap();
        saver.on_epoch_end(1, &metrics(&[("val_loss", 0.4)]), &mut model).unwrap();
        saver.on_epoch_end(2, &metrics(&[("val_loss", 0.4)]), &mut model).unwrap();
        saver.on_epoch_end(3, &metrics(&[("val_loss", 0.6)]), &mut model).unwrap();

        // strict improvement at epochs 0 and 1 only
        assert_eq!(model.saved_names(), vec!["best.safetensors", "best.safetensors"]);
        assert_eq!(saver.best(), 0.4);
    }

    #[test]
    fn test_periodic_fires_on_multiples_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = ModelSaver::with_directory(dir.path())
            .unwrap()
            .each_n(3)
            .unwrap()
            .save_last(false);
        let mut model = MockModel::new(0.1);

        // constant metric so the best policy fires once, at epoch 0
        for epoch in 0..7 {
            saver.on_epoch_end(epoch, &metrics(&[("val_loss", 1.0)]), &mut model).unwrap();
        }

        let names = model.saved_names();
        assert!(names.contains(&"0.safetensors".to_string()));
        assert!(names.contains(&"3.safetensors".to_string()));
        assert!(names.contains(&"6.safetensors".to_string()));
        assert!(!names.contains(&"2.safetensors".to_string()));
        assert!(!names.contains(&"4.safetensors".to_string()));
    }

    #[test]
    fn test_last_written_every_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = ModelSaver::with_directory(dir.path()).unwrap();
        let mut model = MockModel::new(0.1);

        for epoch in 0..3 {
            // increasing loss so only epoch 0 is a best
            saver
                .on_epoch_end(epoch, &metrics(&[("val_loss", epoch as f64)]), &mut model)
                .unwrap();
        }

        let last_writes =
            model.saved_names().iter().filter(|n| *n == "last.safetensors").count();
        assert_eq!(last_writes, 3);
    }

    #[test]
    fn test_sticky_fallback_to_val_loss_then_loss() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = ModelSaver::with_directory(dir.path())
            .unwrap()
            .monitor("val_accuracy")
            .save_last(false);
        let mut model = MockModel::new(0.1);

        saver.on_epoch_end(0, &metrics(&[("val_loss", 0.5), ("loss", 0.7)]), &mut model).unwrap();
        assert_eq!(saver.monitored(), "val_loss");

        let mut saver2 = ModelSaver::with_directory(dir.path())
            .unwrap()
            .monitor("val_accuracy")
            .save_last(false);
        saver2.on_epoch_end(0, &metrics(&[("loss", 0.7)]), &mut model).unwrap();
        assert_eq!(saver2.monitored(), "loss");

        // substitution is sticky: once on 'loss', it stays there even if
        // the original monitor shows up again
        saver2
            .on_epoch_end(1, &metrics(&[("loss", 0.6), ("val_accuracy", 0.9)]), &mut model)
            .unwrap();
        assert_eq!(saver2.monitored(), "loss");
    }

    #[test]
    fn test_no_metrics_at_all_still_writes_last() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = ModelSaver::with_directory(dir.path()).unwrap();
        let mut model = MockModel::new(0.1);

        saver.on_epoch_end(0, &EpochMetrics::new(), &mut model).unwrap();
        assert_eq!(model.saved_names(), vec!["last.safetensors"]);
        assert_eq!(saver.best(), f64::INFINITY);
    }

    #[test]
    fn test_optimizer_sidecar_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = ModelSaver::with_directory(dir.path())
            .unwrap()
            .save_last(false)
            .include_optimizer(true);
        let mut model = MockModel::new(0.1);

        saver.on_epoch_end(0, &metrics(&[("val_loss", 0.5)]), &mut model).unwrap();

        let sidecar = dir.path().join("best.opt");
        assert!(sidecar.exists());
        let bytes = std::fs::read(sidecar).unwrap();
        let state: Vec<(String, Vec<f32>)> = bincode::deserialize(&bytes).unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(state[0].0, "m");
    }

    #[test]
    fn test_save_failure_propagates_and_best_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = ModelSaver::with_directory(dir.path()).unwrap();
        let mut model = MockModel::new(0.1);
        model.fail_saves = true;

        let result = saver.on_epoch_end(0, &metrics(&[("val_loss", 0.5)]), &mut model);
        assert!(matches!(result, Err(HookError::Io(_))));
        // best cell only moves after a successful write
        assert_eq!(saver.best(), f64::INFINITY);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::hook::testing::MockModel;
    use proptest::prelude::*;

    proptest! {
        /// The best cell never increases, whatever the metric stream does
        #[test]
        fn best_cell_is_monotone_non_increasing(
            values in proptest::collection::vec(0.0f64..100.0, 1..20),
        ) {
            let dir = tempfile::tempdir().unwrap();
            let mut saver = ModelSaver::with_directory(dir.path())
                .unwrap()
                .save_last(false);
            let mut model = MockModel::new(0.1);

            let mut prev_best = saver.best();
            for (epoch, value) in values.iter().enumerate() {
                let metrics: EpochMetrics =
                    [("val_loss".to_string(), *value)].into_iter().collect();
                saver.on_epoch_end(epoch, &metrics, &mut model).unwrap();
                prop_assert!(saver.best() <= prev_best);
                prev_best = saver.best();
            }
        }

        /// Periodic writes happen exactly on multiples of the interval
        #[test]
        fn periodic_writes_on_multiples(
            each_n in 1usize..6,
            epochs in 1usize..15,
        ) {
            let dir = tempfile::tempdir().unwrap();
            let mut saver = ModelSaver::with_directory(dir.path())
                .unwrap()
                .each_n(each_n)
                .unwrap()
                .save_last(false);
            let mut model = MockModel::new(0.1);

            for epoch in 0..epochs {
                // metric held above best so only periodic writes occur
                // after epoch 0
                let metrics: EpochMetrics =
                    [("val_loss".to_string(), 1.0)].into_iter().collect();
                saver.on_epoch_end(epoch, &metrics, &mut model).unwrap();
            }

            for epoch in 0..epochs {
                let name = format!("{epoch}.safetensors");
                let written = model.saved_names().contains(&name);
                prop_assert_eq!(written, epoch % each_n == 0);
            }
        }
    }
}
