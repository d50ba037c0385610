//! Learning rate scheduling hook
//!
//! A schedule is chosen once at construction as a tagged variant: a
//! custom rule, a per-epoch multiplicative factor, or an explicit
//! epoch-to-rate table. The [`LrScheduler`] hook applies it on epoch
//! begin, before the epoch's training steps.

use std::collections::BTreeMap;
use std::fmt;

use log::info;

use crate::error::{HookError, Result};
use crate::hook::{Hook, ModelHandle};

/// Outcome of evaluating a schedule at one epoch
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LrDecision {
    /// Candidate learning rate (equals the current rate when unchanged)
    pub lr: f64,
    /// Whether the rate differs from the current one
    pub changed: bool,
}

/// Learning rate schedule, one strategy per instance
pub enum LrSchedule {
    /// User rule: (epoch index, current rate) -> new rate
    Custom(Box<dyn Fn(usize, f64) -> f64 + Send>),
    /// Multiply the current rate by this factor every epoch
    PerEpochFactor(f64),
    /// Explicit rates at specific epochs; other epochs are unchanged
    Table(BTreeMap<usize, f64>),
}

impl LrSchedule {
    /// Schedule driven by a user rule
    pub fn custom(rule: impl Fn(usize, f64) -> f64 + Send + 'static) -> Self {
        Self::Custom(Box::new(rule))
    }

    /// Multiplicative schedule; the factor must be finite and positive
    pub fn per_epoch_factor(factor: f64) -> Result<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(HookError::InvalidFactor(factor));
        }
        Ok(Self::PerEpochFactor(factor))
    }

    /// Table schedule; every rate must be finite and non-negative
    pub fn table(entries: impl IntoIterator<Item = (usize, f64)>) -> Result<Self> {
        let table: BTreeMap<usize, f64> = entries.into_iter().collect();
        for (epoch, rate) in &table {
            if !rate.is_finite() {
                return Err(HookError::NonFinite {
                    name: format!("rate for epoch {epoch}"),
                    value: *rate,
                });
            }
            if *rate < 0.0 {
                return Err(HookError::Negative {
                    name: format!("rate for epoch {epoch}"),
                    value: *rate,
                });
            }
        }
        Ok(Self::Table(table))
    }

    /// Evaluate the schedule for one epoch against the current rate
    pub fn decide(&self, epoch: usize, current: f64) -> LrDecision {
        match self {
            Self::Custom(rule) => {
                let lr = rule(epoch, current);
                LrDecision { lr, changed: lr != current }
            }
            Self::PerEpochFactor(factor) => {
                LrDecision { lr: current * factor, changed: true }
            }
            Self::Table(table) => match table.get(&epoch) {
                Some(lr) => LrDecision { lr: *lr, changed: true },
                None => LrDecision { lr: current, changed: false },
            },
        }
    }
}

impl fmt::Debug for LrSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(_) => f.write_str("LrSchedule::Custom(..)"),
            Self::PerEpochFactor(factor) => {
                write!(f, "LrSchedule::PerEpochFactor({factor})")
            }
            Self::Table(table) => write!(f, "LrSchedule::Table({table:?})"),
        }
    }
}

/// Applies an [`LrSchedule`] to the optimizer on epoch begin
///
/// When the schedule decides on a different rate, the optimizer's rate is
/// overwritten and the change is logged with old and new values.
#[derive(Debug)]
pub struct LrScheduler {
    schedule: LrSchedule,
}

impl LrScheduler {
    /// Wrap a schedule in an epoch-begin hook
    pub fn new(schedule: LrSchedule) -> Self {
        Self { schedule }
    }

    /// The wrapped schedule
    pub fn schedule(&self) -> &LrSchedule {
        &self.schedule
    }
}

impl Hook for LrScheduler {
    fn on_epoch_begin(&mut self, epoch: usize, model: &mut dyn ModelHandle) -> Result<()> {
        let current = model.optimizer().learning_rate();
        let decision = self.schedule.decide(epoch, current);

        if decision.changed {
            info!("learning rate changed from {current} to {} at epoch {epoch}", decision.lr);
            model.optimizer_mut().set_learning_rate(decision.lr);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "LrScheduler"
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Multiplicative schedule: always changed, exact product
        #[test]
        fn factor_schedule_multiplies(
            factor in 0.01f64..10.0,
            lr in 1e-8f64..1.0,
            epoch in 0usize..1000,
        ) {
            let schedule = LrSchedule::per_epoch_factor(factor).unwrap();
            let decision = schedule.decide(epoch, lr);
            prop_assert!(decision.changed);
            prop_assert!((decision.lr - lr * factor).abs() <= 1e-12 * lr.max(1.0));
        }

        /// Table schedule: listed epochs yield exactly their rate,
        /// unlisted epochs leave the rate untouched
        #[test]
        fn table_schedule_exact(
            entries in proptest::collection::btree_map(0usize..50, 0.0f64..1.0, 1..8),
            probe in 0usize..50,
            lr in 1e-6f64..1.0,
        ) {
            let schedule = LrSchedule::table(entries.clone()).unwrap();
            let decision = schedule.decide(probe, lr);
            match entries.get(&probe) {
                Some(rate) => {
                    prop_assert!(decision.changed);
                    prop_assert_eq!(decision.lr, *rate);
                }
                None => {
                    prop_assert!(!decision.changed);
                    prop_assert_eq!(decision.lr, lr);
                }
            }
        }
    }
}
