//! Process-global chart styling
//!
//! Charting style lives in one process-global table, the way a plotting
//! library's global configuration does. `TrainingPlot` applies its
//! per-instance overrides through [`apply_scoped`], which swaps the table
//! and restores the previous one when the guard drops, on every exit path
//! including rendering failures.
//!
//! This table is not protected against concurrent overrides from multiple
//! plot hooks; the crate assumes the host process is single-threaded at
//! the training-loop level.

use std::collections::BTreeMap;
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use plotters::style::RGBColor;
use serde::Deserialize;

use crate::error::{HookError, Result};

/// A single style parameter value
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StyleValue {
    /// Numeric parameter (sizes, widths)
    Number(f64),
    /// Textual parameter (color names, `#rrggbb` hex)
    Text(String),
}

impl From<f64> for StyleValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for StyleValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Numeric parameters and their defaults.
const NUMERIC_DEFAULTS: &[(&str, f64)] = &[
    ("figure.width", 800.0),
    ("figure.height", 600.0),
    ("font.size", 24.0),
    ("margin", 12.0),
    ("line.width", 2.0),
];

/// Color parameters and their defaults.
const COLOR_DEFAULTS: &[(&str, &str)] = &[
    ("background", "white"),
    ("series.color", "#1f77b4"),
    ("val.color", "#ff7f0e"),
];

/// Names of all recognized style parameters, in sorted order.
pub fn known_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = NUMERIC_DEFAULTS
        .iter()
        .map(|(k, _)| *k)
        .chain(COLOR_DEFAULTS.iter().map(|(k, _)| *k))
        .collect();
    keys.sort_unstable();
    keys
}

fn is_known(key: &str) -> bool {
    NUMERIC_DEFAULTS.iter().any(|(k, _)| *k == key)
        || COLOR_DEFAULTS.iter().any(|(k, _)| *k == key)
}

/// The active style table.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleTable(BTreeMap<String, StyleValue>);

impl StyleTable {
    fn defaults() -> Self {
        Self(
            NUMERIC_DEFAULTS
                .iter()
                .map(|(k, v)| ((*k).to_string(), StyleValue::Number(*v)))
                .chain(
                    COLOR_DEFAULTS
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), StyleValue::Text((*v).to_string()))),
                )
                .collect(),
        )
    }

    /// Numeric value of a parameter, falling back to its default when the
    /// stored value is textual.
    pub fn number(&self, key: &str) -> f64 {
        if let Some(StyleValue::Number(n)) = self.0.get(key) {
            return *n;
        }
        NUMERIC_DEFAULTS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .unwrap_or(0.0)
    }

    /// Color value of a parameter, falling back to its default when the
    /// stored value does not parse.
    pub fn color(&self, key: &str) -> RGBColor {
        if let Some(StyleValue::Text(s)) = self.0.get(key) {
            if let Some(color) = parse_color(s) {
                return color;
            }
        }
        COLOR_DEFAULTS
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| parse_color(v))
            .unwrap_or(RGBColor(0, 0, 0))
    }

    fn set(&mut self, key: &str, value: StyleValue) {
        self.0.insert(key.to_string(), value);
    }
}

/// Parse a color from a named value or `#rrggbb` hex.
pub fn parse_color(text: &str) -> Option<RGBColor> {
    match text {
        "white" => return Some(RGBColor(255, 255, 255)),
        "black" => return Some(RGBColor(0, 0, 0)),
        "red" => return Some(RGBColor(214, 39, 40)),
        "green" => return Some(RGBColor(44, 160, 44)),
        "blue" => return Some(RGBColor(31, 119, 180)),
        "orange" => return Some(RGBColor(255, 127, 14)),
        "grey" | "gray" => return Some(RGBColor(127, 127, 127)),
        _ => {}
    }
    let hex = text.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(RGBColor(r, g, b))
}

/// User-supplied style overrides, validated against the known parameters.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct StyleOverrides(BTreeMap<String, StyleValue>);

impl StyleOverrides {
    /// Create an empty override set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an override (keys are validated at hook construction)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<StyleValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Check every key against the known parameter names
    pub fn validate(&self) -> Result<()> {
        for key in self.0.keys() {
            if !is_known(key) {
                return Err(HookError::UnknownStyleKey(key.clone()));
            }
        }
        Ok(())
    }

    /// Check if no overrides are set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &StyleValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

static STYLE: OnceLock<RwLock<StyleTable>> = OnceLock::new();

fn table() -> &'static RwLock<StyleTable> {
    STYLE.get_or_init(|| RwLock::new(StyleTable::defaults()))
}

fn read_table() -> RwLockReadGuard<'static, StyleTable> {
    table().read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_table() -> RwLockWriteGuard<'static, StyleTable> {
    table().write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Snapshot of the active style table.
pub fn snapshot() -> StyleTable {
    read_table().clone()
}

/// Guard that holds the pre-override style table and restores it on drop.
#[must_use = "dropping the guard immediately undoes the overrides"]
pub struct ScopedStyle {
    saved: Option<StyleTable>,
}

/// Apply overrides to the global style table for the lifetime of the
/// returned guard. The previous table is restored when the guard drops,
/// including on error and unwind paths.
pub fn apply_scoped(overrides: &StyleOverrides) -> ScopedStyle {
    let mut guard = write_table();
    let saved = guard.clone();
    for (key, value) in overrides.iter() {
        guard.set(key, value.clone());
    }
    ScopedStyle { saved: Some(saved) }
}

impl Drop for ScopedStyle {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            *write_table() = saved;
        }
    }
}

/// Serializes tests that touch the process-global style table.
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
