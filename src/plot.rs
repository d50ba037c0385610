//! Metric plotting hook
//!
//! Accumulates per-epoch metric values after a warm-up threshold and
//! re-renders one PNG line chart per metric at every epoch end, with the
//! `val_` counterpart overlaid when one was present at warm-up.

use std::collections::BTreeMap;
use std::path::PathBuf;

use log::warn;
use plotters::chart::ChartContext;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;

use crate::error::{HookError, Result};
use crate::hook::{val_name, EpochMetrics, Hook, ModelHandle, VAL_PREFIX};
use crate::style::{self, StyleOverrides, StyleTable};

type MetricChart<'a, 'b> =
    ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

fn render_err<E: std::fmt::Display>(e: E) -> HookError {
    HookError::Render(e.to_string())
}

/// Renders metric trajectories to `<dir>/<metric>.png` on each epoch end
///
/// Before the warm-up epoch the hook is inert. At exactly the warm-up
/// epoch it freezes its tracked set to the metric names present in that
/// epoch's mapping; metrics that first appear later are never tracked.
/// Values append once per epoch from then on; a tracked metric missing in
/// a later epoch records a NaN, which renders as a gap in the line.
///
/// Style overrides apply to the process-global style table only for the
/// duration of each call (see [`crate::style`]); this hook is therefore
/// not safe for concurrent invocation.
pub struct TrainingPlot {
    start_from: usize,
    directory: PathBuf,
    overrides: StyleOverrides,
    history: BTreeMap<String, Vec<f64>>,
    has_validation: bool,
}

impl TrainingPlot {
    /// Create a plot hook writing into the process working directory
    pub fn new(start_from: usize) -> Result<Self> {
        Self::build(start_from, None)
    }

    /// Create a plot hook writing into an existing directory
    pub fn with_directory(start_from: usize, directory: impl Into<PathBuf>) -> Result<Self> {
        Self::build(start_from, Some(directory.into()))
    }

    fn build(start_from: usize, directory: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            start_from,
            directory: crate::validate::existing_dir(directory)?,
            overrides: StyleOverrides::default(),
            history: BTreeMap::new(),
            has_validation: false,
        })
    }

    /// Set chart style overrides; every key must be a known style
    /// parameter (see [`style::known_keys`])
    pub fn style(mut self, overrides: StyleOverrides) -> Result<Self> {
        overrides.validate()?;
        self.overrides = overrides;
        Ok(self)
    }

    /// Warm-up threshold this hook was built with
    pub fn start_from(&self) -> usize {
        self.start_from
    }

    /// Names of the metrics tracked since warm-up (empty before warm-up)
    pub fn tracked(&self) -> impl Iterator<Item = &str> {
        self.history.keys().map(String::as_str)
    }

    /// Number of recorded values for a tracked metric
    pub fn series_len(&self, metric: &str) -> Option<usize> {
        self.history.get(metric).map(Vec::len)
    }

    /// Whether a `val_loss` counterpart was present at warm-up
    pub fn has_validation(&self) -> bool {
        self.has_validation
    }

    fn render_all(&self, epoch: usize, style: &StyleTable) -> Result<()> {
        for name in self.history.keys().filter(|k| !k.starts_with(VAL_PREFIX)) {
            self.render_metric(name, epoch, style)?;
        }
        Ok(())
    }

    fn render_metric(&self, name: &str, epoch: usize, style: &StyleTable) -> Result<()> {
        let Some(series) = self.history.get(name) else {
            return Ok(());
        };
        let val = val_name(name);
        let val_series = if self.has_validation { self.history.get(&val) } else { None };

        let mut y_lo = f64::INFINITY;
        let mut y_hi = f64::NEG_INFINITY;
        for v in series.iter().chain(val_series.into_iter().flatten()) {
            if v.is_finite() {
                y_lo = y_lo.min(*v);
                y_hi = y_hi.max(*v);
            }
        }
        if !y_lo.is_finite() || !y_hi.is_finite() {
            warn!("metric '{name}' has no finite values yet, skipping chart");
            return Ok(());
        }
        if y_lo == y_hi {
            y_lo -= 0.5;
            y_hi += 0.5;
        }
        let pad = (y_hi - y_lo) * 0.05;
        let (y_lo, y_hi) = (y_lo - pad, y_hi + pad);

        let x_lo = self.start_from as f64;
        let x_hi = epoch.max(self.start_from + 1) as f64;

        let width = style.number("figure.width").max(64.0) as u32;
        let height = style.number("figure.height").max(64.0) as u32;
        let stroke = style.number("line.width").max(1.0) as u32;

        let path = self.directory.join(format!("{name}.png"));
        let root = BitMapBackend::new(&path, (width, height)).into_drawing_area();
        root.fill(&style.color("background")).map_err(render_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(name, ("sans-serif", style.number("font.size").max(8.0) as u32))
            .margin(style.number("margin") as u32)
            .x_label_area_size(40)
            .y_label_area_size(56)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .x_desc("Epoch #")
            .y_desc("Metric value")
            .draw()
            .map_err(render_err)?;

        draw_series_with_gaps(
            &mut chart,
            series,
            self.start_from,
            name,
            style.color("series.color"),
            stroke,
        )?;
        if let Some(values) = val_series {
            draw_series_with_gaps(
                &mut chart,
                values,
                self.start_from,
                &val,
                style.color("val.color"),
                stroke,
            )?;
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(render_err)?;

        root.present().map_err(render_err)?;
        Ok(())
    }
}

/// Draw one metric line, splitting at NaN values so gaps stay visible.
fn draw_series_with_gaps(
    chart: &mut MetricChart<'_, '_>,
    series: &[f64],
    x0: usize,
    label: &str,
    color: RGBColor,
    stroke: u32,
) -> Result<()> {
    let mut segments: Vec<Vec<(f64, f64)>> = Vec::new();
    let mut current = Vec::new();
    for (i, v) in series.iter().enumerate() {
        if v.is_finite() {
            current.push(((x0 + i) as f64, *v));
        } else if !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    let line_style = ShapeStyle::from(&color).stroke_width(stroke);
    for (i, segment) in segments.into_iter().enumerate() {
        let drawn = chart
            .draw_series(LineSeries::new(segment, line_style))
            .map_err(render_err)?;
        if i == 0 {
            drawn.label(label).legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 18, y)], line_style)
            });
        }
    }
    Ok(())
}

impl Hook for TrainingPlot {
    fn on_epoch_end(
        &mut self,
        epoch: usize,
        metrics: &EpochMetrics,
        _model: &mut dyn ModelHandle,
    ) -> Result<()> {
        if epoch < self.start_from {
            return Ok(());
        }

        if epoch == self.start_from {
            self.has_validation = metrics.contains(&val_name("loss"));
            for name in metrics.names() {
                self.history.insert(name.to_string(), Vec::new());
            }
        }

        for (name, series) in &mut self.history {
            match metrics.get(name) {
                Some(value) => series.push(value),
                None => {
                    warn!("tracked metric '{name}' missing at epoch {epoch}, recording a gap");
                    series.push(f64::NAN);
                }
            }
        }

        let _style_guard = style::apply_scoped(&self.overrides);
        let style = style::snapshot();
        self.render_all(epoch, &style)
    }

    fn name(&self) -> &'static str {
        "TrainingPlot"
    }
}
