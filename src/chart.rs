use crate::data::{Metric, Sample, SampleTable};
use std::ops::RangeInclusive;
use thiserror::Error;

pub struct Panel {
    pub title: &'static str,
    pub metrics: &'static [Metric],
}

/// Fixed four-panel layout, top to bottom.
pub const PANELS: [Panel; 4] = [
    Panel {
        title: "Utilization [%]",
        metrics: &[Metric::UtilizationGpu, Metric::UtilizationMemory],
    },
    Panel {
        title: "Temperature [C]",
        metrics: &[Metric::TemperatureGpu],
    },
    Panel {
        title: "Power Draw [W]",
        metrics: &[Metric::PowerDraw],
    },
    Panel {
        title: "Clock Frequencies [MHz]",
        metrics: &[
            Metric::ClockGraphics,
            Metric::ClockSm,
            Metric::ClockMemory,
            Metric::ClockVideo,
        ],
    },
];

#[derive(Error, Debug, PartialEq)]
pub enum ChartError {
    #[error("panel `{panel}` has non-finite bounds")]
    NonFiniteBounds { panel: &'static str },
}

pub struct SeriesLine {
    pub label: &'static str,
    /// Contiguous runs of points; a missing value ends a run.
    pub segments: Vec<Vec<[f64; 2]>>,
}

pub struct PanelView {
    pub title: &'static str,
    pub lines: Vec<SeriesLine>,
    pub min: [f64; 2],
    pub max: [f64; 2],
}

/// Visible `time_elapsed` range: the full history, or the trailing
/// `window_samples * interval` seconds once the table is longer than
/// `window_samples`.
pub fn x_window(
    table: &SampleTable,
    interval: f64,
    window_samples: usize,
) -> Option<RangeInclusive<f64>> {
    let first = table.rows().first()?.time_elapsed;
    let last = table.latest()?.time_elapsed;
    if table.len() > window_samples {
        Some(last - window_samples as f64 * interval..=last)
    } else {
        Some(first..=last)
    }
}

pub fn build_panel(
    panel: &Panel,
    table: &SampleTable,
    x: &RangeInclusive<f64>,
) -> Result<PanelView, ChartError> {
    let mut lines = Vec::with_capacity(panel.metrics.len());
    let (mut y_lo, mut y_hi) = (f64::INFINITY, f64::NEG_INFINITY);

    for &metric in panel.metrics {
        let mut segments = Vec::new();
        let mut current: Vec<[f64; 2]> = Vec::new();
        for row in visible_rows(table, x) {
            match metric.value(row) {
                Some(y) => {
                    y_lo = y_lo.min(y);
                    y_hi = y_hi.max(y);
                    current.push([row.time_elapsed, y]);
                }
                None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
        lines.push(SeriesLine {
            label: metric.label(),
            segments,
        });
    }

    // Nothing visible yet: any unit range will do.
    if y_lo > y_hi {
        (y_lo, y_hi) = (0.0, 1.0);
    }
    // The x range is drawn as given; only a zero-width range is widened.
    let (x_lo, x_hi) = if x.start() < x.end() {
        (*x.start(), *x.end())
    } else {
        (x.start() - 0.5, x.end() + 0.5)
    };
    let (y_lo, y_hi) = pad(y_lo, y_hi, 1.0);

    if ![x_lo, x_hi, y_lo, y_hi].iter().all(|v| v.is_finite()) {
        return Err(ChartError::NonFiniteBounds { panel: panel.title });
    }

    Ok(PanelView {
        title: panel.title,
        lines,
        min: [x_lo, y_lo],
        max: [x_hi, y_hi],
    })
}

// Rows inside `x`, plus the last row before it so lines reach the left edge.
fn visible_rows<'a>(
    table: &'a SampleTable,
    x: &'a RangeInclusive<f64>,
) -> impl Iterator<Item = &'a Sample> + 'a {
    let rows = table.rows();
    let lead = rows
        .partition_point(|r| r.time_elapsed < *x.start())
        .saturating_sub(1);
    rows[lead..]
        .iter()
        .filter(move |r| r.time_elapsed <= *x.end())
}

// Widens [lo, hi] by 5% per side, or by `flat` when the range is empty.
fn pad(lo: f64, hi: f64, flat: f64) -> (f64, f64) {
    let margin = (hi - lo) * 0.05;
    if margin > 0.0 {
        (lo - margin, hi + margin)
    } else {
        (lo - flat, hi + flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::sample_at;

    fn table_of(n: usize) -> SampleTable {
        let mut table = SampleTable::default();
        table.append((0..n).map(|i| sample_at(i as f64, Some((i % 100) as f64))));
        table
    }

    #[test]
    fn empty_table_has_no_window() {
        assert!(x_window(&SampleTable::default(), 1.0, 100).is_none());
    }

    #[test]
    fn short_history_shows_everything() {
        let table = table_of(50);
        assert_eq!(x_window(&table, 1.0, 100), Some(0.0..=49.0));
    }

    #[test]
    fn long_history_slides() {
        let table = table_of(150);
        let window = x_window(&table, 1.0, 100).unwrap();
        assert_eq!(window, 49.0..=149.0);
        assert_eq!(window.end() - window.start(), 100.0);
    }

    #[test]
    fn window_width_scales_with_interval() {
        let table = table_of(101);
        assert_eq!(x_window(&table, 0.5, 100), Some(50.0..=100.0));
    }

    #[test]
    fn panels_cover_every_metric_once() {
        let seen: Vec<Metric> = PANELS.iter().flat_map(|p| p.metrics.iter().copied()).collect();
        assert_eq!(seen.len(), Metric::ALL.len());
        for metric in Metric::ALL {
            assert_eq!(seen.iter().filter(|m| **m == metric).count(), 1);
        }
        assert_eq!(PANELS[3].metrics.len(), 4);
    }

    #[test]
    fn missing_values_split_lines() {
        let mut table = SampleTable::default();
        table.append([
            sample_at(0.0, Some(10.0)),
            sample_at(1.0, Some(20.0)),
            sample_at(2.0, None),
            sample_at(3.0, Some(40.0)),
        ]);
        let x = x_window(&table, 1.0, 100).unwrap();
        let view = build_panel(&PANELS[0], &table, &x).unwrap();

        let gpu = &view.lines[0];
        assert_eq!(gpu.label, Metric::UtilizationGpu.label());
        assert_eq!(gpu.segments, vec![vec![[0.0, 10.0], [1.0, 20.0]], vec![[3.0, 40.0]]]);
        // Memory utilization is present on every row.
        assert_eq!(view.lines[1].segments.len(), 1);
    }

    #[test]
    fn bounds_follow_visible_points() {
        let table = table_of(150);
        let x = x_window(&table, 1.0, 100).unwrap();
        let view = build_panel(&PANELS[0], &table, &x).unwrap();

        assert_eq!(view.min[0], 49.0);
        assert_eq!(view.max[0], 149.0);
    }

    #[test]
    fn short_history_bounds_span_everything() {
        let table = table_of(50);
        let x = x_window(&table, 1.0, 100).unwrap();
        let view = build_panel(&PANELS[3], &table, &x).unwrap();

        assert_eq!(view.min[0], 0.0);
        assert_eq!(view.max[0], 49.0);
        assert_eq!(view.lines[0].segments[0].len(), 50);
    }

    #[test]
    fn windowed_lines_reach_the_left_edge() {
        let table = table_of(150);
        let x = x_window(&table, 1.0, 100).unwrap();
        let view = build_panel(&PANELS[0], &table, &x).unwrap();

        let points = &view.lines[0].segments[0];
        assert_eq!(points.first().unwrap()[0], 48.0);
        assert_eq!(points.last().unwrap()[0], 149.0);
        assert_eq!(points.len(), 102);
    }

    #[test]
    fn single_sample_gets_a_usable_range() {
        let table = table_of(1);
        let x = x_window(&table, 1.0, 100).unwrap();
        let view = build_panel(&PANELS[1], &table, &x).unwrap();
        assert_eq!(view.min, [-0.5, 49.0]);
        assert_eq!(view.max, [0.5, 51.0]);
    }

    #[test]
    fn overflowing_values_are_reported() {
        let mut table = SampleTable::default();
        let mut sample = sample_at(0.0, None);
        sample.power_draw = Some(f64::INFINITY);
        table.append([sample]);
        let x = x_window(&table, 1.0, 100).unwrap();

        assert_eq!(
            build_panel(&PANELS[2], &table, &x).err(),
            Some(ChartError::NonFiniteBounds { panel: "Power Draw [W]" })
        );
    }
}
