use crate::boundary_processor::BoundaryRow;
use anyhow::{bail, Context, Result};
use lf_comparison::Quantity;
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_TICKS: u32 = 15;

const PLOTTED: [Quantity; 3] = [Quantity::Current, Quantity::ActivePower, Quantity::ReactivePower];

/// Axis step: `range / (ticks * 100)` rounded up only past a half, scaled back by 100, at least 100.
pub fn calculate_step_size(range: f64, ticks: u32) -> Result<f64> {
    if ticks == 0 {
        bail!("number of ticks must be positive");
    }
    let raw = range / (ticks as f64 * 100.0);
    let rounded = if raw.fract() > 0.5 { raw.ceil() } else { raw.floor() };
    let step = rounded * 100.0;
    Ok(step.max(100.0))
}

/// Snap `min` down and `max` up to multiples of `step`.
pub fn calculate_limits(min: f64, max: f64, step: f64) -> (f64, f64) {
    ((min / step).floor() * step, (max / step).ceil() * step)
}

/// Global min/max rounded outward to hundreds.
pub fn global_bounds<I: IntoIterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        })?;
    Some(((min / 100.0).floor() * 100.0, (max / 100.0).ceil() * 100.0))
}

fn value(row: &BoundaryRow, quantity: Quantity) -> f64 {
    match quantity {
        Quantity::Current => row.i,
        Quantity::ActivePower => row.p,
        _ => row.q,
    }
}

fn file_slug(quantity: Quantity) -> &'static str {
    match quantity {
        Quantity::Current => "current",
        Quantity::ActivePower => "active_power",
        _ => "reactive_power",
    }
}

fn axis_title(quantity: Quantity) -> &'static str {
    match quantity {
        Quantity::Current => "I (A)",
        Quantity::ActivePower => "P (MW)",
        _ => "Q (MVar)",
    }
}

pub fn plot_file_name(bus: &str, line_id: &str, quantity: Quantity) -> String {
    format!(
        "{}_{}_{}_plot.png",
        bus,
        line_id.replace(' ', "_"),
        file_slug(quantity)
    )
}

/// Y-axis limits and step shared by every plot of one quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisScale {
    pub low: f64,
    pub high: f64,
    pub step: f64,
}

impl AxisScale {
    pub fn for_values<I: IntoIterator<Item = f64>>(values: I, ticks: u32) -> Result<Self> {
        let (min, max) = global_bounds(values).unwrap_or((0.0, 100.0));
        let step = calculate_step_size(max - min, ticks)?;
        let (low, mut high) = calculate_limits(min, max, step);
        if high <= low {
            high = low + step;
        }
        Ok(Self { low, high, step })
    }

    pub fn tick_count(&self) -> usize {
        ((self.high - self.low) / self.step).round() as usize + 1
    }
}

pub struct BoundaryPlotter {
    output_dir: PathBuf,
    ticks: u32,
}

impl BoundaryPlotter {
    pub fn new(output_dir: PathBuf, ticks: u32) -> Self {
        Self { output_dir, ticks }
    }

    /// One scatter per (bus, line) and quantity over the timestamp slots.
    pub fn plot_all(&self, rows: &[BoundaryRow], timestamps: &[String]) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create {}", self.output_dir.display()))?;

        let mut series: BTreeMap<(&str, &str), Vec<&BoundaryRow>> = BTreeMap::new();
        for row in rows {
            series
                .entry((row.bus_breaker_id.as_str(), row.id.as_str()))
                .or_default()
                .push(row);
        }

        let mut written = Vec::new();
        for quantity in PLOTTED {
            let scale = AxisScale::for_values(rows.iter().map(|r| value(r, quantity)), self.ticks)?;

            for ((bus, line_id), points) in &series {
                let path = self.output_dir.join(plot_file_name(bus, line_id, quantity));
                let data: Vec<(f64, f64)> = points
                    .iter()
                    .filter_map(|row| {
                        let slot = timestamps.iter().position(|t| *t == row.timestamp)?;
                        Some((slot as f64, value(row, quantity)))
                    })
                    .collect();

                self.draw_scatter(&path, bus, line_id, quantity, &data, timestamps, &scale)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_scatter(
        &self,
        path: &PathBuf,
        bus: &str,
        line_id: &str,
        quantity: Quantity,
        data: &[(f64, f64)],
        timestamps: &[String],
        scale: &AxisScale,
    ) -> Result<()> {
        let root = BitMapBackend::new(path, (1200, 600)).into_drawing_area();
        root.fill(&WHITE)?;

        let slots = timestamps.len().max(1) as f64;
        let mut chart = ChartBuilder::on(&root)
            .caption(
                &format!("{} ({}) - {}", bus, line_id, quantity.label()),
                ("sans-serif", 28).into_font(),
            )
            .margin(10)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(-0.5f64..(slots - 0.5), scale.low..scale.high)?;

        chart
            .configure_mesh()
            .x_labels(timestamps.len().max(1))
            .x_label_formatter(&|x| {
                let idx = x.round();
                if idx >= 0.0 && (idx as usize) < timestamps.len() {
                    timestamps[idx as usize].clone()
                } else {
                    String::new()
                }
            })
            .y_labels(scale.tick_count())
            .x_desc("Timestamp")
            .y_desc(axis_title(quantity))
            .draw()?;

        chart.draw_series(
            data.iter()
                .map(|(x, y)| Circle::new((*x, *y), 4, BLUE.filled())),
        )?;

        root.present()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_size() {
        assert_eq!(calculate_step_size(3000.0, 15).unwrap(), 200.0);
        // an exact half rounds down
        assert_eq!(calculate_step_size(2250.0, 15).unwrap(), 100.0);
        assert_eq!(calculate_step_size(2400.0, 15).unwrap(), 200.0);
        assert_eq!(calculate_step_size(3750.0, 15).unwrap(), 200.0);
        assert_eq!(calculate_step_size(500.0, 15).unwrap(), 100.0);
        assert_eq!(calculate_step_size(0.0, 15).unwrap(), 100.0);
        assert!(calculate_step_size(1000.0, 0).is_err());
    }

    #[test]
    fn test_limits() {
        assert_eq!(calculate_limits(-250.0, 730.0, 200.0), (-400.0, 800.0));
        assert_eq!(calculate_limits(0.0, 600.0, 200.0), (0.0, 600.0));
    }

    #[test]
    fn test_global_bounds() {
        assert_eq!(global_bounds(vec![-123.0, 456.0, 12.0]), Some((-200.0, 500.0)));
        assert_eq!(global_bounds(vec![f64::NAN]), None);
        assert_eq!(global_bounds(Vec::new()), None);
    }

    #[test]
    fn test_axis_scale() {
        let scale = AxisScale::for_values(vec![-123.0, 456.0], 15).unwrap();
        assert_eq!(scale, AxisScale { low: -200.0, high: 500.0, step: 100.0 });
        assert_eq!(scale.tick_count(), 8);

        let flat = AxisScale::for_values(vec![0.0, 0.0], 15).unwrap();
        assert!(flat.high > flat.low);
    }

    #[test]
    fn test_plot_file_name() {
        assert_eq!(
            plot_file_name("GABCDE11", "XAB_XX11 GABCDE11 1", Quantity::ActivePower),
            "GABCDE11_XAB_XX11_GABCDE11_1_active_power_plot.png"
        );
        assert_eq!(
            plot_file_name("GABCDE11", "X1", Quantity::Current),
            "GABCDE11_X1_current_plot.png"
        );
    }

    fn boundary_row(timestamp: &str, i: f64, p: f64) -> BoundaryRow {
        BoundaryRow {
            id: "XAB_XX11_GABCDE11_1".to_string(),
            bus_breaker_id: "GABCDE11_0".to_string(),
            i,
            p,
            q: 0.0,
            timestamp: timestamp.to_string(),
        }
    }

    #[test]
    fn test_plot_all_writes_one_png_per_quantity() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("plots");
        let rows = vec![boundary_row("0030", 33.0, 22.0), boundary_row("0130", -33.0, -40.0)];
        let timestamps = lf_comparison::file_naming::half_hour_timestamps();

        // Q is constant across the day
        let written = BoundaryPlotter::new(out.clone(), DEFAULT_TICKS)
            .plot_all(&rows, &timestamps)
            .unwrap();

        let expected: Vec<PathBuf> = PLOTTED
            .iter()
            .map(|q| out.join(plot_file_name("GABCDE11_0", "XAB_XX11_GABCDE11_1", *q)))
            .collect();
        assert_eq!(written, expected);
        for path in &written {
            assert!(fs::metadata(path).unwrap().len() > 0);
        }
    }
}
