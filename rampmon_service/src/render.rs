//! Rendering boundary.
//!
//! The pipeline hands a `Dataset` with a depth column and a pair of axis
//! labels to a `Renderer`; how it is drawn is entirely the renderer's
//! business. Four text renderers ship with the crate: a raw data table, a
//! terminal line chart, JSON rows for external charting tools, and CSV.

use crate::ingest::hydromet::write_csv;
use crate::model::{Dataset, DepthRow};
use serde::Serialize;
use std::io::Write;
use thiserror::Error;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("dataset has no depth column; apply a reference elevation first")]
    MissingDepth,
    #[error("render I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("render serialization error: {0}")]
    Serialize(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AxisLabels {
    pub x: String,
    pub y: String,
}

impl Default for AxisLabels {
    fn default() -> Self {
        Self {
            x: "date".to_string(),
            y: "feet".to_string(),
        }
    }
}

pub trait Renderer {
    fn render(&mut self, dataset: &Dataset, labels: &AxisLabels) -> Result<(), RenderError>;
}

fn depth_rows(dataset: &Dataset) -> Result<Vec<DepthRow>, RenderError> {
    if dataset.depth_at_ramp.is_none() {
        return Err(RenderError::MissingDepth);
    }
    Ok(dataset.depth_rows())
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Raw data table: timestamp, forebay reading, depth at ramp.
pub struct TableRenderer<W: Write> {
    out: W,
}

impl<W: Write> TableRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for TableRenderer<W> {
    fn render(&mut self, dataset: &Dataset, labels: &AxisLabels) -> Result<(), RenderError> {
        let rows = depth_rows(dataset)?;
        let forebay = format!("{}_fb", dataset.station);
        let depth_header = format!("depth at ramp ({})", labels.y);

        writeln!(self.out, "{:<16}  {:>10}  {:>20}", labels.x, forebay, depth_header)?;
        writeln!(self.out, "{}", "-".repeat(16 + 2 + 10 + 2 + 20))?;
        for row in rows {
            writeln!(
                self.out,
                "{:<16}  {:>10.2}  {:>20.2}",
                row.timestamp.format(TIMESTAMP_FORMAT),
                row.gauge_reading_ft,
                row.depth_at_ramp_ft
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Chart
// ---------------------------------------------------------------------------

/// Line chart of depth against time, one column per observation.
pub struct ChartRenderer<W: Write> {
    out: W,
    height: usize,
}

impl<W: Write> ChartRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, height: 12 }
    }

    pub fn with_height(mut self, height: usize) -> Self {
        self.height = height.max(2);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Row index (0 = bottom) each value lands on.
    fn levels(values: &[f64], height: usize) -> (f64, f64, Vec<usize>) {
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = if hi > lo { hi - lo } else { 1.0 };
        let top = (height - 1) as f64;
        let levels = values
            .iter()
            .map(|v| (((v - lo) / span) * top).round() as usize)
            .collect();
        (lo, hi, levels)
    }
}

impl<W: Write> Renderer for ChartRenderer<W> {
    fn render(&mut self, dataset: &Dataset, labels: &AxisLabels) -> Result<(), RenderError> {
        let rows = depth_rows(dataset)?;
        if rows.is_empty() {
            writeln!(self.out, "(no data)")?;
            return Ok(());
        }

        let values: Vec<f64> = rows.iter().map(|r| r.depth_at_ramp_ft).collect();
        let (lo, hi, levels) = Self::levels(&values, self.height);

        writeln!(self.out, "{:>9}", labels.y)?;
        for level in (0..self.height).rev() {
            let tick = if level == self.height - 1 {
                format!("{:>8.2} ", hi)
            } else if level == 0 {
                format!("{:>8.2} ", lo)
            } else {
                " ".repeat(9)
            };
            let line: String = levels
                .iter()
                .map(|&l| if l == level { '*' } else { ' ' })
                .collect();
            writeln!(self.out, "{}|{}", tick, line.trim_end())?;
        }
        writeln!(self.out, "{}+{}", " ".repeat(9), "-".repeat(rows.len()))?;

        let first = rows[0].timestamp.format("%Y-%m-%d").to_string();
        let last = rows[rows.len() - 1].timestamp.format("%Y-%m-%d").to_string();
        writeln!(self.out, "{}{} .. {} ({})", " ".repeat(10), first, last, labels.x)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct JsonChart<'a> {
    station: &'a str,
    reference_elevation_ft: f64,
    labels: &'a AxisLabels,
    rows: Vec<DepthRow>,
}

/// JSON document with axis labels and `{timestamp, depth_at_ramp_ft}` rows.
pub struct JsonRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for JsonRenderer<W> {
    fn render(&mut self, dataset: &Dataset, labels: &AxisLabels) -> Result<(), RenderError> {
        let rows = depth_rows(dataset)?;
        let reference_elevation_ft = dataset
            .depth_at_ramp
            .as_ref()
            .map(|d| d.reference_elevation_ft)
            .ok_or(RenderError::MissingDepth)?;

        let doc = JsonChart {
            station: &dataset.station,
            reference_elevation_ft,
            labels,
            rows,
        };
        serde_json::to_writer_pretty(&mut self.out, &doc)
            .map_err(|e| RenderError::Serialize(e.to_string()))?;
        writeln!(self.out)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Hydromet-layout CSV with the depth column appended.
pub struct CsvRenderer<W: Write> {
    out: W,
}

impl<W: Write> CsvRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for CsvRenderer<W> {
    fn render(&mut self, dataset: &Dataset, _labels: &AxisLabels) -> Result<(), RenderError> {
        if dataset.depth_at_ramp.is_none() {
            return Err(RenderError::MissingDepth);
        }
        write_csv(dataset, &mut self.out).map_err(|e| RenderError::Serialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::depth::apply_reference;
    use crate::model::Observation;
    use chrono::NaiveDate;

    fn applied(readings: &[f64]) -> Dataset {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let observations = readings
            .iter()
            .enumerate()
            .map(|(i, &r)| Observation {
                timestamp: (start + chrono::Duration::days(i as i64))
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                gauge_reading_ft: r,
                discharge_cfs: None,
            })
            .collect();
        apply_reference(&Dataset::new("hpd", observations), 4501.0).unwrap()
    }

    fn render_default<R: Renderer>(renderer: &mut R, dataset: &Dataset) {
        renderer
            .render(dataset, &AxisLabels::default())
            .expect("render should succeed");
    }

    #[test]
    fn test_default_axis_labels() {
        let labels = AxisLabels::default();
        assert_eq!(labels.x, "date");
        assert_eq!(labels.y, "feet");
    }

    #[test]
    fn test_table_lists_rows_in_order() {
        let mut table = TableRenderer::new(Vec::new());
        render_default(&mut table, &applied(&[4505.2, 4504.8]));
        let text = String::from_utf8(table.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("date"));
        assert!(lines[0].contains("hpd_fb"));
        assert!(lines[2].starts_with("2024-06-01 00:00"));
        assert!(lines[2].trim_end().ends_with("4.20"));
        assert!(lines[3].trim_end().ends_with("3.80"));
    }

    #[test]
    fn test_renderers_require_depth_column() {
        let raw = Dataset::new("hpd", vec![]);
        let labels = AxisLabels::default();
        assert!(matches!(
            TableRenderer::new(Vec::new()).render(&raw, &labels),
            Err(RenderError::MissingDepth)
        ));
        assert!(matches!(
            ChartRenderer::new(Vec::new()).render(&raw, &labels),
            Err(RenderError::MissingDepth)
        ));
        assert!(matches!(
            JsonRenderer::new(Vec::new()).render(&raw, &labels),
            Err(RenderError::MissingDepth)
        ));
        assert!(matches!(
            CsvRenderer::new(Vec::new()).render(&raw, &labels),
            Err(RenderError::MissingDepth)
        ));
    }

    #[test]
    fn test_chart_plots_extremes_on_top_and_bottom_rows() {
        let mut chart = ChartRenderer::new(Vec::new()).with_height(4);
        render_default(&mut chart, &applied(&[4505.0, 4503.0, 4501.0]));
        let text = String::from_utf8(chart.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0].trim(), "feet");
        // Top row holds the 4.0 ft point in column 0, bottom row the 0.0 ft point in column 2.
        assert!(lines[1].starts_with("    4.00 |*"), "got '{}'", lines[1]);
        assert!(lines[4].starts_with("    0.00 |  *"), "got '{}'", lines[4]);
        assert!(lines[5].ends_with("+---"));
        assert!(lines[6].contains("2024-06-01 .. 2024-06-03 (date)"));
    }

    #[test]
    fn test_chart_handles_flat_series_and_empty_data() {
        let mut flat = ChartRenderer::new(Vec::new()).with_height(3);
        render_default(&mut flat, &applied(&[4502.0, 4502.0]));
        let text = String::from_utf8(flat.into_inner()).unwrap();
        assert!(text.lines().any(|l| l.ends_with("|**")));

        let mut empty = ChartRenderer::new(Vec::new());
        render_default(&mut empty, &applied(&[]));
        assert_eq!(String::from_utf8(empty.into_inner()).unwrap(), "(no data)\n");
    }

    #[test]
    fn test_json_contains_labels_reference_and_rows() {
        let mut json = JsonRenderer::new(Vec::new());
        render_default(&mut json, &applied(&[4505.2, 4504.8]));
        let value: serde_json::Value = serde_json::from_slice(&json.into_inner()).unwrap();

        assert_eq!(value["station"], "hpd");
        assert_eq!(value["reference_elevation_ft"], 4501.0);
        assert_eq!(value["labels"]["x"], "date");
        assert_eq!(value["labels"]["y"], "feet");
        let rows = value["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["timestamp"], "2024-06-01T00:00:00");
        let depth = rows[1]["depth_at_ramp_ft"].as_f64().unwrap();
        assert!((depth - 3.8).abs() < 1e-9);
    }

    #[test]
    fn test_csv_renderer_writes_depth_column() {
        let mut csv = CsvRenderer::new(Vec::new());
        render_default(&mut csv, &applied(&[4505.5]));
        let text = String::from_utf8(csv.into_inner()).unwrap();
        assert_eq!(text.lines().next(), Some("DateTime,hpd_fb,hpd_qj,depth_at_ramp"));
        assert_eq!(text.lines().count(), 2);
    }
}
