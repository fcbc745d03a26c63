//! Depth at the ramp relative to a reference elevation.

use crate::model::{Dataset, DepthColumn, LevelsError};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Returns a copy of `dataset` with `depth_at_ramp[i] = reading[i] - reference`.
///
/// Source readings are untouched. An existing depth column is replaced, so
/// applying a new reference never accumulates on top of an old one.
pub fn apply_reference(dataset: &Dataset, reference: f64) -> Result<Dataset, LevelsError> {
    if !reference.is_finite() {
        return Err(LevelsError::InvalidReference(reference));
    }

    let values = dataset.readings().map(|reading| reading - reference).collect();

    Ok(Dataset {
        station: dataset.station.clone(),
        observations: dataset.observations.clone(),
        depth_at_ramp: Some(DepthColumn {
            reference_elevation_ft: reference,
            values,
        }),
    })
}

/// Headline numbers for the depth series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthSummary {
    pub reference_elevation_ft: f64,
    pub latest_timestamp: NaiveDateTime,
    pub latest_depth_ft: f64,
    pub min_depth_ft: f64,
    pub max_depth_ft: f64,
    /// Last minus first depth over the window; negative while the lake drops.
    pub change_ft: f64,
}

/// Summarizes a dataset that has had a reference applied.
///
/// Returns `None` when there is no depth column or no rows.
pub fn summarize(dataset: &Dataset) -> Option<DepthSummary> {
    let depth = dataset.depth_at_ramp.as_ref()?;
    let first = *depth.values.first()?;
    let last = *depth.values.last()?;
    let latest_timestamp = dataset.observations.last()?.timestamp;

    let (min_depth_ft, max_depth_ft) = depth
        .values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    Some(DepthSummary {
        reference_elevation_ft: depth.reference_elevation_ft,
        latest_timestamp,
        latest_depth_ft: last,
        min_depth_ft,
        max_depth_ft,
        change_ft: last - first,
    })
}
