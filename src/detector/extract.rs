//! Edge-triggered raw detections from a nominal production series.

use crate::db::models::{NominalProductionRecord, RawDetectionRecord};

fn is_below_threshold(row: &NominalProductionRecord, threshold_ratio: f64) -> bool {
    row.nominal_prod < threshold_ratio * row.baseline_nominal_prod
}

/// Days on which one home's series enters the below-threshold state.
///
/// `series` must be one home's rows in ascending date order. Only the
/// transition from "not below" to "below" fires, so a sustained drop yields
/// one detection at its onset. The first row has no predecessor and never
/// fires.
pub fn extract(series: &[NominalProductionRecord], threshold_ratio: f64, lag_days: i32) -> Vec<RawDetectionRecord> {
    series
        .windows(2)
        .filter(|pair| !is_below_threshold(&pair[0], threshold_ratio) && is_below_threshold(&pair[1], threshold_ratio))
        .map(|pair| {
            let row = &pair[1];
            RawDetectionRecord {
                home_id: row.home_id,
                date: row.date,
                total_production: row.total_production,
                nominal_prod: row.nominal_prod,
                baseline_nominal_prod: row.baseline_nominal_prod,
                lag_days,
                detection_ratio: threshold_ratio,
            }
        })
        .collect()
}
