use log::{debug, info};

use crate::cursor::IncrementalCursor;
use crate::db::models::RawDetectionRecord;
use crate::detector::extract::extract;
use crate::detector::muting::NeighborCorrelationFilter;
use crate::store::{Dataset, DetectionStore};
use crate::utils::Progress;

/// Extend `raw_detections` from its watermark.
///
/// Each home's nominal series is read from one day before the watermark so a
/// threshold crossing on the watermark day itself has a predecessor.
pub fn compute_raw_detections<S: DetectionStore>(
    store: &mut S,
    detection_ratio: f64,
    lag_days: i32,
    cursor: &IncrementalCursor,
    show_progress: bool,
) -> Result<usize, String> {
    let Some(start) = cursor.resolve_start(store, Dataset::RawDetections)? else {
        info!("Raw detections: raw_detections is current through {}", cursor.yesterday());
        return Ok(0);
    };
    let context_start = start.pred_opt().unwrap_or(start);

    let homes = store.homes_with_nominal_since(start)?;
    info!("Raw detections: scanning {} home(s) from {}", homes.len(), start);

    let mut progress = Progress::new("Raw detections", homes.len(), show_progress);
    let mut inserted = 0;
    for home_id in homes {
        let series = store.nominal_for_home(home_id, context_start)?;
        let rows: Vec<RawDetectionRecord> = extract(&series, detection_ratio, lag_days)
            .into_iter()
            .filter(|r| r.date >= start)
            .collect();
        if !rows.is_empty() {
            debug!("Raw detections: home {} fired on {} day(s)", home_id, rows.len());
            inserted += store.append_raw_detections(&rows)?;
        }
        progress.tick();
    }

    info!("Raw detections: {} row(s) inserted", inserted);
    Ok(inserted)
}

/// Extend `detections` with the raw detections that survive neighbor muting.
pub fn compute_detections<S: DetectionStore>(
    store: &mut S,
    filter: &NeighborCorrelationFilter,
    cursor: &IncrementalCursor,
) -> Result<usize, String> {
    let Some(start) = cursor.resolve_start(store, Dataset::Detections)? else {
        info!("Detections: detections is current through {}", cursor.yesterday());
        return Ok(0);
    };

    let raw = store.raw_detections_since(start)?;
    if raw.is_empty() {
        info!("Detections: no raw detections since {}", start);
        return Ok(0);
    }
    let edges = store.neighbors_within(filter.max_distance_miles)?;
    let kept = filter.filter(&raw, &edges, start);
    info!(
        "Detections: {} of {} raw detection(s) kept, {} muted by neighbors",
        kept.len(),
        raw.len(),
        raw.len() - kept.len()
    );

    if kept.is_empty() {
        return Ok(0);
    }
    store.append_detections(&kept)
}
