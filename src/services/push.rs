use log::info;

use crate::cursor::IncrementalCursor;
use crate::store::{Dataset, DetectionSink, DetectionStore};

/// Copy detections newer than the analytics watermark into the sink.
pub fn push_detections<S: DetectionStore, K: DetectionSink>(
    store: &mut S,
    sink: &mut K,
    cursor: &IncrementalCursor,
) -> Result<usize, String> {
    let Some(start) = cursor.resolve_start(sink, Dataset::DeliveredDetections)? else {
        info!("Push: delivered_detections is current through {}", cursor.yesterday());
        return Ok(0);
    };

    let rows = store.detections_since(start)?;
    if rows.is_empty() {
        info!("Push: no detections since {}", start);
        return Ok(0);
    }
    let delivered = sink.append_detections(&rows)?;
    info!("Push: delivered {} detection(s) from {}", delivered, start);
    Ok(delivered)
}
