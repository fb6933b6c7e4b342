//! Mirrors upstream telemetry into the local working store.

use log::{info, warn};

use crate::cursor::IncrementalCursor;
use crate::db::models::HomeLocation;
use crate::store::{Dataset, DetectionStore, ProductionSource};
use crate::utils::{Progress, valid_coordinates};

/// Replace the local home-location snapshot with every upstream home that has
/// usable coordinates.
pub fn sync_home_locations<U: ProductionSource, S: DetectionStore>(source: &mut U, store: &mut S) -> Result<usize, String> {
    let upstream = source.home_locations()?;
    let total = upstream.len();
    let homes: Vec<HomeLocation> = upstream
        .into_iter()
        .filter(|h| valid_coordinates(h.latitude, h.longitude))
        .collect();
    if homes.len() < total {
        warn!(
            "Home sync: skipping {} home(s) with out-of-range coordinates",
            total - homes.len()
        );
    }

    let mirrored = store.replace_home_locations(&homes)?;
    info!("Home sync: mirrored {} home location(s)", mirrored);
    Ok(mirrored)
}

/// Append upstream daily production from the `prod_history` watermark
/// through yesterday.
///
/// `memory_friendly` fetches one day per query; otherwise the whole range is
/// pulled at once.
pub fn sync_prod_history<U: ProductionSource, S: DetectionStore>(
    source: &mut U,
    store: &mut S,
    cursor: &IncrementalCursor,
    memory_friendly: bool,
    show_progress: bool,
) -> Result<usize, String> {
    let Some(start) = cursor.resolve_start(store, Dataset::ProdHistory)? else {
        info!("Production sync: prod_history is current through {}", cursor.yesterday());
        return Ok(0);
    };
    let end = cursor.yesterday();
    if start > end {
        info!("Production sync: nothing to fetch before {}", start);
        return Ok(0);
    }

    let mut inserted = 0;
    if memory_friendly {
        let total_days = (end - start).num_days() as usize + 1;
        let mut progress = Progress::new("Production sync", total_days, show_progress);
        let mut day = start;
        while day <= end {
            let batch = source.production_on(day)?;
            if !batch.is_empty() {
                inserted += store.append_production(&batch)?;
            }
            progress.tick();
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
    } else {
        let batch = source.production_between(start, end)?;
        inserted += store.append_production(&batch)?;
    }

    info!("Production sync: {} row(s) inserted for {}..={}", inserted, start, end);
    Ok(inserted)
}
