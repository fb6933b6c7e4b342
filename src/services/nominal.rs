use chrono::{Duration, NaiveDate};
use log::{debug, info};
use std::collections::BTreeSet;

use crate::cursor::IncrementalCursor;
use crate::db::models::NominalProductionRecord;
use crate::detector::nominal::NominalProductionEstimator;
use crate::store::{Dataset, DetectionStore};
use crate::utils::Progress;

/// Extend `nominal_production` from its watermark through yesterday.
///
/// Every home that produced inside the lookback window, or that already has a
/// row on the watermark day, is recomputed from `watermark - lookback_days`.
/// Missing days up to yesterday read as zero, and only rows dated on or after
/// the watermark are appended.
pub fn update_all<S: DetectionStore>(
    store: &mut S,
    estimator: &NominalProductionEstimator,
    cursor: &IncrementalCursor,
    show_progress: bool,
) -> Result<usize, String> {
    let Some(start) = cursor.resolve_start(store, Dataset::NominalProduction)? else {
        info!("Nominal prod: nominal_production is current through {}", cursor.yesterday());
        return Ok(0);
    };
    let through = cursor.yesterday();

    let lookback = Duration::days(estimator.lookback_days() as i64);
    let history_start = start.checked_sub_signed(lookback).unwrap_or(NaiveDate::MIN);
    // homes with a row on the watermark day keep a gap-free series even when
    // they stop reporting
    let established: BTreeSet<i64> = match start.pred_opt() {
        Some(watermark) => store.homes_with_nominal_since(watermark)?.into_iter().collect(),
        None => BTreeSet::new(),
    };
    let mut homes: BTreeSet<i64> = store.homes_with_production_after(history_start)?.into_iter().collect();
    homes.extend(established.iter().copied());
    info!(
        "Nominal prod: {} home(s) ({} established) for {}..={} (history from {}, smoothing {}d, lag {}d)",
        homes.len(),
        established.len(),
        start,
        through,
        history_start,
        estimator.smoothing_days(),
        estimator.lag_days()
    );

    let mut progress = Progress::new("Nominal prod", homes.len(), show_progress);
    let mut inserted = 0;
    let mut short_history = 0;
    for home_id in homes {
        let history = store.production_for_home(home_id, history_start)?;
        let first = if established.contains(&home_id) {
            history_start
        } else {
            match history.first() {
                Some(r) if history.len() >= estimator.min_history_days() => r.date,
                _ => {
                    debug!(
                        "Nominal prod: home {} has {} day(s) of history, need {}",
                        home_id,
                        history.len(),
                        estimator.min_history_days()
                    );
                    short_history += 1;
                    progress.tick();
                    continue;
                }
            }
        };

        let rows: Vec<NominalProductionRecord> = estimator
            .compute_span(home_id, &history, first, through)
            .into_iter()
            .filter(|r| r.date >= start)
            .collect();
        if !rows.is_empty() {
            inserted += store.append_nominal(&rows)?;
        }
        progress.tick();
    }

    info!(
        "Nominal prod: {} row(s) inserted, {} home(s) with too little history",
        inserted, short_history
    );
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ProductionRecord;
    use crate::store::memory::MemoryStore;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 9, 1).unwrap() + Duration::days(offset)
    }

    fn store_with(home_id: i64, days: i64) -> MemoryStore {
        let mut store = MemoryStore::default();
        let rows: Vec<ProductionRecord> = (0..days)
            .map(|i| ProductionRecord {
                home_id,
                date: day(i),
                total_production: 60.0 + (i % 5) as f64,
            })
            .collect();
        store.append_production(&rows).unwrap();
        store
    }

    #[test]
    fn short_history_home_is_skipped() {
        let mut store = store_with(5, 5);
        let estimator = NominalProductionEstimator::new(14, 14).unwrap();
        let cursor = IncrementalCursor::new(day(0), day(30));
        assert_eq!(update_all(&mut store, &estimator, &cursor, false).unwrap(), 0);
        assert!(store.nominal.is_empty());
    }

    #[test]
    fn incremental_update_matches_full_recompute() {
        let estimator = NominalProductionEstimator::new(7, 5).unwrap();

        let mut full = store_with(1, 90);
        update_all(&mut full, &estimator, &IncrementalCursor::new(day(0), day(90)), false).unwrap();

        let mut stepped = store_with(1, 90);
        stepped.production.retain(|(_, d), _| *d < day(50));
        update_all(&mut stepped, &estimator, &IncrementalCursor::new(day(0), day(50)), false).unwrap();
        let rest: Vec<ProductionRecord> = full.production.values().filter(|r| r.date >= day(50)).cloned().collect();
        stepped.append_production(&rest).unwrap();
        update_all(&mut stepped, &estimator, &IncrementalCursor::new(day(0), day(90)), false).unwrap();

        assert_eq!(stepped.nominal.len(), full.nominal.len());
        for (key, row) in &full.nominal {
            let other = &stepped.nominal[key];
            assert!((row.nominal_prod - other.nominal_prod).abs() < 1e-9);
            assert!((row.baseline_nominal_prod - other.baseline_nominal_prod).abs() < 1e-9);
        }
    }

    #[test]
    fn rerun_without_new_production_appends_nothing() {
        let estimator = NominalProductionEstimator::new(7, 5).unwrap();
        let mut store = store_with(1, 60);
        let cursor = IncrementalCursor::new(day(0), day(60));
        assert!(update_all(&mut store, &estimator, &cursor, false).unwrap() > 0);
        assert_eq!(update_all(&mut store, &estimator, &cursor, false).unwrap(), 0);
    }

    #[test]
    fn missing_day_at_a_run_boundary_is_zero_filled_once() {
        let estimator = NominalProductionEstimator::new(7, 5).unwrap();
        let without_day_49 = |mut store: MemoryStore| {
            store.production.remove(&(1, day(49)));
            store
        };

        let mut single = without_day_49(store_with(1, 90));
        update_all(&mut single, &estimator, &IncrementalCursor::new(day(0), day(90)), false).unwrap();

        let mut resumed = without_day_49(store_with(1, 90));
        let later: Vec<ProductionRecord> = resumed.production.values().filter(|r| r.date >= day(50)).cloned().collect();
        resumed.production.retain(|(_, d), _| *d < day(50));
        update_all(&mut resumed, &estimator, &IncrementalCursor::new(day(0), day(50)), false).unwrap();
        resumed.append_production(&later).unwrap();
        update_all(&mut resumed, &estimator, &IncrementalCursor::new(day(0), day(90)), false).unwrap();

        assert_eq!(single.nominal.len(), 90 - 7 + 1 - 5);
        assert_eq!(resumed.nominal.len(), single.nominal.len());
        assert_eq!(resumed.nominal[&(1, day(49))].total_production, 0.0);
        for (key, row) in &single.nominal {
            assert!((row.nominal_prod - resumed.nominal[key].nominal_prod).abs() < 1e-9);
        }
    }

    #[test]
    fn silent_home_keeps_getting_zero_rows() {
        let estimator = NominalProductionEstimator::new(7, 5).unwrap();
        let mut store = store_with(1, 40);
        update_all(&mut store, &estimator, &IncrementalCursor::new(day(0), day(40)), false).unwrap();

        // no production after day 39
        update_all(&mut store, &estimator, &IncrementalCursor::new(day(0), day(120)), false).unwrap();
        assert_eq!(store.nominal.len(), 120 - 7 + 1 - 5);
        let last = &store.nominal[&(1, day(119))];
        assert_eq!(last.nominal_prod, 0.0);
        assert_eq!(last.total_production, 0.0);

        // lookback window now holds no production at all
        update_all(&mut store, &estimator, &IncrementalCursor::new(day(0), day(200)), false).unwrap();
        assert_eq!(store.nominal.len(), 200 - 7 + 1 - 5);
        assert!(store.nominal.contains_key(&(1, day(199))));
    }
}
