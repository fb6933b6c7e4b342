//! In-memory store adapters for exercising stages without Postgres.
//! Appends mirror `ON CONFLICT DO NOTHING` on `(home_id, date)`.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::db::models::{
    DetectionRecord, HomeLocation, Homeowner, NeighborEdge, NominalProductionRecord, ProductionRecord,
    RawDetectionRecord,
};
use crate::store::{Dataset, DetectionSink, DetectionStore, ProductionSource, Watermarked};

fn insert_new<T: Clone>(
    table: &mut BTreeMap<(i64, NaiveDate), T>,
    rows: &[T],
    key: impl Fn(&T) -> (i64, NaiveDate),
) -> usize {
    let mut inserted = 0;
    for row in rows {
        let k = key(row);
        if !table.contains_key(&k) {
            table.insert(k, row.clone());
            inserted += 1;
        }
    }
    inserted
}

fn latest<T>(table: &BTreeMap<(i64, NaiveDate), T>) -> Option<NaiveDate> {
    table.keys().map(|(_, d)| *d).max()
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub home_locations: Vec<HomeLocation>,
    pub neighbors: Vec<NeighborEdge>,
    pub production: BTreeMap<(i64, NaiveDate), ProductionRecord>,
    pub nominal: BTreeMap<(i64, NaiveDate), NominalProductionRecord>,
    pub raw_detections: BTreeMap<(i64, NaiveDate), RawDetectionRecord>,
    pub detections: BTreeMap<(i64, NaiveDate), DetectionRecord>,
    /// When set, every append fails with this message.
    pub fail_appends: Option<String>,
}

impl MemoryStore {
    fn check_writable(&self) -> Result<(), String> {
        match &self.fail_appends {
            Some(msg) => Err(msg.clone()),
            None => Ok(()),
        }
    }
}

impl Watermarked for MemoryStore {
    fn max_date(&mut self, dataset: Dataset) -> Result<Option<NaiveDate>, String> {
        match dataset {
            Dataset::ProdHistory => Ok(latest(&self.production)),
            Dataset::NominalProduction => Ok(latest(&self.nominal)),
            Dataset::RawDetections => Ok(latest(&self.raw_detections)),
            Dataset::Detections => Ok(latest(&self.detections)),
            Dataset::DeliveredDetections => Err(format!("{} is not held by the local store", dataset.table_name())),
        }
    }
}

impl DetectionStore for MemoryStore {
    fn replace_home_locations(&mut self, rows: &[HomeLocation]) -> Result<usize, String> {
        self.check_writable()?;
        self.home_locations = rows.to_vec();
        Ok(rows.len())
    }

    fn home_locations(&mut self) -> Result<Vec<HomeLocation>, String> {
        Ok(self.home_locations.clone())
    }

    fn replace_neighbors(&mut self, rows: &[NeighborEdge]) -> Result<usize, String> {
        self.check_writable()?;
        self.neighbors = rows.to_vec();
        Ok(rows.len())
    }

    fn neighbors_within(&mut self, max_distance_miles: f64) -> Result<Vec<NeighborEdge>, String> {
        Ok(self
            .neighbors
            .iter()
            .filter(|e| e.distance_miles <= max_distance_miles)
            .cloned()
            .collect())
    }

    fn append_production(&mut self, rows: &[ProductionRecord]) -> Result<usize, String> {
        self.check_writable()?;
        Ok(insert_new(&mut self.production, rows, |r| (r.home_id, r.date)))
    }

    fn homes_with_production_after(&mut self, after: NaiveDate) -> Result<Vec<i64>, String> {
        let homes: BTreeSet<i64> = self.production.keys().filter(|(_, d)| *d > after).map(|(h, _)| *h).collect();
        Ok(homes.into_iter().collect())
    }

    fn production_for_home(&mut self, home_id: i64, since: NaiveDate) -> Result<Vec<ProductionRecord>, String> {
        Ok(self
            .production
            .values()
            .filter(|r| r.home_id == home_id && r.date >= since)
            .cloned()
            .collect())
    }

    fn append_nominal(&mut self, rows: &[NominalProductionRecord]) -> Result<usize, String> {
        self.check_writable()?;
        Ok(insert_new(&mut self.nominal, rows, |r| (r.home_id, r.date)))
    }

    fn homes_with_nominal_since(&mut self, since: NaiveDate) -> Result<Vec<i64>, String> {
        let homes: BTreeSet<i64> = self.nominal.keys().filter(|(_, d)| *d >= since).map(|(h, _)| *h).collect();
        Ok(homes.into_iter().collect())
    }

    fn nominal_for_home(&mut self, home_id: i64, since: NaiveDate) -> Result<Vec<NominalProductionRecord>, String> {
        Ok(self
            .nominal
            .values()
            .filter(|r| r.home_id == home_id && r.date >= since)
            .cloned()
            .collect())
    }

    fn append_raw_detections(&mut self, rows: &[RawDetectionRecord]) -> Result<usize, String> {
        self.check_writable()?;
        Ok(insert_new(&mut self.raw_detections, rows, |r| (r.home_id, r.date)))
    }

    fn raw_detections_since(&mut self, since: NaiveDate) -> Result<Vec<RawDetectionRecord>, String> {
        let mut rows: Vec<RawDetectionRecord> = self.raw_detections.values().filter(|r| r.date >= since).cloned().collect();
        rows.sort_by_key(|r| (r.date, r.home_id));
        Ok(rows)
    }

    fn append_detections(&mut self, rows: &[DetectionRecord]) -> Result<usize, String> {
        self.check_writable()?;
        Ok(insert_new(&mut self.detections, rows, |r| (r.home_id, r.date)))
    }

    fn detections_since(&mut self, since: NaiveDate) -> Result<Vec<DetectionRecord>, String> {
        let mut rows: Vec<DetectionRecord> = self.detections.values().filter(|r| r.date >= since).cloned().collect();
        rows.sort_by_key(|r| (r.date, r.home_id));
        Ok(rows)
    }
}

#[derive(Debug, Default)]
pub struct MemorySource {
    pub homeowners: Vec<Homeowner>,
    pub history: Vec<ProductionRecord>,
    pub noise_floor: f64,
    /// Number of production queries served, for asserting fetch strategy.
    pub queries: usize,
}

impl ProductionSource for MemorySource {
    fn home_locations(&mut self) -> Result<Vec<HomeLocation>, String> {
        Ok(self
            .homeowners
            .iter()
            .filter_map(|o| {
                Some(HomeLocation {
                    home_id: o.id,
                    latitude: o.lat?,
                    longitude: o.lng?,
                })
            })
            .collect())
    }

    fn production_on(&mut self, day: NaiveDate) -> Result<Vec<ProductionRecord>, String> {
        self.production_between(day, day)
    }

    fn production_between(&mut self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ProductionRecord>, String> {
        self.queries += 1;
        let mut rows: Vec<ProductionRecord> = self
            .history
            .iter()
            .filter(|r| r.date >= start && r.date <= end && r.total_production > self.noise_floor)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.date, r.home_id));
        Ok(rows)
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    pub delivered: BTreeMap<(i64, NaiveDate), DetectionRecord>,
}

impl Watermarked for MemorySink {
    fn max_date(&mut self, dataset: Dataset) -> Result<Option<NaiveDate>, String> {
        match dataset {
            Dataset::DeliveredDetections => Ok(latest(&self.delivered)),
            other => Err(format!("{} is not held by the analytics store", other.table_name())),
        }
    }
}

impl DetectionSink for MemorySink {
    fn append_detections(&mut self, rows: &[DetectionRecord]) -> Result<usize, String> {
        Ok(insert_new(&mut self.delivered, rows, |r| (r.home_id, r.date)))
    }
}
