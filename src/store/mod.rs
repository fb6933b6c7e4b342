//! Collaborator seams: the local working store, the upstream telemetry source
//! and the analytics sink. Stage code only sees these traits; `pg` holds the
//! diesel adapters.

use chrono::NaiveDate;

use crate::db::models::{
    DetectionRecord, HomeLocation, NeighborEdge, NominalProductionRecord, ProductionRecord, RawDetectionRecord,
};

pub mod pg;

#[cfg(test)]
pub mod memory;

/// Tables that carry an incremental watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    ProdHistory,
    NominalProduction,
    RawDetections,
    Detections,
    /// Held by the analytics sink, not the local store.
    DeliveredDetections,
}

impl Dataset {
    pub fn table_name(&self) -> &'static str {
        match self {
            Dataset::ProdHistory => "prod_history",
            Dataset::NominalProduction => "nominal_production",
            Dataset::RawDetections => "raw_detections",
            Dataset::Detections => "detections",
            Dataset::DeliveredDetections => "delivered_detections",
        }
    }
}

pub trait Watermarked {
    /// Latest `date` present in `dataset`, `None` when it holds no rows.
    fn max_date(&mut self, dataset: Dataset) -> Result<Option<NaiveDate>, String>;
}

/// Local working tables. Appends never touch existing rows; replaces swap
/// the whole table.
pub trait DetectionStore: Watermarked {
    fn replace_home_locations(&mut self, rows: &[HomeLocation]) -> Result<usize, String>;
    fn home_locations(&mut self) -> Result<Vec<HomeLocation>, String>;

    fn replace_neighbors(&mut self, rows: &[NeighborEdge]) -> Result<usize, String>;
    fn neighbors_within(&mut self, max_distance_miles: f64) -> Result<Vec<NeighborEdge>, String>;

    fn append_production(&mut self, rows: &[ProductionRecord]) -> Result<usize, String>;
    /// Homes with production strictly after `after`, ascending.
    fn homes_with_production_after(&mut self, after: NaiveDate) -> Result<Vec<i64>, String>;
    /// One home's production on or after `since`, ascending by date.
    fn production_for_home(&mut self, home_id: i64, since: NaiveDate) -> Result<Vec<ProductionRecord>, String>;

    fn append_nominal(&mut self, rows: &[NominalProductionRecord]) -> Result<usize, String>;
    /// Homes with nominal production on or after `since`, ascending.
    fn homes_with_nominal_since(&mut self, since: NaiveDate) -> Result<Vec<i64>, String>;
    fn nominal_for_home(&mut self, home_id: i64, since: NaiveDate) -> Result<Vec<NominalProductionRecord>, String>;

    fn append_raw_detections(&mut self, rows: &[RawDetectionRecord]) -> Result<usize, String>;
    fn raw_detections_since(&mut self, since: NaiveDate) -> Result<Vec<RawDetectionRecord>, String>;

    fn append_detections(&mut self, rows: &[DetectionRecord]) -> Result<usize, String>;
    fn detections_since(&mut self, since: NaiveDate) -> Result<Vec<DetectionRecord>, String>;
}

/// Upstream telemetry. Production at or below the noise floor never comes
/// out of a source.
pub trait ProductionSource {
    /// Homes that have both coordinates.
    fn home_locations(&mut self) -> Result<Vec<HomeLocation>, String>;
    fn production_on(&mut self, day: NaiveDate) -> Result<Vec<ProductionRecord>, String>;
    /// Inclusive on both ends.
    fn production_between(&mut self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ProductionRecord>, String>;
}

/// Downstream consumer of final detections.
pub trait DetectionSink: Watermarked {
    fn append_detections(&mut self, rows: &[DetectionRecord]) -> Result<usize, String>;
}
