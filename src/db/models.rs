//! Diesel row types. These double as the domain records passed between the
//! detector stages, so the pure algorithms and the store adapters share one
//! vocabulary.

use chrono::NaiveDate;
use diesel::prelude::*;

use crate::schema;

/// One day of production for one home.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::prod_history)]
pub struct ProductionRecord {
    pub home_id: i64,
    pub date: NaiveDate,
    pub total_production: f64,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::home_locations)]
pub struct HomeLocation {
    pub home_id: i64,
    pub latitude: f64,
    pub longitude: f64,
}

/// Directed proximity edge `home_id_a -> home_id_b`.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::neighbors)]
pub struct NeighborEdge {
    pub home_id_a: i64,
    pub home_id_b: i64,
    pub distance_miles: f64,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::nominal_production)]
pub struct NominalProductionRecord {
    pub home_id: i64,
    pub date: NaiveDate,
    pub total_production: f64,
    pub nominal_prod: f64,
    /// `nominal_prod` from `lag_days` earlier.
    pub baseline_nominal_prod: f64,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::raw_detections)]
pub struct RawDetectionRecord {
    pub home_id: i64,
    pub date: NaiveDate,
    pub total_production: f64,
    pub nominal_prod: f64,
    pub baseline_nominal_prod: f64,
    pub lag_days: i32,
    pub detection_ratio: f64,
}

/// A raw detection that survived neighbor muting.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::detections)]
pub struct DetectionRecord {
    pub home_id: i64,
    pub date: NaiveDate,
    pub total_production: f64,
    pub nominal_prod: f64,
    pub baseline_nominal_prod: f64,
    pub lag_days: i32,
    pub detection_ratio: f64,
}

impl From<RawDetectionRecord> for DetectionRecord {
    fn from(raw: RawDetectionRecord) -> Self {
        DetectionRecord {
            home_id: raw.home_id,
            date: raw.date,
            total_production: raw.total_production,
            nominal_prod: raw.nominal_prod,
            baseline_nominal_prod: raw.baseline_nominal_prod,
            lag_days: raw.lag_days,
            detection_ratio: raw.detection_ratio,
        }
    }
}

// Upstream: homeowners
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::homeowners)]
pub struct Homeowner {
    pub id: i64,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

// Upstream: history_report
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::history_report)]
pub struct NewHistoryReport {
    pub homeowner_id: i64,
    pub date: NaiveDate,
    pub total_production: f64,
}
