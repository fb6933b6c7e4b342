//! One detector run: every stage in dependency order, each resuming from its
//! own watermark.

use log::info;

use crate::config::{DetectorParams, ParamsError};
use crate::cursor::IncrementalCursor;
use crate::detector::graph::NeighborGraphBuilder;
use crate::detector::muting::NeighborCorrelationFilter;
use crate::detector::nominal::NominalProductionEstimator;
use crate::services::{detections, neighbors, nominal, push, sync};
use crate::store::{DetectionSink, DetectionStore, ProductionSource};
use crate::utils::logged;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Fetch upstream history one day per query.
    pub memory_friendly: bool,
    pub show_progress: bool,
}

/// Rows written by each stage during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub home_locations: usize,
    pub production_rows: usize,
    pub neighbor_edges: usize,
    pub nominal_rows: usize,
    pub raw_detections: usize,
    pub detections: usize,
    pub delivered: usize,
}

#[derive(Debug, Clone)]
pub struct DetectionPipeline {
    estimator: NominalProductionEstimator,
    graph: NeighborGraphBuilder,
    filter: NeighborCorrelationFilter,
    detection_ratio: f64,
    lag_days: i32,
}

impl DetectionPipeline {
    pub fn new(params: &DetectorParams) -> Result<Self, ParamsError> {
        params.validate()?;
        let lag_days = i32::try_from(params.lag_days).map_err(|_| ParamsError::LagDays(params.lag_days))?;
        Ok(DetectionPipeline {
            estimator: NominalProductionEstimator::new(params.smoothing_days, params.lag_days)?,
            graph: NeighborGraphBuilder::new(params.min_neighbor_miles, params.max_neighbor_miles, params.max_neighbors),
            filter: NeighborCorrelationFilter::new(params.neighbor_radius_miles, params.neighbor_count_thresh),
            detection_ratio: params.detection_ratio,
            lag_days,
        })
    }

    pub fn run<S, U, K>(
        &self,
        store: &mut S,
        source: &mut U,
        sink: &mut K,
        cursor: &IncrementalCursor,
        options: RunOptions,
    ) -> Result<PipelineSummary, String>
    where
        S: DetectionStore,
        U: ProductionSource,
        K: DetectionSink,
    {
        info!(
            "Pipeline: run through {} (default start {}, memory_friendly={})",
            cursor.yesterday(),
            cursor.default_start(),
            options.memory_friendly
        );

        let home_locations = logged("sync_home_locations", || sync::sync_home_locations(source, store))?;
        let production_rows = logged("sync_prod_history", || {
            sync::sync_prod_history(source, store, cursor, options.memory_friendly, options.show_progress)
        })?;
        let neighbor_edges = logged("update_neighbors", || neighbors::update_neighbors(store, &self.graph))?;
        let nominal_rows = logged("update_nominal_prod", || {
            nominal::update_all(store, &self.estimator, cursor, options.show_progress)
        })?;
        let raw_detections = logged("compute_raw_detections", || {
            detections::compute_raw_detections(store, self.detection_ratio, self.lag_days, cursor, options.show_progress)
        })?;
        let detections = logged("compute_detections", || {
            detections::compute_detections(store, &self.filter, cursor)
        })?;
        let delivered = logged("push_detections", || push::push_detections(store, sink, cursor))?;

        let summary = PipelineSummary {
            home_locations,
            production_rows,
            neighbor_edges,
            nominal_rows,
            raw_detections,
            detections,
            delivered,
        };
        info!("Pipeline: {:?}", summary);
        Ok(summary)
    }
}
