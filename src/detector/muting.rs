//! Neighbor correlation: a drop shared by many nearby homes on the same day
//! points at weather or the grid, not at the home itself.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::db::models::{DetectionRecord, NeighborEdge, RawDetectionRecord};

/// For every observed `(home_id, date)`, how many of the home's neighbors
/// within `max_distance_miles` were observed on the same date.
///
/// Every observation gets an entry, zero when it has no neighbors or none of
/// them were observed.
pub fn count_flagged_neighbors(
    observations: &[(i64, NaiveDate)],
    edges: &[NeighborEdge],
    max_distance_miles: f64,
) -> HashMap<(i64, NaiveDate), usize> {
    let mut adjacency: HashMap<i64, Vec<i64>> = HashMap::new();
    for edge in edges.iter().filter(|e| e.distance_miles <= max_distance_miles) {
        adjacency.entry(edge.home_id_a).or_default().push(edge.home_id_b);
    }

    let observed: HashSet<(i64, NaiveDate)> = observations.iter().copied().collect();
    observed
        .iter()
        .map(|&(home_id, date)| {
            let count = adjacency
                .get(&home_id)
                .map(|near| near.iter().filter(|b| observed.contains(&(**b, date))).count())
                .unwrap_or(0);
            ((home_id, date), count)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct NeighborCorrelationFilter {
    pub max_distance_miles: f64,
    pub neighbor_count_thresh: usize,
}

impl NeighborCorrelationFilter {
    pub fn new(max_distance_miles: f64, neighbor_count_thresh: usize) -> Self {
        NeighborCorrelationFilter {
            max_distance_miles,
            neighbor_count_thresh,
        }
    }

    /// Raw detections dated `since` or later that are not muted.
    ///
    /// `raw` is the observation set: a detection is muted when at least
    /// `neighbor_count_thresh` of its neighbors also appear in `raw` on the
    /// same day.
    pub fn filter(&self, raw: &[RawDetectionRecord], edges: &[NeighborEdge], since: NaiveDate) -> Vec<DetectionRecord> {
        let observations: Vec<(i64, NaiveDate)> = raw.iter().map(|r| (r.home_id, r.date)).collect();
        let counts = count_flagged_neighbors(&observations, edges, self.max_distance_miles);

        raw.iter()
            .filter(|r| r.date >= since)
            .filter(|r| counts.get(&(r.home_id, r.date)).copied().unwrap_or(0) < self.neighbor_count_thresh)
            .cloned()
            .map(DetectionRecord::from)
            .collect()
    }
}
