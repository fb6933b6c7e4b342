//! Bounded-degree proximity graph over geocoded homes.
//!
//! Distances use a flat equirectangular approximation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

use crate::db::models::{HomeLocation, NeighborEdge};

pub const EARTH_RADIUS_MILES: f64 = 3963.0;

/// Planar distance in miles between two points given in radians.
///
/// The east-west leg is scaled by the cosine of the first point's latitude.
pub fn planar_distance_miles(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let dy = EARTH_RADIUS_MILES * (lat2 - lat1);
    let dx = EARTH_RADIUS_MILES * lat1.cos() * (lng2 - lng1);
    (dx * dx + dy * dy).sqrt()
}

/// Ordered by distance, then id, so a max-heap's top is the farthest
/// neighbor kept so far.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance_miles: f64,
    home_id: i64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_miles
            .total_cmp(&other.distance_miles)
            .then(self.home_id.cmp(&other.home_id))
    }
}

/// Keep at most `cap` nearest candidates in `heap`.
fn offer(heap: &mut BinaryHeap<Candidate>, candidate: Candidate, cap: usize) {
    if heap.len() < cap {
        heap.push(candidate);
    } else if let Some(mut farthest) = heap.peek_mut() {
        if candidate < *farthest {
            *farthest = candidate;
        }
    }
}

#[derive(Debug, Clone)]
pub struct NeighborGraphBuilder {
    pub min_miles: f64,
    pub max_miles: f64,
    pub max_neighbors: usize,
}

impl NeighborGraphBuilder {
    pub fn new(min_miles: f64, max_miles: f64, max_neighbors: usize) -> Self {
        NeighborGraphBuilder {
            min_miles,
            max_miles,
            max_neighbors,
        }
    }

    /// Build every edge from scratch.
    ///
    /// Each unordered pair is measured once, from the home with the lower id,
    /// so `a -> b` and `b -> a` always carry the same distance. Pairs outside
    /// `[min_miles, max_miles]` are dropped, and each home keeps its
    /// `max_neighbors` nearest, so memory stays bounded by
    /// `homes * max_neighbors`. Output is grouped by `home_id_a` with
    /// ascending distance inside each group.
    pub fn build(&self, homes: &[HomeLocation]) -> Vec<NeighborEdge> {
        // Dedupe by id and convert to radians
        let points: Vec<(i64, f64, f64)> = homes
            .iter()
            .map(|h| (h.home_id, (h.latitude.to_radians(), h.longitude.to_radians())))
            .collect::<BTreeMap<_, _>>()
            .into_iter()
            .map(|(id, (lat, lng))| (id, lat, lng))
            .collect();

        let mut nearest: HashMap<i64, BinaryHeap<Candidate>> = HashMap::new();
        for (i, &(id1, lat1, lng1)) in points.iter().enumerate() {
            for &(id2, lat2, lng2) in &points[i + 1..] {
                let distance_miles = planar_distance_miles(lat1, lng1, lat2, lng2);
                if !(distance_miles >= self.min_miles && distance_miles <= self.max_miles) {
                    continue;
                }
                let to = |home_id| Candidate { distance_miles, home_id };
                offer(nearest.entry(id1).or_default(), to(id2), self.max_neighbors);
                offer(nearest.entry(id2).or_default(), to(id1), self.max_neighbors);
            }
        }

        let mut edges = Vec::new();
        for &(home_id_a, _, _) in &points {
            let Some(heap) = nearest.remove(&home_id_a) else {
                continue;
            };
            edges.extend(heap.into_sorted_vec().into_iter().map(|c| NeighborEdge {
                home_id_a,
                home_id_b: c.home_id,
                distance_miles: c.distance_miles,
            }));
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_LAT: f64 = 40.0;
    const BASE_LNG: f64 = -105.0;

    fn home_at(home_id: i64, north_miles: f64, east_miles: f64) -> HomeLocation {
        let lat = BASE_LAT + (north_miles / EARTH_RADIUS_MILES).to_degrees();
        let lng = BASE_LNG + (east_miles / (EARTH_RADIUS_MILES * BASE_LAT.to_radians().cos())).to_degrees();
        HomeLocation {
            home_id,
            latitude: lat,
            longitude: lng,
        }
    }

    fn builder() -> NeighborGraphBuilder {
        NeighborGraphBuilder::new(0.125, 50.0, 100)
    }

    #[test]
    fn planar_distance_matches_latitude_arc() {
        let lat1 = 40f64.to_radians();
        let lat2 = lat1 + 10.0 / EARTH_RADIUS_MILES;
        let d = planar_distance_miles(lat1, 0.0, lat2, 0.0);
        assert!((d - 10.0).abs() < 1e-9);
    }

    #[test]
    fn keeps_only_pairs_inside_the_distance_band() {
        let homes = vec![
            home_at(1, 0.0, 0.0),
            home_at(2, 1.0, 0.0),
            home_at(3, 0.05, 0.0),
            home_at(4, 60.0, 0.0),
        ];
        let edges = builder().build(&homes);
        let pairs: Vec<(i64, i64)> = edges.iter().map(|e| (e.home_id_a, e.home_id_b)).collect();
        assert!(pairs.contains(&(1, 2)));
        assert!(pairs.contains(&(2, 1)));
        assert!(!pairs.iter().any(|&(a, b)| (a, b) == (1, 3) || (a, b) == (3, 1)));
        assert!(!pairs.iter().any(|&(a, b)| a == 4 || b == 4));
        for e in &edges {
            assert!(e.distance_miles >= 0.125 && e.distance_miles <= 50.0);
            assert_ne!(e.home_id_a, e.home_id_b);
        }
    }

    #[test]
    fn caps_neighbors_per_home_nearest_first() {
        let homes: Vec<HomeLocation> = (0..8).map(|i| home_at(i, 0.0, i as f64 * 2.0)).collect();
        let edges = NeighborGraphBuilder::new(0.125, 50.0, 3).build(&homes);

        for id in 0..8 {
            let own: Vec<&NeighborEdge> = edges.iter().filter(|e| e.home_id_a == id).collect();
            assert_eq!(own.len(), 3);
            for pair in own.windows(2) {
                assert!(pair[0].distance_miles <= pair[1].distance_miles);
            }
        }
        let from_zero: Vec<i64> = edges.iter().filter(|e| e.home_id_a == 0).map(|e| e.home_id_b).collect();
        assert_eq!(from_zero, vec![1, 2, 3]);
    }

    #[test]
    fn reverse_edges_carry_identical_distance() {
        let homes: Vec<HomeLocation> = (0..30)
            .map(|i| home_at(i, ((i * 7) % 13) as f64 * 1.7, ((i * 5) % 11) as f64 * 2.3))
            .collect();
        let edges = builder().build(&homes);
        let by_pair: HashMap<(i64, i64), f64> = edges
            .iter()
            .map(|e| ((e.home_id_a, e.home_id_b), e.distance_miles))
            .collect();
        assert!(!by_pair.is_empty());
        for (&(a, b), &d) in &by_pair {
            if let Some(&back) = by_pair.get(&(b, a)) {
                assert_eq!(d, back);
            }
        }
    }

    #[test]
    fn lone_home_has_no_edges() {
        assert!(builder().build(&[home_at(1, 0.0, 0.0)]).is_empty());
        assert!(builder().build(&[]).is_empty());
    }

    #[test]
    fn bounded_selection_matches_full_ranking() {
        let homes: Vec<HomeLocation> = (0..49).map(|i| home_at(i, (i / 7) as f64 * 1.5, (i % 7) as f64 * 1.5)).collect();
        let edges = NeighborGraphBuilder::new(0.125, 50.0, 5).build(&homes);

        for a in &homes {
            let mut all: Vec<(f64, i64)> = homes
                .iter()
                .filter(|b| b.home_id != a.home_id)
                .map(|b| {
                    let (lo, hi) = if a.home_id < b.home_id { (a, b) } else { (b, a) };
                    let d = planar_distance_miles(
                        lo.latitude.to_radians(),
                        lo.longitude.to_radians(),
                        hi.latitude.to_radians(),
                        hi.longitude.to_radians(),
                    );
                    (d, b.home_id)
                })
                .collect();
            all.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));
            let expected: Vec<i64> = all.iter().take(5).map(|(_, id)| *id).collect();
            let kept: Vec<i64> = edges
                .iter()
                .filter(|e| e.home_id_a == a.home_id)
                .map(|e| e.home_id_b)
                .collect();
            assert_eq!(kept, expected, "home {}", a.home_id);
        }
    }
}
