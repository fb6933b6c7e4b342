use log::info;

use crate::detector::graph::NeighborGraphBuilder;
use crate::store::DetectionStore;

/// Rebuild the `neighbors` table from the local home-location snapshot.
pub fn update_neighbors<S: DetectionStore>(store: &mut S, builder: &NeighborGraphBuilder) -> Result<usize, String> {
    let homes = store.home_locations()?;
    let edges = builder.build(&homes);
    let written = store.replace_neighbors(&edges)?;
    info!(
        "Neighbors: {} edge(s) across {} home(s) (band {}..={} mi, max {} per home)",
        written,
        homes.len(),
        builder.min_miles,
        builder.max_miles,
        builder.max_neighbors
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{HomeLocation, NeighborEdge};
    use crate::store::memory::MemoryStore;

    #[test]
    fn rebuild_replaces_previous_edges() {
        let mut store = MemoryStore {
            home_locations: vec![
                HomeLocation {
                    home_id: 1,
                    latitude: 39.70,
                    longitude: -105.00,
                },
                HomeLocation {
                    home_id: 2,
                    latitude: 39.72,
                    longitude: -105.00,
                },
            ],
            neighbors: vec![NeighborEdge {
                home_id_a: 8,
                home_id_b: 9,
                distance_miles: 1.0,
            }],
            ..MemoryStore::default()
        };

        let written = update_neighbors(&mut store, &NeighborGraphBuilder::new(0.125, 50.0, 100)).unwrap();
        assert_eq!(written, 2);
        assert!(store.neighbors.iter().all(|e| e.home_id_a != 8));
    }
}
