//! Diesel/Postgres adapters for the store traits.

use chrono::NaiveDate;
use diesel::PgConnection;
use diesel::dsl::max;
use diesel::prelude::*;

use crate::db::models::{
    DetectionRecord, HomeLocation, Homeowner, NeighborEdge, NominalProductionRecord, ProductionRecord,
    RawDetectionRecord,
};
use crate::schema;
use crate::store::{Dataset, DetectionSink, DetectionStore, ProductionSource, Watermarked};

// Postgres caps a statement at 65535 bind parameters
const INSERT_CHUNK_ROWS: usize = 5_000;

/// Local working store.
pub struct PgStore {
    conn: PgConnection,
}

impl PgStore {
    pub fn new(conn: PgConnection) -> Self {
        PgStore { conn }
    }
}

impl Watermarked for PgStore {
    fn max_date(&mut self, dataset: Dataset) -> Result<Option<NaiveDate>, String> {
        let conn = &mut self.conn;
        let latest: QueryResult<Option<NaiveDate>> = match dataset {
            Dataset::ProdHistory => {
                use schema::prod_history::dsl as P;
                P::prod_history.select(max(P::date)).first(conn)
            }
            Dataset::NominalProduction => {
                use schema::nominal_production::dsl as N;
                N::nominal_production.select(max(N::date)).first(conn)
            }
            Dataset::RawDetections => {
                use schema::raw_detections::dsl as R;
                R::raw_detections.select(max(R::date)).first(conn)
            }
            Dataset::Detections => {
                use schema::detections::dsl as D;
                D::detections.select(max(D::date)).first(conn)
            }
            Dataset::DeliveredDetections => {
                return Err(format!("{} is not held by the local store", dataset.table_name()));
            }
        };
        latest.map_err(|e| format!("query max({}.date) failed: {}", dataset.table_name(), e))
    }
}

impl DetectionStore for PgStore {
    fn replace_home_locations(&mut self, rows: &[HomeLocation]) -> Result<usize, String> {
        use schema::home_locations::dsl as H;

        self.conn
            .transaction::<usize, diesel::result::Error, _>(|conn| {
                diesel::delete(H::home_locations).execute(conn)?;
                let mut inserted = 0;
                for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
                    inserted += diesel::insert_into(H::home_locations).values(chunk).execute(conn)?;
                }
                Ok(inserted)
            })
            .map_err(|e| format!("replace home_locations failed: {}", e))
    }

    fn home_locations(&mut self) -> Result<Vec<HomeLocation>, String> {
        use schema::home_locations::dsl as H;

        H::home_locations
            .order(H::home_id.asc())
            .select(HomeLocation::as_select())
            .load(&mut self.conn)
            .map_err(|e| format!("query home_locations failed: {}", e))
    }

    fn replace_neighbors(&mut self, rows: &[NeighborEdge]) -> Result<usize, String> {
        use schema::neighbors::dsl as N;

        self.conn
            .transaction::<usize, diesel::result::Error, _>(|conn| {
                diesel::delete(N::neighbors).execute(conn)?;
                let mut inserted = 0;
                for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
                    inserted += diesel::insert_into(N::neighbors).values(chunk).execute(conn)?;
                }
                Ok(inserted)
            })
            .map_err(|e| format!("replace neighbors failed: {}", e))
    }

    fn neighbors_within(&mut self, max_distance_miles: f64) -> Result<Vec<NeighborEdge>, String> {
        use schema::neighbors::dsl as N;

        N::neighbors
            .filter(N::distance_miles.le(max_distance_miles))
            .select(NeighborEdge::as_select())
            .load(&mut self.conn)
            .map_err(|e| format!("query neighbors failed: {}", e))
    }

    fn append_production(&mut self, rows: &[ProductionRecord]) -> Result<usize, String> {
        use schema::prod_history::dsl as P;

        let mut inserted = 0;
        for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
            inserted += diesel::insert_into(P::prod_history)
                .values(chunk)
                .on_conflict((P::home_id, P::date))
                .do_nothing()
                .execute(&mut self.conn)
                .map_err(|e| format!("insert prod_history rows failed: {}", e))?;
        }
        Ok(inserted)
    }

    fn homes_with_production_after(&mut self, after: NaiveDate) -> Result<Vec<i64>, String> {
        use schema::prod_history::dsl as P;

        P::prod_history
            .filter(P::date.gt(after))
            .select(P::home_id)
            .distinct()
            .order(P::home_id.asc())
            .load(&mut self.conn)
            .map_err(|e| format!("query producing homes failed: {}", e))
    }

    fn production_for_home(&mut self, home_id: i64, since: NaiveDate) -> Result<Vec<ProductionRecord>, String> {
        use schema::prod_history::dsl as P;

        P::prod_history
            .filter(P::home_id.eq(home_id).and(P::date.ge(since)))
            .order(P::date.asc())
            .select(ProductionRecord::as_select())
            .load(&mut self.conn)
            .map_err(|e| format!("query production for home {} failed: {}", home_id, e))
    }

    fn append_nominal(&mut self, rows: &[NominalProductionRecord]) -> Result<usize, String> {
        use schema::nominal_production::dsl as N;

        let mut inserted = 0;
        for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
            inserted += diesel::insert_into(N::nominal_production)
                .values(chunk)
                .on_conflict((N::home_id, N::date))
                .do_nothing()
                .execute(&mut self.conn)
                .map_err(|e| format!("insert nominal_production rows failed: {}", e))?;
        }
        Ok(inserted)
    }

    fn homes_with_nominal_since(&mut self, since: NaiveDate) -> Result<Vec<i64>, String> {
        use schema::nominal_production::dsl as N;

        N::nominal_production
            .filter(N::date.ge(since))
            .select(N::home_id)
            .distinct()
            .order(N::home_id.asc())
            .load(&mut self.conn)
            .map_err(|e| format!("query homes with nominal production failed: {}", e))
    }

    fn nominal_for_home(&mut self, home_id: i64, since: NaiveDate) -> Result<Vec<NominalProductionRecord>, String> {
        use schema::nominal_production::dsl as N;

        N::nominal_production
            .filter(N::home_id.eq(home_id).and(N::date.ge(since)))
            .order(N::date.asc())
            .select(NominalProductionRecord::as_select())
            .load(&mut self.conn)
            .map_err(|e| format!("query nominal production for home {} failed: {}", home_id, e))
    }

    fn append_raw_detections(&mut self, rows: &[RawDetectionRecord]) -> Result<usize, String> {
        use schema::raw_detections::dsl as R;

        let mut inserted = 0;
        for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
            inserted += diesel::insert_into(R::raw_detections)
                .values(chunk)
                .on_conflict((R::home_id, R::date))
                .do_nothing()
                .execute(&mut self.conn)
                .map_err(|e| format!("insert raw_detections rows failed: {}", e))?;
        }
        Ok(inserted)
    }

    fn raw_detections_since(&mut self, since: NaiveDate) -> Result<Vec<RawDetectionRecord>, String> {
        use schema::raw_detections::dsl as R;

        R::raw_detections
            .filter(R::date.ge(since))
            .order((R::date.asc(), R::home_id.asc()))
            .select(RawDetectionRecord::as_select())
            .load(&mut self.conn)
            .map_err(|e| format!("query raw_detections failed: {}", e))
    }

    fn append_detections(&mut self, rows: &[DetectionRecord]) -> Result<usize, String> {
        use schema::detections::dsl as D;

        let mut inserted = 0;
        for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
            inserted += diesel::insert_into(D::detections)
                .values(chunk)
                .on_conflict((D::home_id, D::date))
                .do_nothing()
                .execute(&mut self.conn)
                .map_err(|e| format!("insert detections rows failed: {}", e))?;
        }
        Ok(inserted)
    }

    fn detections_since(&mut self, since: NaiveDate) -> Result<Vec<DetectionRecord>, String> {
        use schema::detections::dsl as D;

        D::detections
            .filter(D::date.ge(since))
            .order((D::date.asc(), D::home_id.asc()))
            .select(DetectionRecord::as_select())
            .load(&mut self.conn)
            .map_err(|e| format!("query detections failed: {}", e))
    }
}

/// Upstream telemetry tables (`homeowners`, `history_report`).
pub struct PgSource {
    conn: PgConnection,
    noise_floor: f64,
}

impl PgSource {
    pub fn new(conn: PgConnection, noise_floor: f64) -> Self {
        PgSource { conn, noise_floor }
    }
}

impl ProductionSource for PgSource {
    fn home_locations(&mut self) -> Result<Vec<HomeLocation>, String> {
        use schema::homeowners::dsl as O;

        let owners: Vec<Homeowner> = O::homeowners
            .filter(O::lat.is_not_null().and(O::lng.is_not_null()))
            .order(O::id.asc())
            .select(Homeowner::as_select())
            .load(&mut self.conn)
            .map_err(|e| format!("query homeowners failed: {}", e))?;

        Ok(owners
            .into_iter()
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
        use schema::history_report::dsl as HR;

        HR::history_report
            .filter(HR::date.eq(day).and(HR::total_production.gt(self.noise_floor)))
            .order(HR::homeowner_id.asc())
            .select((HR::homeowner_id, HR::date, HR::total_production))
            .load::<ProductionRecord>(&mut self.conn)
            .map_err(|e| format!("query history_report for {} failed: {}", day, e))
    }

    fn production_between(&mut self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ProductionRecord>, String> {
        use schema::history_report::dsl as HR;

        HR::history_report
            .filter(
                HR::date
                    .between(start, end)
                    .and(HR::total_production.gt(self.noise_floor)),
            )
            .order((HR::date.asc(), HR::homeowner_id.asc()))
            .select((HR::homeowner_id, HR::date, HR::total_production))
            .load::<ProductionRecord>(&mut self.conn)
            .map_err(|e| format!("query history_report {}..={} failed: {}", start, end, e))
    }
}

/// Analytics destination (`delivered_detections`).
pub struct PgSink {
    conn: PgConnection,
}

impl PgSink {
    pub fn new(conn: PgConnection) -> Self {
        PgSink { conn }
    }
}

impl Watermarked for PgSink {
    fn max_date(&mut self, dataset: Dataset) -> Result<Option<NaiveDate>, String> {
        use schema::delivered_detections::dsl as D;

        if dataset != Dataset::DeliveredDetections {
            return Err(format!("{} is not held by the analytics store", dataset.table_name()));
        }
        D::delivered_detections
            .select(max(D::date))
            .first(&mut self.conn)
            .map_err(|e| format!("query max(delivered_detections.date) failed: {}", e))
    }
}

impl DetectionSink for PgSink {
    fn append_detections(&mut self, rows: &[DetectionRecord]) -> Result<usize, String> {
        use schema::delivered_detections::dsl as D;

        let mut inserted = 0;
        for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
            let values: Vec<_> = chunk
                .iter()
                .map(|r| {
                    (
                        D::home_id.eq(r.home_id),
                        D::date.eq(r.date),
                        D::total_production.eq(r.total_production),
                        D::nominal_prod.eq(r.nominal_prod),
                        D::baseline_nominal_prod.eq(r.baseline_nominal_prod),
                        D::lag_days.eq(r.lag_days),
                        D::detection_ratio.eq(r.detection_ratio),
                    )
                })
                .collect();
            inserted += diesel::insert_into(D::delivered_detections)
                .values(values)
                .on_conflict((D::home_id, D::date))
                .do_nothing()
                .execute(&mut self.conn)
                .map_err(|e| format!("insert delivered_detections rows failed: {}", e))?;
        }
        Ok(inserted)
    }
}
