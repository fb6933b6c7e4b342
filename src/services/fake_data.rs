use crate::db::models::{Homeowner, NewHistoryReport};
use crate::detector::graph::planar_distance_miles;
use crate::schema;
use chrono::{Datelike, Duration, Local, NaiveDate};
use diesel::PgConnection;
use diesel::dsl::max;
use diesel::prelude::*;
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

const SEED: u64 = 0x50_1A_2D_E7_EC_70_u64;
const CENTER: (f64, f64) = (39.7392, -104.9903);
const CLUSTER_HOMES: i64 = 54;
// Remote homes sit far from the cluster and from each other.
const REMOTE_HOMES: [(f64, f64); 6] = [
    (33.4484, -112.0740),
    (35.0844, -106.6504),
    (40.7608, -111.8910),
    (41.1400, -104.8202),
    (38.2544, -104.6091),
    (36.1699, -115.1398),
];
const HISTORY_DAYS: i64 = 2 * 365;
const INSERT_CHUNK_ROWS: usize = 5_000;
const FAULT_PERIOD_DAYS: i64 = 180;
const FAULT_LENGTH_DAYS: i64 = 45;
const STORM_WEEK_PROBABILITY: f64 = 0.05;

pub fn run(conn: &mut PgConnection) -> Result<(), String> {
    let homes = fleet();
    let upserted = ensure_homeowners(conn, &homes)?;

    let yesterday = Local::now().date_naive() - Duration::days(1);
    let latest = latest_report_date(conn)?;
    let start = match latest {
        Some(day) => day + Duration::days(1),
        None => yesterday - Duration::days(HISTORY_DAYS - 1),
    };
    if start > yesterday {
        info!("Fake data: history_report already covers {}", yesterday);
        return Ok(());
    }

    info!(
        "Fake data: generating production for {} home(s) from {} to {} ({} new homeowner row(s))",
        homes.len(),
        start,
        yesterday,
        upserted
    );

    let mut batch: Vec<NewHistoryReport> = Vec::with_capacity(INSERT_CHUNK_ROWS + homes.len());
    let mut inserted = 0;
    let mut day = start;
    let mut last_logged_month: Option<(i32, u32)> = None;
    while day <= yesterday {
        let month_key = (day.year(), day.month());
        if last_logged_month != Some(month_key) {
            info!(
                "Fake data: processing {:04}-{:02} (≈{} day(s) remaining)",
                month_key.0,
                month_key.1,
                (yesterday - day).num_days()
            );
            last_logged_month = Some(month_key);
        }

        batch.extend(reports_for_day(&homes, day));
        if batch.len() >= INSERT_CHUNK_ROWS {
            inserted += flush(conn, &mut batch)?;
        }
        day += Duration::days(1);
    }
    inserted += flush(conn, &mut batch)?;

    info!("Fake data: complete ({} history_report row(s) inserted)", inserted);
    Ok(())
}

fn ensure_homeowners(conn: &mut PgConnection, homes: &[Homeowner]) -> Result<usize, String> {
    use schema::homeowners::dsl as O;

    diesel::insert_into(O::homeowners)
        .values(homes)
        .on_conflict(O::id)
        .do_nothing()
        .execute(conn)
        .map_err(|e| format!("insert homeowners failed: {}", e))
}

fn latest_report_date(conn: &mut PgConnection) -> Result<Option<NaiveDate>, String> {
    use schema::history_report::dsl as R;

    R::history_report
        .select(max(R::date))
        .first(conn)
        .map_err(|e| format!("query max(history_report.date) failed: {}", e))
}

fn flush(conn: &mut PgConnection, batch: &mut Vec<NewHistoryReport>) -> Result<usize, String> {
    use schema::history_report::dsl as R;

    if batch.is_empty() {
        return Ok(0);
    }
    let inserted = diesel::insert_into(R::history_report)
        .values(batch.as_slice())
        .on_conflict((R::homeowner_id, R::date))
        .do_nothing()
        .execute(conn)
        .map_err(|e| format!("insert history_report rows failed: {}", e))?;
    batch.clear();
    Ok(inserted)
}

/// The synthetic fleet: a dense cluster around `CENTER` plus a few isolated
/// homes. Home 7 has no coordinates.
pub fn fleet() -> Vec<Homeowner> {
    let mut rng = SmallRng::seed_from_u64(SEED);
    let mut homes = Vec::with_capacity(CLUSTER_HOMES as usize + REMOTE_HOMES.len());
    for id in 1..=CLUSTER_HOMES {
        // within ~15 miles of the centre
        let lat = CENTER.0 + rng.random_range(-0.2..=0.2);
        let lng = CENTER.1 + rng.random_range(-0.25..=0.25);
        let located = id != 7;
        homes.push(Homeowner {
            id,
            lat: located.then_some(lat),
            lng: located.then_some(lng),
        });
    }
    for (offset, (lat, lng)) in REMOTE_HOMES.iter().enumerate() {
        homes.push(Homeowner {
            id: CLUSTER_HOMES + 1 + offset as i64,
            lat: Some(*lat),
            lng: Some(*lng),
        });
    }
    homes
}

/// Typical clear-sky daily output for a home, in kWh. Always well above the
/// upstream noise floor, even in midwinter.
fn capacity(home_id: i64) -> f64 {
    60.0 + (home_id % 10) as f64 * 10.0
}

/// Every eleventh home breaks for `FAULT_LENGTH_DAYS` out of every
/// `FAULT_PERIOD_DAYS`, each on its own phase.
pub fn is_faulty(home_id: i64, day: NaiveDate) -> bool {
    if home_id % 11 != 0 {
        return false;
    }
    let phase = (home_id * 37).rem_euclid(FAULT_PERIOD_DAYS);
    (day.num_days_from_ce() as i64 + phase).rem_euclid(FAULT_PERIOD_DAYS) < FAULT_LENGTH_DAYS
}

/// Multi-day overcast covering the whole cluster, drawn per calendar week.
pub fn is_storm_week(day: NaiveDate) -> bool {
    let week = day.num_days_from_ce() as u64 / 7;
    let mut rng = SmallRng::seed_from_u64(SEED ^ week.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    rng.random_bool(STORM_WEEK_PROBABILITY)
}

fn seasonal_factor(day: NaiveDate) -> f64 {
    let from_solstice = (day.ordinal0() as f64 - 171.0) / 365.25;
    0.65 + 0.35 * (2.0 * PI * from_solstice).cos()
}

fn in_cluster(home: &Homeowner) -> bool {
    match (home.lat, home.lng) {
        (Some(lat), Some(lng)) => {
            planar_distance_miles(
                lat.to_radians(),
                lng.to_radians(),
                CENTER.0.to_radians(),
                CENTER.1.to_radians(),
            ) <= 50.0
        }
        _ => true,
    }
}

/// One day of upstream reports for the whole fleet. Deterministic per date.
pub fn reports_for_day(homes: &[Homeowner], day: NaiveDate) -> Vec<NewHistoryReport> {
    let mut rng = SmallRng::seed_from_u64(SEED ^ day.num_days_from_ce() as u64);
    let storm = is_storm_week(day);
    let season = seasonal_factor(day);

    homes
        .iter()
        .map(|home| {
            let mut weather = rng.random_range(0.75..=1.0);
            if storm && in_cluster(home) {
                weather *= rng.random_range(0.15..=0.35);
            }
            let fault = if is_faulty(home.id, day) { 0.3 } else { 1.0 };
            NewHistoryReport {
                homeowner_id: home.id,
                date: day,
                total_production: capacity(home.id) * season * weather * fault,
            }
        })
        .collect()
}
