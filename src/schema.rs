//! Diesel table declarations for the three databases the detector touches.
//!
//! Local working store: `home_locations`, `prod_history`, `neighbors`,
//! `nominal_production`, `raw_detections`, `detections`.
//! Analytics store: `delivered_detections`.
//! Upstream source (read-only outside development): `homeowners`, `history_report`.

diesel::table! {
    home_locations (home_id) {
        home_id -> BigInt,
        latitude -> Double,
        longitude -> Double,
    }
}

diesel::table! {
    prod_history (home_id, date) {
        home_id -> BigInt,
        date -> Date,
        total_production -> Double,
    }
}

diesel::table! {
    neighbors (home_id_a, home_id_b) {
        home_id_a -> BigInt,
        home_id_b -> BigInt,
        distance_miles -> Double,
    }
}

diesel::table! {
    nominal_production (home_id, date) {
        home_id -> BigInt,
        date -> Date,
        total_production -> Double,
        nominal_prod -> Double,
        baseline_nominal_prod -> Double,
    }
}

diesel::table! {
    raw_detections (home_id, date) {
        home_id -> BigInt,
        date -> Date,
        total_production -> Double,
        nominal_prod -> Double,
        baseline_nominal_prod -> Double,
        lag_days -> Integer,
        detection_ratio -> Double,
    }
}

diesel::table! {
    detections (home_id, date) {
        home_id -> BigInt,
        date -> Date,
        total_production -> Double,
        nominal_prod -> Double,
        baseline_nominal_prod -> Double,
        lag_days -> Integer,
        detection_ratio -> Double,
    }
}

// Lives in the analytics database
diesel::table! {
    delivered_detections (home_id, date) {
        home_id -> BigInt,
        date -> Date,
        total_production -> Double,
        nominal_prod -> Double,
        baseline_nominal_prod -> Double,
        lag_days -> Integer,
        detection_ratio -> Double,
    }
}

// Upstream telemetry; owned by the source system
diesel::table! {
    homeowners (id) {
        id -> BigInt,
        lat -> Nullable<Double>,
        lng -> Nullable<Double>,
    }
}

diesel::table! {
    history_report (homeowner_id, date) {
        homeowner_id -> BigInt,
        date -> Date,
        total_production -> Double,
    }
}
