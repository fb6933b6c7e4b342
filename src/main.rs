pub mod config;
pub mod cursor;
pub mod db {
    pub mod models;
}
pub mod detector;
pub mod env_file;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod utils;
pub mod services {
    pub mod detections;
    pub mod fake_data;
    pub mod neighbors;
    pub mod nominal;
    pub mod push;
    pub mod sync;
}

use crate::config::Config;
use crate::cursor::IncrementalCursor;
use crate::pipeline::{DetectionPipeline, RunOptions};
use crate::services::fake_data;
use crate::store::pg::{PgSink, PgSource, PgStore};
use diesel::PgConnection;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::{error, info};
use std::ffi::OsString;
use std::path::PathBuf;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/local");
pub const ANALYTICS_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/analytics");
pub const SOURCE_DEV_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/source_dev");

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    env_file: Option<PathBuf>,
    /// `Some` when `--ram-friendly` or `--ram-hostile` was given.
    memory_friendly: Option<bool>,
    show_progress: bool,
}

fn parse_args(args: impl IntoIterator<Item = OsString>) -> Result<CliArgs, String> {
    let mut cli = CliArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let arg = arg
            .into_string()
            .map_err(|_| "argument contains invalid UTF-8".to_string())?;
        let env_path = match arg.as_str() {
            "--env-file" => Some(
                args.next()
                    .map(PathBuf::from)
                    .ok_or_else(|| "`--env-file` requires a path argument".to_string())?,
            ),
            s if s.starts_with("--env-file=") => match &s["--env-file=".len()..] {
                "" => return Err("`--env-file` requires a path argument".to_string()),
                p => Some(PathBuf::from(p)),
            },
            "--ram-friendly" | "--ram-hostile" => {
                if cli.memory_friendly.is_some() {
                    return Err("only one of `--ram-friendly` / `--ram-hostile` may be given".to_string());
                }
                cli.memory_friendly = Some(arg == "--ram-friendly");
                None
            }
            "--progress" => {
                cli.show_progress = true;
                None
            }
            other => return Err(format!("unrecognised argument: {}", other)),
        };

        if let Some(path) = env_path {
            if cli.env_file.is_some() {
                return Err("`--env-file` provided more than once".to_string());
            }
            cli.env_file = Some(path);
        }
    }
    Ok(cli)
}

/// Load the env file named on the command line, or `./.env` when present.
/// Returns the path that was loaded and whether it was given explicitly.
fn load_env(cli: &CliArgs) -> Result<Option<(PathBuf, bool)>, String> {
    if let Some(path) = &cli.env_file {
        if !path.is_file() {
            return Err(format!("env file not found: {}", path.display()));
        }
        env_file::load(path)?;
        return Ok(Some((path.clone(), true)));
    }

    let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
    let default_path = cwd.join(".env");
    if !default_path.is_file() {
        return Ok(None);
    }
    env_file::load(&default_path)?;
    Ok(Some((default_path, false)))
}

fn connect(label: &str, url: &str) -> Result<PgConnection, String> {
    let conn = PgConnection::establish(url).map_err(|e| format!("{} DB connection failed: {}", label, e))?;
    info!("Connected to {} database", label);
    Ok(conn)
}

fn apply_migrations(label: &str, conn: &mut PgConnection, migrations: EmbeddedMigrations) -> Result<(), String> {
    let applied = conn
        .run_pending_migrations(migrations)
        .map_err(|e| format!("Applying {} migrations failed: {}", label, e))?;
    if applied.is_empty() {
        info!("{} schema is up to date; no migrations were applied", label);
    } else {
        let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
        info!("Applied {} {} migration(s): {}", applied.len(), label, names);
    }
    Ok(())
}

fn run(cli: &CliArgs) -> Result<(), String> {
    // 1) Load config, CLI flags win over the environment
    let mut cfg = Config::from_env()?;
    if let Some(memory_friendly) = cli.memory_friendly {
        cfg.memory_friendly = memory_friendly;
    }
    cfg.show_progress |= cli.show_progress;
    let p = &cfg.params;
    info!(
        "Config loaded (earliest_date={}, smoothing_days={}, lag_days={}, detection_ratio={}, neighbor_radius={}mi, neighbor_count_thresh={}, max_neighbors={}, noise_floor={}, memory_friendly={}, fake_data={})",
        p.earliest_date,
        p.smoothing_days,
        p.lag_days,
        p.detection_ratio,
        p.neighbor_radius_miles,
        p.neighbor_count_thresh,
        p.max_neighbors,
        cfg.production_noise_floor,
        cfg.memory_friendly,
        cfg.fake_data_enabled
    );
    let pipeline = DetectionPipeline::new(&cfg.params).map_err(|e| format!("invalid detector parameters: {}", e))?;

    // 2) Connect and migrate
    let mut local = connect("local", &cfg.database_url)?;
    apply_migrations("local", &mut local, MIGRATIONS)?;
    let mut analytics = connect("analytics", &cfg.analytics_database_url)?;
    apply_migrations("analytics", &mut analytics, ANALYTICS_MIGRATIONS)?;
    let mut source = connect("source", &cfg.source_database_url)?;

    // 3) Optional synthetic upstream data
    if cfg.fake_data_enabled {
        apply_migrations("source (dev)", &mut source, SOURCE_DEV_MIGRATIONS)?;
        fake_data::run(&mut source)?;
    }

    // 4) Run every stage once
    let mut store = PgStore::new(local);
    let mut upstream = PgSource::new(source, cfg.production_noise_floor);
    let mut sink = PgSink::new(analytics);
    let cursor = IncrementalCursor::from_local_clock(cfg.params.earliest_date);
    let options = RunOptions {
        memory_friendly: cfg.memory_friendly,
        show_progress: cfg.show_progress,
    };
    let summary = pipeline.run(&mut store, &mut upstream, &mut sink, &cursor, options)?;
    info!(
        "Run complete: {} home(s), {} neighbor edge(s), {} production row(s), {} nominal row(s), {} raw detection(s), {} detection(s), {} delivered",
        summary.home_locations,
        summary.neighbor_edges,
        summary.production_rows,
        summary.nominal_rows,
        summary.raw_detections,
        summary.detections,
        summary.delivered
    );
    Ok(())
}

fn main() {
    let cli = match parse_args(std::env::args_os().skip(1)) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };
    let loaded_env = match load_env(&cli) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some((path, explicit)) = loaded_env.as_ref() {
        let origin = if *explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, path.display());
    }

    info!(
        "solarprod-detector {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(&cli) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
