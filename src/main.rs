use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use detoxrank::{log_error, App};

const ENABLE_LOGS: bool = true;

const DATA_DIR_ENV: &str = "DETOXRANK_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "./detoxrank-data";

/// Filter directives from `var`, info when it is unset.
fn log_env(var: &str) -> env_logger::Env<'_> {
    env_logger::Env::new().filter_or(var, "info")
}

async fn run() -> Result<()> {
    let data_dir = std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

    let app = App::open(&data_dir)?;
    let summary = app.start_session(Utc::now()).await?;

    if summary.first_run {
        log::info!("Drew {} tasks for a new profile", summary.seeded.len());
    }
    for report in &summary.rotations {
        log::info!(
            "{} rotation: {} completed, +{} RP, {} new tasks",
            report.category,
            report.completed,
            report.reward.rank_points,
            report.drawn.len()
        );
    }
    if summary.special_tasks_unlocked > 0 {
        log::info!("{} special tasks unlocked", summary.special_tasks_unlocked);
    }

    let progress = app.db.get_progress().await?;
    log::info!(
        "{} RP ({}), level {}, {} tasks finished",
        progress.rank_points,
        detoxrank::rewards::Rank::for_points(progress.rank_points).name(),
        detoxrank::rewards::level_for_xp(progress.xp_points),
        progress.tasks_finished
    );

    while let Some(popup) = app.popups.dismiss() {
        log::info!("{}: {}", popup.title, popup.description);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(log_env("RUST_LOG")).init();

    log::info!("DetoxRank starting up...");

    if let Err(err) = run().await {
        log_error!("DetoxRank failed: {err:#}");
        std::process::exit(1);
    }
}
