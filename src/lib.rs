//! DetoxRank gamification core: rotating task batches, rewards and ranks,
//! achievements, and the popup queue that announces them.

pub mod db;
pub mod popups;
pub mod rewards;
pub mod rotation;
pub mod settings;
pub mod tasks;
pub mod timer;
mod utils;

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use db::{models::TaskCategory, Database, Task};
use popups::PopupQueue;
use rotation::{RotationEngine, RotationReport};
use settings::SettingsStore;
use tasks::TaskController;
use timer::{TimerController, TimerState};

const ENABLE_LOGS: bool = true;

const DATABASE_FILE: &str = "detoxrank.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

/// What [`App::start_session`] did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub first_run: bool,
    pub timer: TimerState,
    /// Tasks drawn for a fresh install.
    pub seeded: Vec<Task>,
    pub rotations: Vec<RotationReport>,
    pub special: RotationReport,
    pub special_tasks_unlocked: usize,
}

/// Everything the app needs, wired to one data directory.
#[derive(Clone)]
pub struct App {
    pub db: Database,
    pub popups: PopupQueue,
    pub settings: Arc<SettingsStore>,
    pub rotation: RotationEngine,
    pub tasks: TaskController,
    pub timer: TimerController,
}

impl App {
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).with_context(|| {
            format!("failed to create data directory {}", data_dir.display())
        })?;

        let db = Database::new(data_dir.join(DATABASE_FILE))?;
        let settings = Arc::new(SettingsStore::new(data_dir.join(SETTINGS_FILE))?);
        let popups = PopupQueue::new();

        Ok(Self {
            rotation: RotationEngine::new(db.clone(), popups.clone(), settings.clone()),
            tasks: TaskController::new(db.clone(), popups.clone(), settings.clone()),
            timer: TimerController::new(db.clone()),
            db,
            popups,
            settings,
        })
    }

    /// Brings the stored state up to date when the app comes to the foreground:
    /// restores the timer, seeds or rotates batches, settles finished special
    /// tasks and unlocks special tasks when the level allows it.
    pub async fn start_session(&self, now: DateTime<Utc>) -> Result<SessionSummary> {
        let timer = self.timer.restore().await?;

        let first_run = self.db.get_progress().await?.is_first_run();
        let seeded = if first_run {
            log_info!("First run, drawing initial batches");
            self.rotation.seed_initial_batches(now).await?
        } else {
            Vec::new()
        };

        let rotations = self.rotation.refresh_due(now).await?;
        let special = self.rotation.reconcile(TaskCategory::Special).await?;
        let special_tasks_unlocked = self.tasks.unlock_special_tasks().await?;

        Ok(SessionSummary {
            first_run,
            timer,
            seeded,
            rotations,
            special,
            special_tasks_unlocked,
        })
    }
}
