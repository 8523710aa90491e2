use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{db::models::TaskCategory, log_warn, rotation::milestones::MilestonePolicy};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchSizes {
    pub daily: usize,
    pub weekly: usize,
    pub monthly: usize,
}

impl Default for BatchSizes {
    fn default() -> Self {
        Self {
            daily: 3,
            weekly: 2,
            monthly: 1,
        }
    }
}

impl BatchSizes {
    /// Number of active tasks per batch; zero for non-rotating categories.
    pub fn for_category(&self, category: TaskCategory) -> usize {
        match category {
            TaskCategory::Daily => self.daily,
            TaskCategory::Weekly => self.weekly,
            TaskCategory::Monthly => self.monthly,
            TaskCategory::Special | TaskCategory::Uncategorized => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub batch_sizes: BatchSizes,
    pub milestone_policy: MilestonePolicy,
    pub special_tasks_unlock_level: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            batch_sizes: BatchSizes::default(),
            milestone_policy: MilestonePolicy::default(),
            special_tasks_unlock_level: 5,
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        for category in TaskCategory::ROTATING {
            if self.batch_sizes.for_category(category) == 0 {
                bail!("batch size for {category} tasks must be at least 1");
            }
        }
        if self.special_tasks_unlock_level < 1 {
            bail!("special task unlock level must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserSettings {
    #[serde(default)]
    engine: EngineSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<UserSettings>(&contents) {
                Ok(settings) if settings.engine.validate().is_ok() => settings,
                Ok(_) | Err(_) => {
                    log_warn!(
                        "Ignoring invalid settings file {}; using defaults",
                        path.display()
                    );
                    UserSettings::default()
                }
            }
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn engine(&self) -> EngineSettings {
        self.read().engine
    }

    pub fn update_engine(&self, settings: EngineSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        guard.engine = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.engine(), EngineSettings::default());
        assert_eq!(store.engine().batch_sizes.for_category(TaskCategory::Daily), 3);
    }

    #[test]
    fn updates_persist_across_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.engine();
        settings.milestone_policy = MilestonePolicy::HighestOnly;
        settings.batch_sizes.daily = 4;
        store.update_engine(settings).unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.engine().milestone_policy, MilestonePolicy::HighestOnly);
        assert_eq!(reloaded.engine().batch_sizes.daily, 4);
    }

    #[test]
    fn rejects_empty_batches_and_bad_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.engine();
        settings.batch_sizes.weekly = 0;
        assert!(store.update_engine(settings).is_err());

        fs::write(&path, "{ not json").unwrap();
        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.engine(), EngineSettings::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "engine": { "milestonePolicy": "highestOnly" } }"#).unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.engine().milestone_policy, MilestonePolicy::HighestOnly);
        assert_eq!(store.engine().batch_sizes, BatchSizes::default());
    }
}
