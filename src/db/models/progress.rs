//! User progress: the single row of cumulative counters and timer settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskCategory;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerDifficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl TimerDifficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerDifficulty::Easy => "Easy",
            TimerDifficulty::Medium => "Medium",
            TimerDifficulty::Hard => "Hard",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub xp_points: i64,
    pub rank_points: i64,
    pub pages_read: i64,
    pub tasks_finished: i64,
    pub timer_difficulty: TimerDifficulty,
    pub timer_started: bool,
    pub timer_started_at: Option<DateTime<Utc>>,
    pub daily_refreshed_at: Option<DateTime<Utc>>,
    pub weekly_refreshed_at: Option<DateTime<Utc>>,
    pub monthly_refreshed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl UserProgress {
    /// Last refresh of a rotating category; `None` for the others.
    pub fn refreshed_at(&self, category: TaskCategory) -> Option<DateTime<Utc>> {
        match category {
            TaskCategory::Daily => self.daily_refreshed_at,
            TaskCategory::Weekly => self.weekly_refreshed_at,
            TaskCategory::Monthly => self.monthly_refreshed_at,
            TaskCategory::Special | TaskCategory::Uncategorized => None,
        }
    }

    /// Nothing has ever been drawn for this user.
    pub fn is_first_run(&self) -> bool {
        TaskCategory::ROTATING
            .iter()
            .all(|category| self.refreshed_at(*category).is_none())
    }
}
