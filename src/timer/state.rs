use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{TimerDifficulty, UserProgress};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub status: TimerStatus,
    /// Kept while idle; the rotation bonus reads it either way.
    pub difficulty: TimerDifficulty,
    pub started_at: Option<DateTime<Utc>>,
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the state persisted with the user progress. A running flag
    /// without a start time is treated as idle.
    pub fn from_progress(progress: &UserProgress) -> Self {
        match (progress.timer_started, progress.timer_started_at) {
            (true, Some(started_at)) => Self {
                status: TimerStatus::Running,
                difficulty: progress.timer_difficulty,
                started_at: Some(started_at),
            },
            _ => Self {
                status: TimerStatus::Idle,
                difficulty: progress.timer_difficulty,
                started_at: None,
            },
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        match (self.status, self.started_at) {
            (TimerStatus::Running, Some(started_at)) => {
                (now - started_at).num_milliseconds().max(0)
            }
            _ => 0,
        }
    }

    pub fn begin(&mut self, difficulty: TimerDifficulty, start_at: DateTime<Utc>) {
        *self = Self {
            status: TimerStatus::Running,
            difficulty,
            started_at: Some(start_at),
        };
    }

    pub fn stop(&mut self) {
        self.status = TimerStatus::Idle;
        self.started_at = None;
    }
}
