use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    db::{models::TimerDifficulty, Database},
    log_info,
};

use super::{TimerState, TimerStatus};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub elapsed_ms: i64,
}

/// Streak timer. Every change is written to the store before the in-memory
/// state moves, so a restart resumes where the user left off.
#[derive(Clone)]
pub struct TimerController {
    state: Arc<Mutex<TimerState>>,
    db: Database,
}

impl TimerController {
    pub fn new(db: Database) -> Self {
        Self {
            state: Arc::new(Mutex::new(TimerState::new())),
            db,
        }
    }

    /// Loads the persisted timer after a restart.
    pub async fn restore(&self) -> Result<TimerState> {
        let progress = self.db.get_progress().await?;
        let restored = TimerState::from_progress(&progress);

        let mut state = self.state.lock().await;
        *state = restored.clone();
        if restored.is_running() {
            log_info!(
                "Restored running timer ({}) started at {:?}",
                restored.difficulty.as_str(),
                restored.started_at
            );
        }
        Ok(restored)
    }

    pub async fn get_state(&self) -> TimerState {
        self.state.lock().await.clone()
    }

    pub async fn snapshot(&self, now: DateTime<Utc>) -> TimerSnapshot {
        let state = self.state.lock().await;
        TimerSnapshot {
            elapsed_ms: state.elapsed_ms(now),
            state: state.clone(),
        }
    }

    pub async fn start(
        &self,
        difficulty: TimerDifficulty,
        now: DateTime<Utc>,
    ) -> Result<TimerState> {
        let mut state = self.state.lock().await;
        if state.status != TimerStatus::Idle {
            return Err(anyhow!("timer already running"));
        }

        self.db.set_timer(difficulty, true, Some(now)).await?;
        state.begin(difficulty, now);

        log_info!("Timer started ({})", difficulty.as_str());
        Ok(state.clone())
    }

    /// Stops the running timer and returns how long it ran.
    pub async fn stop(&self, now: DateTime<Utc>) -> Result<Duration> {
        let mut state = self.state.lock().await;
        if state.status == TimerStatus::Idle {
            return Err(anyhow!("timer is not running"));
        }

        let elapsed = Duration::milliseconds(state.elapsed_ms(now));
        self.db.set_timer(state.difficulty, false, None).await?;
        state.stop();

        log_info!("Timer stopped after {}s", elapsed.num_seconds());
        Ok(elapsed)
    }

    /// Changes the difficulty used for future rewards. Only allowed while idle.
    pub async fn set_difficulty(&self, difficulty: TimerDifficulty) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.status != TimerStatus::Idle {
            return Err(anyhow!("cannot change difficulty while the timer runs"));
        }

        self.db.set_timer(difficulty, false, None).await?;
        state.difficulty = difficulty;
        Ok(())
    }
}
