//! Point gains for completed tasks.
//!
//! Rank points get a difficulty bonus that is truncated per task before being
//! multiplied by the task count; experience never gets a bonus.

pub mod rank;

pub use rank::{level_for_xp, Rank};

use serde::{Deserialize, Serialize};

use crate::db::models::{TaskCategory, TimerDifficulty};

const RP_BONUS_PERCENT_EASY: u32 = 0;
const RP_BONUS_PERCENT_MEDIUM: u32 = 25;
const RP_BONUS_PERCENT_HARD: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasePoints {
    pub xp: i64,
    pub rp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub xp: i64,
    pub rank_points: i64,
}

pub fn base_points(category: TaskCategory) -> BasePoints {
    match category {
        TaskCategory::Daily => BasePoints { xp: 10, rp: 10 },
        TaskCategory::Weekly => BasePoints { xp: 40, rp: 30 },
        TaskCategory::Monthly => BasePoints { xp: 100, rp: 80 },
        TaskCategory::Uncategorized => BasePoints { xp: 5, rp: 5 },
        TaskCategory::Special => BasePoints { xp: 50, rp: 50 },
    }
}

/// Rank point bonus as a fraction of the base reward.
pub fn difficulty_multiplier(difficulty: TimerDifficulty) -> f64 {
    let percent = match difficulty {
        TimerDifficulty::Easy => RP_BONUS_PERCENT_EASY,
        TimerDifficulty::Medium => RP_BONUS_PERCENT_MEDIUM,
        TimerDifficulty::Hard => RP_BONUS_PERCENT_HARD,
    };
    f64::from(percent) / 100.0
}

pub fn rank_points_for_batch(count: i64, rp_base: i64, multiplier: f64) -> i64 {
    let bonus = (rp_base as f64 * multiplier).floor() as i64;
    count * (rp_base + bonus)
}

pub fn experience_for_batch(count: i64, xp_base: i64) -> i64 {
    count * xp_base
}

/// Reward for `count` tasks of `category` settled together by a rotation.
pub fn batch_reward(category: TaskCategory, count: i64, difficulty: TimerDifficulty) -> Reward {
    let base = base_points(category);
    Reward {
        xp: experience_for_batch(count, base.xp),
        rank_points: rank_points_for_batch(count, base.rp, difficulty_multiplier(difficulty)),
    }
}

/// Rank points for a single task completed by hand. The bonus only applies while
/// the timer is running.
pub fn task_reward(
    category: TaskCategory,
    difficulty: TimerDifficulty,
    timer_running: bool,
) -> Reward {
    let base = base_points(category);
    let multiplier = if timer_running {
        difficulty_multiplier(difficulty)
    } else {
        0.0
    };
    Reward {
        xp: 0,
        rank_points: rank_points_for_batch(1, base.rp, multiplier),
    }
}
