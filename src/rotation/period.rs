//! Calendar boundaries that make a rotating category due for a new batch.
//!
//! Days, ISO weeks (Monday first) and months are taken in UTC. A clock that
//! moved backwards never makes a category due.

use chrono::{DateTime, Datelike, Utc};

use crate::db::models::{TaskCategory, UserProgress};

fn period_key(category: TaskCategory, at: DateTime<Utc>) -> Option<(i32, u32)> {
    match category {
        TaskCategory::Daily => Some((at.year(), at.ordinal())),
        TaskCategory::Weekly => {
            let week = at.iso_week();
            Some((week.year(), week.week()))
        }
        TaskCategory::Monthly => Some((at.year(), at.month())),
        TaskCategory::Special | TaskCategory::Uncategorized => None,
    }
}

pub fn is_due(
    category: TaskCategory,
    last_refresh: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    let Some(current) = period_key(category, now) else {
        return false;
    };
    match last_refresh {
        None => true,
        Some(last) => period_key(category, last).map_or(true, |previous| current > previous),
    }
}

/// Rotating categories whose period has ended, in Daily, Weekly, Monthly order.
pub fn due_categories(progress: &UserProgress, now: DateTime<Utc>) -> Vec<TaskCategory> {
    TaskCategory::ROTATING
        .into_iter()
        .filter(|category| is_due(*category, progress.refreshed_at(*category), now))
        .collect()
}
