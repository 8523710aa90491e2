use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::db::models::{Selection, TaskCategory, TaskIcon, TimerDifficulty};

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_category(value: &str) -> Result<TaskCategory> {
    match value {
        "Uncategorized" => Ok(TaskCategory::Uncategorized),
        "Special" => Ok(TaskCategory::Special),
        "Daily" => Ok(TaskCategory::Daily),
        "Weekly" => Ok(TaskCategory::Weekly),
        "Monthly" => Ok(TaskCategory::Monthly),
        other => Err(anyhow!("unknown task category {other}")),
    }
}

pub fn parse_selection(value: &str) -> Result<Selection> {
    match value {
        "Available" => Ok(Selection::Available),
        "Active" => Ok(Selection::Active),
        "RecentlyRotated" => Ok(Selection::RecentlyRotated),
        other => Err(anyhow!("unknown task selection {other}")),
    }
}

pub fn parse_difficulty(value: &str) -> Result<TimerDifficulty> {
    match value {
        "Easy" => Ok(TimerDifficulty::Easy),
        "Medium" => Ok(TimerDifficulty::Medium),
        "Hard" => Ok(TimerDifficulty::Hard),
        other => Err(anyhow!("unknown timer difficulty {other}")),
    }
}

/// Unknown icons fall back to `Other`; they are cosmetic only.
pub fn parse_icon(value: &str) -> TaskIcon {
    match value {
        "Exercise" => TaskIcon::Exercise,
        "Health" => TaskIcon::Health,
        "Running" => TaskIcon::Running,
        "Walking" => TaskIcon::Walking,
        "Swimming" => TaskIcon::Swimming,
        "Meditation" => TaskIcon::Meditation,
        "HealthyFood" => TaskIcon::HealthyFood,
        "UnhealthyFood" => TaskIcon::UnhealthyFood,
        "Cleaning" => TaskIcon::Cleaning,
        "Cycling" => TaskIcon::Cycling,
        "Reading" => TaskIcon::Reading,
        "Hiking" => TaskIcon::Hiking,
        "Fun" => TaskIcon::Fun,
        "Places" => TaskIcon::Places,
        "Creating" => TaskIcon::Creating,
        "Music" => TaskIcon::Music,
        "Sports" => TaskIcon::Sports,
        "Photography" => TaskIcon::Photography,
        _ => TaskIcon::Other,
    }
}
