//! Task-related data models.
//!
//! Rotating categories (Daily, Weekly, Monthly) are pools of seeded rows; the
//! current batch of a category is the set of its rows in [`Selection::Active`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TaskCategory {
    Uncategorized,
    Special,
    Daily,
    Weekly,
    Monthly,
}

impl TaskCategory {
    pub const ROTATING: [TaskCategory; 3] =
        [TaskCategory::Daily, TaskCategory::Weekly, TaskCategory::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Uncategorized => "Uncategorized",
            TaskCategory::Special => "Special",
            TaskCategory::Daily => "Daily",
            TaskCategory::Weekly => "Weekly",
            TaskCategory::Monthly => "Monthly",
        }
    }

    /// Whether the category is retired and redrawn on period boundaries.
    pub fn is_rotating(&self) -> bool {
        matches!(
            self,
            TaskCategory::Daily | TaskCategory::Weekly | TaskCategory::Monthly
        )
    }
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cosmetic icon bucket. The engine never looks at it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TaskIcon {
    Exercise,
    Health,
    Running,
    Walking,
    Swimming,
    Meditation,
    HealthyFood,
    UnhealthyFood,
    Cleaning,
    Cycling,
    Reading,
    Hiking,
    Fun,
    Places,
    Creating,
    Music,
    Sports,
    Photography,
    Other,
}

impl TaskIcon {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskIcon::Exercise => "Exercise",
            TaskIcon::Health => "Health",
            TaskIcon::Running => "Running",
            TaskIcon::Walking => "Walking",
            TaskIcon::Swimming => "Swimming",
            TaskIcon::Meditation => "Meditation",
            TaskIcon::HealthyFood => "HealthyFood",
            TaskIcon::UnhealthyFood => "UnhealthyFood",
            TaskIcon::Cleaning => "Cleaning",
            TaskIcon::Cycling => "Cycling",
            TaskIcon::Reading => "Reading",
            TaskIcon::Hiking => "Hiking",
            TaskIcon::Fun => "Fun",
            TaskIcon::Places => "Places",
            TaskIcon::Creating => "Creating",
            TaskIcon::Music => "Music",
            TaskIcon::Sports => "Sports",
            TaskIcon::Photography => "Photography",
            TaskIcon::Other => "Other",
        }
    }
}

/// Where a task stands in the draw cycle of its category.
///
/// `RecentlyRotated` only exists while a rotation is in progress: the retired
/// batch is excluded from the next draw and released right after it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Selection {
    Available,
    Active,
    RecentlyRotated,
}

impl Selection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Selection::Available => "Available",
            Selection::Active => "Active",
            Selection::RecentlyRotated => "RecentlyRotated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub description: String,
    pub completed: bool,
    pub category: TaskCategory,
    pub icon: TaskIcon,
    pub selection: Selection,
    /// Achievement id this task is tied to, 0 when none.
    pub special_task_id: i64,
    /// Completed and already counted by a reconciliation.
    pub settled: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn is_active(&self) -> bool {
        self.selection == Selection::Active
    }
}

/// Input data for creating a task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub description: String,
    pub category: TaskCategory,
    pub icon: TaskIcon,
    pub selection: Selection,
    pub special_task_id: i64,
}

impl NewTask {
    pub fn user_task(description: impl Into<String>, icon: TaskIcon) -> Self {
        Self {
            description: description.into(),
            category: TaskCategory::Uncategorized,
            icon,
            selection: Selection::Active,
            special_task_id: 0,
        }
    }
}

/// Validation for user-entered task data
pub mod validation {
    use crate::tasks::TaskError;

    pub const MAX_DESCRIPTION_CHARS: usize = 120;

    /// Returns the trimmed description, or why it was rejected.
    pub fn validate_description(raw: &str) -> Result<String, TaskError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TaskError::InvalidDescription(
                "description must not be empty".into(),
            ));
        }
        if trimmed.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(TaskError::InvalidDescription(format!(
                "description exceeds {MAX_DESCRIPTION_CHARS} characters"
            )));
        }
        Ok(trimmed.to_string())
    }
}
