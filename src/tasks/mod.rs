pub mod controller;

pub use controller::{CompletionOutcome, TaskController};

use thiserror::Error;

use crate::db::models::TaskCategory;

/// Task failures a caller can react to. Store failures stay plain `anyhow` errors;
/// these travel inside them and come back out with `downcast_ref::<TaskError>()`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("cannot draw {requested} {category} tasks, only {available} eligible")]
    PartialSelection {
        category: TaskCategory,
        requested: usize,
        available: usize,
    },
    #[error("invalid task description: {0}")]
    InvalidDescription(String),
    #[error("task {0} not found")]
    NotFound(i64),
    #[error("task {0} is already completed")]
    AlreadyCompleted(i64),
    #[error("task {0} is not in the current batch")]
    NotInBatch(i64),
    #[error("{0} tasks do not rotate")]
    NotRotating(TaskCategory),
}
