//! Batch rotation for rotating task categories and the achievement sweep that
//! runs with it.

pub mod engine;
pub mod milestones;
pub mod period;

pub use engine::{RotationEngine, RotationReport};
pub use milestones::MilestonePolicy;
