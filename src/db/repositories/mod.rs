pub mod achievements;
pub mod progress;
pub mod tasks;
