pub mod achievement;
pub mod progress;
pub mod task;

pub use achievement::Achievement;
pub use progress::{TimerDifficulty, UserProgress};
pub use task::{NewTask, Selection, Task, TaskCategory, TaskIcon};
