//! Achievement identifiers and the rules that unlock them.

use serde::{Deserialize, Serialize};

pub const ID_FINISH_FIRST_TASK: i64 = 1;
pub const ID_FINISH_5_TASKS: i64 = 2;
pub const ID_FINISH_10_TASKS: i64 = 3;
pub const ID_FINISH_25_TASKS: i64 = 4;
pub const ID_FINISH_50_TASKS: i64 = 5;
pub const ID_FINISH_100_TASKS: i64 = 6;
pub const ID_FINISH_250_TASKS: i64 = 7;

pub const ID_RUN_3_KM: i64 = 8;
pub const ID_RUN_5_KM: i64 = 9;
pub const ID_RUN_7_KM: i64 = 10;
pub const ID_RUN_10_KM: i64 = 11;

pub const ID_READ_10_PAGES: i64 = 12;
pub const ID_READ_50_PAGES: i64 = 13;
pub const ID_READ_100_PAGES: i64 = 14;
pub const ID_READ_250_PAGES: i64 = 15;

/// Highest threshold first.
const FINISHED_TASKS_LADDER: [(i64, i64); 7] = [
    (250, ID_FINISH_250_TASKS),
    (100, ID_FINISH_100_TASKS),
    (50, ID_FINISH_50_TASKS),
    (25, ID_FINISH_25_TASKS),
    (10, ID_FINISH_10_TASKS),
    (5, ID_FINISH_5_TASKS),
    (1, ID_FINISH_FIRST_TASK),
];

/// Which finished-tasks milestones a sweep may unlock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum MilestonePolicy {
    /// Every reached milestone, so jumping from 4 to 11 unlocks both 5 and 10.
    #[default]
    AllCrossed,
    /// Only the highest reached milestone per sweep.
    HighestOnly,
}

/// Achievement ids for the finished-tasks ladder, highest first.
pub fn finished_task_milestones(tasks_finished: i64, policy: MilestonePolicy) -> Vec<i64> {
    let reached = FINISHED_TASKS_LADDER
        .iter()
        .filter(|(threshold, _)| tasks_finished >= *threshold)
        .map(|(_, id)| *id);

    match policy {
        MilestonePolicy::AllCrossed => reached.collect(),
        MilestonePolicy::HighestOnly => reached.take(1).collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialMilestone {
    /// Completing the task unlocks the achievement.
    Run { achievement_id: i64 },
    /// Completing the task adds to the pages-read counter.
    Read { pages: i64 },
}

pub fn special_milestone(special_task_id: i64) -> Option<SpecialMilestone> {
    match special_task_id {
        ID_RUN_3_KM | ID_RUN_5_KM | ID_RUN_7_KM | ID_RUN_10_KM => Some(SpecialMilestone::Run {
            achievement_id: special_task_id,
        }),
        ID_READ_10_PAGES => Some(SpecialMilestone::Read { pages: 10 }),
        ID_READ_50_PAGES => Some(SpecialMilestone::Read { pages: 50 }),
        ID_READ_100_PAGES => Some(SpecialMilestone::Read { pages: 100 }),
        ID_READ_250_PAGES => Some(SpecialMilestone::Read { pages: 250 }),
        _ => None,
    }
}
