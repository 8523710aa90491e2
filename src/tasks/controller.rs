use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

use crate::{
    db::{
        models::{
            task::validation::validate_description, Achievement, NewTask, Selection, Task,
            TaskCategory, TaskIcon,
        },
        repositories::{
            achievements,
            progress::{self, Counter},
            tasks,
        },
        Database,
    },
    log_info,
    popups::PopupQueue,
    rewards::{level_for_xp, task_reward, Rank, Reward},
    settings::SettingsStore,
};

use super::TaskError;

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOutcome {
    pub task: Task,
    pub reward: Reward,
    /// Uncategorized tasks are deleted once completed.
    pub removed: bool,
    pub unlocked: Option<Achievement>,
    pub rank_before: Rank,
    pub rank_after: Rank,
}

/// Direct user actions on tasks.
#[derive(Clone)]
pub struct TaskController {
    db: Database,
    popups: PopupQueue,
    settings: Arc<SettingsStore>,
}

fn active_task(conn: &rusqlite::Connection, task_id: i64) -> Result<Task> {
    let task = tasks::get_task(conn, task_id)?.ok_or(TaskError::NotFound(task_id))?;
    if !task.is_active() {
        return Err(TaskError::NotInBatch(task_id).into());
    }
    Ok(task)
}

impl TaskController {
    pub fn new(db: Database, popups: PopupQueue, settings: Arc<SettingsStore>) -> Self {
        Self {
            db,
            popups,
            settings,
        }
    }

    pub async fn create_task(&self, description: &str, icon: TaskIcon) -> Result<Task> {
        let description = validate_description(description)?;
        self.db.insert_task(NewTask::user_task(description, icon)).await
    }

    pub async fn delete_task(&self, task_id: i64) -> Result<()> {
        if !self.db.delete_task(task_id).await? {
            return Err(TaskError::NotFound(task_id).into());
        }
        Ok(())
    }

    pub async fn all_tasks(&self) -> Result<Vec<Task>> {
        self.db.all_tasks().await
    }

    /// Tasks currently shown for a category.
    pub async fn tasks_in_batch(&self, category: TaskCategory) -> Result<Vec<Task>> {
        self.db.active_tasks(category).await
    }

    /// Completes a task from the current batch.
    ///
    /// Uncategorized and special tasks pay out immediately; rotating tasks are
    /// only flagged and get paid by the next rotation of their category.
    pub async fn complete_task(&self, task_id: i64) -> Result<CompletionOutcome> {
        let outcome = self
            .db
            .transaction(move |tx| {
                let mut task = active_task(tx, task_id)?;
                if task.completed {
                    return Err(TaskError::AlreadyCompleted(task_id).into());
                }

                let current = progress::load(tx)?;
                let paid = task_reward(
                    task.category,
                    current.timer_difficulty,
                    current.timer_started,
                );

                task.completed = true;
                let mut removed = false;
                let mut unlocked = None;
                let reward = match task.category {
                    TaskCategory::Uncategorized => {
                        tasks::delete_task(tx, task.id)?;
                        removed = true;
                        paid
                    }
                    TaskCategory::Special => {
                        task.selection = Selection::Available;
                        tasks::update_task(tx, &task)?;
                        if task.special_task_id != 0 {
                            unlocked =
                                achievements::mark_achieved(tx, task.special_task_id, Utc::now())?;
                        }
                        paid
                    }
                    TaskCategory::Daily | TaskCategory::Weekly | TaskCategory::Monthly => {
                        tasks::update_task(tx, &task)?;
                        Reward::default()
                    }
                };

                if reward.rank_points > 0 {
                    progress::increment(tx, Counter::RankPoints, reward.rank_points)?;
                }

                Ok(CompletionOutcome {
                    task,
                    reward,
                    removed,
                    unlocked,
                    rank_before: Rank::for_points(current.rank_points),
                    rank_after: Rank::for_points(current.rank_points + reward.rank_points),
                })
            })
            .await?;

        if let Some(achievement) = &outcome.unlocked {
            self.popups.show_achievement(achievement);
        }
        if outcome.rank_after > outcome.rank_before {
            self.popups.show_rank_up(outcome.rank_after);
        }

        log_info!(
            "Completed {} task {} (+{} RP)",
            outcome.task.category,
            outcome.task.id,
            outcome.reward.rank_points
        );
        Ok(outcome)
    }

    /// Checks or unchecks a task of a rotating batch.
    pub async fn toggle_task(&self, task_id: i64) -> Result<Task> {
        self.db
            .transaction(move |tx| {
                let mut task = active_task(tx, task_id)?;
                if !task.category.is_rotating() {
                    return Err(TaskError::NotRotating(task.category).into());
                }
                task.completed = !task.completed;
                tasks::update_task(tx, &task)?;
                Ok(task)
            })
            .await
    }

    /// Replaces one open task of a rotating batch with a task that was not shown.
    pub async fn swap_task(&self, task_id: i64) -> Result<Task> {
        let replacement = self
            .db
            .transaction(move |tx| {
                let task = active_task(tx, task_id)?;
                if !task.category.is_rotating() {
                    return Err(TaskError::NotRotating(task.category).into());
                }
                if task.completed {
                    return Err(TaskError::AlreadyCompleted(task_id).into());
                }

                tasks::set_selection(tx, &[task.id], Selection::RecentlyRotated)?;
                let mut drawn = tasks::draw_batch(tx, task.category, 1, false)?;
                tasks::release_retired(tx, task.category)?;
                drawn
                    .pop()
                    .ok_or_else(|| anyhow::Error::from(TaskError::NotFound(task_id)))
            })
            .await?;

        log_info!(
            "Swapped task {task_id} for {} ({})",
            replacement.id,
            replacement.description
        );
        Ok(replacement)
    }

    /// Shows the special tasks once the user is experienced enough, until the
    /// first of them is completed. Returns how many tasks were unlocked.
    pub async fn unlock_special_tasks(&self) -> Result<usize> {
        let unlock_level = self.settings.engine().special_tasks_unlock_level;
        let unlocked = self
            .db
            .transaction(move |tx| {
                let xp_points = progress::load(tx)?.xp_points;
                if level_for_xp(xp_points) < unlock_level {
                    return Ok(0);
                }

                let specials = tasks::list_by_category(tx, TaskCategory::Special)?;
                if specials.iter().any(|task| task.completed) {
                    return Ok(0);
                }

                let locked: Vec<i64> = specials
                    .iter()
                    .filter(|task| task.selection == Selection::Available)
                    .map(|task| task.id)
                    .collect();
                tasks::set_selection(tx, &locked, Selection::Active)?;
                Ok(locked.len())
            })
            .await?;

        if unlocked > 0 {
            log_info!("Unlocked {unlocked} special tasks");
        }
        Ok(unlocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{models::TimerDifficulty, test_support::temp_database},
        popups::PopupKind,
        rotation::milestones::{ID_READ_50_PAGES, ID_RUN_3_KM},
    };
    use tempfile::TempDir;

    struct Fixture {
        controller: TaskController,
        db: Database,
        popups: PopupQueue,
        _dirs: (TempDir, TempDir),
    }

    fn fixture() -> Fixture {
        let (db, db_dir) = temp_database();
        let settings_dir = TempDir::new().unwrap();
        let settings =
            Arc::new(SettingsStore::new(settings_dir.path().join("settings.json")).unwrap());
        let popups = PopupQueue::new();
        Fixture {
            controller: TaskController::new(db.clone(), popups.clone(), settings),
            db,
            popups,
            _dirs: (db_dir, settings_dir),
        }
    }

    async fn special_task(db: &Database, special_task_id: i64) -> Task {
        db.tasks_by_category(TaskCategory::Special)
            .await
            .unwrap()
            .into_iter()
            .find(|task| task.special_task_id == special_task_id)
            .unwrap()
    }

    #[tokio::test]
    async fn create_rejects_blank_description() {
        let fx = fixture();
        let err = fx.controller.create_task("   ", TaskIcon::Other).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TaskError>(),
            Some(TaskError::InvalidDescription(_))
        ));

        let task = fx
            .controller
            .create_task("  Clean the kitchen ", TaskIcon::Cleaning)
            .await
            .unwrap();
        assert_eq!(task.description, "Clean the kitchen");
    }

    #[tokio::test]
    async fn completing_user_task_pays_and_removes_it() {
        let fx = fixture();
        fx.db
            .set_timer(TimerDifficulty::Hard, true, Some(Utc::now()))
            .await
            .unwrap();
        let task = fx
            .controller
            .create_task("Write a letter", TaskIcon::Creating)
            .await
            .unwrap();

        let outcome = fx.controller.complete_task(task.id).await.unwrap();
        assert!(outcome.removed);
        assert_eq!(outcome.reward.rank_points, 5 + 2);
        assert!(fx.db.get_task(task.id).await.unwrap().is_none());
        assert_eq!(fx.db.get_progress().await.unwrap().rank_points, 7);
    }

    #[tokio::test]
    async fn completing_special_task_unlocks_achievement() {
        let fx = fixture();
        let task = special_task(&fx.db, ID_RUN_3_KM).await;
        tasks_set_active(&fx.db, task.id).await;

        let outcome = fx.controller.complete_task(task.id).await.unwrap();
        assert_eq!(outcome.unlocked.as_ref().map(|a| a.id), Some(ID_RUN_3_KM));
        assert_eq!(outcome.reward.rank_points, 50);
        assert_eq!(outcome.task.selection, Selection::Available);
        assert!(fx.db.get_achievement(ID_RUN_3_KM).await.unwrap().unwrap().achieved);

        let popup = fx.popups.current().unwrap();
        assert_eq!(popup.kind, PopupKind::Achievement);
        assert_eq!(popup.achievement_id, Some(ID_RUN_3_KM));

        let err = fx.controller.complete_task(task.id).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TaskError>(),
            Some(TaskError::NotInBatch(_))
        ));
    }

    #[tokio::test]
    async fn rotating_tasks_toggle_without_payout() {
        let fx = fixture();
        let drawn = fx.db.draw_batch(TaskCategory::Daily, 3, false).await.unwrap();
        let task = &drawn[0];

        let outcome = fx.controller.complete_task(task.id).await.unwrap();
        assert_eq!(outcome.reward, Reward::default());
        assert!(outcome.task.completed);
        assert_eq!(fx.db.get_progress().await.unwrap().rank_points, 0);

        let err = fx.controller.complete_task(task.id).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TaskError>(),
            Some(TaskError::AlreadyCompleted(_))
        ));

        let toggled = fx.controller.toggle_task(task.id).await.unwrap();
        assert!(!toggled.completed);
    }

    #[tokio::test]
    async fn toggle_refuses_non_rotating_tasks() {
        let fx = fixture();
        let task = fx
            .controller
            .create_task("Plant a tree", TaskIcon::Other)
            .await
            .unwrap();
        let err = fx.controller.toggle_task(task.id).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<TaskError>(),
            Some(&TaskError::NotRotating(TaskCategory::Uncategorized))
        );
    }

    #[tokio::test]
    async fn swap_replaces_with_unseen_task() {
        let fx = fixture();
        let drawn = fx.db.draw_batch(TaskCategory::Daily, 3, false).await.unwrap();
        let old = drawn[1].clone();

        let replacement = fx.controller.swap_task(old.id).await.unwrap();
        assert_ne!(replacement.id, old.id);
        assert!(drawn.iter().all(|task| task.id != replacement.id));

        let active = fx.db.active_tasks(TaskCategory::Daily).await.unwrap();
        assert_eq!(active.len(), 3);
        assert!(active.iter().all(|task| task.id != old.id));
        let old_now = fx.db.get_task(old.id).await.unwrap().unwrap();
        assert_eq!(old_now.selection, Selection::Available);
    }

    #[tokio::test]
    async fn swap_fails_cleanly_when_pool_is_exhausted() {
        let fx = fixture();
        // The seeded monthly pool has four tasks.
        let drawn = fx.db.draw_batch(TaskCategory::Monthly, 4, false).await.unwrap();

        let err = fx.controller.swap_task(drawn[0].id).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TaskError>(),
            Some(TaskError::PartialSelection { .. })
        ));
        let still_active = fx.db.get_task(drawn[0].id).await.unwrap().unwrap();
        assert!(still_active.is_active());
    }

    #[tokio::test]
    async fn special_tasks_unlock_at_level() {
        let fx = fixture();
        assert_eq!(fx.controller.unlock_special_tasks().await.unwrap(), 0);

        fx.db.add_xp(400).await.unwrap();
        assert_eq!(fx.controller.unlock_special_tasks().await.unwrap(), 8);
        assert_eq!(
            fx.controller.tasks_in_batch(TaskCategory::Special).await.unwrap().len(),
            8
        );

        let read = special_task(&fx.db, ID_READ_50_PAGES).await;
        fx.controller.complete_task(read.id).await.unwrap();
        assert_eq!(fx.controller.unlock_special_tasks().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn crossing_rank_boundary_enqueues_rank_up() {
        let fx = fixture();
        fx.db.add_rank_points(90).await.unwrap();
        let task = fx
            .controller
            .create_task("Sort the mail", TaskIcon::Other)
            .await
            .unwrap();
        fx.controller.complete_task(task.id).await.unwrap();
        assert!(fx.popups.is_empty());

        fx.db.add_rank_points(4).await.unwrap();
        let task = fx
            .controller
            .create_task("Water plants", TaskIcon::Other)
            .await
            .unwrap();
        let outcome = fx.controller.complete_task(task.id).await.unwrap();
        assert_eq!(outcome.rank_after, Rank::Silver);
        assert_eq!(fx.popups.current().unwrap().rank, Some(Rank::Silver));
    }

    async fn tasks_set_active(db: &Database, task_id: i64) {
        db.execute(move |conn| tasks::set_selection(conn, &[task_id], Selection::Active))
            .await
            .unwrap();
    }
}
