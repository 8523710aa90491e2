use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    db::{
        models::{Achievement, Task, TaskCategory},
        repositories::{
            achievements,
            progress::{self, Counter},
            tasks,
        },
        Database,
    },
    log_info,
    popups::PopupQueue,
    rewards::{batch_reward, Rank, Reward},
    settings::{EngineSettings, SettingsStore},
};

use super::{
    milestones::{finished_task_milestones, special_milestone, SpecialMilestone},
    period::{due_categories, is_due},
};

const ENABLE_LOGS: bool = true;

/// What one reconciliation of a category changed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationReport {
    pub category: TaskCategory,
    pub completed: i64,
    pub reward: Reward,
    pub pages_added: i64,
    /// Achievements unlocked by this run, in unlock order.
    pub unlocked: Vec<Achievement>,
    /// The new batch; empty for categories that do not rotate.
    pub drawn: Vec<Task>,
    pub rank_before: Rank,
    pub rank_after: Rank,
}

impl RotationReport {
    pub fn ranked_up(&self) -> bool {
        self.rank_after > self.rank_before
    }
}

fn sweep_achievements(
    conn: &Connection,
    tasks_finished: i64,
    completed: &[Task],
    settings: &EngineSettings,
    now: DateTime<Utc>,
) -> Result<(Vec<Achievement>, i64)> {
    let mut unlocked = Vec::new();
    // Lowest milestone first so popups come out in ladder order.
    for achievement_id in finished_task_milestones(tasks_finished, settings.milestone_policy)
        .into_iter()
        .rev()
    {
        if let Some(achievement) = achievements::mark_achieved(conn, achievement_id, now)? {
            unlocked.push(achievement);
        }
    }

    let mut pages_added = 0;
    for task in completed {
        match special_milestone(task.special_task_id) {
            Some(SpecialMilestone::Run { achievement_id }) => {
                if let Some(achievement) = achievements::mark_achieved(conn, achievement_id, now)? {
                    unlocked.push(achievement);
                }
            }
            Some(SpecialMilestone::Read { pages }) => pages_added += pages,
            None => {}
        }
    }
    if pages_added > 0 {
        progress::increment(conn, Counter::PagesRead, pages_added)?;
    }

    Ok((unlocked, pages_added))
}

/// Settles the completed tasks of `category` and, for rotating categories,
/// pays them out and draws the next batch. Meant to run inside a transaction.
pub(crate) fn reconcile_in(
    conn: &Connection,
    category: TaskCategory,
    settings: &EngineSettings,
    now: DateTime<Utc>,
) -> Result<RotationReport> {
    let before = progress::load(conn)?;
    let completed_tasks = tasks::list_completed(conn, category)?;
    let completed = tasks::count_completed(conn, category)?;

    let tasks_finished = if completed > 0 {
        progress::increment(conn, Counter::TasksFinished, completed)?
    } else {
        before.tasks_finished
    };

    let (unlocked, pages_added) =
        sweep_achievements(conn, tasks_finished, &completed_tasks, settings, now)?;

    let mut report = RotationReport {
        category,
        completed,
        reward: Reward::default(),
        pages_added,
        unlocked,
        drawn: Vec::new(),
        rank_before: Rank::for_points(before.rank_points),
        rank_after: Rank::for_points(before.rank_points),
    };

    if !category.is_rotating() {
        let ids: Vec<i64> = completed_tasks.iter().map(|task| task.id).collect();
        tasks::mark_settled(conn, &ids)?;
        return Ok(report);
    }

    if completed > 0 {
        report.reward = batch_reward(category, completed, before.timer_difficulty);
        let rank_points =
            progress::increment(conn, Counter::RankPoints, report.reward.rank_points)?;
        progress::increment(conn, Counter::Xp, report.reward.xp)?;
        report.rank_after = Rank::for_points(rank_points);
    }

    tasks::mark_batch_retired(conn, category)?;
    tasks::reset_completion(conn, category)?;
    report.drawn = tasks::draw_batch(
        conn,
        category,
        settings.batch_sizes.for_category(category),
        true,
    )?;
    tasks::release_retired(conn, category)?;

    Ok(report)
}

/// Retires and redraws task batches, paying out what was completed.
#[derive(Clone)]
pub struct RotationEngine {
    db: Database,
    popups: PopupQueue,
    settings: Arc<SettingsStore>,
}

impl RotationEngine {
    pub fn new(db: Database, popups: PopupQueue, settings: Arc<SettingsStore>) -> Self {
        Self {
            db,
            popups,
            settings,
        }
    }

    /// Reconciles one category in a single transaction. On error nothing is
    /// written, and calling again recomputes from the stored state.
    pub async fn reconcile(&self, category: TaskCategory) -> Result<RotationReport> {
        let settings = self.settings.engine();
        let report = self
            .db
            .transaction(move |tx| reconcile_in(tx, category, &settings, Utc::now()))
            .await?;
        self.announce(&report);
        Ok(report)
    }

    /// Draws the first batch of every rotating category that has none yet.
    /// Pays nothing; stamps the refresh times so the periods start now.
    pub async fn seed_initial_batches(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let settings = self.settings.engine();
        let drawn = self
            .db
            .transaction(move |tx| {
                let mut drawn = Vec::new();
                for category in TaskCategory::ROTATING {
                    if tasks::list_active(tx, category)?.is_empty() {
                        let count = settings.batch_sizes.for_category(category);
                        drawn.extend(tasks::draw_batch(tx, category, count, false)?);
                    }
                    progress::set_refreshed_at(tx, category, now)?;
                }
                Ok(drawn)
            })
            .await?;

        log_info!("Seeded {} initial tasks", drawn.len());
        Ok(drawn)
    }

    /// Reconciles every rotating category whose period ended since its last
    /// refresh, in Daily, Weekly, Monthly order.
    pub async fn refresh_due(&self, now: DateTime<Utc>) -> Result<Vec<RotationReport>> {
        let stored = self.db.get_progress().await?;
        let due = due_categories(&stored, now);

        let mut reports = Vec::with_capacity(due.len());
        for category in due {
            let settings = self.settings.engine();
            let report = self
                .db
                .transaction(move |tx| {
                    // A concurrent refresh may have rotated it since the snapshot.
                    let last_refresh = progress::load(tx)?.refreshed_at(category);
                    if !is_due(category, last_refresh, now) {
                        return Ok(None);
                    }
                    let report = reconcile_in(tx, category, &settings, now)?;
                    progress::set_refreshed_at(tx, category, now)?;
                    Ok(Some(report))
                })
                .await?;
            if let Some(report) = report {
                self.announce(&report);
                reports.push(report);
            }
        }
        Ok(reports)
    }

    fn announce(&self, report: &RotationReport) {
        for achievement in &report.unlocked {
            self.popups.show_achievement(achievement);
        }
        if report.ranked_up() {
            self.popups.show_rank_up(report.rank_after);
        }

        log_info!(
            "Reconciled {}: {} completed, +{} RP, +{} XP, +{} pages, {} unlocked, drew {}",
            report.category,
            report.completed,
            report.reward.rank_points,
            report.reward.xp,
            report.pages_added,
            report.unlocked.len(),
            report.drawn.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{
            models::{NewTask, Selection, TaskIcon, TimerDifficulty},
            test_support::temp_database,
        },
        popups::PopupKind,
        rotation::milestones::{
            MilestonePolicy, ID_FINISH_10_TASKS, ID_FINISH_5_TASKS, ID_FINISH_FIRST_TASK,
            ID_READ_50_PAGES, ID_RUN_5_KM,
        },
        tasks::TaskError,
    };
    use chrono::TimeZone;
    use tempfile::TempDir;

    struct Fixture {
        engine: RotationEngine,
        db: Database,
        popups: PopupQueue,
        settings: Arc<SettingsStore>,
        _dirs: (TempDir, TempDir),
    }

    fn fixture() -> Fixture {
        let (db, db_dir) = temp_database();
        let settings_dir = TempDir::new().unwrap();
        let settings =
            Arc::new(SettingsStore::new(settings_dir.path().join("settings.json")).unwrap());
        let popups = PopupQueue::new();
        Fixture {
            engine: RotationEngine::new(db.clone(), popups.clone(), settings.clone()),
            db,
            popups,
            settings,
            _dirs: (db_dir, settings_dir),
        }
    }

    async fn complete_active(db: &Database, category: TaskCategory, count: usize) -> Vec<i64> {
        let mut active = db.active_tasks(category).await.unwrap();
        active.truncate(count);
        for task in &mut active {
            task.completed = true;
        }
        let ids = active.iter().map(|task| task.id).collect();
        db.update_tasks(active).await.unwrap();
        ids
    }

    async fn complete_special(db: &Database, special_task_id: i64) {
        let mut task = db
            .tasks_by_category(TaskCategory::Special)
            .await
            .unwrap()
            .into_iter()
            .find(|task| task.special_task_id == special_task_id)
            .unwrap();
        task.completed = true;
        db.update_task(task).await.unwrap();
    }

    #[tokio::test]
    async fn hard_daily_batch_pays_45_and_redraws() {
        let fx = fixture();
        fx.engine.seed_initial_batches(Utc::now()).await.unwrap();
        // The bonus follows the stored difficulty even with the timer stopped.
        fx.db
            .set_timer(TimerDifficulty::Hard, false, None)
            .await
            .unwrap();
        let old_batch = complete_active(&fx.db, TaskCategory::Daily, 3).await;

        let report = fx.engine.reconcile(TaskCategory::Daily).await.unwrap();
        assert_eq!(report.completed, 3);
        assert_eq!(report.reward.rank_points, 45);
        assert_eq!(report.reward.xp, 30);

        let progress = fx.db.get_progress().await.unwrap();
        assert_eq!(progress.rank_points, 45);
        assert_eq!(progress.xp_points, 30);
        assert_eq!(progress.tasks_finished, 3);

        let daily = fx.db.tasks_by_category(TaskCategory::Daily).await.unwrap();
        let active: Vec<&Task> = daily.iter().filter(|task| task.is_active()).collect();
        assert_eq!(active.len(), 3);
        assert!(daily
            .iter()
            .all(|task| task.selection != Selection::RecentlyRotated && !task.completed));
        // Ten pooled dailies leave seven fresh ones, so nothing repeats.
        assert!(active.iter().all(|task| !old_batch.contains(&task.id)));
    }

    #[tokio::test]
    async fn rotation_without_completions_still_redraws() {
        let fx = fixture();
        fx.engine.seed_initial_batches(Utc::now()).await.unwrap();

        let report = fx.engine.reconcile(TaskCategory::Weekly).await.unwrap();
        assert_eq!(report.completed, 0);
        assert_eq!(report.reward, Reward::default());
        assert_eq!(report.drawn.len(), 2);
        assert_eq!(fx.db.get_progress().await.unwrap().tasks_finished, 0);
        assert!(fx.popups.is_empty());
    }

    #[tokio::test]
    async fn crossing_milestones_unlocks_each_reached_one() {
        let fx = fixture();
        fx.engine.seed_initial_batches(Utc::now()).await.unwrap();
        fx.db.add_tasks_finished(4).await.unwrap();
        complete_active(&fx.db, TaskCategory::Daily, 2).await;

        let report = fx.engine.reconcile(TaskCategory::Daily).await.unwrap();
        let ids: Vec<i64> = report.unlocked.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![ID_FINISH_FIRST_TASK, ID_FINISH_5_TASKS]);
        assert_eq!(fx.db.get_progress().await.unwrap().tasks_finished, 6);
        assert!(!fx.db.get_achievement(ID_FINISH_10_TASKS).await.unwrap().unwrap().achieved);

        let popup = fx.popups.current().unwrap();
        assert_eq!(popup.kind, PopupKind::Achievement);
        assert_eq!(popup.achievement_id, Some(ID_FINISH_FIRST_TASK));
        assert_eq!(fx.popups.len(), 2);

        // A sweep with nothing new unlocks nothing.
        let again = fx.engine.reconcile(TaskCategory::Daily).await.unwrap();
        assert!(again.unlocked.is_empty());
    }

    #[tokio::test]
    async fn highest_only_policy_unlocks_top_milestone() {
        let fx = fixture();
        let mut settings = fx.settings.engine();
        settings.milestone_policy = MilestonePolicy::HighestOnly;
        fx.settings.update_engine(settings).unwrap();

        fx.engine.seed_initial_batches(Utc::now()).await.unwrap();
        fx.db.add_tasks_finished(9).await.unwrap();
        complete_active(&fx.db, TaskCategory::Daily, 2).await;

        let report = fx.engine.reconcile(TaskCategory::Daily).await.unwrap();
        let ids: Vec<i64> = report.unlocked.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![ID_FINISH_10_TASKS]);
        assert!(!fx.db.get_achievement(ID_FINISH_5_TASKS).await.unwrap().unwrap().achieved);
    }

    #[tokio::test]
    async fn special_reconcile_counts_once() {
        let fx = fixture();
        complete_special(&fx.db, ID_READ_50_PAGES).await;
        complete_special(&fx.db, ID_RUN_5_KM).await;

        let report = fx.engine.reconcile(TaskCategory::Special).await.unwrap();
        assert_eq!(report.completed, 2);
        assert_eq!(report.pages_added, 50);
        assert!(report.drawn.is_empty());
        assert_eq!(report.reward, Reward::default());
        assert!(report.unlocked.iter().any(|a| a.id == ID_RUN_5_KM));

        let retry = fx.engine.reconcile(TaskCategory::Special).await.unwrap();
        assert_eq!(retry.completed, 0);
        assert_eq!(retry.pages_added, 0);

        let progress = fx.db.get_progress().await.unwrap();
        assert_eq!(progress.pages_read, 50);
        assert_eq!(progress.tasks_finished, 2);

        let specials = fx.db.tasks_by_category(TaskCategory::Special).await.unwrap();
        assert_eq!(specials.len(), 8);
        assert_eq!(specials.iter().filter(|task| task.completed).count(), 2);
    }

    #[tokio::test]
    async fn user_tasks_are_never_rotated() {
        let fx = fixture();
        let task = fx
            .db
            .insert_task(NewTask::user_task("Fix the bike", TaskIcon::Cycling))
            .await
            .unwrap();

        let report = fx.engine.reconcile(TaskCategory::Uncategorized).await.unwrap();
        assert!(report.drawn.is_empty());
        let stored = fx.db.get_task(task.id).await.unwrap().unwrap();
        assert!(stored.is_active());
        assert!(!stored.completed);
    }

    #[tokio::test]
    async fn undersized_pool_rolls_back() {
        let fx = fixture();
        fx.engine.seed_initial_batches(Utc::now()).await.unwrap();
        let batch = complete_active(&fx.db, TaskCategory::Daily, 3).await;

        let mut settings = fx.settings.engine();
        settings.batch_sizes.daily = 11;
        fx.settings.update_engine(settings).unwrap();

        let err = fx.engine.reconcile(TaskCategory::Daily).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<TaskError>(),
            Some(&TaskError::PartialSelection {
                category: TaskCategory::Daily,
                requested: 11,
                available: 10,
            })
        );

        let progress = fx.db.get_progress().await.unwrap();
        assert_eq!(progress.tasks_finished, 0);
        assert_eq!(progress.rank_points, 0);
        let mut active: Vec<i64> = fx
            .db
            .active_tasks(TaskCategory::Daily)
            .await
            .unwrap()
            .iter()
            .map(|task| task.id)
            .collect();
        active.sort();
        let mut expected = batch;
        expected.sort();
        assert_eq!(active, expected);
        assert_eq!(fx.db.completed_tasks(TaskCategory::Daily).await.unwrap().len(), 3);
        assert!(fx.popups.is_empty());
    }

    #[tokio::test]
    async fn achievement_popups_come_before_rank_up() {
        let fx = fixture();
        fx.engine.seed_initial_batches(Utc::now()).await.unwrap();
        fx.db.add_rank_points(90).await.unwrap();
        fx.db
            .set_timer(TimerDifficulty::Hard, true, Some(Utc::now()))
            .await
            .unwrap();
        complete_active(&fx.db, TaskCategory::Daily, 3).await;

        let report = fx.engine.reconcile(TaskCategory::Daily).await.unwrap();
        assert_eq!(report.rank_before, Rank::Bronze);
        assert_eq!(report.rank_after, Rank::Silver);

        let first = fx.popups.dismiss().unwrap();
        assert_eq!(first.achievement_id, Some(ID_FINISH_FIRST_TASK));
        let second = fx.popups.dismiss().unwrap();
        assert_eq!(second.kind, PopupKind::RankUp);
        assert_eq!(second.rank, Some(Rank::Silver));
        assert!(fx.popups.is_empty());
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let fx = fixture();
        let drawn = fx.engine.seed_initial_batches(Utc::now()).await.unwrap();
        assert_eq!(drawn.len(), 3 + 2 + 1);

        let again = fx.engine.seed_initial_batches(Utc::now()).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(fx.db.active_tasks(TaskCategory::Daily).await.unwrap().len(), 3);
        assert_eq!(fx.db.get_progress().await.unwrap().rank_points, 0);
    }

    #[tokio::test]
    async fn refresh_follows_calendar_boundaries() {
        let fx = fixture();
        // Monday.
        let seeded = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        fx.engine.seed_initial_batches(seeded).await.unwrap();

        let same_day = Utc.with_ymd_and_hms(2024, 3, 4, 22, 0, 0).unwrap();
        assert!(fx.engine.refresh_due(same_day).await.unwrap().is_empty());

        let tuesday = Utc.with_ymd_and_hms(2024, 3, 5, 7, 0, 0).unwrap();
        let reports = fx.engine.refresh_due(tuesday).await.unwrap();
        let categories: Vec<TaskCategory> = reports.iter().map(|r| r.category).collect();
        assert_eq!(categories, vec![TaskCategory::Daily]);

        let next_month = Utc.with_ymd_and_hms(2024, 4, 1, 7, 0, 0).unwrap();
        let reports = fx.engine.refresh_due(next_month).await.unwrap();
        let categories: Vec<TaskCategory> = reports.iter().map(|r| r.category).collect();
        assert_eq!(categories, TaskCategory::ROTATING.to_vec());

        let progress = fx.db.get_progress().await.unwrap();
        assert_eq!(progress.monthly_refreshed_at, Some(next_month));
        assert!(fx.engine.refresh_due(next_month).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overlapping_refreshes_rotate_once() {
        let fx = fixture();
        let monday = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        fx.engine.seed_initial_batches(monday).await.unwrap();
        let seeded: Vec<i64> = fx
            .db
            .active_tasks(TaskCategory::Daily)
            .await
            .unwrap()
            .iter()
            .map(|task| task.id)
            .collect();

        let tuesday = Utc.with_ymd_and_hms(2024, 3, 5, 7, 0, 0).unwrap();
        let (first, second) = tokio::join!(
            fx.engine.refresh_due(tuesday),
            fx.engine.refresh_due(tuesday)
        );
        let daily_rotations = first
            .unwrap()
            .iter()
            .chain(second.unwrap().iter())
            .filter(|report| report.category == TaskCategory::Daily)
            .count();
        assert_eq!(daily_rotations, 1);

        let active = fx.db.active_tasks(TaskCategory::Daily).await.unwrap();
        assert_eq!(active.len(), 3);
        assert!(active.iter().all(|task| !seeded.contains(&task.id)));
    }
}
