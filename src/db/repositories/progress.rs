use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::db::{
    helpers::{parse_datetime, parse_difficulty, parse_optional_datetime},
    models::{TaskCategory, TimerDifficulty, UserProgress},
    Database,
};

/// Counters that only ever move by increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Xp,
    RankPoints,
    PagesRead,
    TasksFinished,
}

impl Counter {
    fn column(&self) -> &'static str {
        match self {
            Counter::Xp => "xp_points",
            Counter::RankPoints => "rank_points",
            Counter::PagesRead => "pages_read",
            Counter::TasksFinished => "tasks_finished",
        }
    }
}

fn refreshed_column(category: TaskCategory) -> Result<&'static str> {
    match category {
        TaskCategory::Daily => Ok("daily_refreshed_at"),
        TaskCategory::Weekly => Ok("weekly_refreshed_at"),
        TaskCategory::Monthly => Ok("monthly_refreshed_at"),
        other => Err(anyhow!("{other} tasks have no refresh timestamp")),
    }
}

/// Creates the progress row on first open; a no-op afterwards.
pub fn ensure_progress(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_progress (id, updated_at) VALUES (1, ?1)",
        params![Utc::now().to_rfc3339()],
    )
    .with_context(|| "failed to create user progress")?;
    Ok(())
}

pub fn load(conn: &Connection) -> Result<UserProgress> {
    let mut stmt = conn.prepare(
        "SELECT xp_points, rank_points, pages_read, tasks_finished, timer_difficulty,
                timer_started, timer_started_at, daily_refreshed_at, weekly_refreshed_at,
                monthly_refreshed_at, updated_at
         FROM user_progress
         WHERE id = 1",
    )?;
    let mut rows = stmt.query([])?;
    let row = rows
        .next()?
        .ok_or_else(|| anyhow!("user progress has not been created"))?;

    let difficulty: String = row.get("timer_difficulty")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(UserProgress {
        xp_points: row.get("xp_points")?,
        rank_points: row.get("rank_points")?,
        pages_read: row.get("pages_read")?,
        tasks_finished: row.get("tasks_finished")?,
        timer_difficulty: parse_difficulty(&difficulty)?,
        timer_started: row.get("timer_started")?,
        timer_started_at: parse_optional_datetime(
            row.get("timer_started_at")?,
            "timer_started_at",
        )?,
        daily_refreshed_at: parse_optional_datetime(
            row.get("daily_refreshed_at")?,
            "daily_refreshed_at",
        )?,
        weekly_refreshed_at: parse_optional_datetime(
            row.get("weekly_refreshed_at")?,
            "weekly_refreshed_at",
        )?,
        monthly_refreshed_at: parse_optional_datetime(
            row.get("monthly_refreshed_at")?,
            "monthly_refreshed_at",
        )?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

/// Adds `amount` to a counter in place and returns the new value.
pub fn increment(conn: &Connection, counter: Counter, amount: i64) -> Result<i64> {
    let column = counter.column();
    let sql = format!(
        "UPDATE user_progress SET {column} = {column} + ?1, updated_at = ?2 WHERE id = 1"
    );
    conn.execute(&sql, params![amount, Utc::now().to_rfc3339()])
        .with_context(|| format!("failed to update {column}"))?;

    conn.query_row(
        &format!("SELECT {column} FROM user_progress WHERE id = 1"),
        [],
        |row| row.get(0),
    )
    .with_context(|| format!("failed to read back {column}"))
}

pub fn store(conn: &Connection, progress: &UserProgress) -> Result<()> {
    conn.execute(
        "UPDATE user_progress
         SET xp_points = ?1,
             rank_points = ?2,
             pages_read = ?3,
             tasks_finished = ?4,
             timer_difficulty = ?5,
             timer_started = ?6,
             timer_started_at = ?7,
             daily_refreshed_at = ?8,
             weekly_refreshed_at = ?9,
             monthly_refreshed_at = ?10,
             updated_at = ?11
         WHERE id = 1",
        params![
            progress.xp_points,
            progress.rank_points,
            progress.pages_read,
            progress.tasks_finished,
            progress.timer_difficulty.as_str(),
            progress.timer_started,
            progress.timer_started_at.map(|dt| dt.to_rfc3339()),
            progress.daily_refreshed_at.map(|dt| dt.to_rfc3339()),
            progress.weekly_refreshed_at.map(|dt| dt.to_rfc3339()),
            progress.monthly_refreshed_at.map(|dt| dt.to_rfc3339()),
            Utc::now().to_rfc3339(),
        ],
    )
    .with_context(|| "failed to update user progress")?;
    Ok(())
}

pub fn set_timer(
    conn: &Connection,
    difficulty: TimerDifficulty,
    started: bool,
    started_at: Option<DateTime<Utc>>,
) -> Result<()> {
    conn.execute(
        "UPDATE user_progress
         SET timer_difficulty = ?1,
             timer_started = ?2,
             timer_started_at = ?3,
             updated_at = ?4
         WHERE id = 1",
        params![
            difficulty.as_str(),
            started,
            started_at.map(|dt| dt.to_rfc3339()),
            Utc::now().to_rfc3339(),
        ],
    )
    .with_context(|| "failed to update timer state")?;
    Ok(())
}

pub fn set_refreshed_at(
    conn: &Connection,
    category: TaskCategory,
    at: DateTime<Utc>,
) -> Result<()> {
    let column = refreshed_column(category)?;
    conn.execute(
        &format!("UPDATE user_progress SET {column} = ?1, updated_at = ?2 WHERE id = 1"),
        params![at.to_rfc3339(), Utc::now().to_rfc3339()],
    )
    .with_context(|| format!("failed to update {column}"))?;
    Ok(())
}

impl Database {
    pub async fn get_progress(&self) -> Result<UserProgress> {
        self.execute(|conn| load(conn)).await
    }

    pub async fn add_xp(&self, amount: i64) -> Result<i64> {
        self.execute(move |conn| increment(conn, Counter::Xp, amount)).await
    }

    pub async fn add_rank_points(&self, amount: i64) -> Result<i64> {
        self.execute(move |conn| increment(conn, Counter::RankPoints, amount)).await
    }

    pub async fn add_pages_read(&self, amount: i64) -> Result<i64> {
        self.execute(move |conn| increment(conn, Counter::PagesRead, amount)).await
    }

    pub async fn add_tasks_finished(&self, amount: i64) -> Result<i64> {
        self.execute(move |conn| increment(conn, Counter::TasksFinished, amount)).await
    }

    /// Overwrites the whole record. Prefer the field increments for counters.
    pub async fn update_progress(&self, progress: UserProgress) -> Result<()> {
        self.execute(move |conn| store(conn, &progress)).await
    }

    pub async fn set_timer(
        &self,
        difficulty: TimerDifficulty,
        started: bool,
        started_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.execute(move |conn| set_timer(conn, difficulty, started, started_at)).await
    }

    pub async fn set_refreshed_at(&self, category: TaskCategory, at: DateTime<Utc>) -> Result<()> {
        self.execute(move |conn| set_refreshed_at(conn, category, at)).await
    }
}
