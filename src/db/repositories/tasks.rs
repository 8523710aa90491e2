use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::{seq::SliceRandom, Rng};
use rusqlite::{params, Connection, Row};

use crate::{
    db::{
        helpers::{parse_category, parse_datetime, parse_icon, parse_selection},
        models::{NewTask, Selection, Task, TaskCategory},
        Database,
    },
    tasks::TaskError,
};

const TASK_COLUMNS: &str = "id, description, completed, duration_category, icon_category, \
     selection, special_task_id, settled, created_at";

fn row_to_task(row: &Row) -> Result<Task> {
    let category: String = row.get("duration_category")?;
    let icon: String = row.get("icon_category")?;
    let selection: String = row.get("selection")?;
    let created_at: String = row.get("created_at")?;

    Ok(Task {
        id: row.get("id")?,
        description: row.get("description")?,
        completed: row.get("completed")?,
        category: parse_category(&category)?,
        icon: parse_icon(&icon),
        selection: parse_selection(&selection)?,
        special_task_id: row.get("special_task_id")?,
        settled: row.get("settled")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

fn query_tasks(
    conn: &Connection,
    filter: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Task>> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks {filter} ORDER BY id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(args)?;
    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(row_to_task(row)?);
    }
    Ok(tasks)
}

pub fn list_all(conn: &Connection) -> Result<Vec<Task>> {
    query_tasks(conn, "", &[])
}

pub fn list_by_category(conn: &Connection, category: TaskCategory) -> Result<Vec<Task>> {
    query_tasks(
        conn,
        "WHERE duration_category = ?1",
        &[&category.as_str()],
    )
}

/// The current batch of a category.
pub fn list_active(conn: &Connection, category: TaskCategory) -> Result<Vec<Task>> {
    query_tasks(
        conn,
        "WHERE duration_category = ?1 AND selection = 'Active'",
        &[&category.as_str()],
    )
}

/// Completed tasks that no reconciliation has counted yet.
pub fn list_completed(conn: &Connection, category: TaskCategory) -> Result<Vec<Task>> {
    query_tasks(
        conn,
        "WHERE duration_category = ?1 AND completed = 1 AND settled = 0",
        &[&category.as_str()],
    )
}

pub fn get_task(conn: &Connection, task_id: i64) -> Result<Option<Task>> {
    let mut tasks = query_tasks(conn, "WHERE id = ?1", &[&task_id])?;
    Ok(tasks.pop())
}

pub fn insert_task(conn: &Connection, task: &NewTask, now: DateTime<Utc>) -> Result<Task> {
    conn.execute(
        "INSERT INTO tasks (description, duration_category, icon_category, selection,
                            special_task_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            task.description,
            task.category.as_str(),
            task.icon.as_str(),
            task.selection.as_str(),
            task.special_task_id,
            now.to_rfc3339(),
        ],
    )
    .with_context(|| "failed to insert task")?;

    let task_id = conn.last_insert_rowid();
    get_task(conn, task_id)?.ok_or_else(|| TaskError::NotFound(task_id).into())
}

/// Returns false when no such task existed.
pub fn delete_task(conn: &Connection, task_id: i64) -> Result<bool> {
    let rows_affected = conn
        .execute("DELETE FROM tasks WHERE id = ?1", params![task_id])
        .with_context(|| "failed to delete task")?;
    Ok(rows_affected > 0)
}

pub fn update_task(conn: &Connection, task: &Task) -> Result<()> {
    let rows_affected = conn
        .execute(
            "UPDATE tasks
             SET description = ?1,
                 completed = ?2,
                 duration_category = ?3,
                 icon_category = ?4,
                 selection = ?5,
                 special_task_id = ?6,
                 settled = ?7
             WHERE id = ?8",
            params![
                task.description,
                task.completed,
                task.category.as_str(),
                task.icon.as_str(),
                task.selection.as_str(),
                task.special_task_id,
                task.settled,
                task.id,
            ],
        )
        .with_context(|| format!("failed to update task {}", task.id))?;

    if rows_affected == 0 {
        return Err(TaskError::NotFound(task.id).into());
    }
    Ok(())
}

pub fn update_tasks(conn: &Connection, tasks: &[Task]) -> Result<()> {
    for task in tasks {
        update_task(conn, task)?;
    }
    Ok(())
}

pub fn count_completed(conn: &Connection, category: TaskCategory) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM tasks
         WHERE duration_category = ?1 AND completed = 1 AND settled = 0",
        params![category.as_str()],
        |row| row.get(0),
    )
    .with_context(|| format!("failed to count completed {category} tasks"))
}

/// Moves the current batch of a category to `RecentlyRotated`.
pub fn mark_batch_retired(conn: &Connection, category: TaskCategory) -> Result<usize> {
    conn.execute(
        "UPDATE tasks SET selection = 'RecentlyRotated'
         WHERE duration_category = ?1 AND selection = 'Active'",
        params![category.as_str()],
    )
    .with_context(|| format!("failed to retire {category} batch"))
}

/// Returns every `RecentlyRotated` task of a category to the pool.
pub fn release_retired(conn: &Connection, category: TaskCategory) -> Result<usize> {
    conn.execute(
        "UPDATE tasks SET selection = 'Available'
         WHERE duration_category = ?1 AND selection = 'RecentlyRotated'",
        params![category.as_str()],
    )
    .with_context(|| format!("failed to release retired {category} tasks"))
}

pub fn reset_completion(conn: &Connection, category: TaskCategory) -> Result<usize> {
    conn.execute(
        "UPDATE tasks SET completed = 0, settled = 0 WHERE duration_category = ?1",
        params![category.as_str()],
    )
    .with_context(|| format!("failed to reset {category} tasks"))
}

pub fn mark_settled(conn: &Connection, task_ids: &[i64]) -> Result<()> {
    let mut stmt = conn.prepare("UPDATE tasks SET settled = 1 WHERE id = ?1")?;
    for task_id in task_ids {
        stmt.execute(params![task_id])?;
    }
    Ok(())
}

pub fn set_selection(conn: &Connection, task_ids: &[i64], selection: Selection) -> Result<()> {
    let mut stmt = conn.prepare("UPDATE tasks SET selection = ?1 WHERE id = ?2")?;
    for task_id in task_ids {
        stmt.execute(params![selection.as_str(), task_id])?;
    }
    Ok(())
}

/// Picks `count` ids at random from `candidates`, preferring `Available` ones.
///
/// Retired tasks are only used to top up the batch when `allow_repeat` is set
/// and the available pool is too small.
pub fn choose_batch<R: Rng + ?Sized>(
    category: TaskCategory,
    candidates: &[Task],
    count: usize,
    allow_repeat: bool,
    rng: &mut R,
) -> Result<Vec<i64>, TaskError> {
    let fresh: Vec<i64> = candidates
        .iter()
        .filter(|task| task.selection == Selection::Available)
        .map(|task| task.id)
        .collect();
    let retired: Vec<i64> = candidates
        .iter()
        .filter(|task| task.selection == Selection::RecentlyRotated)
        .map(|task| task.id)
        .collect();

    let eligible = fresh.len() + if allow_repeat { retired.len() } else { 0 };
    if eligible < count {
        return Err(TaskError::PartialSelection {
            category,
            requested: count,
            available: eligible,
        });
    }

    let mut chosen: Vec<i64> = fresh.choose_multiple(rng, count).copied().collect();
    if chosen.len() < count {
        let missing = count - chosen.len();
        chosen.extend(retired.choose_multiple(rng, missing).copied());
    }
    Ok(chosen)
}

/// Draws a new batch for `category` and marks it `Active`.
pub fn draw_batch(
    conn: &Connection,
    category: TaskCategory,
    count: usize,
    allow_repeat: bool,
) -> Result<Vec<Task>> {
    let candidates = query_tasks(
        conn,
        "WHERE duration_category = ?1 AND selection IN ('Available', 'RecentlyRotated')",
        &[&category.as_str()],
    )?;

    let chosen = choose_batch(
        category,
        &candidates,
        count,
        allow_repeat,
        &mut rand::thread_rng(),
    )?;
    log::debug!("Drew {category} tasks {chosen:?}");
    set_selection(conn, &chosen, Selection::Active)?;

    let mut drawn = Vec::with_capacity(chosen.len());
    for task_id in chosen {
        if let Some(task) = get_task(conn, task_id)? {
            drawn.push(task);
        }
    }
    Ok(drawn)
}

impl Database {
    pub async fn all_tasks(&self) -> Result<Vec<Task>> {
        self.execute(|conn| list_all(conn)).await
    }

    pub async fn tasks_by_category(&self, category: TaskCategory) -> Result<Vec<Task>> {
        self.execute(move |conn| list_by_category(conn, category)).await
    }

    pub async fn active_tasks(&self, category: TaskCategory) -> Result<Vec<Task>> {
        self.execute(move |conn| list_active(conn, category)).await
    }

    pub async fn completed_tasks(&self, category: TaskCategory) -> Result<Vec<Task>> {
        self.execute(move |conn| list_completed(conn, category)).await
    }

    pub async fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        self.execute(move |conn| get_task(conn, task_id)).await
    }

    pub async fn insert_task(&self, task: NewTask) -> Result<Task> {
        self.execute(move |conn| insert_task(conn, &task, Utc::now())).await
    }

    pub async fn delete_task(&self, task_id: i64) -> Result<bool> {
        self.execute(move |conn| delete_task(conn, task_id)).await
    }

    pub async fn update_task(&self, task: Task) -> Result<()> {
        self.execute(move |conn| update_task(conn, &task)).await
    }

    /// Updates all rows or none of them.
    pub async fn update_tasks(&self, tasks: Vec<Task>) -> Result<()> {
        self.transaction(move |tx| update_tasks(tx, &tasks)).await
    }

    pub async fn count_completed(&self, category: TaskCategory) -> Result<i64> {
        self.execute(move |conn| count_completed(conn, category)).await
    }

    pub async fn mark_batch_retired(&self, category: TaskCategory) -> Result<usize> {
        self.execute(move |conn| mark_batch_retired(conn, category)).await
    }

    pub async fn release_retired(&self, category: TaskCategory) -> Result<usize> {
        self.execute(move |conn| release_retired(conn, category)).await
    }

    pub async fn reset_completion(&self, category: TaskCategory) -> Result<usize> {
        self.execute(move |conn| reset_completion(conn, category)).await
    }

    pub async fn draw_batch(
        &self,
        category: TaskCategory,
        count: usize,
        allow_repeat: bool,
    ) -> Result<Vec<Task>> {
        self.transaction(move |tx| draw_batch(tx, category, count, allow_repeat)).await
    }
}
