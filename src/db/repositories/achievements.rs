use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::db::{helpers::parse_optional_datetime, models::Achievement, Database};

fn row_to_achievement(row: &Row) -> Result<Achievement> {
    let achieved_at: Option<String> = row.get("achieved_at")?;

    Ok(Achievement {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        achieved: row.get("achieved")?,
        achieved_at: parse_optional_datetime(achieved_at, "achieved_at")?,
    })
}

pub fn get(conn: &Connection, achievement_id: i64) -> Result<Option<Achievement>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, achieved, achieved_at
         FROM achievements
         WHERE id = ?1",
    )?;
    let mut rows = stmt.query(params![achievement_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_achievement(row)?)),
        None => Ok(None),
    }
}

pub fn list(conn: &Connection) -> Result<Vec<Achievement>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, achieved, achieved_at
         FROM achievements
         ORDER BY id ASC",
    )?;
    let mut rows = stmt.query([])?;
    let mut achievements = Vec::new();
    while let Some(row) = rows.next()? {
        achievements.push(row_to_achievement(row)?);
    }
    Ok(achievements)
}

/// Flags an achievement as achieved. Returns the achievement only when this call
/// unlocked it; already achieved or unknown ids yield `None`.
pub fn mark_achieved(
    conn: &Connection,
    achievement_id: i64,
    at: DateTime<Utc>,
) -> Result<Option<Achievement>> {
    let rows_affected = conn
        .execute(
            "UPDATE achievements
             SET achieved = 1, achieved_at = ?1
             WHERE id = ?2 AND achieved = 0",
            params![at.to_rfc3339(), achievement_id],
        )
        .with_context(|| format!("failed to mark achievement {achievement_id}"))?;

    if rows_affected == 0 {
        return Ok(None);
    }
    get(conn, achievement_id)
}

impl Database {
    pub async fn get_achievement(&self, achievement_id: i64) -> Result<Option<Achievement>> {
        self.execute(move |conn| get(conn, achievement_id)).await
    }

    pub async fn all_achievements(&self) -> Result<Vec<Achievement>> {
        self.execute(|conn| list(conn)).await
    }

    pub async fn mark_achieved(&self, achievement_id: i64) -> Result<Option<Achievement>> {
        self.execute(move |conn| mark_achieved(conn, achievement_id, Utc::now())).await
    }
}
