use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Persisted progress for one title, keyed by the title id.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub anime_name: String,
    pub episode: u32,
    /// Elapsed seconds into `episode`.
    pub timestamp: f64,
    pub duration: Option<f64>,
    pub progress_percent: f64,
    pub last_watched: String,
}

/// Read/write contract of the progress store used by playback and resume.
pub trait WatchHistory {
    fn get_entry(&self, anime_id: &str) -> Result<Option<HistoryEntry>>;

    fn update_progress(
        &self,
        anime_id: &str,
        anime_name: &str,
        episode: u32,
        elapsed: f64,
        duration: Option<f64>,
    ) -> Result<()>;

    /// Most recently watched entries first.
    fn continue_watching(&self, limit: usize) -> Result<Vec<(String, HistoryEntry)>>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPolicy {
    /// Maximum number of stored titles; 0 disables pruning.
    pub limit: usize,
    pub minimal_progress_seconds: f64,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            limit: 100,
            minimal_progress_seconds: 0.0,
        }
    }
}

pub struct Database {
    conn: Connection,
    policy: HistoryPolicy,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self {
            conn,
            policy: HistoryPolicy::default(),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
            policy: HistoryPolicy::default(),
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn with_policy(mut self, policy: HistoryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS watch_history (
                anime_id TEXT PRIMARY KEY,
                anime_name TEXT NOT NULL,
                episode INTEGER NOT NULL,
                timestamp REAL NOT NULL,
                duration REAL,
                progress_percent REAL NOT NULL,
                last_watched TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_watch_history_last_watched ON watch_history(last_watched DESC);
            "#,
        )?;
        Ok(())
    }

    fn prune(&self) -> Result<()> {
        if self.policy.limit == 0 {
            return Ok(());
        }
        self.conn.execute(
            r#"
            DELETE FROM watch_history WHERE anime_id NOT IN (
                SELECT anime_id FROM watch_history ORDER BY last_watched DESC LIMIT ?1
            )
            "#,
            params![self.policy.limit as i64],
        )?;
        Ok(())
    }
}

impl WatchHistory for Database {
    fn get_entry(&self, anime_id: &str) -> Result<Option<HistoryEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT anime_name, episode, timestamp, duration, progress_percent, last_watched FROM watch_history WHERE anime_id = ?1",
                params![anime_id],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn update_progress(
        &self,
        anime_id: &str,
        anime_name: &str,
        episode: u32,
        elapsed: f64,
        duration: Option<f64>,
    ) -> Result<()> {
        // A write without a duration keeps the one already known for the same episode.
        let duration = match duration.filter(|d| *d > 0.0) {
            Some(duration) => Some(duration),
            None => self
                .get_entry(anime_id)?
                .filter(|entry| entry.episode == episode)
                .and_then(|entry| entry.duration),
        };
        let elapsed = elapsed.max(0.0);
        let percent = progress_percent(elapsed, duration);
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        self.conn.execute(
            r#"
            INSERT INTO watch_history (anime_id, anime_name, episode, timestamp, duration, progress_percent, last_watched)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(anime_id) DO UPDATE SET
                anime_name = excluded.anime_name,
                episode = excluded.episode,
                timestamp = excluded.timestamp,
                duration = excluded.duration,
                progress_percent = excluded.progress_percent,
                last_watched = excluded.last_watched
            "#,
            params![anime_id, anime_name, episode, elapsed, duration, percent, now],
        )?;
        self.prune()
    }

    fn continue_watching(&self, limit: usize) -> Result<Vec<(String, HistoryEntry)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT anime_id, anime_name, episode, timestamp, duration, progress_percent, last_watched
            FROM watch_history
            WHERE timestamp >= ?1
            ORDER BY last_watched DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(
            params![self.policy.minimal_progress_seconds, limit as i64],
            |row| {
                let id: String = row.get(0)?;
                Ok((
                    id,
                    HistoryEntry {
                        anime_name: row.get(1)?,
                        episode: row.get(2)?,
                        timestamp: row.get(3)?,
                        duration: row.get(4)?,
                        progress_percent: row.get(5)?,
                        last_watched: row.get(6)?,
                    },
                ))
            },
        )?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        anime_name: row.get(0)?,
        episode: row.get(1)?,
        timestamp: row.get(2)?,
        duration: row.get(3)?,
        progress_percent: row.get(4)?,
        last_watched: row.get(5)?,
    })
}

pub fn progress_percent(elapsed: f64, duration: Option<f64>) -> f64 {
    match duration {
        Some(duration) if duration > 0.0 => (elapsed / duration * 100.0).clamp(0.0, 100.0),
        _ => 0.0,
    }
}
