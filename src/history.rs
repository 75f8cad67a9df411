//! Local session history kept in SQLite.
//!
//! [`HistoryDb`] implements [`Reporter`], so the engine records sessions here
//! through the same best-effort path it would use for a remote backend.

use chrono::{DateTime, Local, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::report::{ReportError, Reporter, SessionId};
use crate::session::{RoundResult, SessionConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionStatus {
    #[strum(serialize = "in progress")]
    InProgress,
    #[strum(serialize = "completed")]
    Completed,
    #[strum(serialize = "cancelled")]
    Cancelled,
}

impl SessionStatus {
    fn as_db_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(SessionStatus::InProgress),
            "completed" => Some(SessionStatus::Completed),
            "cancelled" => Some(SessionStatus::Cancelled),
            _ => None,
        }
    }
}

/// One stored session with its rounds in order
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: i64,
    pub started_at: DateTime<Local>,
    pub completed_at: Option<DateTime<Local>>,
    pub total_rounds: u32,
    pub breaths_per_round: u32,
    pub breath_cycle_ms: u64,
    pub status: SessionStatus,
    pub rounds: Vec<RoundResult>,
}

#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Open the database at the default state path, creating it if needed
    pub fn open_default() -> Result<Self, ReportError> {
        let path = AppDirs::history_db_path()
            .unwrap_or_else(|| PathBuf::from("breathwork_history.db"));
        Self::open(&path)
    }

    pub fn open(path: &Path) -> Result<Self, ReportError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, ReportError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, ReportError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                rounds INTEGER NOT NULL,
                breaths_per_round INTEGER NOT NULL,
                breath_cycle_ms INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'in_progress'
            );
            CREATE TABLE IF NOT EXISTS rounds (
                session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                round_number INTEGER NOT NULL,
                hold_seconds INTEGER NOT NULL,
                recovery_seconds INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (session_id, round_number)
            );
            "#,
        )?;
        Ok(HistoryDb { conn })
    }

    fn status(&self, id: i64) -> Result<Option<SessionStatus>, ReportError> {
        let status: Option<String> = self
            .conn
            .query_row("SELECT status FROM sessions WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(status.as_deref().and_then(SessionStatus::from_db_str))
    }

    fn require_in_progress(&self, id: i64, what: &'static str) -> Result<(), ReportError> {
        match self.status(id)? {
            Some(SessionStatus::InProgress) => Ok(()),
            Some(other) => Err(ReportError::Rejected {
                what,
                reason: format!("session {id} is {other}"),
            }),
            None => Err(ReportError::Rejected {
                what,
                reason: format!("no session {id}"),
            }),
        }
    }

    fn finish(
        &self,
        session: &SessionId,
        status: SessionStatus,
        what: &'static str,
    ) -> Result<(), ReportError> {
        let id = row_id(session)?;
        let changed = self.conn.execute(
            "UPDATE sessions SET status = ?1, completed_at = ?2 WHERE id = ?3 AND status = 'in_progress'",
            params![status.as_db_str(), now_timestamp(), id],
        )?;
        if changed == 0 {
            return Err(ReportError::Rejected {
                what,
                reason: format!("session {id} is not in progress"),
            });
        }
        Ok(())
    }

    /// Most recent sessions first (ids follow insertion order), each with its recorded rounds
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>, ReportError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, started_at, completed_at, rounds, breaths_per_round, breath_cycle_ms, status
            FROM sessions
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let started_at: String = row.get(1)?;
            let completed_at: Option<String> = row.get(2)?;
            let status: String = row.get(6)?;

            Ok(SessionRecord {
                id: row.get(0)?,
                started_at: parse_timestamp(&started_at, 1)?,
                completed_at: completed_at
                    .map(|ts| parse_timestamp(&ts, 2))
                    .transpose()?,
                total_rounds: row.get(3)?,
                breaths_per_round: row.get(4)?,
                breath_cycle_ms: row.get(5)?,
                status: SessionStatus::from_db_str(&status).ok_or_else(|| {
                    rusqlite::Error::InvalidColumnType(
                        6,
                        "status".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?,
                rounds: Vec::new(),
            })
        })?;

        let mut sessions = Vec::new();
        for record in rows {
            let mut record = record?;
            record.rounds = self.rounds_for(record.id)?;
            sessions.push(record);
        }
        Ok(sessions)
    }

    fn rounds_for(&self, id: i64) -> Result<Vec<RoundResult>, ReportError> {
        let mut stmt = self.conn.prepare(
            "SELECT round_number, hold_seconds, recovery_seconds FROM rounds WHERE session_id = ?1 ORDER BY round_number",
        )?;
        let rounds = stmt
            .query_map([id], |row| {
                Ok(RoundResult {
                    round_number: row.get(0)?,
                    hold_seconds: row.get(1)?,
                    recovery_seconds: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rounds)
    }
}

/// Stored in UTC; converted to local time when read back
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_id(session: &SessionId) -> Result<i64, ReportError> {
    session.0.parse().map_err(|_| ReportError::Rejected {
        what: "session id",
        reason: format!("{session} is not a history id"),
    })
}

fn parse_timestamp(ts: &str, column: usize) -> rusqlite::Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                column,
                "timestamp".to_string(),
                rusqlite::types::Type::Text,
            )
        })
}

impl Reporter for HistoryDb {
    fn create_session(&mut self, config: &SessionConfig) -> Result<SessionId, ReportError> {
        self.conn.execute(
            r#"
            INSERT INTO sessions (started_at, rounds, breaths_per_round, breath_cycle_ms, status)
            VALUES (?1, ?2, ?3, ?4, 'in_progress')
            "#,
            params![
                now_timestamp(),
                config.total_rounds,
                config.breaths_per_round,
                config.breath_cycle.as_millis() as u64,
            ],
        )?;
        Ok(SessionId(self.conn.last_insert_rowid().to_string()))
    }

    fn report_hold_end(
        &mut self,
        session: &SessionId,
        round: u32,
        hold_seconds: u64,
    ) -> Result<(), ReportError> {
        let id = row_id(session)?;
        self.require_in_progress(id, "hold end")?;
        self.conn.execute(
            r#"
            INSERT INTO rounds (session_id, round_number, hold_seconds, recovery_seconds)
            VALUES (?1, ?2, ?3, 0)
            ON CONFLICT(session_id, round_number) DO UPDATE SET hold_seconds = excluded.hold_seconds
            "#,
            params![id, round, hold_seconds],
        )?;
        Ok(())
    }

    fn report_recovery_end(
        &mut self,
        session: &SessionId,
        round: u32,
        recovery_seconds: u64,
    ) -> Result<(), ReportError> {
        let id = row_id(session)?;
        self.require_in_progress(id, "recovery end")?;
        let changed = self.conn.execute(
            "UPDATE rounds SET recovery_seconds = ?1 WHERE session_id = ?2 AND round_number = ?3",
            params![recovery_seconds, id, round],
        )?;
        if changed == 0 {
            return Err(ReportError::Rejected {
                what: "recovery end",
                reason: format!("round {round} has no recorded hold"),
            });
        }
        Ok(())
    }

    fn report_complete(&mut self, session: &SessionId) -> Result<(), ReportError> {
        self.finish(session, SessionStatus::Completed, "completion")
    }

    fn report_cancelled(&mut self, session: &SessionId) -> Result<(), ReportError> {
        self.finish(session, SessionStatus::Cancelled, "cancellation")
    }
}
