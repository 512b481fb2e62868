use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::session::{QuizResult, SubmitReason};

/// One submitted attempt at a quiz
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub user_id: u32,
    pub course_id: u32,
    pub quiz_id: u32,
    pub correct: usize,
    pub total: usize,
    pub percent: f64,
    pub passed: bool,
    pub reason: SubmitReason,
    pub elapsed_secs: f64,
    pub taken_at: DateTime<Local>,
}

impl AttemptRecord {
    pub fn from_result(user_id: u32, course_id: u32, quiz_id: u32, result: &QuizResult) -> Self {
        Self {
            user_id,
            course_id,
            quiz_id,
            correct: result.score.correct,
            total: result.score.total,
            percent: result.score.percent,
            passed: result.passed,
            reason: result.reason,
            elapsed_secs: result.elapsed.as_secs_f64(),
            taken_at: Local::now(),
        }
    }
}

/// Aggregate of a user's attempts at one quiz
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttemptSummary {
    pub attempts: usize,
    pub best_percent: f64,
    pub ever_passed: bool,
}

/// History of submitted attempts
#[derive(Debug)]
pub struct AttemptLog {
    conn: Connection,
}

impl AttemptLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS quiz_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                course_id INTEGER NOT NULL,
                quiz_id INTEGER NOT NULL,
                correct INTEGER NOT NULL,
                total INTEGER NOT NULL,
                percent REAL NOT NULL,
                passed BOOLEAN NOT NULL,
                reason TEXT NOT NULL,
                elapsed_secs REAL NOT NULL,
                taken_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_quiz_attempts_user_quiz ON quiz_attempts(user_id, quiz_id)",
            [],
        )?;

        Ok(Self { conn })
    }

    pub fn record(&self, attempt: &AttemptRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO quiz_attempts
            (user_id, course_id, quiz_id, correct, total, percent, passed, reason, elapsed_secs, taken_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                attempt.user_id,
                attempt.course_id,
                attempt.quiz_id,
                attempt.correct as i64,
                attempt.total as i64,
                attempt.percent,
                attempt.passed,
                attempt.reason.to_string(),
                attempt.elapsed_secs,
                attempt.taken_at.to_rfc3339(),
            ],
        )?;
        debug!(quiz_id = attempt.quiz_id, percent = attempt.percent, "attempt recorded");
        Ok(())
    }

    /// Attempts at a quiz, newest first
    pub fn for_quiz(&self, user_id: u32, quiz_id: u32) -> Result<Vec<AttemptRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id, course_id, quiz_id, correct, total, percent, passed, reason, elapsed_secs, taken_at
            FROM quiz_attempts
            WHERE user_id = ?1 AND quiz_id = ?2
            ORDER BY id DESC
            "#,
        )?;

        let rows = stmt.query_map([user_id, quiz_id], attempt_from_row)?;
        let mut attempts = Vec::new();
        for attempt in rows {
            attempts.push(attempt?);
        }
        Ok(attempts)
    }

    pub fn summary(&self, user_id: u32, quiz_id: u32) -> Result<Option<AttemptSummary>> {
        let (attempts, best, passed): (i64, Option<f64>, Option<bool>) = self.conn.query_row(
            r#"
            SELECT COUNT(*), MAX(percent), MAX(passed)
            FROM quiz_attempts
            WHERE user_id = ?1 AND quiz_id = ?2
            "#,
            [user_id, quiz_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        if attempts == 0 {
            return Ok(None);
        }
        Ok(Some(AttemptSummary {
            attempts: attempts as usize,
            best_percent: best.unwrap_or(0.0),
            ever_passed: passed.unwrap_or(false),
        }))
    }

    /// Writes every attempt as CSV, oldest first. Returns the row count.
    pub fn export_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id, course_id, quiz_id, correct, total, percent, passed, reason, elapsed_secs, taken_at
            FROM quiz_attempts
            ORDER BY id ASC
            "#,
        )?;

        let mut csv_writer = csv::Writer::from_writer(writer);
        let mut count = 0;
        for attempt in stmt.query_map([], attempt_from_row)? {
            csv_writer.serialize(attempt?)?;
            count += 1;
        }
        // an empty history still gets a header row
        if count == 0 {
            csv_writer.write_record([
                "user_id",
                "course_id",
                "quiz_id",
                "correct",
                "total",
                "percent",
                "passed",
                "reason",
                "elapsed_secs",
                "taken_at",
            ])?;
        }
        csv_writer.flush()?;
        Ok(count)
    }

    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM quiz_attempts", [])?;
        Ok(())
    }
}

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<AttemptRecord> {
    let reason: String = row.get(7)?;
    let reason = SubmitReason::from_db(&reason).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(7, "reason".to_string(), rusqlite::types::Type::Text)
    })?;
    let taken_at: String = row.get(9)?;
    let taken_at = DateTime::parse_from_rfc3339(&taken_at)
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(9, "taken_at".to_string(), rusqlite::types::Type::Text)
        })?
        .with_timezone(&Local);

    Ok(AttemptRecord {
        user_id: row.get(0)?,
        course_id: row.get(1)?,
        quiz_id: row.get(2)?,
        correct: row.get::<_, i64>(3)? as usize,
        total: row.get::<_, i64>(4)? as usize,
        percent: row.get(5)?,
        passed: row.get(6)?,
        reason,
        elapsed_secs: row.get(8)?,
        taken_at,
    })
}
