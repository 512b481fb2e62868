use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{QuizError, Result};
use crate::fixtures;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    #[serde(rename = "Id")]
    pub id: u32,
    pub user_id: u32,
    pub course_id: u32,
    #[serde(default)]
    pub completed_lessons: BTreeSet<u32>,
    /// Percent of the course's lessons completed
    #[serde(default)]
    pub progress: f64,
    pub enrolled_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    pub fn has_completed(&self, lesson_id: u32) -> bool {
        self.completed_lessons.contains(&lesson_id)
    }

    /// Patch adding `lesson_id` to the completed set with progress recomputed
    /// against the course's lesson count
    pub fn completion_patch(&self, lesson_id: u32, lesson_count: usize) -> EnrollmentPatch {
        let mut completed = self.completed_lessons.clone();
        completed.insert(lesson_id);
        let progress = if lesson_count == 0 {
            100.0
        } else {
            ((completed.len() as f64 / lesson_count as f64) * 100.0).min(100.0)
        };
        EnrollmentPatch {
            completed_lessons: Some(completed),
            progress: Some(progress),
        }
    }

    fn apply(&mut self, patch: &EnrollmentPatch, now: DateTime<Utc>) {
        if let Some(completed) = &patch.completed_lessons {
            self.completed_lessons = completed.clone();
        }
        if let Some(progress) = patch.progress {
            self.progress = progress;
        }
        self.updated_at = Some(now);
    }
}

/// Partial update for an enrollment; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrollmentPatch {
    pub completed_lessons: Option<BTreeSet<u32>>,
    pub progress: Option<f64>,
}

/// Records of which users are enrolled in which courses and what they completed
pub trait EnrollmentStore {
    /// `QuizError::NotEnrolled` when the user has no enrollment in the course
    fn get_for_user(&self, user_id: u32, course_id: u32) -> Result<Enrollment>;
    /// `QuizError::UpdateFailed` when the enrollment is missing or cannot be written
    fn update(&mut self, id: u32, patch: &EnrollmentPatch) -> Result<Enrollment>;
    /// Enrolls the user, returning the existing enrollment if there is one
    fn create(&mut self, user_id: u32, course_id: u32) -> Result<Enrollment>;
}

/// Enrollments shipped with the catalog, optionally overridden by a catalog dir
pub fn fixture_enrollments(dir: Option<&Path>) -> Result<Vec<Enrollment>> {
    match dir {
        Some(dir) if dir.join(fixtures::ENROLLMENTS).exists() => {
            fixtures::read_from_dir(dir, fixtures::ENROLLMENTS)
        }
        Some(_) => Ok(vec![]),
        None => fixtures::read_embedded(fixtures::ENROLLMENTS),
    }
}

/// In-process store
#[derive(Debug, Clone, Default)]
pub struct MemoryEnrollmentStore {
    enrollments: Vec<Enrollment>,
}

impl MemoryEnrollmentStore {
    pub fn new(enrollments: Vec<Enrollment>) -> Self {
        Self { enrollments }
    }

    pub fn all(&self) -> &[Enrollment] {
        &self.enrollments
    }
}

impl EnrollmentStore for MemoryEnrollmentStore {
    fn get_for_user(&self, user_id: u32, course_id: u32) -> Result<Enrollment> {
        self.enrollments
            .iter()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
            .cloned()
            .ok_or(QuizError::NotEnrolled { user_id, course_id })
    }

    fn update(&mut self, id: u32, patch: &EnrollmentPatch) -> Result<Enrollment> {
        let enrollment = self
            .enrollments
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| QuizError::UpdateFailed {
                id,
                reason: "enrollment not found".to_string(),
            })?;
        enrollment.apply(patch, Utc::now());
        Ok(enrollment.clone())
    }

    fn create(&mut self, user_id: u32, course_id: u32) -> Result<Enrollment> {
        if let Ok(existing) = self.get_for_user(user_id, course_id) {
            return Ok(existing);
        }
        let id = self.enrollments.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        let enrollment = Enrollment {
            id,
            user_id,
            course_id,
            completed_lessons: BTreeSet::new(),
            progress: 0.0,
            enrolled_at: Utc::now(),
            updated_at: None,
        };
        self.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }
}

const ENROLLMENT_COLUMNS: &str =
    "id, user_id, course_id, completed_lessons, progress, enrolled_at, updated_at";

/// SQLite backed store
#[derive(Debug)]
pub struct SqliteEnrollmentStore {
    conn: Connection,
}

impl SqliteEnrollmentStore {
    /// Opens (creating if needed) the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened enrollment store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS enrollments (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                course_id INTEGER NOT NULL,
                completed_lessons TEXT NOT NULL DEFAULT '[]',
                progress REAL NOT NULL DEFAULT 0,
                enrolled_at TEXT NOT NULL,
                updated_at TEXT,
                UNIQUE(user_id, course_id)
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }

    /// Inserts `enrollments` only when the table is empty.
    /// Returns the number of rows written.
    pub fn seed(&mut self, enrollments: &[Enrollment]) -> Result<usize> {
        let existing: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM enrollments", [], |row| row.get(0))?;
        if existing > 0 {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        for enrollment in enrollments {
            tx.execute(
                &format!("INSERT INTO enrollments ({ENROLLMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    enrollment.id,
                    enrollment.user_id,
                    enrollment.course_id,
                    encode_lessons(&enrollment.completed_lessons),
                    enrollment.progress,
                    enrollment.enrolled_at.to_rfc3339(),
                    enrollment.updated_at.map(|t| t.to_rfc3339()),
                ],
            )?;
        }
        tx.commit()?;
        debug!(count = enrollments.len(), "seeded enrollments");
        Ok(enrollments.len())
    }

    fn find_by_id(&self, id: u32) -> Result<Option<Enrollment>> {
        let enrollment = self
            .conn
            .query_row(
                &format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = ?1"),
                [id],
                enrollment_from_row,
            )
            .optional()?;
        Ok(enrollment)
    }

    fn write(&self, enrollment: &Enrollment) -> Result<()> {
        self.conn.execute(
            "UPDATE enrollments SET completed_lessons = ?1, progress = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                encode_lessons(&enrollment.completed_lessons),
                enrollment.progress,
                enrollment.updated_at.map(|t| t.to_rfc3339()),
                enrollment.id,
            ],
        )?;
        Ok(())
    }
}

impl EnrollmentStore for SqliteEnrollmentStore {
    fn get_for_user(&self, user_id: u32, course_id: u32) -> Result<Enrollment> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE user_id = ?1 AND course_id = ?2"
                ),
                [user_id, course_id],
                enrollment_from_row,
            )
            .optional()?
            .ok_or(QuizError::NotEnrolled { user_id, course_id })
    }

    fn update(&mut self, id: u32, patch: &EnrollmentPatch) -> Result<Enrollment> {
        let update_failed = |reason: String| QuizError::UpdateFailed { id, reason };

        let mut enrollment = self
            .find_by_id(id)
            .map_err(|e| update_failed(e.to_string()))?
            .ok_or_else(|| update_failed("enrollment not found".to_string()))?;

        enrollment.apply(patch, Utc::now());
        self.write(&enrollment).map_err(|e| {
            warn!(id, error = %e, "enrollment write failed");
            update_failed(e.to_string())
        })?;
        Ok(enrollment)
    }

    fn create(&mut self, user_id: u32, course_id: u32) -> Result<Enrollment> {
        if let Ok(existing) = self.get_for_user(user_id, course_id) {
            return Ok(existing);
        }
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO enrollments (user_id, course_id, enrolled_at) VALUES (?1, ?2, ?3)",
            params![user_id, course_id, now.to_rfc3339()],
        )?;
        info!(user_id, course_id, "created enrollment");
        self.get_for_user(user_id, course_id)
    }
}

fn encode_lessons(lessons: &BTreeSet<u32>) -> String {
    serde_json::to_string(lessons).unwrap_or_else(|_| "[]".to_string())
}

fn parse_timestamp(value: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                idx,
                "timestamp".to_string(),
                rusqlite::types::Type::Text,
            )
        })
}

fn enrollment_from_row(row: &Row<'_>) -> rusqlite::Result<Enrollment> {
    let lessons: String = row.get(3)?;
    let completed_lessons = serde_json::from_str(&lessons).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let enrolled_at: String = row.get(5)?;
    let updated_at: Option<String> = row.get(6)?;

    Ok(Enrollment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        course_id: row.get(2)?,
        completed_lessons,
        progress: row.get(4)?,
        enrolled_at: parse_timestamp(&enrolled_at, 5)?,
        updated_at: updated_at
            .as_deref()
            .map(|t| parse_timestamp(t, 6))
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    fn enrollment(id: u32, user_id: u32, course_id: u32, completed: &[u32]) -> Enrollment {
        Enrollment {
            id,
            user_id,
            course_id,
            completed_lessons: completed.iter().copied().collect(),
            progress: 0.0,
            enrolled_at: Utc::now(),
            updated_at: None,
        }
    }

    fn seeded_sqlite() -> SqliteEnrollmentStore {
        let mut store = SqliteEnrollmentStore::open_in_memory().unwrap();
        store
            .seed(&[enrollment(1, 1, 1, &[1, 2]), enrollment(2, 1, 2, &[])])
            .unwrap();
        store
    }

    #[test]
    fn test_completion_patch_recomputes_progress() {
        let e = enrollment(1, 1, 1, &[1, 2]);
        let patch = e.completion_patch(3, 4);
        assert_eq!(
            patch.completed_lessons,
            Some([1, 2, 3].into_iter().collect::<BTreeSet<u32>>())
        );
        assert_eq!(patch.progress, Some(75.0));
    }

    #[test]
    fn test_completion_patch_is_set_semantics() {
        let e = enrollment(1, 1, 1, &[1, 2]);
        let patch = e.completion_patch(2, 4);
        assert_eq!(patch.completed_lessons.map(|c| c.len()), Some(2));
        assert_eq!(patch.progress, Some(50.0));
    }

    #[test]
    fn test_fixture_enrollments_embedded() {
        let enrollments = fixture_enrollments(None).unwrap();
        assert!(enrollments
            .iter()
            .any(|e| e.user_id == 1 && e.course_id == 1 && e.has_completed(2)));
    }

    #[test]
    fn test_memory_store_get_and_update() {
        let mut store = MemoryEnrollmentStore::new(vec![enrollment(1, 1, 1, &[])]);
        let e = store.get_for_user(1, 1).unwrap();
        let updated = store.update(e.id, &e.completion_patch(5, 2)).unwrap();
        assert!(updated.has_completed(5));
        assert_eq!(updated.progress, 50.0);
        assert!(updated.updated_at.is_some());
        assert_eq!(store.get_for_user(1, 1).unwrap(), updated);
    }

    #[test]
    fn test_memory_store_not_enrolled() {
        let store = MemoryEnrollmentStore::default();
        assert_matches!(
            store.get_for_user(1, 9),
            Err(QuizError::NotEnrolled { user_id: 1, course_id: 9 })
        );
    }

    #[test]
    fn test_memory_store_update_missing() {
        let mut store = MemoryEnrollmentStore::default();
        assert_matches!(
            store.update(4, &EnrollmentPatch::default()),
            Err(QuizError::UpdateFailed { id: 4, .. })
        );
    }

    #[test]
    fn test_memory_store_create_assigns_next_id() {
        let mut store = MemoryEnrollmentStore::new(vec![enrollment(7, 1, 1, &[])]);
        let created = store.create(2, 3).unwrap();
        assert_eq!(created.id, 8);
        assert_eq!(store.create(2, 3).unwrap().id, 8);
        assert_eq!(store.all().len(), 2);
    }

    #[test]
    fn test_sqlite_get_for_user() {
        let store = seeded_sqlite();
        let e = store.get_for_user(1, 1).unwrap();
        assert_eq!(e.id, 1);
        assert_eq!(e.completed_lessons, [1, 2].into_iter().collect::<BTreeSet<u32>>());
        assert_matches!(
            store.get_for_user(3, 1),
            Err(QuizError::NotEnrolled { user_id: 3, course_id: 1 })
        );
    }

    #[test]
    fn test_sqlite_seed_only_once() {
        let mut store = seeded_sqlite();
        assert_eq!(store.seed(&[enrollment(9, 9, 9, &[])]).unwrap(), 0);
        assert_matches!(store.get_for_user(9, 9), Err(QuizError::NotEnrolled { .. }));
    }

    #[test]
    fn test_sqlite_update_persists() {
        let mut store = seeded_sqlite();
        let e = store.get_for_user(1, 1).unwrap();
        store.update(e.id, &e.completion_patch(3, 4)).unwrap();

        let reloaded = store.get_for_user(1, 1).unwrap();
        assert!(reloaded.has_completed(3));
        assert_eq!(reloaded.progress, 75.0);
        assert!(reloaded.updated_at.is_some());
    }

    #[test]
    fn test_sqlite_update_missing_is_update_failed() {
        let mut store = seeded_sqlite();
        assert_matches!(
            store.update(99, &EnrollmentPatch::default()),
            Err(QuizError::UpdateFailed { id: 99, .. })
        );
    }

    #[test]
    fn test_sqlite_create() {
        let mut store = seeded_sqlite();
        let created = store.create(5, 3).unwrap();
        assert_eq!(created.user_id, 5);
        assert!(created.completed_lessons.is_empty());
        assert_eq!(store.create(5, 3).unwrap().id, created.id);
    }

    #[test]
    fn test_sqlite_file_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("tenta.db");
        {
            let mut store = SqliteEnrollmentStore::open(&path).unwrap();
            store.seed(&[enrollment(1, 1, 1, &[])]).unwrap();
            store.update(1, &EnrollmentPatch {
                completed_lessons: Some([4].into_iter().collect()),
                progress: Some(25.0),
            })
            .unwrap();
        }
        let store = SqliteEnrollmentStore::open(&path).unwrap();
        assert!(store.get_for_user(1, 1).unwrap().has_completed(4));
    }
}
