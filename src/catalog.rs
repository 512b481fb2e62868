use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{QuizError, Result};
use crate::fixtures;

/// A single multiple choice question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "question")]
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    /// Optional explanation per option, aligned with `options`
    #[serde(default)]
    pub explanations: Option<Vec<Option<String>>>,
}

impl Question {
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_answer
    }

    pub fn explanation(&self, option: usize) -> Option<&str> {
        self.explanations.as_ref()?.get(option)?.as_deref()
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.options.len() < 2 {
            return Err(format!("\"{}\" needs at least two options", self.prompt));
        }
        if self.correct_answer >= self.options.len() {
            return Err(format!(
                "\"{}\" marks option {} correct but only has {}",
                self.prompt,
                self.correct_answer,
                self.options.len()
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LessonKind {
    Video,
    Article,
    Quiz,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(rename = "Id")]
    pub id: u32,
    pub course_id: u32,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: LessonKind,
    pub order: u32,
    /// Minutes
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub passing_score: Option<u8>,
    /// Minutes
    #[serde(default)]
    pub time_limit: Option<u32>,
}

impl Lesson {
    pub fn is_quiz(&self) -> bool {
        self.kind == LessonKind::Quiz
    }

    pub fn as_quiz(&self) -> Option<Quiz> {
        if !self.is_quiz() {
            return None;
        }
        Some(Quiz {
            id: self.id,
            course_id: self.course_id,
            title: self.title.clone(),
            questions: self.questions.clone(),
            passing_score: self.passing_score,
            time_limit_minutes: self.time_limit,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(rename = "Id")]
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub instructor: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub level: String,
}

/// A quiz lesson with everything a session needs
#[derive(Debug, Clone, PartialEq)]
pub struct Quiz {
    pub id: u32,
    pub course_id: u32,
    pub title: String,
    pub questions: Vec<Question>,
    pub passing_score: Option<u8>,
    pub time_limit_minutes: Option<u32>,
}

impl Quiz {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// A missing or zero passing score falls back to `default`
    pub fn passing_score_or(&self, default: u8) -> u8 {
        self.passing_score
            .filter(|p| *p > 0)
            .unwrap_or(default)
            .min(100)
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_minutes
            .filter(|m| *m > 0)
            .map(|m| Duration::from_secs(u64::from(m) * 60))
    }
}

/// Read-only store of courses and lessons
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    courses: Vec<Course>,
    lessons: Vec<Lesson>,
}

impl Catalog {
    pub fn new(courses: Vec<Course>, lessons: Vec<Lesson>) -> Result<Self> {
        let catalog = Self { courses, lessons };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Catalog compiled into the binary
    pub fn embedded() -> Result<Self> {
        let courses = fixtures::read_embedded(fixtures::COURSES)?;
        let lessons = fixtures::read_embedded(fixtures::LESSONS)?;
        Self::new(courses, lessons)
    }

    /// Catalog read from `courses.json` and `lessons.json` in `dir`
    pub fn from_dir(dir: &Path) -> Result<Self> {
        info!(dir = %dir.display(), "loading catalog");
        let courses = fixtures::read_from_dir(dir, fixtures::COURSES)?;
        let lessons = fixtures::read_from_dir(dir, fixtures::LESSONS)?;
        Self::new(courses, lessons)
    }

    fn validate(&self) -> Result<()> {
        for lesson in self.lessons.iter().filter(|l| l.is_quiz()) {
            if lesson.questions.is_empty() {
                return Err(QuizError::InvalidQuiz {
                    id: lesson.id,
                    reason: "no questions".to_string(),
                });
            }
            for question in &lesson.questions {
                question.validate().map_err(|reason| QuizError::InvalidQuiz {
                    id: lesson.id,
                    reason,
                })?;
            }
        }
        debug!(
            courses = self.courses.len(),
            lessons = self.lessons.len(),
            "catalog validated"
        );
        Ok(())
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn get_course_by_id(&self, id: u32) -> Result<&Course> {
        self.courses
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| QuizError::not_found("course", id))
    }

    /// Looks up a quiz lesson. Lessons of any other kind count as missing.
    pub fn get_quiz_by_id(&self, id: u32) -> Result<Quiz> {
        self.lessons
            .iter()
            .find(|l| l.id == id)
            .and_then(Lesson::as_quiz)
            .ok_or_else(|| QuizError::not_found("quiz", id))
    }

    /// Lessons of a course in display order
    pub fn lessons_for_course(&self, course_id: u32) -> Vec<&Lesson> {
        self.lessons
            .iter()
            .filter(|l| l.course_id == course_id)
            .sorted_by_key(|l| l.order)
            .collect()
    }

    pub fn quizzes_for_course(&self, course_id: u32) -> Vec<&Lesson> {
        self.lessons_for_course(course_id)
            .into_iter()
            .filter(|l| l.is_quiz())
            .collect()
    }

    pub fn first_quiz(&self) -> Option<&Lesson> {
        self.courses
            .iter()
            .flat_map(|c| self.quizzes_for_course(c.id))
            .next()
    }
}
