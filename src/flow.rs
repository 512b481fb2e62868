use std::time::Duration;
use tracing::{info, warn};

use crate::attempts::{AttemptLog, AttemptRecord, AttemptSummary};
use crate::catalog::{Catalog, Course, Quiz};
use crate::enrollment::{Enrollment, EnrollmentStore};
use crate::error::{QuizError, Result};
use crate::session::{QuizResult, QuizSession, SessionConfig, SubmitReason};

pub const NOTICE_TTL: Duration = Duration::from_secs(5);

pub const PASSED_MESSAGE: &str = "Quiz passed!";
pub const COMPLETED_MESSAGE: &str = "Quiz completed. You can retake it to improve your score.";
pub const SAVE_FAILED_MESSAGE: &str = "Failed to save quiz results.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// Transient message shown over the results
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub remaining: Duration,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            remaining: NOTICE_TTL,
        }
    }
}

/// Which quiz to take, and as whom
#[derive(Debug, Clone, PartialEq)]
pub struct QuizRequest {
    pub user_id: u32,
    pub course_id: u32,
    pub quiz_id: u32,
    pub default_passing_score: u8,
}

/// Collaborators that outlive a single quiz flow
pub struct Services {
    pub enrollments: Box<dyn EnrollmentStore>,
    pub attempts: Option<AttemptLog>,
}

impl Services {
    pub fn new(enrollments: Box<dyn EnrollmentStore>, attempts: Option<AttemptLog>) -> Self {
        Self {
            enrollments,
            attempts,
        }
    }
}

/// A quiz being taken by an enrolled user
#[derive(Debug)]
pub struct QuizFlow {
    request: QuizRequest,
    course: Course,
    quiz: Quiz,
    lesson_count: usize,
    enrollment: Enrollment,
    session: QuizSession,
    notices: Vec<Notice>,
    summary: Option<AttemptSummary>,
}

impl QuizFlow {
    pub fn load(catalog: &Catalog, services: &Services, request: &QuizRequest) -> Result<Self> {
        let quiz = catalog.get_quiz_by_id(request.quiz_id)?;
        if quiz.course_id != request.course_id {
            return Err(QuizError::not_found("quiz", request.quiz_id));
        }
        let course = catalog.get_course_by_id(request.course_id)?.clone();
        let enrollment = services
            .enrollments
            .get_for_user(request.user_id, request.course_id)?;
        let lesson_count = catalog.lessons_for_course(request.course_id).len();

        let config = SessionConfig {
            passing_score: quiz.passing_score_or(request.default_passing_score),
            time_limit: quiz.time_limit(),
        };
        let session = QuizSession::new(quiz.questions.clone(), config).map_err(|e| {
            QuizError::InvalidQuiz {
                id: quiz.id,
                reason: e.to_string(),
            }
        })?;

        let summary = load_summary(services, request);

        info!(
            user_id = request.user_id,
            course_id = request.course_id,
            quiz_id = request.quiz_id,
            questions = quiz.question_count(),
            "quiz loaded"
        );

        Ok(Self {
            request: request.clone(),
            course,
            quiz,
            lesson_count,
            enrollment,
            session,
            notices: Vec::new(),
            summary,
        })
    }

    /// Submits the session. Returns the result only on the first submission.
    pub fn submit(&mut self, reason: SubmitReason, services: &mut Services) -> Option<QuizResult> {
        let result = self.session.submit(reason)?;
        self.on_submitted(&result, services);
        Some(result)
    }

    /// Advances the countdown and notice timers. Returns a result when the
    /// countdown expired and forced a submission.
    pub fn tick(&mut self, elapsed: Duration, services: &mut Services) -> Option<QuizResult> {
        for notice in &mut self.notices {
            notice.remaining = notice.remaining.saturating_sub(elapsed);
        }
        self.notices.retain(|n| !n.remaining.is_zero());

        let result = self.session.tick(elapsed)?;
        self.on_submitted(&result, services);
        Some(result)
    }

    pub fn retake(&mut self) {
        info!(quiz_id = self.quiz.id, "retaking quiz");
        self.session.retake();
        self.notices.clear();
    }

    fn on_submitted(&mut self, result: &QuizResult, services: &mut Services) {
        if result.passed {
            match self.mark_completed(services) {
                Ok(_) => self.notify(NoticeLevel::Success, PASSED_MESSAGE),
                Err(err) => {
                    warn!(error = %err, "could not persist quiz completion");
                    self.notify(NoticeLevel::Error, SAVE_FAILED_MESSAGE);
                }
            }
        } else {
            self.notify(NoticeLevel::Info, COMPLETED_MESSAGE);
        }

        self.record_attempt(result, services);
    }

    /// Adds the quiz to the enrollment's completed lessons. Returns whether
    /// an update was needed.
    fn mark_completed(&mut self, services: &mut Services) -> Result<bool> {
        if self.enrollment.has_completed(self.quiz.id) {
            return Ok(false);
        }
        let patch = self
            .enrollment
            .completion_patch(self.quiz.id, self.lesson_count);
        let updated = services.enrollments.update(self.enrollment.id, &patch)?;
        info!(
            enrollment_id = updated.id,
            progress = updated.progress,
            "quiz marked completed"
        );
        self.enrollment = updated;
        Ok(true)
    }

    fn record_attempt(&mut self, result: &QuizResult, services: &Services) {
        let Some(log) = services.attempts.as_ref() else {
            return;
        };
        let record = AttemptRecord::from_result(
            self.request.user_id,
            self.request.course_id,
            self.quiz.id,
            result,
        );
        if let Err(err) = log.record(&record) {
            warn!(error = %err, "could not record quiz attempt");
            return;
        }
        self.summary = load_summary(services, &self.request);
    }

    fn notify(&mut self, level: NoticeLevel, message: &str) {
        self.notices.push(Notice::new(level, message));
    }

    pub fn request(&self) -> &QuizRequest {
        &self.request
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn lesson_count(&self) -> usize {
        self.lesson_count
    }

    pub fn enrollment(&self) -> &Enrollment {
        &self.enrollment
    }

    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut QuizSession {
        &mut self.session
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn summary(&self) -> Option<&AttemptSummary> {
        self.summary.as_ref()
    }
}

fn load_summary(services: &Services, request: &QuizRequest) -> Option<AttemptSummary> {
    let log = services.attempts.as_ref()?;
    match log.summary(request.user_id, request.quiz_id) {
        Ok(summary) => summary,
        Err(err) => {
            warn!(error = %err, "could not load attempt history");
            None
        }
    }
}
