use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::Question;
use crate::countdown::Countdown;
use crate::scorer::{score, Score};

pub const DEFAULT_PASSING_SCORE: u8 = 70;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub passing_score: u8,
    pub time_limit: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            passing_score: DEFAULT_PASSING_SCORE,
            time_limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubmitReason {
    Manual,
    TimeExpired,
}

impl SubmitReason {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(SubmitReason::Manual),
            "time_expired" => Some(SubmitReason::TimeExpired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizResult {
    pub score: Score,
    pub passing_score: u8,
    pub passed: bool,
    pub reason: SubmitReason,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    InProgress,
    Submitted(QuizResult),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("the quiz has no questions")]
    EmptyQuiz,
    #[error("the quiz has already been submitted")]
    AlreadySubmitted,
    #[error("question {index} does not exist, the quiz has {count}")]
    QuestionOutOfRange { index: usize, count: usize },
    #[error("option {option} does not exist for question {question}, it has {count}")]
    OptionOutOfRange {
        question: usize,
        option: usize,
        count: usize,
    },
    #[error("question {0} must be answered before moving on")]
    Unanswered(usize),
}

/// One attempt at a quiz
#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<Question>,
    config: SessionConfig,
    answers: BTreeMap<usize, usize>,
    current: usize,
    countdown: Option<Countdown>,
    elapsed: Duration,
    state: SessionState,
}

impl QuizSession {
    pub fn new(questions: Vec<Question>, config: SessionConfig) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::EmptyQuiz);
        }
        let countdown = config.time_limit.map(Countdown::new);
        Ok(Self {
            questions,
            config,
            answers: BTreeMap::new(),
            current: 0,
            countdown,
            elapsed: Duration::ZERO,
            state: SessionState::InProgress,
        })
    }

    pub fn select_answer(&mut self, question: usize, option: usize) -> Result<(), SessionError> {
        if self.is_submitted() {
            return Err(SessionError::AlreadySubmitted);
        }
        let count = self.questions.len();
        let q = self
            .questions
            .get(question)
            .ok_or(SessionError::QuestionOutOfRange {
                index: question,
                count,
            })?;
        if option >= q.option_count() {
            return Err(SessionError::OptionOutOfRange {
                question,
                option,
                count: q.option_count(),
            });
        }

        self.answers.insert(question, option);
        debug!(question, option, "answer selected");
        Ok(())
    }

    pub fn select_current(&mut self, option: usize) -> Result<(), SessionError> {
        self.select_answer(self.current, option)
    }

    /// Moves forward one question. Leaving an unanswered question is refused;
    /// on the last question this is a no-op.
    pub fn advance(&mut self) -> Result<usize, SessionError> {
        if self.current + 1 >= self.questions.len() {
            return Ok(self.current);
        }
        if !self.answers.contains_key(&self.current) {
            return Err(SessionError::Unanswered(self.current));
        }
        self.current += 1;
        Ok(self.current)
    }

    pub fn retreat(&mut self) -> usize {
        self.current = self.current.saturating_sub(1);
        self.current
    }

    /// Scores the session. Only the first call yields a result; later calls
    /// return `None` and leave the recorded result untouched.
    pub fn submit(&mut self, reason: SubmitReason) -> Option<QuizResult> {
        if self.is_submitted() {
            return None;
        }

        let score = score(&self.questions, &self.answers);
        let result = QuizResult {
            score,
            passing_score: self.config.passing_score,
            passed: score.passes(self.config.passing_score),
            reason,
            elapsed: self.elapsed,
        };
        info!(
            correct = score.correct,
            total = score.total,
            percent = score.percent,
            passed = result.passed,
            %reason,
            "quiz submitted"
        );
        self.state = SessionState::Submitted(result.clone());
        Some(result)
    }

    /// Advances the clock. Submits with `TimeExpired` once a configured
    /// time limit runs out.
    pub fn tick(&mut self, elapsed: Duration) -> Option<QuizResult> {
        if self.is_submitted() {
            return None;
        }
        self.elapsed += elapsed;

        let expired = self
            .countdown
            .as_mut()
            .map(|c| c.advance(elapsed))
            .unwrap_or(false);

        if expired {
            self.submit(SubmitReason::TimeExpired)
        } else {
            None
        }
    }

    pub fn retake(&mut self) {
        self.answers.clear();
        self.current = 0;
        self.elapsed = Duration::ZERO;
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.reset();
        }
        self.state = SessionState::InProgress;
        debug!("session reset for retake");
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> &Question {
        &self.questions[self.current]
    }

    pub fn is_last_question(&self) -> bool {
        self.current + 1 == self.questions.len()
    }

    pub fn answers(&self) -> &BTreeMap<usize, usize> {
        &self.answers
    }

    pub fn answer_for(&self, question: usize) -> Option<usize> {
        self.answers.get(&question).copied()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn all_answered(&self) -> bool {
        self.answers.len() == self.questions.len()
    }

    pub fn countdown(&self) -> Option<&Countdown> {
        self.countdown.as_ref()
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.countdown.map(|c| c.remaining())
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Position through the quiz, counting the current question as reached
    pub fn progress_percent(&self) -> f64 {
        ((self.current + 1) as f64 / self.questions.len() as f64) * 100.0
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.state, SessionState::Submitted(_))
    }

    pub fn result(&self) -> Option<&QuizResult> {
        match &self.state {
            SessionState::Submitted(result) => Some(result),
            SessionState::InProgress => None,
        }
    }
}
