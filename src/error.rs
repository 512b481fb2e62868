use thiserror::Error;

/// Errors raised while loading quizzes and talking to the enrollment store
#[derive(Debug, Error)]
pub enum QuizError {
    /// Quiz or course missing. Shown as a full screen error with retry.
    #[error("{kind} with id {id} not found")]
    NotFound { kind: &'static str, id: u32 },

    #[error("user {user_id} is not enrolled in course {course_id}")]
    NotEnrolled { user_id: u32, course_id: u32 },

    /// Persisting an enrollment change failed. Never blocks showing a result.
    #[error("failed to update enrollment {id}: {reason}")]
    UpdateFailed { id: u32, reason: String },

    #[error("quiz {id} is invalid: {reason}")]
    InvalidQuiz { id: u32, reason: String },

    #[error("fixture {0} not found")]
    MissingFixture(String),

    #[error("unable to parse fixture {name}")]
    Fixture {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl QuizError {
    pub fn not_found(kind: &'static str, id: u32) -> Self {
        QuizError::NotFound { kind, id }
    }

    /// Whether reloading could plausibly fix the error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QuizError::NotFound { .. } | QuizError::Storage(_) | QuizError::Io(_)
        )
    }
}

pub type Result<T, E = QuizError> = std::result::Result<T, E>;
