use thiserror::Error;

/// Failures inside the outcome learner. None of these reach callers of the
/// prediction interface; they are logged and the learner falls back to its default.
#[derive(Error, Debug)]
pub enum LearnerError {
    #[error("Not enough training examples: {available} available, {required} required")]
    InsufficientData { available: usize, required: usize },

    #[error("Model fit failed: {0}")]
    Fit(String),

    #[error("Training data persistence failed: {0}")]
    Persistence(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Urgency must be between 1 and 5, got {0}")]
    InvalidUrgency(u8),

    #[error("Success probability must be within [0, 1], got {0}")]
    InvalidProbability(f64),
}
