// libs/learning-cell/src/models.rs
use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScoringError;

// ==============================================================================
// URGENCY
// ==============================================================================

/// Clinical urgency of a request, 1 (routine) to 5 (most urgent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Urgency(u8);

impl Urgency {
    pub const ROUTINE: Urgency = Urgency(1);
    pub const CRITICAL: Urgency = Urgency(5);

    pub fn new(value: u8) -> Result<Self, ScoringError> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ScoringError::InvalidUrgency(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Urgency scaled into (0, 1].
    pub fn normalized(self) -> f64 {
        f64::from(self.0) / 5.0
    }
}

impl Default for Urgency {
    fn default() -> Self {
        Self::ROUTINE
    }
}

impl TryFrom<u8> for Urgency {
    type Error = ScoringError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Urgency> for u8 {
    fn from(urgency: Urgency) -> Self {
        urgency.0
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ==============================================================================
// TRAINING DATA
// ==============================================================================

/// Features of one booking attempt: hour of day, weekday (Monday = 0), month, urgency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; 4]);

impl FeatureVector {
    pub const LEN: usize = 4;

    pub fn from_moment(moment: NaiveDateTime, urgency: Urgency) -> Self {
        Self([
            f64::from(moment.hour()),
            f64::from(moment.weekday().num_days_from_monday()),
            f64::from(moment.month()),
            f64::from(urgency.value()),
        ])
    }

    pub fn values(&self) -> &[f64; 4] {
        &self.0
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub features: FeatureVector,
    pub success: bool,
}

impl TrainingExample {
    pub fn label(&self) -> f64 {
        if self.success { 1.0 } else { 0.0 }
    }
}

/// Fitted parameters kept next to the corpus for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub family: String,
    pub trained_on: usize,
    pub parameters: Vec<f64>,
}

/// Durable learner state: the corpus plus the last fitted model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnerState {
    pub examples: Vec<TrainingExample>,
    #[serde(default)]
    pub model: Option<ModelSnapshot>,
}

// ==============================================================================
// PRIORITY RANKING
// ==============================================================================

/// Anything that can be ordered by the priority scorer.
pub trait Prioritized {
    fn urgency(&self) -> Urgency;
    fn success_probability(&self) -> f64;
    fn request_time(&self) -> NaiveDateTime;
    fn is_preferred_time(&self) -> bool;
    fn set_priority_score(&mut self, score: f64);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
    #[serde(default = "Uuid::new_v4")]
    pub request_id: Uuid,
    pub urgency: Urgency,
    pub success_probability: f64,
    pub request_time: NaiveDateTime,
    #[serde(default)]
    pub is_preferred_time: bool,
    #[serde(default)]
    pub priority_score: Option<f64>,
}

impl Prioritized for PendingRequest {
    fn urgency(&self) -> Urgency {
        self.urgency
    }

    fn success_probability(&self) -> f64 {
        self.success_probability
    }

    fn request_time(&self) -> NaiveDateTime {
        self.request_time
    }

    fn is_preferred_time(&self) -> bool {
        self.is_preferred_time
    }

    fn set_priority_score(&mut self, score: f64) {
        self.priority_score = Some(score);
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionQuery {
    pub moment: NaiveDateTime,
    #[serde(default)]
    pub urgency: Urgency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub moment: NaiveDateTime,
    pub urgency: Urgency,
    pub success: bool,
}
