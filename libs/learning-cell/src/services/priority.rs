use chrono::{Duration, NaiveDateTime};
use tracing::{debug, error};

use crate::error::ScoringError;
use crate::models::{Prioritized, Urgency};

/// Relative weight of each ranking signal. The defaults sum to 1, keeping scores in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityWeights {
    pub urgency: f64,
    pub success_probability: f64,
    pub waiting_time: f64,
    pub preferred_time: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            urgency: 0.4,
            success_probability: 0.3,
            waiting_time: 0.2,
            preferred_time: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PriorityScorer {
    weights: PriorityWeights,
    wait_cap: Duration,
}

impl Default for PriorityScorer {
    fn default() -> Self {
        Self::new(PriorityWeights::default())
    }
}

impl PriorityScorer {
    pub fn new(weights: PriorityWeights) -> Self {
        Self {
            weights,
            wait_cap: Duration::days(7),
        }
    }

    pub fn weights(&self) -> &PriorityWeights {
        &self.weights
    }

    /// Weighted sum of normalised urgency, success probability, wait (capped
    /// at one week) and preferred-time match.
    pub fn score(
        &self,
        urgency: Urgency,
        success_probability: f64,
        waiting_time: Duration,
        is_preferred_time: bool,
    ) -> Result<f64, ScoringError> {
        if !(0.0..=1.0).contains(&success_probability) {
            return Err(ScoringError::InvalidProbability(success_probability));
        }

        // A request time in the future counts as no wait.
        let waited = waiting_time.max(Duration::zero());
        let normalized_waiting = (waited.num_seconds() as f64
            / self.wait_cap.num_seconds() as f64)
            .min(1.0);

        let score = self.weights.urgency * urgency.normalized()
            + self.weights.success_probability * success_probability
            + self.weights.waiting_time * normalized_waiting
            + self.weights.preferred_time * if is_preferred_time { 1.0 } else { 0.0 };

        Ok(score)
    }

    /// Scores every request against `now`, records the score on it and returns
    /// the batch ordered by descending score. Equal scores keep their input order.
    pub fn rank<T: Prioritized>(&self, requests: Vec<T>, now: NaiveDateTime) -> Vec<T> {
        let mut scored: Vec<(f64, T)> = requests
            .into_iter()
            .map(|mut request| {
                let waiting_time = now - request.request_time();
                let score = self
                    .score(
                        request.urgency(),
                        request.success_probability(),
                        waiting_time,
                        request.is_preferred_time(),
                    )
                    .unwrap_or_else(|e| {
                        error!("Error calculating priority score: {}", e);
                        0.0
                    });
                request.set_priority_score(score);
                (score, request)
            })
            .collect();

        // `sort_by` is stable.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        debug!("Ranked {} pending requests", scored.len());

        scored.into_iter().map(|(_, request)| request).collect()
    }
}
