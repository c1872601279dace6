use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use shared_database::JsonSnapshot;

use crate::error::LearnerError;
use crate::models::{FeatureVector, LearnerState, ModelSnapshot, TrainingExample, Urgency};
use crate::services::classifier::{LogisticRegression, ModelFamily, SuccessModel};

/// Probability returned while the learner has no usable model.
pub const DEFAULT_SUCCESS_PROBABILITY: f64 = 0.5;

const MIN_TRAINING_EXAMPLES: usize = 2;

/// What the booking engine needs from the learner: an estimate before booking
/// and a labeled outcome afterwards.
#[async_trait]
pub trait OutcomeTracker: Send + Sync {
    fn predict_success_probability(&self, moment: NaiveDateTime, urgency: Urgency) -> f64;
    async fn learn(&self, moment: NaiveDateTime, urgency: Urgency, success: bool);
}

/// Online learner over booking outcomes.
///
/// `learn` appends to the corpus and refits from scratch; the fitted model is
/// swapped in whole, so concurrent predictions see either the old or the new
/// model and never a partially trained one.
pub struct OutcomeLearner {
    family: Arc<dyn ModelFamily>,
    examples: Mutex<Vec<TrainingExample>>,
    model: RwLock<Option<Arc<dyn SuccessModel>>>,
    snapshot: Option<JsonSnapshot>,
}

impl OutcomeLearner {
    /// A learner that keeps its corpus in memory only.
    pub fn in_memory() -> Self {
        Self::with_family(Box::new(LogisticRegression::default()), None)
    }

    pub fn with_family(family: Box<dyn ModelFamily>, snapshot: Option<JsonSnapshot>) -> Self {
        Self {
            family: Arc::from(family),
            examples: Mutex::new(Vec::new()),
            model: RwLock::new(None),
            snapshot,
        }
    }

    /// Loads the durable corpus, if any, and refits before serving predictions.
    /// A missing or unreadable corpus starts the learner empty.
    pub async fn load(snapshot: JsonSnapshot) -> Self {
        Self::load_with_family(snapshot, Box::new(LogisticRegression::default())).await
    }

    pub async fn load_with_family(snapshot: JsonSnapshot, family: Box<dyn ModelFamily>) -> Self {
        let state = match snapshot.load::<LearnerState>().await {
            Ok(Some(state)) => state,
            Ok(None) => {
                info!("No training data at {}, starting empty", snapshot.path().display());
                LearnerState::default()
            }
            Err(e) => {
                error!("Error loading training data: {}", LearnerError::Persistence(e.to_string()));
                LearnerState::default()
            }
        };

        let learner = Self::with_family(family, Some(snapshot));
        let count = state.examples.len();
        if count >= MIN_TRAINING_EXAMPLES {
            let model = learner.fit(state.examples.clone()).await;
            learner.swap_model(model);
        }
        *learner.examples.lock().await = state.examples;

        info!("Outcome learner ready with {} training examples", count);
        learner
    }

    pub async fn example_count(&self) -> usize {
        self.examples.lock().await.len()
    }

    pub fn is_trained(&self) -> bool {
        self.current_model().is_some()
    }

    pub fn model_family(&self) -> &'static str {
        self.family.name()
    }

    fn current_model(&self) -> Option<Arc<dyn SuccessModel>> {
        match self.model.read() {
            Ok(guard) => guard.clone(),
            Err(_) => {
                warn!("Model lock poisoned, serving default probability");
                None
            }
        }
    }

    fn swap_model(&self, model: Option<Arc<dyn SuccessModel>>) {
        match self.model.write() {
            Ok(mut guard) => *guard = model,
            Err(poisoned) => *poisoned.into_inner() = model,
        }
    }

    /// Fits on the blocking pool so a growing corpus never stalls the async workers.
    async fn fit(&self, examples: Vec<TrainingExample>) -> Option<Arc<dyn SuccessModel>> {
        let family = self.family.clone();
        let count = examples.len();
        let fitted = tokio::task::spawn_blocking(move || family.fit(&examples))
            .await
            .map_err(|e| LearnerError::Fit(format!("fit task did not finish: {}", e)))
            .and_then(|result| result);

        match fitted {
            Ok(model) => {
                debug!("Refit {} model on {} examples", self.family.name(), count);
                Some(Arc::from(model))
            }
            Err(e) => {
                error!("Error fitting success model: {}", e);
                None
            }
        }
    }

    async fn persist(&self, examples: &[TrainingExample], model: Option<ModelSnapshot>) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };

        let state = LearnerState {
            examples: examples.to_vec(),
            model,
        };

        if let Err(e) = snapshot.save(&state).await {
            error!("Error saving training data: {}", LearnerError::Persistence(e.to_string()));
        }
    }
}

#[async_trait]
impl OutcomeTracker for OutcomeLearner {
    fn predict_success_probability(&self, moment: NaiveDateTime, urgency: Urgency) -> f64 {
        let Some(model) = self.current_model() else {
            return DEFAULT_SUCCESS_PROBABILITY;
        };

        let probability = model.predict_proba(&FeatureVector::from_moment(moment, urgency));
        if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            error!("Error predicting success probability: model returned {}", probability);
            DEFAULT_SUCCESS_PROBABILITY
        }
    }

    async fn learn(&self, moment: NaiveDateTime, urgency: Urgency, success: bool) {
        // Holding the corpus lock serialises refits and saves.
        let mut examples = self.examples.lock().await;
        examples.push(TrainingExample {
            features: FeatureVector::from_moment(moment, urgency),
            success,
        });

        debug!(
            "Learned {} outcome for {} (urgency {}), corpus size {}",
            if success { "successful" } else { "failed" },
            moment, urgency, examples.len()
        );

        if examples.len() < MIN_TRAINING_EXAMPLES {
            self.persist(&examples, None).await;
            return;
        }

        let model = self.fit(examples.clone()).await;
        let snapshot = model.as_ref().map(|m| m.snapshot());
        self.swap_model(model);
        self.persist(&examples, snapshot).await;
    }
}
