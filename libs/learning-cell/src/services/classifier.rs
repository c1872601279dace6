use tracing::debug;

use crate::error::LearnerError;
use crate::models::{FeatureVector, ModelSnapshot, TrainingExample};

const MIN_EXAMPLES: usize = 2;

/// A fitted model: maps a feature vector to the probability of a successful booking.
pub trait SuccessModel: Send + Sync {
    fn predict_proba(&self, features: &FeatureVector) -> f64;
    fn snapshot(&self) -> ModelSnapshot;
}

/// A model family that can be fitted on demand from a labeled corpus.
pub trait ModelFamily: Send + Sync {
    fn name(&self) -> &'static str;
    fn fit(&self, examples: &[TrainingExample]) -> Result<Box<dyn SuccessModel>, LearnerError>;
}

/// L2-regularised logistic regression over standardised features, fitted with
/// full-batch gradient descent.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2_penalty: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            epochs: 800,
            learning_rate: 0.5,
            l2_penalty: 1e-3,
        }
    }
}

#[derive(Debug, Clone)]
struct LogisticModel {
    means: [f64; FeatureVector::LEN],
    scales: [f64; FeatureVector::LEN],
    weights: [f64; FeatureVector::LEN],
    bias: f64,
    trained_on: usize,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticModel {
    fn standardize(&self, features: &FeatureVector) -> [f64; FeatureVector::LEN] {
        let mut out = [0.0; FeatureVector::LEN];
        for (i, value) in features.values().iter().enumerate() {
            out[i] = (value - self.means[i]) / self.scales[i];
        }
        out
    }

    fn logit(&self, x: &[f64; FeatureVector::LEN]) -> f64 {
        self.bias + self.weights.iter().zip(x).map(|(w, v)| w * v).sum::<f64>()
    }
}

impl SuccessModel for LogisticModel {
    fn predict_proba(&self, features: &FeatureVector) -> f64 {
        sigmoid(self.logit(&self.standardize(features)))
    }

    fn snapshot(&self) -> ModelSnapshot {
        let mut parameters = Vec::with_capacity(3 * FeatureVector::LEN + 1);
        parameters.extend_from_slice(&self.means);
        parameters.extend_from_slice(&self.scales);
        parameters.extend_from_slice(&self.weights);
        parameters.push(self.bias);

        ModelSnapshot {
            family: "logistic_regression".to_string(),
            trained_on: self.trained_on,
            parameters,
        }
    }
}

impl ModelFamily for LogisticRegression {
    fn name(&self) -> &'static str {
        "logistic_regression"
    }

    fn fit(&self, examples: &[TrainingExample]) -> Result<Box<dyn SuccessModel>, LearnerError> {
        if examples.len() < MIN_EXAMPLES {
            return Err(LearnerError::InsufficientData {
                available: examples.len(),
                required: MIN_EXAMPLES,
            });
        }
        if let Some(bad) = examples.iter().position(|e| !e.features.is_finite()) {
            return Err(LearnerError::Fit(format!("example {} has non-finite features", bad)));
        }

        let n = examples.len() as f64;
        let mut means = [0.0; FeatureVector::LEN];
        for example in examples {
            for (i, value) in example.features.values().iter().enumerate() {
                means[i] += value / n;
            }
        }

        let mut scales = [0.0; FeatureVector::LEN];
        for example in examples {
            for (i, value) in example.features.values().iter().enumerate() {
                scales[i] += (value - means[i]).powi(2) / n;
            }
        }
        for scale in scales.iter_mut() {
            *scale = scale.sqrt();
            // Constant features contribute nothing; keep them centred at zero.
            if *scale < 1e-9 {
                *scale = 1.0;
            }
        }

        let mut model = LogisticModel {
            means,
            scales,
            weights: [0.0; FeatureVector::LEN],
            bias: 0.0,
            trained_on: examples.len(),
        };

        let standardized: Vec<([f64; FeatureVector::LEN], f64)> = examples
            .iter()
            .map(|e| (model.standardize(&e.features), e.label()))
            .collect();

        for _ in 0..self.epochs {
            let mut grad_w = [0.0; FeatureVector::LEN];
            let mut grad_b = 0.0;

            for (x, y) in &standardized {
                let error = sigmoid(model.logit(x)) - y;
                for (g, v) in grad_w.iter_mut().zip(x) {
                    *g += error * v / n;
                }
                grad_b += error / n;
            }

            for (w, g) in model.weights.iter_mut().zip(grad_w) {
                *w -= self.learning_rate * (g + self.l2_penalty * *w);
            }
            model.bias -= self.learning_rate * grad_b;
        }

        if !model.bias.is_finite() || model.weights.iter().any(|w| !w.is_finite()) {
            return Err(LearnerError::Fit("gradient descent diverged".to_string()));
        }

        debug!(
            "Fitted logistic model on {} examples: weights={:?} bias={:.4}",
            examples.len(), model.weights, model.bias
        );

        Ok(Box::new(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(hour: f64, urgency: f64, success: bool) -> TrainingExample {
        TrainingExample {
            features: FeatureVector([hour, 2.0, 6.0, urgency]),
            success,
        }
    }

    #[test]
    fn refuses_to_fit_a_single_example() {
        let result = LogisticRegression::default().fit(&[example(9.0, 5.0, true)]);
        assert!(matches!(
            result,
            Err(LearnerError::InsufficientData { available: 1, required: 2 })
        ));
    }

    #[test]
    fn separates_two_clusters() {
        let mut examples = Vec::new();
        for _ in 0..10 {
            examples.push(example(9.0, 5.0, true));
            examples.push(example(16.0, 1.0, false));
        }

        let model = LogisticRegression::default().fit(&examples).unwrap();
        let good = model.predict_proba(&FeatureVector([9.0, 2.0, 6.0, 5.0]));
        let bad = model.predict_proba(&FeatureVector([16.0, 2.0, 6.0, 1.0]));

        assert!(good > 0.8, "expected high probability, got {}", good);
        assert!(bad < 0.2, "expected low probability, got {}", bad);
    }

    #[test]
    fn single_class_corpus_still_fits() {
        let examples = vec![example(9.0, 1.0, true), example(10.0, 2.0, true)];
        let model = LogisticRegression::default().fit(&examples).unwrap();
        let p = model.predict_proba(&FeatureVector([9.5, 2.0, 6.0, 1.0]));
        assert!(p > 0.5 && p <= 1.0);
    }

    #[test]
    fn rejects_non_finite_features() {
        let examples = vec![example(f64::NAN, 1.0, true), example(10.0, 2.0, false)];
        assert!(matches!(
            LogisticRegression::default().fit(&examples),
            Err(LearnerError::Fit(_))
        ));
    }

    #[test]
    fn snapshot_carries_all_parameters() {
        let examples = vec![example(9.0, 1.0, true), example(15.0, 2.0, false)];
        let snapshot = LogisticRegression::default().fit(&examples).unwrap().snapshot();
        assert_eq!(snapshot.family, "logistic_regression");
        assert_eq!(snapshot.trained_on, 2);
        assert_eq!(snapshot.parameters.len(), 13);
    }
}
