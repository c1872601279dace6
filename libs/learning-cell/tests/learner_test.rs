use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveDateTime};

use learning_cell::*;
use shared_database::JsonSnapshot;

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn urgency(value: u8) -> Urgency {
    Urgency::new(value).unwrap()
}

async fn train_morning_success_afternoon_failure(learner: &OutcomeLearner) {
    for i in 0..20 {
        learner.learn(at(2 + i % 5, 9), urgency(5), true).await;
        learner.learn(at(2 + i % 5, 16), urgency(1), false).await;
    }
}

#[tokio::test]
async fn untrained_learner_returns_default_probability() {
    let learner = OutcomeLearner::in_memory();

    for (hour, u) in [(9, 1), (13, 3), (16, 5)] {
        assert_eq!(learner.predict_success_probability(at(3, hour), urgency(u)), 0.5);
    }
    assert!(!learner.is_trained());
}

#[tokio::test]
async fn single_example_still_returns_default_probability() {
    let learner = OutcomeLearner::in_memory();
    learner.learn(at(3, 9), urgency(5), true).await;

    assert_eq!(learner.example_count().await, 1);
    assert_eq!(learner.predict_success_probability(at(3, 9), urgency(5)), 0.5);
    assert_eq!(learner.predict_success_probability(at(4, 16), urgency(1)), 0.5);
}

#[tokio::test]
async fn learning_updates_prediction() {
    let learner = OutcomeLearner::in_memory();
    train_morning_success_afternoon_failure(&learner).await;

    let morning = learner.predict_success_probability(at(10, 9), urgency(5));
    let afternoon = learner.predict_success_probability(at(10, 16), urgency(1));

    assert!(learner.is_trained());
    assert!(
        morning > afternoon,
        "expected morning ({}) to beat afternoon ({})",
        morning, afternoon
    );
    assert!((0.0..=1.0).contains(&morning));
    assert!((0.0..=1.0).contains(&afternoon));
}

#[tokio::test]
async fn corpus_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("training_data.json");

    let learner = OutcomeLearner::load(JsonSnapshot::new(&path)).await;
    train_morning_success_afternoon_failure(&learner).await;
    let before = learner.predict_success_probability(at(10, 9), urgency(5));
    drop(learner);

    let restored = OutcomeLearner::load(JsonSnapshot::new(&path)).await;
    assert_eq!(restored.example_count().await, 40);
    assert!(restored.is_trained());

    let after = restored.predict_success_probability(at(10, 9), urgency(5));
    assert!((before - after).abs() < 1e-9);

    let state: LearnerState = JsonSnapshot::new(&path).load().await.unwrap().unwrap();
    assert_eq!(state.examples.len(), 40);
    assert_eq!(state.model.unwrap().trained_on, 40);
}

#[tokio::test]
async fn unreadable_corpus_degrades_to_empty_learner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("training_data.json");
    std::fs::write(&path, b"[[[ definitely not json").unwrap();

    let learner = OutcomeLearner::load(JsonSnapshot::new(&path)).await;

    assert_eq!(learner.example_count().await, 0);
    assert_eq!(learner.predict_success_probability(at(3, 9), urgency(5)), 0.5);
}

#[test]
fn logistic_family_fits_smallest_corpus() {
    let examples = [
        TrainingExample { features: FeatureVector::from_moment(at(3, 9), urgency(2)), success: true },
        TrainingExample { features: FeatureVector::from_moment(at(3, 16), urgency(2)), success: false },
    ];

    let snapshot = LogisticRegression::default().fit(&examples).map(|model| model.snapshot());

    assert_matches!(snapshot, Ok(ModelSnapshot { trained_on: 2, .. }));
}

struct FailingFamily;

impl ModelFamily for FailingFamily {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn fit(&self, _examples: &[TrainingExample]) -> Result<Box<dyn SuccessModel>, LearnerError> {
        Err(LearnerError::Fit("solver exploded".to_string()))
    }
}

#[tokio::test]
async fn fit_failure_degrades_to_default_probability() {
    let learner = OutcomeLearner::with_family(Box::new(FailingFamily), None);
    train_morning_success_afternoon_failure(&learner).await;

    assert_eq!(learner.example_count().await, 40);
    assert!(!learner.is_trained());
    assert_eq!(learner.predict_success_probability(at(10, 9), urgency(5)), 0.5);
}

struct PanickingFamily;

impl ModelFamily for PanickingFamily {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn fit(&self, _examples: &[TrainingExample]) -> Result<Box<dyn SuccessModel>, LearnerError> {
        panic!("solver crashed");
    }
}

#[tokio::test]
async fn panicking_fit_keeps_the_learner_serving() {
    let learner = OutcomeLearner::with_family(Box::new(PanickingFamily), None);
    train_morning_success_afternoon_failure(&learner).await;

    assert_eq!(learner.example_count().await, 40);
    assert!(!learner.is_trained());
    assert_eq!(learner.predict_success_probability(at(10, 9), urgency(5)), 0.5);
}

#[tokio::test]
async fn predictions_during_concurrent_learning_stay_valid() {
    let learner = Arc::new(OutcomeLearner::in_memory());

    let writer = {
        let learner = learner.clone();
        tokio::spawn(async move {
            train_morning_success_afternoon_failure(&learner).await;
        })
    };

    for _ in 0..200 {
        let p = learner.predict_success_probability(at(10, 9), urgency(5));
        assert!((0.0..=1.0).contains(&p));
        tokio::task::yield_now().await;
    }

    writer.await.unwrap();
    assert_eq!(learner.example_count().await, 40);
}
