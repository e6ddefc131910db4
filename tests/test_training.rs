//! Integration test: training pipeline end to end

use claimsight::data::{load_csv, DatasetStore};
use claimsight::model::{train, ModelArtifact, TrainConfig};
use claimsight::predict::{predict_claim, ClaimFeatures};

fn sample_csv(n: usize) -> String {
    let mut csv =
        String::from("age,bmi,gender,smoker,region,premium_annual_inr,claim_amount_inr\n");
    for i in 0..n {
        let age = 20 + (i % 40);
        let bmi = 19.0 + (i % 14) as f64;
        let gender = if i % 2 == 0 { "Male" } else { "Female" };
        let smoker = if i % 4 == 0 { "Yes" } else { "No" };
        let region = ["North", "South", "East", "West"][i % 4];
        let premium = 12000 + 800 * (i % 10);
        let claim = 4000 + 250 * age + if i % 4 == 0 { 20000 } else { 0 };
        csv.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            age, bmi, gender, smoker, region, premium, claim
        ));
    }
    csv
}

fn features() -> ClaimFeatures {
    ClaimFeatures {
        age: 30.0,
        bmi: 25.0,
        gender: "Male".to_string(),
        smoker: "No".to_string(),
        region: "North".to_string(),
        premium_annual_inr: Some(15000.0),
    }
}

#[test]
fn test_train_from_uploaded_csv_and_predict() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("data"));
    store
        .upload(sample_csv(100).as_bytes(), "claims.csv")
        .unwrap();

    let df = store.load_latest().unwrap();
    let artifact = train(&df, &TrainConfig::default().with_n_trees(20)).unwrap();

    assert_eq!(artifact.metadata.training_samples, 80);
    assert_eq!(artifact.metadata.test_samples, 20);
    // The synthetic target is strongly age-driven; a fitted forest must
    // explain most of the training variance.
    assert!(artifact.metadata.train_r2 > 0.5);

    let outcome = predict_claim(&artifact, &features()).unwrap();
    assert!(outcome.prediction >= 0.0);
    assert!((0.0..=1.0).contains(&outcome.confidence));
}

#[test]
fn test_training_is_deterministic_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("claims.csv");
    std::fs::write(&path, sample_csv(80)).unwrap();
    let df = load_csv(&path).unwrap();

    let config = TrainConfig::default().with_n_trees(15);
    let first = train(&df, &config).unwrap();
    let second = train(&df, &config).unwrap();

    assert_eq!(first.metadata.train_rmse, second.metadata.train_rmse);
    assert_eq!(first.metadata.test_rmse, second.metadata.test_rmse);
    assert_eq!(first.metadata.train_r2, second.metadata.train_r2);
    assert_eq!(first.metadata.test_r2, second.metadata.test_r2);

    let p1 = predict_claim(&first, &features()).unwrap();
    let p2 = predict_claim(&second, &features()).unwrap();
    assert_eq!(p1.prediction, p2.prediction);
    assert_eq!(p1.confidence, p2.confidence);
}

#[test]
fn test_different_seeds_may_differ_but_stay_valid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("claims.csv");
    std::fs::write(&path, sample_csv(80)).unwrap();
    let df = load_csv(&path).unwrap();

    let a = train(&df, &TrainConfig::default().with_n_trees(10).with_seed(1)).unwrap();
    let b = train(&df, &TrainConfig::default().with_n_trees(10).with_seed(2)).unwrap();

    for artifact in [&a, &b] {
        let outcome = predict_claim(artifact, &features()).unwrap();
        assert!(outcome.prediction >= 0.0);
        assert!((0.0..=1.0).contains(&outcome.confidence));
    }
}

#[test]
fn test_artifact_round_trip_preserves_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("data"));
    store
        .upload(sample_csv(60).as_bytes(), "claims.csv")
        .unwrap();

    let df = store.load_latest().unwrap();
    let artifact = train(&df, &TrainConfig::default().with_n_trees(10)).unwrap();
    let before = predict_claim(&artifact, &features()).unwrap();

    let models_dir = dir.path().join("models");
    artifact.save(&models_dir).unwrap();
    let reloaded = ModelArtifact::load(&models_dir).unwrap();
    let after = predict_claim(&reloaded, &features()).unwrap();

    assert_eq!(before.prediction, after.prediction);
    assert_eq!(before.confidence, after.confidence);
}
