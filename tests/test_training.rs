//! Integration test: Full training flow (load → schema → fit → persist → reload)

use churn_api::pipeline::ModelArtifact;
use churn_api::training::train_model;
use polars::prelude::*;
use std::path::PathBuf;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("churn-api-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// 40 balanced rows: churners are older and hold fewer products.
fn write_training_csv(path: &std::path::Path) {
    let mut csv = String::from("CustomerId,Geography,CreditScore,Age,NumOfProducts,Exited\n");
    for i in 0..40 {
        let exited = i % 2;
        let geography = if i % 4 < 2 { "France" } else { "Germany" };
        let age = if exited == 1 { 50 + i } else { 20 + i };
        let products = if exited == 1 { 1 } else { 2 };
        let score = 550.0 + i as f64 * 5.0;
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            1000 + i,
            geography,
            score,
            age,
            products,
            exited
        ));
    }
    std::fs::write(path, csv).unwrap();
}

#[test]
fn test_train_model_end_to_end() {
    let dir = temp_dir("train-e2e");
    let data_path = dir.join("train.csv");
    let model_path = dir.join("model.json");
    write_training_csv(&data_path);

    let outcome = train_model(&data_path, None, &model_path).unwrap();

    let schema = &outcome.artifact.schema;
    assert_eq!(schema.target_column, "Exited");
    // id-like columns and the target are not features
    assert!(!schema.feature_columns.contains(&"CustomerId".to_string()));
    assert!(!schema.feature_columns.contains(&"Exited".to_string()));
    // wide integer range stays numerical, low-cardinality ints go categorical
    assert!(schema.numerical_columns.contains(&"Age".to_string()));
    assert!(schema.numerical_columns.contains(&"CreditScore".to_string()));
    assert!(schema.categorical_columns.contains(&"Geography".to_string()));
    assert!(schema.categorical_columns.contains(&"NumOfProducts".to_string()));

    // the data is separable on Age, metrics should reflect that
    let m = &outcome.metrics;
    assert!(m.accuracy > 0.7, "accuracy too low: {}", m.accuracy);
    assert!(m.roc_auc > 0.7, "roc_auc too low: {}", m.roc_auc);
    assert_eq!(m.n_samples, 40);

    assert!(model_path.exists());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_explicit_target_is_honored() {
    let dir = temp_dir("train-target");
    let data_path = dir.join("train.csv");
    let model_path = dir.join("model.json");
    write_training_csv(&data_path);

    let outcome = train_model(&data_path, Some("Exited"), &model_path).unwrap();
    assert_eq!(outcome.artifact.schema.target_column, "Exited");

    let err = train_model(&data_path, Some("DoesNotExist"), &model_path);
    assert!(err.is_err());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_persisted_artifact_predicts_after_reload() {
    let dir = temp_dir("train-reload");
    let data_path = dir.join("train.csv");
    let model_path = dir.join("model.json");
    write_training_csv(&data_path);

    train_model(&data_path, None, &model_path).unwrap();
    let artifact = ModelArtifact::load(&model_path).unwrap();

    let input = df!(
        "Geography" => &["France"],
        "CreditScore" => &[600.0],
        "Age" => &[62i64],
        "NumOfProducts" => &[1i64]
    )
    .unwrap();

    let validated = artifact.schema.validate_frame(&input).unwrap();
    let preds = artifact.pipeline.predict(&validated).unwrap();
    let probas = artifact.pipeline.predict_proba(&validated).unwrap();

    assert_eq!(preds.len(), 1);
    assert!(preds[0] == 0 || preds[0] == 1);
    assert!(probas[0] >= 0.0 && probas[0] <= 1.0);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_schema_fields_shape() {
    let dir = temp_dir("train-fields");
    let data_path = dir.join("train.csv");
    let model_path = dir.join("model.json");
    write_training_csv(&data_path);

    let outcome = train_model(&data_path, None, &model_path).unwrap();
    let fields = outcome.artifact.schema.fields();

    assert_eq!(fields.len(), outcome.artifact.schema.feature_columns.len());
    for field in &fields {
        match field.field_type.as_str() {
            "categorical" => assert!(field.values.is_some()),
            "number" => assert!(field.values.is_none()),
            other => panic!("unexpected field type: {}", other),
        }
    }
    std::fs::remove_dir_all(&dir).ok();
}
