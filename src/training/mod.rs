//! Model training
//!
//! Loads the training CSV, derives the schema, fits the preprocessing +
//! classification pipeline on a deterministic 80/20 split, scores the
//! held-out rows, and persists the artifact.

mod metrics;

pub use metrics::{ConfusionMatrix, ModelMetrics};

use crate::error::{ChurnError, Result};
use crate::pipeline::{ChurnPipeline, ModelArtifact};
use crate::schema::ModelSchema;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;
use std::time::Instant;
use tracing::info;

const TEST_FRACTION: f64 = 0.2;
const SPLIT_SEED: u64 = 42;

/// The result of a training run: the persisted artifact plus its metrics.
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub metrics: ModelMetrics,
}

/// Train a churn model from `data_path` and persist it to `model_path`.
pub fn train_model(
    data_path: &Path,
    target: Option<&str>,
    model_path: &Path,
) -> Result<TrainingOutcome> {
    let start = Instant::now();

    let df = read_csv(data_path)?;
    info!(
        rows = df.height(),
        columns = df.width(),
        path = %data_path.display(),
        "Loaded training dataset"
    );

    let schema = ModelSchema::detect(&df, target)?;
    info!(
        target = %schema.target_column,
        numerical = schema.numerical_columns.len(),
        categorical = schema.categorical_columns.len(),
        "Schema detected"
    );

    let features = df
        .select(schema.feature_columns.iter().map(|s| s.as_str()))
        .map_err(|e| ChurnError::DataError(e.to_string()))?;
    let features = schema.validate_frame(&features)?;

    let target_series = df
        .column(&schema.target_column)
        .map_err(|_| ChurnError::FeatureNotFound(schema.target_column.clone()))?
        .as_materialized_series();
    let targets = schema.encode_target(target_series)?;

    let (train_idx, test_idx) = split_indices(&targets)?;
    let features_train = take_rows(&features, &train_idx)?;
    let features_test = take_rows(&features, &test_idx)?;
    let y_train: Vec<usize> = train_idx.iter().map(|&i| targets[i as usize]).collect();
    let y_test: Vec<usize> = test_idx.iter().map(|&i| targets[i as usize]).collect();

    let mut pipeline = ChurnPipeline::new();
    pipeline.fit(&features_train, &y_train, &schema)?;

    let y_pred = pipeline.predict(&features_test)?;
    let y_proba = pipeline.predict_proba(&features_test)?;

    let mut metrics = ModelMetrics::compute(&y_test, &y_pred, &y_proba);
    metrics.training_time_secs = start.elapsed().as_secs_f64();
    metrics.n_samples = features.height();
    metrics.n_features = features.width();

    let artifact = ModelArtifact { schema, pipeline };
    artifact.save(model_path)?;
    info!(
        path = %model_path.display(),
        accuracy = metrics.accuracy,
        roc_auc = metrics.roc_auc,
        elapsed_secs = metrics.training_time_secs,
        "Model trained and persisted"
    );

    Ok(TrainingOutcome { artifact, metrics })
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| ChurnError::DataError(e.to_string()))?
        .finish()
        .map_err(|e| ChurnError::DataError(e.to_string()))?;
    Ok(df)
}

/// Seeded, class-stratified 80/20 split of row indices.
///
/// Each class is shuffled and cut separately, so the train split always
/// keeps every class; a class with a single row goes entirely to train.
fn split_indices(targets: &[usize]) -> Result<(Vec<u32>, Vec<u32>)> {
    let n = targets.len();
    if n < 2 {
        return Err(ChurnError::Training(format!(
            "Not enough rows to split: {}",
            n
        )));
    }

    let mut classes: Vec<usize> = targets.to_vec();
    classes.sort_unstable();
    classes.dedup();

    let mut rng = StdRng::seed_from_u64(SPLIT_SEED);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in classes {
        let mut indices: Vec<u32> = targets
            .iter()
            .enumerate()
            .filter(|(_, &t)| t == class)
            .map(|(i, _)| i as u32)
            .collect();
        indices.shuffle(&mut rng);

        let n_test = if indices.len() > 1 {
            ((indices.len() as f64 * TEST_FRACTION).ceil() as usize).min(indices.len() - 1)
        } else {
            0
        };
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    Ok((train, test))
}

fn take_rows(df: &DataFrame, indices: &[u32]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec("idx".into(), indices.to_vec());
    df.take(&idx)
        .map_err(|e| ChurnError::DataError(e.to_string()))
}
