//! Preprocessing + classification pipeline
//!
//! Column-wise preprocessing (one-hot categoricals, standard-scaled
//! numerics) feeding a logistic regression classifier from `linfa`. The
//! fitted pipeline, together with its [`ModelSchema`], is the single
//! artifact persisted to disk and reloaded at startup.

mod encoder;
mod scaler;

pub use encoder::OneHotEncoder;
pub use scaler::StandardScaler;

use crate::error::{ChurnError, Result};
use crate::schema::ModelSchema;
use linfa::prelude::*;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

const MAX_ITERATIONS: u64 = 1000;

/// Fitted preprocessing + classifier pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnPipeline {
    encoder: Option<OneHotEncoder>,
    scaler: Option<StandardScaler>,
    categorical_columns: Vec<String>,
    numerical_columns: Vec<String>,
    /// Design-matrix column order fixed at fit time: indicator columns
    /// first, then scaled numerics.
    design_columns: Vec<String>,
    model: Option<FittedLogisticRegression<f64, usize>>,
    /// Whether the model's raw probability output tracks class 1. linfa
    /// orients its internal positive label by the order classes appear in
    /// the targets, so this is learned at fit time.
    proba_is_class_one: bool,
    is_fitted: bool,
}

impl ChurnPipeline {
    pub fn new() -> Self {
        Self {
            encoder: None,
            scaler: None,
            categorical_columns: Vec::new(),
            numerical_columns: Vec::new(),
            design_columns: Vec::new(),
            model: None,
            proba_is_class_one: true,
            is_fitted: false,
        }
    }

    /// Fit the pipeline on a schema-validated training frame.
    ///
    /// `df` must contain the schema's feature columns with numericals
    /// already coerced to Float64 (the output of
    /// [`ModelSchema::validate_frame`]); `targets` are 0/1 class ids.
    pub fn fit(&mut self, df: &DataFrame, targets: &[usize], schema: &ModelSchema) -> Result<&mut Self> {
        self.categorical_columns = schema.categorical_columns.clone();
        self.numerical_columns = schema.numerical_columns.clone();

        if self.categorical_columns.is_empty() && self.numerical_columns.is_empty() {
            return Err(ChurnError::Training(
                "No features found for preprocessing".to_string(),
            ));
        }

        let mut transformed = df.clone();

        if !self.categorical_columns.is_empty() {
            let mut encoder = OneHotEncoder::new();
            transformed = encoder.fit_transform(&transformed, &self.categorical_columns)?;
            self.encoder = Some(encoder);
        }

        if !self.numerical_columns.is_empty() {
            let mut scaler = StandardScaler::new();
            transformed = scaler.fit_transform(&transformed, &self.numerical_columns)?;
            self.scaler = Some(scaler);
        }

        self.design_columns = self.build_design_columns();

        let x = Self::to_feature_array(&transformed, &self.design_columns)?;
        let y: Array1<usize> = Array1::from_vec(targets.to_vec());

        let dataset = Dataset::new(x, y);
        let model = LogisticRegression::default()
            .max_iterations(MAX_ITERATIONS)
            .fit(&dataset)
            .map_err(|e| ChurnError::Training(e.to_string()))?;

        let train_preds = model.predict(dataset.records()).to_vec();
        let train_probs = model.predict_probabilities(dataset.records()).to_vec();
        self.proba_is_class_one = probability_tracks_class_one(&train_preds, &train_probs);

        self.model = Some(model);
        self.is_fitted = true;
        Ok(self)
    }

    /// Predicted class id (0/1) per row of a validated frame.
    pub fn predict(&self, df: &DataFrame) -> Result<Vec<usize>> {
        let model = self.model.as_ref().ok_or(ChurnError::ModelNotFitted)?;
        let x = self.transform(df)?;
        Ok(model.predict(&x).to_vec())
    }

    /// Probability of the churn class (class id 1) per row.
    pub fn predict_proba(&self, df: &DataFrame) -> Result<Vec<f64>> {
        let model = self.model.as_ref().ok_or(ChurnError::ModelNotFitted)?;
        let x = self.transform(df)?;
        let probs = model.predict_probabilities(&x);
        Ok(probs
            .iter()
            .map(|&p| if self.proba_is_class_one { p } else { 1.0 - p })
            .collect())
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn model_type(&self) -> &'static str {
        "LogisticRegression"
    }

    /// Apply the fitted transformers and assemble the design matrix.
    fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ChurnError::ModelNotFitted);
        }

        let mut transformed = df.clone();
        if let Some(ref encoder) = self.encoder {
            transformed = encoder.transform(&transformed)?;
        }
        if let Some(ref scaler) = self.scaler {
            transformed = scaler.transform(&transformed)?;
        }

        Self::to_feature_array(&transformed, &self.design_columns)
    }

    fn build_design_columns(&self) -> Vec<String> {
        let mut columns = match &self.encoder {
            Some(encoder) => encoder.output_columns(),
            None => Vec::new(),
        };
        columns.extend(self.numerical_columns.iter().cloned());
        columns
    }

    /// Extract named columns into a row-major `Array2<f64>`. Nulls left
    /// after imputation-free preprocessing become 0.0.
    fn to_feature_array(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
        let n_rows = df.height();
        let n_cols = col_names.len();

        let col_data: Vec<Vec<f64>> = col_names
            .iter()
            .map(|col_name| {
                let column = df
                    .column(col_name)
                    .map_err(|_| ChurnError::FeatureNotFound(col_name.clone()))?;
                let casted = column
                    .as_materialized_series()
                    .cast(&DataType::Float64)
                    .map_err(|e| ChurnError::DataError(e.to_string()))?;
                let values: Vec<f64> = casted
                    .f64()
                    .map_err(|e| ChurnError::DataError(e.to_string()))?
                    .into_iter()
                    .map(|v| v.unwrap_or(0.0))
                    .collect();
                Ok(values)
            })
            .collect::<Result<Vec<Vec<f64>>>>()?;

        let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
        Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| {
            col_refs[c][r]
        }))
    }
}

impl Default for ChurnPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Determine whether raw model probabilities track class 1.
///
/// The decision rule predicts the model's positive label exactly when the
/// probability exceeds the threshold, so the most confident training row
/// reveals which class the probabilities describe.
fn probability_tracks_class_one(preds: &[usize], probs: &[f64]) -> bool {
    let mut best: Option<(usize, f64)> = None;
    for (&pred, &prob) in preds.iter().zip(probs.iter()) {
        let margin = (prob - 0.5).abs();
        if best.map_or(true, |(_, p)| margin > (p - 0.5f64).abs()) {
            best = Some((pred, prob));
        }
    }
    match best {
        Some((pred, prob)) if prob > 0.5 => pred == 1,
        Some((pred, _)) => pred == 0,
        None => true,
    }
}

/// Everything `/train` persists: the preprocessing contract plus the fitted
/// pipeline, as one JSON blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema: ModelSchema,
    pub pipeline: ChurnPipeline,
}

impl ModelArtifact {
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let artifact: Self = serde_json::from_str(&json)?;
        Ok(artifact)
    }
}
