//! HTTP request handlers

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::Cursor;
use tracing::info;

use crate::error::ChurnError;
use crate::training::{self, ModelMetrics};

use super::error::{Result, ServerError};
use super::state::AppState;

// ============================================================================
// Liveness
// ============================================================================

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Churn Analysis API is running",
        "status": "healthy",
    }))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let model_loaded = state.model.read().await.is_some();
    Json(json!({
        "status": "healthy",
        "model_loaded": model_loaded,
    }))
}

// ============================================================================
// Schema
// ============================================================================

pub async fn get_schema(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    if state.model.read().await.is_none() {
        // a persisted artifact that exists but cannot be read is a server
        // fault, not a missing model
        state
            .load_persisted_model()
            .await
            .map_err(|e| ServerError::Internal(format!("Unable to load schema: {}", e)))?;
    }

    let guard = state.model.read().await;
    let artifact = guard.as_ref().ok_or_else(|| {
        ServerError::BadRequest("Schema not available. Train the model first.".to_string())
    })?;

    Ok(Json(json!({
        "target": artifact.schema.target_column,
        "fields": artifact.schema.fields(),
    })))
}

// ============================================================================
// Training
// ============================================================================

#[derive(Deserialize)]
pub struct TrainQuery {
    target: Option<String>,
}

#[derive(Serialize)]
pub struct TrainingResponse {
    pub message: String,
    pub metrics: ModelMetrics,
    pub target_column: String,
    pub feature_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub numerical_columns: Vec<String>,
}

pub async fn train(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrainQuery>,
) -> Result<Json<TrainingResponse>> {
    let data_path = PathBuf::from(&state.config.data_path);
    if !data_path.exists() {
        return Err(ServerError::NotFound(format!(
            "Data file not found. Please ensure {} exists.",
            data_path.display()
        )));
    }

    let model_path = state.model_path();
    let target = query.target.clone();

    // Training is CPU-bound; keep it off the async workers.
    let outcome = tokio::task::spawn_blocking(move || {
        training::train_model(&data_path, target.as_deref(), &model_path)
    })
    .await
    .map_err(|e| ServerError::Internal(format!("Training task failed: {}", e)))??;

    let schema = outcome.artifact.schema.clone();
    *state.model.write().await = Some(outcome.artifact);
    info!(target = %schema.target_column, "Model swapped into serving state");

    Ok(Json(TrainingResponse {
        message: "Model trained successfully".to_string(),
        metrics: outcome.metrics,
        target_column: schema.target_column,
        feature_columns: schema.feature_columns,
        categorical_columns: schema.categorical_columns,
        numerical_columns: schema.numerical_columns,
    }))
}

// ============================================================================
// Prediction
// ============================================================================

#[derive(Serialize)]
pub struct PredictionResponse {
    pub prediction: i64,
    pub probability: f64,
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(input): Json<serde_json::Map<String, Value>>,
) -> Result<Json<PredictionResponse>> {
    let guard = state.model.read().await;
    let artifact = guard.as_ref().ok_or(ChurnError::ModelNotFitted)?;

    let df = json_row_to_frame(&input)?;
    let validated = artifact.schema.validate_frame(&df)?;

    let prediction = artifact.pipeline.predict(&validated)?[0] as i64;
    let probability = artifact.pipeline.predict_proba(&validated)?[0];

    Ok(Json(PredictionResponse {
        prediction,
        probability,
    }))
}

pub async fn predict_batch(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response> {
    let guard = state.model.read().await;
    let artifact = guard.as_ref().ok_or(ChurnError::ModelNotFitted)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        let file_name = field.file_name().unwrap_or("data.csv").to_string();
        if !file_name.ends_with(".csv") {
            return Err(ServerError::BadRequest(
                "File must be a CSV file. Please upload a .csv file.".to_string(),
            ));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;
        info!(file = %file_name, bytes = data.len(), "Received batch prediction CSV");

        let df = CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .into_reader_with_file_handle(Cursor::new(&data))
            .finish()?;

        if df.height() == 0 {
            return Err(ServerError::BadRequest(
                "CSV contains no data rows".to_string(),
            ));
        }

        let validated = artifact.schema.validate_frame(&df)?;
        let predictions = artifact.pipeline.predict(&validated)?;
        let probabilities = artifact.pipeline.predict_proba(&validated)?;

        // Keep the caller's columns (extras included) and append results
        let mut out = df.clone();
        let preds: Vec<i64> = predictions.iter().map(|&p| p as i64).collect();
        out.with_column(Series::new("Prediction".into(), preds))?;
        out.with_column(Series::new("Probability".into(), probabilities))?;

        let mut buf = Vec::new();
        CsvWriter::new(&mut buf)
            .include_header(true)
            .finish(&mut out)?;

        let disposition = format!("attachment; filename=predictions_{}", file_name);
        return Ok((
            StatusCode::OK,
            [
                (
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/csv; charset=utf-8"),
                ),
                (
                    header::CONTENT_DISPOSITION,
                    HeaderValue::from_str(&disposition)
                        .map_err(|e| ServerError::Internal(format!("Invalid header: {}", e)))?,
                ),
            ],
            buf,
        )
            .into_response());
    }

    Err(ServerError::BadRequest("No file uploaded".to_string()))
}

// ============================================================================
// Model info
// ============================================================================

pub async fn get_model_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let guard = state.model.read().await;
    match guard.as_ref() {
        Some(artifact) => Json(json!({
            "target_column": artifact.schema.target_column,
            "feature_columns": artifact.schema.feature_columns,
            "categorical_columns": artifact.schema.categorical_columns,
            "numerical_columns": artifact.schema.numerical_columns,
            "model_type": artifact.pipeline.model_type(),
        })),
        None => Json(json!({ "error": "Model not trained" })),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Build a one-row dataframe from a JSON object of feature -> value.
///
/// Integral numbers become Int64 columns so integer-coded categoricals
/// stringify the same way they did in the training CSV.
fn json_row_to_frame(input: &serde_json::Map<String, Value>) -> Result<DataFrame> {
    if input.is_empty() {
        return Err(ServerError::BadRequest(
            "Input object is empty".to_string(),
        ));
    }

    let mut columns: Vec<Column> = Vec::with_capacity(input.len());
    for (name, value) in input {
        let series = match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Series::new(name.as_str().into(), vec![i])
                } else {
                    let f = n.as_f64().unwrap_or(f64::NAN);
                    // 2.0 for an integer-coded categorical must stringify to
                    // the "2" recorded at fit time
                    if f.is_finite()
                        && f.fract() == 0.0
                        && f > i64::MIN as f64
                        && f < i64::MAX as f64
                    {
                        Series::new(name.as_str().into(), vec![f as i64])
                    } else {
                        Series::new(name.as_str().into(), vec![f])
                    }
                }
            }
            Value::String(s) => Series::new(name.as_str().into(), vec![s.as_str()]),
            Value::Bool(b) => Series::new(name.as_str().into(), vec![b.to_string()]),
            Value::Null => Series::new(name.as_str().into(), vec![None::<f64>]),
            _ => {
                return Err(ServerError::BadRequest(format!(
                    "Field '{}' must be a scalar value",
                    name
                )))
            }
        };
        columns.push(series.into());
    }

    DataFrame::new(columns).map_err(ServerError::Polars)
}
