//! Schema inference and request validation
//!
//! This is the contract that ties training and inference together: at train
//! time the dataset's columns are classified as numerical or categorical and
//! a target column is derived; at inference time every inbound frame is
//! checked and coerced against the persisted schema before it reaches the
//! pipeline.

use crate::error::{ChurnError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::warn;

/// Target column names probed, in order, when no explicit target is given.
const TARGET_CANDIDATES: &[&str] = &["Churn", "Exited", "churn", "target"];

/// Integer columns with at most this many distinct non-null values are
/// reclassified as categorical.
const LOW_CARDINALITY_LIMIT: usize = 10;

/// Column role for preprocessing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Numerical,
    Categorical,
}

/// One entry of the `/schema` response
#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

/// The persisted preprocessing contract.
///
/// Feature order is the dataframe column order observed at fit time and is
/// the order used for every later validation and encoding step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSchema {
    pub target_column: String,
    pub feature_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub numerical_columns: Vec<String>,
    /// Sorted, stringified, null-free value lists per categorical column.
    pub categorical_values: HashMap<String, Vec<String>>,
    /// The two target labels, sorted; index in this list is the class id.
    pub classes: Vec<String>,
}

impl ModelSchema {
    /// Derive the full schema from a training dataframe.
    pub fn detect(df: &DataFrame, target_param: Option<&str>) -> Result<Self> {
        let target_column = detect_target_column(df, target_param)?;
        let feature_columns = select_feature_columns(df, &target_column);
        if feature_columns.is_empty() {
            return Err(ChurnError::SchemaError(
                "No feature columns found for preprocessing".to_string(),
            ));
        }

        let (numerical_columns, categorical_columns) =
            detect_column_types(df, &feature_columns)?;

        let mut categorical_values = HashMap::new();
        for col_name in &categorical_columns {
            let column = df
                .column(col_name)
                .map_err(|_| ChurnError::FeatureNotFound(col_name.clone()))?;
            let values = distinct_string_values(column.as_materialized_series())?;
            categorical_values.insert(col_name.clone(), values);
        }

        let target = df
            .column(&target_column)
            .map_err(|_| ChurnError::FeatureNotFound(target_column.clone()))?;
        let classes = distinct_string_values(target.as_materialized_series())?;
        if classes.len() != 2 {
            return Err(ChurnError::SchemaError(format!(
                "Target column '{}' must be binary, found {} distinct values",
                target_column,
                classes.len()
            )));
        }

        Ok(Self {
            target_column,
            feature_columns,
            categorical_columns,
            numerical_columns,
            categorical_values,
            classes,
        })
    }

    /// Field descriptions in feature order, for the `/schema` endpoint.
    pub fn fields(&self) -> Vec<FieldSpec> {
        self.feature_columns
            .iter()
            .map(|name| {
                if self.categorical_columns.contains(name) {
                    FieldSpec {
                        name: name.clone(),
                        field_type: "categorical".to_string(),
                        values: Some(
                            self.categorical_values
                                .get(name)
                                .cloned()
                                .unwrap_or_default(),
                        ),
                    }
                } else {
                    FieldSpec {
                        name: name.clone(),
                        field_type: "number".to_string(),
                        values: None,
                    }
                }
            })
            .collect()
    }

    /// Map raw target values to class ids (0/1) using the stored labels.
    pub fn encode_target(&self, series: &Series) -> Result<Vec<usize>> {
        let stringified = series
            .cast(&DataType::String)
            .map_err(|e| ChurnError::DataError(e.to_string()))?;
        let ca = stringified
            .str()
            .map_err(|e| ChurnError::DataError(e.to_string()))?;

        ca.into_iter()
            .map(|opt| match opt {
                Some(v) => self
                    .classes
                    .iter()
                    .position(|c| c == v)
                    .ok_or_else(|| {
                        ChurnError::DataError(format!(
                            "Unknown target value '{}', expected one of {:?}",
                            v, self.classes
                        ))
                    }),
                None => Err(ChurnError::DataError(
                    "Target column contains null values".to_string(),
                )),
            })
            .collect()
    }

    /// Enforce the schema on an inbound frame.
    ///
    /// Missing required columns fail, extra columns are dropped with a
    /// warning, columns are reordered to the schema's feature order, and
    /// numerical columns are coerced to `Float64` (rejecting values that do
    /// not parse). Categorical columns pass through untouched; values unseen
    /// at fit time are handled later by the encoder.
    pub fn validate_frame(&self, df: &DataFrame) -> Result<DataFrame> {
        let present: HashSet<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let missing: Vec<&str> = self
            .feature_columns
            .iter()
            .filter(|c| !present.contains(c.as_str()))
            .map(|c| c.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(ChurnError::ValidationError(format!(
                "Missing required columns: {:?}. Input must include all required fields: {:?}",
                missing, self.feature_columns
            )));
        }

        let known: HashSet<&str> = self.feature_columns.iter().map(|c| c.as_str()).collect();
        let extra: Vec<&String> = present
            .iter()
            .filter(|c| !known.contains(c.as_str()))
            .collect();
        if !extra.is_empty() {
            warn!(columns = ?extra, "Ignoring extra columns in prediction input");
        }

        let mut selected = df
            .select(self.feature_columns.iter().map(|s| s.as_str()))
            .map_err(|e| ChurnError::DataError(e.to_string()))?;

        for col_name in &self.numerical_columns {
            let column = selected
                .column(col_name)
                .map_err(|_| ChurnError::FeatureNotFound(col_name.clone()))?;
            let coerced = coerce_numeric(column.as_materialized_series(), col_name)?;
            selected
                .with_column(coerced)
                .map_err(|e| ChurnError::DataError(e.to_string()))?;
        }

        Ok(selected)
    }
}

/// Pick the target column: explicit parameter wins (but must exist), then
/// the conventional names are probed in order.
pub fn detect_target_column(df: &DataFrame, target_param: Option<&str>) -> Result<String> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    if let Some(param) = target_param {
        if names.iter().any(|n| n.as_str() == param) {
            return Ok(param.to_string());
        }
        return Err(ChurnError::SchemaError(format!(
            "Target column '{}' not found in dataset",
            param
        )));
    }

    for candidate in TARGET_CANDIDATES {
        if names.iter().any(|n| n.as_str() == *candidate) {
            return Ok(candidate.to_string());
        }
    }

    Err(ChurnError::SchemaError(
        "No target column found. Please specify with ?target= parameter".to_string(),
    ))
}

/// All columns except the target and identifier-like columns.
pub fn select_feature_columns(df: &DataFrame, target_column: &str) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .filter(|name| name.as_str() != target_column && !name.to_lowercase().ends_with("id"))
        .collect()
}

/// Classify feature columns as numerical or categorical.
///
/// Non-numeric dtypes are categorical. Integer columns with few distinct
/// values are reclassified as categorical (encoded flags, counts of
/// products, and the like). Everything else numeric stays numerical.
pub fn detect_column_types(
    df: &DataFrame,
    feature_cols: &[String],
) -> Result<(Vec<String>, Vec<String>)> {
    let mut numerical = Vec::new();
    let mut categorical = Vec::new();

    for col_name in feature_cols {
        let column = df
            .column(col_name)
            .map_err(|_| ChurnError::FeatureNotFound(col_name.clone()))?;
        let series = column.as_materialized_series();
        let dtype = series.dtype();

        if is_numeric_dtype(dtype) {
            if is_integer_dtype(dtype)
                && distinct_non_null_count(series)? <= LOW_CARDINALITY_LIMIT
            {
                categorical.push(col_name.clone());
            } else {
                numerical.push(col_name.clone());
            }
        } else {
            categorical.push(col_name.clone());
        }
    }

    Ok((numerical, categorical))
}

fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    is_integer_dtype(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64)
}

fn distinct_non_null_count(series: &Series) -> Result<usize> {
    let n = series
        .n_unique()
        .map_err(|e| ChurnError::DataError(e.to_string()))?;
    // n_unique counts null as its own group
    if series.null_count() > 0 {
        Ok(n.saturating_sub(1))
    } else {
        Ok(n)
    }
}

/// Sorted, stringified, null-free distinct values of a series.
fn distinct_string_values(series: &Series) -> Result<Vec<String>> {
    let stringified = series
        .cast(&DataType::String)
        .map_err(|e| ChurnError::DataError(e.to_string()))?;
    let ca = stringified
        .str()
        .map_err(|e| ChurnError::DataError(e.to_string()))?;

    let values: BTreeSet<String> = ca
        .into_iter()
        .flatten()
        .map(|s| s.to_string())
        .collect();
    Ok(values.into_iter().collect())
}

/// Cast a column to `Float64`, parsing string values and rejecting anything
/// that is not a number.
fn coerce_numeric(series: &Series, col_name: &str) -> Result<Series> {
    let dtype = series.dtype();

    if is_numeric_dtype(dtype) {
        return series
            .cast(&DataType::Float64)
            .map_err(|e| ChurnError::DataError(e.to_string()));
    }

    if matches!(dtype, DataType::String) {
        let ca = series
            .str()
            .map_err(|e| ChurnError::DataError(e.to_string()))?;
        let parsed: Float64Chunked = ca
            .into_iter()
            .map(|opt| match opt {
                Some(raw) => {
                    let trimmed = raw.trim();
                    if trimmed.is_empty() {
                        Ok(None)
                    } else {
                        trimmed.parse::<f64>().map(Some).map_err(|_| {
                            ChurnError::ValidationError(format!(
                                "Column '{}' must be numeric. Received: {}",
                                col_name, raw
                            ))
                        })
                    }
                }
                None => Ok(None),
            })
            .collect::<Result<_>>()?;
        return Ok(parsed.with_name(series.name().clone()).into_series());
    }

    Err(ChurnError::ValidationError(format!(
        "Column '{}' must be numeric. Received type: {:?}",
        col_name, dtype
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn churn_df() -> DataFrame {
        df!(
            "CustomerId" => &[101i64, 102, 103, 104],
            "Geography" => &["France", "Spain", "France", "Germany"],
            "CreditScore" => &[619i64, 608, 502, 699],
            "Age" => &[42.0, 41.0, 42.0, 39.0],
            "NumOfProducts" => &[1i64, 1, 3, 2],
            "Exited" => &[1i64, 0, 1, 0],
        )
        .unwrap()
    }

    #[test]
    fn test_detect_target_by_convention() {
        let df = churn_df();
        assert_eq!(detect_target_column(&df, None).unwrap(), "Exited");
    }

    #[test]
    fn test_detect_target_explicit() {
        let df = churn_df();
        assert_eq!(detect_target_column(&df, Some("Age")).unwrap(), "Age");
        assert!(detect_target_column(&df, Some("Nope")).is_err());
    }

    #[test]
    fn test_missing_target_errors() {
        let df = df!("a" => &[1i64, 2]).unwrap();
        assert!(detect_target_column(&df, None).is_err());
    }

    #[test]
    fn test_id_columns_excluded() {
        let df = churn_df();
        let features = select_feature_columns(&df, "Exited");
        assert!(!features.contains(&"CustomerId".to_string()));
        assert!(!features.contains(&"Exited".to_string()));
        assert!(features.contains(&"Geography".to_string()));
    }

    #[test]
    fn test_low_cardinality_integers_are_categorical() {
        let df = churn_df();
        let features = select_feature_columns(&df, "Exited");
        let (numerical, categorical) = detect_column_types(&df, &features).unwrap();

        // 4 distinct credit scores over 4 rows is still <= 10, so the small
        // fixture pushes everything integer into categorical; Age is float.
        assert!(numerical.contains(&"Age".to_string()));
        assert!(categorical.contains(&"Geography".to_string()));
        assert!(categorical.contains(&"NumOfProducts".to_string()));
        assert!(categorical.contains(&"CreditScore".to_string()));
    }

    #[test]
    fn test_high_cardinality_integers_stay_numerical() {
        let values: Vec<i64> = (0..50).collect();
        let target: Vec<i64> = (0..50).map(|v| v % 2).collect();
        let df = df!("score" => &values, "Churn" => &target).unwrap();
        let (numerical, categorical) =
            detect_column_types(&df, &["score".to_string()]).unwrap();
        assert_eq!(numerical, vec!["score".to_string()]);
        assert!(categorical.is_empty());
    }

    #[test]
    fn test_schema_detect() {
        let df = churn_df();
        let schema = ModelSchema::detect(&df, None).unwrap();
        assert_eq!(schema.target_column, "Exited");
        assert_eq!(schema.classes, vec!["0", "1"]);
        assert_eq!(
            schema.categorical_values.get("Geography").unwrap(),
            &vec!["France".to_string(), "Germany".to_string(), "Spain".to_string()]
        );
    }

    #[test]
    fn test_non_binary_target_rejected() {
        let df = df!(
            "x" => &[1.0, 2.0, 3.0],
            "Churn" => &[0i64, 1, 2],
        )
        .unwrap();
        assert!(ModelSchema::detect(&df, None).is_err());
    }

    #[test]
    fn test_validate_frame_missing_column() {
        let df = churn_df();
        let schema = ModelSchema::detect(&df, None).unwrap();
        let input = df!("Geography" => &["France"]).unwrap();
        let err = schema.validate_frame(&input).unwrap_err();
        assert!(err.to_string().contains("Missing required columns"));
    }

    #[test]
    fn test_validate_frame_extra_column_dropped() {
        let df = churn_df();
        let schema = ModelSchema::detect(&df, None).unwrap();
        let input = df!(
            "Geography" => &["France"],
            "CreditScore" => &[650i64],
            "Age" => &[33.0],
            "NumOfProducts" => &[2i64],
            "Unrelated" => &["x"],
        )
        .unwrap();
        let validated = schema.validate_frame(&input).unwrap();
        assert!(validated.column("Unrelated").is_err());
        assert_eq!(validated.width(), schema.feature_columns.len());
    }

    #[test]
    fn test_validate_frame_coerces_numeric_strings() {
        let df = churn_df();
        let schema = ModelSchema::detect(&df, None).unwrap();
        let input = df!(
            "Geography" => &["France"],
            "CreditScore" => &[650i64],
            "Age" => &["33.5"],
            "NumOfProducts" => &[2i64],
        )
        .unwrap();
        let validated = schema.validate_frame(&input).unwrap();
        let age = validated.column("Age").unwrap().f64().unwrap();
        assert_eq!(age.get(0), Some(33.5));
    }

    #[test]
    fn test_validate_frame_rejects_bad_numeric() {
        let df = churn_df();
        let schema = ModelSchema::detect(&df, None).unwrap();
        let input = df!(
            "Geography" => &["France"],
            "CreditScore" => &[650i64],
            "Age" => &["not-a-number"],
            "NumOfProducts" => &[2i64],
        )
        .unwrap();
        let err = schema.validate_frame(&input).unwrap_err();
        assert!(err.to_string().contains("Age"));
        assert!(err.to_string().contains("not-a-number"));
    }

    #[test]
    fn test_fields_shape() {
        let df = churn_df();
        let schema = ModelSchema::detect(&df, None).unwrap();
        let fields = schema.fields();
        assert_eq!(fields.len(), schema.feature_columns.len());

        let geo = fields.iter().find(|f| f.name == "Geography").unwrap();
        assert_eq!(geo.field_type, "categorical");
        assert!(geo.values.is_some());

        let age = fields.iter().find(|f| f.name == "Age").unwrap();
        assert_eq!(age.field_type, "number");
        assert!(age.values.is_none());
    }

    #[test]
    fn test_encode_target() {
        let df = churn_df();
        let schema = ModelSchema::detect(&df, None).unwrap();
        let target = df.column("Exited").unwrap().as_materialized_series();
        let encoded = schema.encode_target(target).unwrap();
        assert_eq!(encoded, vec![1, 0, 1, 0]);
    }
}
