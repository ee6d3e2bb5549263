//! One-hot encoding of categorical features

use crate::error::{ChurnError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One-hot encoder with drop-first semantics.
///
/// Fit records the sorted category list per column; transform replaces each
/// fitted column with one 0/1 indicator per category except the first. A
/// value never seen at fit time (or a null) encodes to all zeros, so
/// inference never fails on an unknown category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    /// (column, sorted categories), in the fitted column order.
    categories: Vec<(String, Vec<String>)>,
    is_fitted: bool,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self {
            categories: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit category lists from the given columns. Values are stringified so
    /// integer-coded categoricals and string categoricals behave the same.
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.categories.clear();

        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| ChurnError::FeatureNotFound(col_name.clone()))?;
            let stringified = column
                .as_materialized_series()
                .cast(&DataType::String)
                .map_err(|e| ChurnError::DataError(e.to_string()))?;
            let ca = stringified
                .str()
                .map_err(|e| ChurnError::DataError(e.to_string()))?;

            let values: BTreeSet<String> =
                ca.into_iter().flatten().map(|s| s.to_string()).collect();
            self.categories
                .push((col_name.clone(), values.into_iter().collect()));
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace each fitted column with its indicator columns.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ChurnError::ModelNotFitted);
        }

        let mut result = df.clone();

        for (col_name, categories) in &self.categories {
            let column = result
                .column(col_name)
                .map_err(|_| ChurnError::FeatureNotFound(col_name.clone()))?;
            let stringified = column
                .as_materialized_series()
                .cast(&DataType::String)
                .map_err(|e| ChurnError::DataError(e.to_string()))?;
            let ca = stringified
                .str()
                .map_err(|e| ChurnError::DataError(e.to_string()))?;

            let indicators: Vec<Series> = categories
                .iter()
                .skip(1) // drop-first
                .map(|category| {
                    let values: Float64Chunked = ca
                        .into_iter()
                        .map(|opt| {
                            Some(match opt {
                                Some(v) if v == category => 1.0,
                                _ => 0.0,
                            })
                        })
                        .collect();
                    values
                        .with_name(format!("{}_{}", col_name, category).into())
                        .into_series()
                })
                .collect();

            result = result
                .drop(col_name)
                .map_err(|e| ChurnError::DataError(e.to_string()))?;
            for indicator in indicators {
                result
                    .with_column(indicator)
                    .map_err(|e| ChurnError::DataError(e.to_string()))?;
            }
        }

        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Names of the indicator columns produced by transform, in order.
    pub fn output_columns(&self) -> Vec<String> {
        self.categories
            .iter()
            .flat_map(|(col_name, categories)| {
                categories
                    .iter()
                    .skip(1)
                    .map(move |category| format!("{}_{}", col_name, category))
            })
            .collect()
    }
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_df() -> DataFrame {
        df!(
            "city" => &["NYC", "LA", "NYC", "SF"],
            "age" => &[25.0, 30.0, 35.0, 40.0],
        )
        .unwrap()
    }

    #[test]
    fn test_drop_first_column_count() {
        let df = sample_df();
        let mut encoder = OneHotEncoder::new();
        let result = encoder
            .fit_transform(&df, &["city".to_string()])
            .unwrap();

        // 3 categories -> 2 indicators; original column removed
        assert!(result.column("city").is_err());
        assert!(result.column("city_NYC").is_ok());
        assert!(result.column("city_SF").is_ok());
        assert!(result.column("city_LA").is_err()); // first category dropped
        assert_eq!(result.width(), 3);
    }

    #[test]
    fn test_indicator_values() {
        let df = sample_df();
        let mut encoder = OneHotEncoder::new();
        let result = encoder
            .fit_transform(&df, &["city".to_string()])
            .unwrap();

        let nyc = result.column("city_NYC").unwrap().f64().unwrap();
        let collected: Vec<f64> = nyc.into_iter().flatten().collect();
        assert_eq!(collected, vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unknown_category_encodes_to_zeros() {
        let df = sample_df();
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&df, &["city".to_string()]).unwrap();

        let unseen = df!(
            "city" => &["Tokyo"],
            "age" => &[50.0],
        )
        .unwrap();
        let result = encoder.transform(&unseen).unwrap();

        let nyc = result.column("city_NYC").unwrap().f64().unwrap();
        let sf = result.column("city_SF").unwrap().f64().unwrap();
        assert_eq!(nyc.get(0), Some(0.0));
        assert_eq!(sf.get(0), Some(0.0));
    }

    #[test]
    fn test_integer_coded_categoricals() {
        let df = df!("products" => &[1i64, 2, 3, 1]).unwrap();
        let mut encoder = OneHotEncoder::new();
        let result = encoder
            .fit_transform(&df, &["products".to_string()])
            .unwrap();

        assert!(result.column("products_2").is_ok());
        assert!(result.column("products_3").is_ok());
        assert!(result.column("products_1").is_err());
    }

    #[test]
    fn test_output_columns_order() {
        let df = sample_df();
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&df, &["city".to_string()]).unwrap();
        assert_eq!(
            encoder.output_columns(),
            vec!["city_NYC".to_string(), "city_SF".to_string()]
        );
    }
}
