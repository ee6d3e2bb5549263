//! Churn Analysis API - schema-aware churn model training and serving
//!
//! This crate trains a binary churn classifier from a tabular CSV and serves
//! predictions over a REST API. The schema is derived from the training data
//! (categorical vs numerical columns, target detection) and every prediction
//! request is validated against it.
//!
//! # Modules
//!
//! ## Core
//! - [`schema`] - Schema inference and request validation
//! - [`pipeline`] - One-hot encoding, scaling, and the fitted classifier
//! - [`training`] - Train/test split, fitting, and held-out metrics
//!
//! ## Services
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core modules
pub mod pipeline;
pub mod schema;
pub mod training;

// Services
pub mod cli;
pub mod server;

pub use error::{ChurnError, Result};
pub use pipeline::{ChurnPipeline, ModelArtifact};
pub use schema::{ColumnType, ModelSchema};
