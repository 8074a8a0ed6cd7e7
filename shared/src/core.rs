use crate::error::PipelineError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt::Debug;

#[cfg(any(test, feature = "mocks"))]
use mockall::{automock, predicate::*};

/// A decoded stream record, in the order its fields arrived.
pub type Payload = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureValue {
    pub name: String,
    pub value: String,
}

impl FeatureValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Online feature store holding the precomputed features of one feature group.
#[cfg_attr(any(test, feature = "mocks"), automock)]
#[async_trait]
pub trait FeatureStore: Debug {
    /// Returns whatever the store holds for `record_identifier`; an empty
    /// list means the identifier is unknown.
    async fn get_record(
        &self,
        record_identifier: &str,
        feature_names: &[String],
    ) -> Result<Vec<FeatureValue>, PipelineError>;
}

/// Hosted model that turns one CSV feature line into a prediction.
#[cfg_attr(any(test, feature = "mocks"), automock)]
#[async_trait]
pub trait InferenceEndpoint: Debug {
    async fn predict(&self, csv_line: &str) -> Result<Value, PipelineError>;
}

#[cfg_attr(any(test, feature = "mocks"), automock)]
#[async_trait]
pub trait PredictionRepository: Debug {
    async fn store_prediction(&self, record: &Payload) -> Result<(), PipelineError>;
}

#[cfg_attr(any(test, feature = "mocks"), automock)]
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
