use crate::{
    core::{FeatureStore, FeatureValue, InferenceEndpoint, Payload, PredictionRepository},
    error::PipelineError,
    payload::CSV_CONTENT_TYPE,
};
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_sagemakerruntime::primitives::Blob;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug)]
pub struct SageMakerFeatureStore {
    feature_group_name: String,
    featurestore_client: aws_sdk_sagemakerfeaturestoreruntime::Client,
}

impl SageMakerFeatureStore {
    pub fn new(
        feature_group_name: String,
        featurestore_client: aws_sdk_sagemakerfeaturestoreruntime::Client,
    ) -> Self {
        Self {
            feature_group_name,
            featurestore_client,
        }
    }
}

#[async_trait]
impl FeatureStore for SageMakerFeatureStore {
    async fn get_record(
        &self,
        record_identifier: &str,
        feature_names: &[String],
    ) -> Result<Vec<FeatureValue>, PipelineError> {
        let response = self
            .featurestore_client
            .get_record()
            .feature_group_name(&self.feature_group_name)
            .record_identifier_value_as_string(record_identifier)
            .set_feature_names(Some(feature_names.to_vec()))
            .send()
            .await
            .map_err(|e| PipelineError::from_sdk("sagemaker-featurestore-runtime", e))?;

        Ok(to_feature_values(response.record()))
    }
}

/// Keeps the scalar features in response order. A list-valued feature has
/// no single CSV cell; it is dropped here and reported as missing later if
/// it was requested.
pub fn to_feature_values(
    record: &[aws_sdk_sagemakerfeaturestoreruntime::types::FeatureValue],
) -> Vec<FeatureValue> {
    record
        .iter()
        .filter_map(|feature| {
            let name = feature.feature_name()?;
            match feature.value_as_string() {
                Some(value) => Some(FeatureValue::new(name, value)),
                None => {
                    tracing::debug!("skipping feature {} without a string value", name);
                    None
                }
            }
        })
        .collect()
}

#[derive(Debug)]
pub struct SageMakerEndpoint {
    endpoint_name: String,
    sagemaker_runtime_client: aws_sdk_sagemakerruntime::Client,
}

impl SageMakerEndpoint {
    pub fn new(
        endpoint_name: String,
        sagemaker_runtime_client: aws_sdk_sagemakerruntime::Client,
    ) -> Self {
        Self {
            endpoint_name,
            sagemaker_runtime_client,
        }
    }
}

#[async_trait]
impl InferenceEndpoint for SageMakerEndpoint {
    async fn predict(&self, csv_line: &str) -> Result<Value, PipelineError> {
        let response = self
            .sagemaker_runtime_client
            .invoke_endpoint()
            .endpoint_name(&self.endpoint_name)
            .content_type(CSV_CONTENT_TYPE)
            .body(Blob::new(csv_line.as_bytes().to_vec()))
            .send()
            .await
            .map_err(|e| PipelineError::from_sdk("sagemaker-runtime", e))?;

        let body = response
            .body()
            .ok_or_else(|| PipelineError::InvalidPrediction("empty response body".to_string()))?;
        serde_json::from_slice(body.as_ref())
            .map_err(|e| PipelineError::InvalidPrediction(e.to_string()))
    }
}

#[derive(Debug)]
pub struct DynamoDbPredictionRepository {
    table_name: String,
    dynamodb_client: aws_sdk_dynamodb::Client,
}

impl DynamoDbPredictionRepository {
    pub fn new(table_name: String, dynamodb_client: aws_sdk_dynamodb::Client) -> Self {
        Self {
            table_name,
            dynamodb_client,
        }
    }
}

#[async_trait]
impl PredictionRepository for DynamoDbPredictionRepository {
    async fn store_prediction(&self, record: &Payload) -> Result<(), PipelineError> {
        self.dynamodb_client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_dynamodb_item(record)))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| PipelineError::from_sdk("dynamodb", e))
    }
}

pub fn to_dynamodb_item(record: &Payload) -> HashMap<String, AttributeValue> {
    record
        .iter()
        .map(|(name, value)| (name.clone(), to_attribute_value(value)))
        .collect()
}

/// Numbers keep their exact decimal text so DynamoDB stores them as `N`
/// without going through a binary float.
pub fn to_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute_value).collect()),
        Value::Object(fields) => AttributeValue::M(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), to_attribute_value(value)))
                .collect(),
        ),
    }
}
