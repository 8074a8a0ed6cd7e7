use crate::error::InfraError;
use async_trait::async_trait;
use aws_sdk_sagemaker::types::FeatureGroupStatus;
use std::time::Duration;

#[cfg(any(test, feature = "mocks"))]
use mockall::automock;

pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[cfg_attr(any(test, feature = "mocks"), automock)]
#[async_trait]
pub trait FeatureGroupDescriber {
    async fn feature_group_status(&self, feature_group_name: &str)
        -> Result<Option<String>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SageMakerFeatureGroups {
    sagemaker_client: aws_sdk_sagemaker::Client,
}

impl SageMakerFeatureGroups {
    pub fn new(sagemaker_client: aws_sdk_sagemaker::Client) -> Self {
        Self { sagemaker_client }
    }
}

#[async_trait]
impl FeatureGroupDescriber for SageMakerFeatureGroups {
    async fn feature_group_status(
        &self,
        feature_group_name: &str,
    ) -> Result<Option<String>, InfraError> {
        let response = self
            .sagemaker_client
            .describe_feature_group()
            .feature_group_name(feature_group_name)
            .send()
            .await
            .map_err(|e| InfraError::aws("sagemaker", e.into_service_error()))?;
        Ok(response
            .feature_group_status()
            .map(|status| status.as_str().to_string()))
    }
}

/// Waits while the feature group reports `Creating`, checking every
/// `interval`. There is no timeout. Returns the first status that is not
/// `Creating`, or `None` when the status could not be read.
pub async fn wait_for_feature_group<D: FeatureGroupDescriber + ?Sized>(
    describer: &D,
    feature_group_name: &str,
    interval: Duration,
) -> Option<String> {
    let creating = FeatureGroupStatus::Creating.as_str();
    loop {
        let status = match describer.feature_group_status(feature_group_name).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(
                    "describe feature group {}, exception={}",
                    feature_group_name,
                    e
                );
                return None;
            }
        };
        match status {
            Some(status) if status == creating => {
                tracing::info!("Waiting for Feature Group {} to be Created", feature_group_name);
                tokio::time::sleep(interval).await;
            }
            Some(status) => {
                tracing::info!("FeatureGroup {} status is {}", feature_group_name, status);
                return Some(status);
            }
            None => {
                tracing::error!("FeatureGroup {} reported no status", feature_group_name);
                return None;
            }
        }
    }
}
