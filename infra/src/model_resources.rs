use crate::error::InfraError;
use async_trait::async_trait;

#[cfg(any(test, feature = "mocks"))]
use mockall::automock;

/// The SageMaker resources behind one deployed endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResources {
    pub endpoint_name: String,
    pub endpoint_config_name: String,
    pub model_name: String,
}

#[cfg_attr(any(test, feature = "mocks"), automock)]
#[async_trait]
pub trait ModelResourceClient {
    /// Name of the model served by the first production variant.
    async fn endpoint_config_model(&self, endpoint_config_name: &str)
        -> Result<String, InfraError>;
    async fn delete_endpoint_config(&self, endpoint_config_name: &str) -> Result<(), InfraError>;
    async fn delete_endpoint(&self, endpoint_name: &str) -> Result<(), InfraError>;
    async fn delete_model(&self, model_name: &str) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SageMakerModelResources {
    sagemaker_client: aws_sdk_sagemaker::Client,
}

impl SageMakerModelResources {
    pub fn new(sagemaker_client: aws_sdk_sagemaker::Client) -> Self {
        Self { sagemaker_client }
    }
}

#[async_trait]
impl ModelResourceClient for SageMakerModelResources {
    async fn endpoint_config_model(
        &self,
        endpoint_config_name: &str,
    ) -> Result<String, InfraError> {
        let response = self
            .sagemaker_client
            .describe_endpoint_config()
            .endpoint_config_name(endpoint_config_name)
            .send()
            .await
            .map_err(|e| InfraError::aws("sagemaker", e.into_service_error()))?;
        tracing::debug!("{:?}", response);

        response
            .production_variants()
            .first()
            .and_then(|variant| variant.model_name())
            .map(str::to_string)
            .ok_or(InfraError::Missing("ProductionVariants[0].ModelName"))
    }

    async fn delete_endpoint_config(&self, endpoint_config_name: &str) -> Result<(), InfraError> {
        self.sagemaker_client
            .delete_endpoint_config()
            .endpoint_config_name(endpoint_config_name)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| InfraError::aws("sagemaker", e.into_service_error()))
    }

    async fn delete_endpoint(&self, endpoint_name: &str) -> Result<(), InfraError> {
        self.sagemaker_client
            .delete_endpoint()
            .endpoint_name(endpoint_name)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| InfraError::aws("sagemaker", e.into_service_error()))
    }

    async fn delete_model(&self, model_name: &str) -> Result<(), InfraError> {
        self.sagemaker_client
            .delete_model()
            .model_name(model_name)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| InfraError::aws("sagemaker", e.into_service_error()))
    }
}

/// Deletes the endpoint config, then the endpoint, then the model. The
/// endpoint config carries the endpoint's name. The first failure is logged
/// and stops the teardown; `None` is returned in that case.
pub async fn delete_model_resources<C: ModelResourceClient + ?Sized>(
    client: &C,
    endpoint_name: &str,
) -> Option<ModelResources> {
    tracing::info!("delete_model_resources, ep_name={}", endpoint_name);
    match try_delete_model_resources(client, endpoint_name).await {
        Ok(resources) => {
            tracing::info!(
                "delete_model_resources, after deleting ep_config_name={}, ep_name={}, model_name={}",
                resources.endpoint_config_name,
                resources.endpoint_name,
                resources.model_name
            );
            Some(resources)
        }
        Err(e) => {
            tracing::error!("delete_model_resources, exception={}", e);
            None
        }
    }
}

async fn try_delete_model_resources<C: ModelResourceClient + ?Sized>(
    client: &C,
    endpoint_name: &str,
) -> Result<ModelResources, InfraError> {
    let endpoint_config_name = endpoint_name.to_string();
    let model_name = client.endpoint_config_model(&endpoint_config_name).await?;
    tracing::info!(
        "delete_model_resources, going to delete ep_config_name={}, ep_name={}, model_name={}",
        endpoint_config_name,
        endpoint_name,
        model_name
    );

    client.delete_endpoint_config(&endpoint_config_name).await?;
    client.delete_endpoint(endpoint_name).await?;
    client.delete_model(&model_name).await?;

    Ok(ModelResources {
        endpoint_name: endpoint_name.to_string(),
        endpoint_config_name,
        model_name,
    })
}
