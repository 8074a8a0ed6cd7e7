//! CloudFormation stack introspection.
//!
//! Lookups return `None` when the stack, the section or the key is absent;
//! the cause is logged.

use crate::error::InfraError;
use async_trait::async_trait;
use std::collections::BTreeMap;

#[cfg(any(test, feature = "mocks"))]
use mockall::automock;

/// Outputs and parameters of one stack. A section the stack does not
/// declare at all is `None`, which is different from an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackMetadata {
    pub outputs: Option<BTreeMap<String, String>>,
    pub parameters: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Outputs,
    Parameters,
}

impl Section {
    fn name(self) -> &'static str {
        match self {
            Section::Outputs => "Outputs",
            Section::Parameters => "Parameters",
        }
    }
}

#[cfg_attr(any(test, feature = "mocks"), automock)]
#[async_trait]
pub trait StackDescriber {
    /// `Ok(None)` when the service answers but lists no stack.
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackMetadata>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct CloudFormationStacks {
    cloudformation_client: aws_sdk_cloudformation::Client,
}

impl CloudFormationStacks {
    pub fn new(cloudformation_client: aws_sdk_cloudformation::Client) -> Self {
        Self {
            cloudformation_client,
        }
    }
}

#[async_trait]
impl StackDescriber for CloudFormationStacks {
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackMetadata>, InfraError> {
        let response = self
            .cloudformation_client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| InfraError::aws("cloudformation", e.into_service_error()))?;

        let Some(stack) = response.stacks().first() else {
            return Ok(None);
        };

        let outputs = stack.outputs.as_ref().map(|outputs| {
            outputs
                .iter()
                .filter_map(|output| {
                    Some((
                        output.output_key()?.to_string(),
                        output.output_value()?.to_string(),
                    ))
                })
                .collect()
        });
        let parameters = stack.parameters.as_ref().map(|parameters| {
            parameters
                .iter()
                .filter_map(|parameter| {
                    Some((
                        parameter.parameter_key()?.to_string(),
                        parameter.parameter_value()?.to_string(),
                    ))
                })
                .collect()
        });

        Ok(Some(StackMetadata {
            outputs,
            parameters,
        }))
    }
}

async fn section<D: StackDescriber + ?Sized>(
    describer: &D,
    stack_name: &str,
    section: Section,
) -> Option<BTreeMap<String, String>> {
    let metadata = match describer.describe_stack(stack_name).await {
        Ok(Some(metadata)) => metadata,
        Ok(None) => {
            tracing::error!("stack {} not found", stack_name);
            return None;
        }
        Err(e) => {
            tracing::error!("describe stack {}, exception={}", stack_name, e);
            return None;
        }
    };
    tracing::debug!("{:?}", metadata);

    let values = match section {
        Section::Outputs => metadata.outputs,
        Section::Parameters => metadata.parameters,
    };
    if values.is_none() {
        tracing::error!("stack {} has no {} section", stack_name, section.name());
    }
    values
}

async fn section_value<D: StackDescriber + ?Sized>(
    describer: &D,
    stack_name: &str,
    section_kind: Section,
    key: &str,
) -> Option<String> {
    let mut values = section(describer, stack_name, section_kind).await?;
    let value = values.remove(key);
    if value.is_none() {
        tracing::error!("{} not found in the {} section", key, section_kind.name());
    }
    value
}

pub async fn stack_output<D: StackDescriber + ?Sized>(
    describer: &D,
    stack_name: &str,
    key: &str,
) -> Option<String> {
    section_value(describer, stack_name, Section::Outputs, key).await
}

pub async fn stack_outputs<D: StackDescriber + ?Sized>(
    describer: &D,
    stack_name: &str,
) -> Option<BTreeMap<String, String>> {
    tracing::info!("no key is specified, returning the entire Outputs section");
    section(describer, stack_name, Section::Outputs).await
}

pub async fn stack_parameter<D: StackDescriber + ?Sized>(
    describer: &D,
    stack_name: &str,
    key: &str,
) -> Option<String> {
    section_value(describer, stack_name, Section::Parameters, key).await
}

pub async fn stack_parameters<D: StackDescriber + ?Sized>(
    describer: &D,
    stack_name: &str,
) -> Option<BTreeMap<String, String>> {
    tracing::info!("no key is specified, returning the entire Parameters section");
    section(describer, stack_name, Section::Parameters).await
}
