use clap::{Parser, Subcommand};
use infra::{
    feature_group::{wait_for_feature_group, SageMakerFeatureGroups, STATUS_POLL_INTERVAL},
    model_resources::{delete_model_resources, SageMakerModelResources},
    params::{read_param, write_param, DEFAULT_CONFIG_DIR},
    stack::{stack_output, stack_outputs, stack_parameter, stack_parameters, CloudFormationStacks},
    storage::{delete_all_objects, S3ObjectStore},
    tags::{escape_tag_chars, unescape_tag_chars},
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Setup and teardown helpers for the hotel cluster pipeline.
///
/// Results go to stdout, logs to stderr. A missing value prints nothing.
#[derive(Parser)]
#[command(name = "infra")]
struct Opt {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print one stack output, or all of them when no key is given
    StackOutput {
        #[arg(long, env = "STACK_NAME")]
        stack_name: String,
        key: Option<String>,
    },
    /// Print one stack parameter, or all of them when no key is given
    StackParameter {
        #[arg(long, env = "STACK_NAME")]
        stack_name: String,
        key: Option<String>,
    },
    /// Block while the feature group is still being created
    WaitFeatureGroup {
        feature_group_name: String,
        #[arg(long, default_value_t = STATUS_POLL_INTERVAL.as_secs())]
        interval_secs: u64,
    },
    WriteParam {
        name: String,
        value: String,
        #[arg(long, env = "CONFIG_DIR", default_value = DEFAULT_CONFIG_DIR)]
        config_dir: PathBuf,
    },
    ReadParam {
        name: String,
        #[arg(long, env = "CONFIG_DIR", default_value = DEFAULT_CONFIG_DIR)]
        config_dir: PathBuf,
    },
    /// Delete every object in a bucket
    PurgeBucket { bucket: String },
    /// Delete an endpoint together with its endpoint config and model
    DeleteModelResources { endpoint_name: String },
    EscapeTag { value: String },
    UnescapeTag { value: String },
}

fn print_section(section: Option<BTreeMap<String, String>>) {
    for (key, value) in section.unwrap_or_default() {
        println!("{key}={value}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let opt = Opt::parse();

    match opt.command {
        Command::StackOutput { stack_name, key } => {
            let stacks = CloudFormationStacks::new(aws_sdk_cloudformation::Client::new(
                &load_aws_config().await,
            ));
            match key {
                Some(key) => {
                    if let Some(value) = stack_output(&stacks, &stack_name, &key).await {
                        println!("{value}");
                    }
                }
                None => print_section(stack_outputs(&stacks, &stack_name).await),
            }
        }
        Command::StackParameter { stack_name, key } => {
            let stacks = CloudFormationStacks::new(aws_sdk_cloudformation::Client::new(
                &load_aws_config().await,
            ));
            match key {
                Some(key) => {
                    if let Some(value) = stack_parameter(&stacks, &stack_name, &key).await {
                        println!("{value}");
                    }
                }
                None => print_section(stack_parameters(&stacks, &stack_name).await),
            }
        }
        Command::WaitFeatureGroup {
            feature_group_name,
            interval_secs,
        } => {
            let feature_groups = SageMakerFeatureGroups::new(aws_sdk_sagemaker::Client::new(
                &load_aws_config().await,
            ));
            let status = wait_for_feature_group(
                &feature_groups,
                &feature_group_name,
                Duration::from_secs(interval_secs),
            )
            .await;
            if let Some(status) = status {
                println!("{status}");
            }
        }
        Command::WriteParam {
            name,
            value,
            config_dir,
        } => {
            if let Some(path) = write_param(&name, &value, &config_dir) {
                println!("{}", path.display());
            }
        }
        Command::ReadParam { name, config_dir } => {
            if let Some(value) = read_param(&name, &config_dir) {
                println!("{value}");
            }
        }
        Command::PurgeBucket { bucket } => {
            let store = S3ObjectStore::new(aws_sdk_s3::Client::new(&load_aws_config().await));
            let deleted = delete_all_objects(&store, &bucket).await;
            println!("{deleted}");
        }
        Command::DeleteModelResources { endpoint_name } => {
            let client = SageMakerModelResources::new(aws_sdk_sagemaker::Client::new(
                &load_aws_config().await,
            ));
            if let Some(resources) = delete_model_resources(&client, &endpoint_name).await {
                println!(
                    "{} {} {}",
                    resources.endpoint_config_name, resources.endpoint_name, resources.model_name
                );
            }
        }
        Command::EscapeTag { value } => println!("{}", escape_tag_chars(&value)),
        Command::UnescapeTag { value } => println!("{}", unescape_tag_chars(&value)),
    }

    Ok(())
}

async fn load_aws_config() -> aws_config::SdkConfig {
    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await
}
