//! Hotel cluster predictions lambda
//!
//! Triggered by the customer transaction Kinesis stream. For every record it:
//! * decodes the JSON transaction
//! * looks up the destination features in the online feature store, keyed by
//!   `ONLINE_FEATURE_GROUP_KEY`
//! * sends the stream values followed by the looked-up features to the
//!   SageMaker endpoint `ENDPOINT_NAME` as one CSV line
//! * writes the transaction, a timestamp and the prediction to the DynamoDB
//!   table `DDB_TABLE_NAME`
//!
//! The event source mapping must have `ReportBatchItemFailures` enabled.
//! A transient failure ends the batch with that record as the only batch
//! item failure, so the stream resumes from it. Without the setting Lambda
//! ignores the response and the rest of the batch is checkpointed as done.
//! Records that can never succeed (bad JSON, unknown destination, missing
//! feature) are logged at `error` and skipped.
use lambda_runtime::{run, service_fn, Error};
use shared::{
    adapters::{DynamoDbPredictionRepository, SageMakerEndpoint, SageMakerFeatureStore},
    configuration::Config,
    core::SystemClock,
};

mod event_handler;
use event_handler::{function_handler, HandlerDeps};

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::tracing::init_default_subscriber();
    let config = Config::load()?;
    tracing::info!(
        endpoint_name = %config.endpoint_name,
        fg_name = %config.fg_name,
        ddb_table_name = %config.ddb_table_name,
        online_feature_group_key = %config.online_feature_group_key,
        "Loaded configuration"
    );

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let feature_store = SageMakerFeatureStore::new(
        config.fg_name.clone(),
        aws_sdk_sagemakerfeaturestoreruntime::Client::new(&aws_config),
    );
    let endpoint = SageMakerEndpoint::new(
        config.endpoint_name.clone(),
        aws_sdk_sagemakerruntime::Client::new(&aws_config),
    );
    let repository = DynamoDbPredictionRepository::new(
        config.ddb_table_name.clone(),
        aws_sdk_dynamodb::Client::new(&aws_config),
    );

    let handler_deps = HandlerDeps {
        feature_store,
        endpoint,
        repository,
        clock: SystemClock,
        config,
    };

    run(service_fn(|event| function_handler(&handler_deps, event))).await
}
