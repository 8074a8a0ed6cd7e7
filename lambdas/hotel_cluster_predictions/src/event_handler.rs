use aws_lambda_events::{
    event::kinesis::KinesisEvent,
    kinesis::KinesisEventRecord,
    streams::{KinesisBatchItemFailure, KinesisEventResponse},
};
use lambda_runtime::{Error, LambdaEvent};
use shared::{
    configuration::Config,
    core::{Clock, FeatureStore, InferenceEndpoint, PredictionRepository},
    error::PipelineError,
    payload::{augment_payload, decode_payload, lookup_key_value, order_features, FeatureVector},
};

pub(crate) struct HandlerDeps<F, E, R, C>
where
    F: FeatureStore,
    E: InferenceEndpoint,
    R: PredictionRepository,
    C: Clock,
{
    pub feature_store: F,
    pub endpoint: E,
    pub repository: R,
    pub clock: C,
    pub config: Config,
}

/// Records are handled one at a time in arrival order. A transient failure
/// stops the batch and reports that record, so the stream redelivers it and
/// everything after it. A permanent failure can never succeed on redelivery;
/// the record is logged and skipped.
#[tracing::instrument(skip(deps, event), fields(records = event.payload.records.len()))]
pub(crate) async fn function_handler<F, E, R, C>(
    deps: &HandlerDeps<F, E, R, C>,
    event: LambdaEvent<KinesisEvent>,
) -> Result<KinesisEventResponse, Error>
where
    F: FeatureStore,
    E: InferenceEndpoint,
    R: PredictionRepository,
    C: Clock,
{
    let mut response = KinesisEventResponse {
        batch_item_failures: vec![],
    };

    for record in event.payload.records {
        match process_record(deps, &record).await {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                tracing::error!(
                    "Stopping batch at record {}: {}",
                    record.kinesis.sequence_number,
                    e
                );
                response.batch_item_failures.push(KinesisBatchItemFailure {
                    item_identifier: Some(record.kinesis.sequence_number),
                });
                break;
            }
            Err(e) => {
                tracing::error!(
                    "Discarding record {:?} ({}): {}",
                    record.event_id,
                    record.kinesis.sequence_number,
                    e
                );
            }
        }
    }

    tracing::info!("all done, exiting");
    Ok(response)
}

#[tracing::instrument("process hotel cluster record", skip(deps, record), fields(
    event_id = record.event_id.as_deref().unwrap_or_default(),
    event_source_arn = record.event_source_arn.as_deref().unwrap_or_default(),
    sequence_number = %record.kinesis.sequence_number,
))]
async fn process_record<F, E, R, C>(
    deps: &HandlerDeps<F, E, R, C>,
    record: &KinesisEventRecord,
) -> Result<(), PipelineError>
where
    F: FeatureStore,
    E: InferenceEndpoint,
    R: PredictionRepository,
    C: Clock,
{
    let config = &deps.config;
    let mut payload = decode_payload(record.kinesis.data.as_slice())?;
    tracing::debug!("decoded data from kinesis record: {:?}", payload);

    let key_value = lookup_key_value(&payload, &config.online_feature_group_key)?;
    tracing::info!("{}={}", config.online_feature_group_key, key_value);

    let feature_names = config.feature_names();
    let fetched = deps
        .feature_store
        .get_record(&key_value, &feature_names)
        .await?;
    let from_store = order_features(&key_value, &feature_names, fetched)?;
    tracing::debug!("features_from_feature_store={:?}", from_store);

    let vector = FeatureVector::assemble(&payload, from_store);
    let csv_line = vector.to_csv_line();
    tracing::debug!(
        features = vector.len(),
        "csv_input_for_model={}",
        csv_line
    );

    let prediction = deps.endpoint.predict(&csv_line).await?;
    tracing::info!("prediction from endpoint: {}", prediction);

    augment_payload(
        &mut payload,
        &config.subject_id_field,
        deps.clock.now(),
        &config.predicted_variable,
        prediction,
    )?;
    deps.repository.store_prediction(&payload).await?;
    tracing::info!("wrote prediction to table {}", config.ddb_table_name);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{function_handler, HandlerDeps};
    use aws_lambda_events::event::kinesis::{KinesisEvent, KinesisEventRecord};
    use chrono::{TimeZone, Utc};
    use lambda_runtime::{Context, LambdaEvent};
    use mockall::{predicate::eq, Sequence};
    use serde_json::{json, Value};
    use shared::{
        configuration::Config,
        core::{
            FeatureValue, MockClock, MockFeatureStore, MockInferenceEndpoint,
            MockPredictionRepository,
        },
        error::{ErrorKind, PipelineError},
    };

    type TestDeps =
        HandlerDeps<MockFeatureStore, MockInferenceEndpoint, MockPredictionRepository, MockClock>;

    fn test_config() -> Config {
        Config {
            endpoint_name: "hotel-cluster-endpoint".to_string(),
            fg_name: "hotel-cluster-destinations".to_string(),
            ddb_table_name: "hotel-cluster-predictions".to_string(),
            online_feature_group_key: "srch_destination_id".to_string(),
            online_feature_group_features_of_interest: "ch_popularity,ch_mean_distance"
                .to_string(),
            predicted_variable: "hotel_cluster".to_string(),
            subject_id_field: "user_id".to_string(),
        }
    }

    fn fixed_clock() -> MockClock {
        let mut clock = MockClock::default();
        clock
            .expect_now()
            .returning(|| Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap());
        clock
    }

    fn deps(
        feature_store: MockFeatureStore,
        endpoint: MockInferenceEndpoint,
        repository: MockPredictionRepository,
    ) -> TestDeps {
        HandlerDeps {
            feature_store,
            endpoint,
            repository,
            clock: fixed_clock(),
            config: test_config(),
        }
    }

    fn create_kinesis_record(sequence_number: &str, data: &str) -> KinesisEventRecord {
        use base64::{engine::general_purpose::STANDARD, Engine};
        let encoded_data = STANDARD.encode(data);

        let record_json = json!({
            "kinesis": {
                "data": encoded_data,
                "partitionKey": "test-partition",
                "sequenceNumber": sequence_number,
                "approximateArrivalTimestamp": 1234567890.123,
                "kinesisSchemaVersion": "1.0"
            },
            "eventSource": "aws:kinesis",
            "eventID": format!("shardId-000000000000:{}", sequence_number),
            "eventName": "aws:kinesis:record",
            "eventSourceARN": "arn:aws:kinesis:us-east-1:123456789:stream/hotel-cluster-input",
            "awsRegion": "us-east-1"
        });

        serde_json::from_value(record_json).expect("Failed to create KinesisEventRecord")
    }

    fn create_lambda_event(records: Vec<KinesisEventRecord>) -> LambdaEvent<KinesisEvent> {
        LambdaEvent::new(KinesisEvent { records }, Context::default())
    }

    fn transaction(user_id: u64, destination: &str) -> String {
        json!({
            "user_id": user_id,
            "srch_destination_id": destination,
            "is_mobile": 0,
            "orig_destination_distance": 590.21
        })
        .to_string()
    }

    fn destination_features() -> Vec<FeatureValue> {
        vec![
            FeatureValue::new("ch_mean_distance", "1204.5"),
            FeatureValue::new("ch_popularity", "0.31"),
        ]
    }

    fn transient_error() -> PipelineError {
        PipelineError::Service {
            service: "sagemaker-featurestore-runtime",
            kind: ErrorKind::Transient,
            message: "ThrottlingException".to_string(),
        }
    }

    #[tokio::test]
    async fn when_valid_record_should_enrich_predict_and_store() {
        let mut feature_store = MockFeatureStore::default();
        let mut endpoint = MockInferenceEndpoint::default();
        let mut repository = MockPredictionRepository::default();

        feature_store
            .expect_get_record()
            .times(1)
            .withf(|identifier, names| {
                identifier == "8250" && names == ["ch_popularity", "ch_mean_distance"]
            })
            .returning(|_, _| Ok(destination_features()));

        endpoint
            .expect_predict()
            .times(1)
            .with(eq("42,8250,0,590.21,0.31,1204.5"))
            .returning(|_| Ok(json!({"predictions": [{"predicted_label": 91}]})));

        repository
            .expect_store_prediction()
            .times(1)
            .withf(|record| {
                record["user_id"] == json!("42")
                    && record["date_time"] == json!("2024-03-01T12:30:00.000000Z")
                    && record["hotel_cluster"] == json!({"predictions": [{"predicted_label": 91}]})
                    && record["orig_destination_distance"] == json!(590.21)
            })
            .returning(|_| Ok(()));

        let deps = deps(feature_store, endpoint, repository);
        let event = create_lambda_event(vec![create_kinesis_record("1", &transaction(42, "8250"))]);

        let result = function_handler(&deps, event).await;

        assert!(result.is_ok());
        let response = result.unwrap();
        assert!(response.batch_item_failures.is_empty());
    }

    #[tokio::test]
    async fn when_batch_is_empty_should_make_no_calls() {
        let mut feature_store = MockFeatureStore::default();
        let mut endpoint = MockInferenceEndpoint::default();
        let mut repository = MockPredictionRepository::default();

        feature_store.expect_get_record().times(0);
        endpoint.expect_predict().times(0);
        repository.expect_store_prediction().times(0);

        let deps = deps(feature_store, endpoint, repository);

        let response = function_handler(&deps, create_lambda_event(vec![]))
            .await
            .unwrap();

        assert!(response.batch_item_failures.is_empty());
    }

    #[tokio::test]
    async fn when_records_arrive_should_process_them_in_order() {
        let mut feature_store = MockFeatureStore::default();
        let mut endpoint = MockInferenceEndpoint::default();
        let mut repository = MockPredictionRepository::default();
        let mut seq = Sequence::new();

        feature_store
            .expect_get_record()
            .returning(|_, _| Ok(destination_features()));
        endpoint.expect_predict().returning(|_| Ok(json!(91)));

        for user_id in ["1", "2", "3"] {
            repository
                .expect_store_prediction()
                .times(1)
                .in_sequence(&mut seq)
                .withf(move |record| record["user_id"] == Value::String(user_id.to_string()))
                .returning(|_| Ok(()));
        }

        let deps = deps(feature_store, endpoint, repository);
        let event = create_lambda_event(vec![
            create_kinesis_record("1", &transaction(1, "8250")),
            create_kinesis_record("2", &transaction(2, "8250")),
            create_kinesis_record("3", &transaction(3, "8250")),
        ]);

        let response = function_handler(&deps, event).await.unwrap();

        assert!(response.batch_item_failures.is_empty());
    }

    #[tokio::test]
    async fn when_payload_is_invalid_json_should_skip_and_continue() {
        let mut feature_store = MockFeatureStore::default();
        let mut endpoint = MockInferenceEndpoint::default();
        let mut repository = MockPredictionRepository::default();

        feature_store
            .expect_get_record()
            .times(1)
            .returning(|_, _| Ok(destination_features()));
        endpoint.expect_predict().times(1).returning(|_| Ok(json!(91)));
        repository
            .expect_store_prediction()
            .times(1)
            .withf(|record| record["user_id"] == json!("7"))
            .returning(|_| Ok(()));

        let deps = deps(feature_store, endpoint, repository);
        let event = create_lambda_event(vec![
            create_kinesis_record("1", "invalid json"),
            create_kinesis_record("2", &transaction(7, "8250")),
        ]);

        let response = function_handler(&deps, event).await.unwrap();

        assert!(response.batch_item_failures.is_empty());
    }

    #[tokio::test]
    async fn when_lookup_key_is_missing_should_not_query_feature_store() {
        let mut feature_store = MockFeatureStore::default();
        let mut endpoint = MockInferenceEndpoint::default();
        let mut repository = MockPredictionRepository::default();

        feature_store.expect_get_record().times(0);
        endpoint.expect_predict().times(0);
        repository.expect_store_prediction().times(0);

        let deps = deps(feature_store, endpoint, repository);
        let data = json!({"user_id": 42, "is_mobile": 1}).to_string();
        let event = create_lambda_event(vec![create_kinesis_record("1", &data)]);

        let response = function_handler(&deps, event).await.unwrap();

        assert!(response.batch_item_failures.is_empty());
    }

    #[tokio::test]
    async fn when_feature_is_missing_should_not_invoke_endpoint() {
        let mut feature_store = MockFeatureStore::default();
        let mut endpoint = MockInferenceEndpoint::default();
        let mut repository = MockPredictionRepository::default();

        feature_store
            .expect_get_record()
            .times(1)
            .returning(|_, _| Ok(vec![FeatureValue::new("ch_popularity", "0.31")]));
        endpoint.expect_predict().times(0);
        repository.expect_store_prediction().times(0);

        let deps = deps(feature_store, endpoint, repository);
        let event = create_lambda_event(vec![create_kinesis_record("1", &transaction(42, "8250"))]);

        let response = function_handler(&deps, event).await.unwrap();

        assert!(response.batch_item_failures.is_empty());
    }

    #[tokio::test]
    async fn when_feature_store_is_throttled_should_stop_and_report_record() {
        let mut feature_store = MockFeatureStore::default();
        let mut endpoint = MockInferenceEndpoint::default();
        let mut repository = MockPredictionRepository::default();
        let mut seq = Sequence::new();

        feature_store
            .expect_get_record()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(destination_features()));
        feature_store
            .expect_get_record()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(transient_error()));
        endpoint.expect_predict().times(1).returning(|_| Ok(json!(91)));
        repository
            .expect_store_prediction()
            .times(1)
            .returning(|_| Ok(()));

        let deps = deps(feature_store, endpoint, repository);
        let event = create_lambda_event(vec![
            create_kinesis_record("100", &transaction(1, "8250")),
            create_kinesis_record("101", &transaction(2, "8250")),
            create_kinesis_record("102", &transaction(3, "8250")),
        ]);

        let response = function_handler(&deps, event).await.unwrap();

        assert_eq!(response.batch_item_failures.len(), 1);
        assert_eq!(
            response.batch_item_failures[0].item_identifier,
            Some("101".to_string())
        );
    }

    #[tokio::test]
    async fn when_table_write_fails_transiently_should_report_record() {
        let mut feature_store = MockFeatureStore::default();
        let mut endpoint = MockInferenceEndpoint::default();
        let mut repository = MockPredictionRepository::default();

        feature_store
            .expect_get_record()
            .times(1)
            .returning(|_, _| Ok(destination_features()));
        endpoint.expect_predict().times(1).returning(|_| Ok(json!(91)));
        repository.expect_store_prediction().times(1).returning(|_| {
            Err(PipelineError::Service {
                service: "dynamodb",
                kind: ErrorKind::Transient,
                message: "ProvisionedThroughputExceededException".to_string(),
            })
        });

        let deps = deps(feature_store, endpoint, repository);
        let event = create_lambda_event(vec![create_kinesis_record("5", &transaction(42, "8250"))]);

        let response = function_handler(&deps, event).await.unwrap();

        assert_eq!(response.batch_item_failures.len(), 1);
        assert_eq!(
            response.batch_item_failures[0].item_identifier,
            Some("5".to_string())
        );
    }
}
