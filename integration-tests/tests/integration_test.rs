use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_kinesis::primitives::Blob;
use infra::stack::{stack_output, CloudFormationStacks};
use std::env;
use std::time::Duration;

#[ignore]
#[tokio::test]
async fn when_transaction_is_streamed_should_store_a_prediction() {
    let config = aws_config::load_from_env().await;
    let stacks = CloudFormationStacks::new(aws_sdk_cloudformation::Client::new(&config));
    let stack_name = env::var("STACK_NAME").unwrap_or("hotel-cluster".to_string());

    let stream_name = stack_output(&stacks, &stack_name, "KinesisStreamName")
        .await
        .expect("KinesisStreamName output");
    let table_name = stack_output(&stacks, &stack_name, "PredictionsTableName")
        .await
        .expect("PredictionsTableName output");
    let predicted_variable =
        env::var("PREDICTED_VARIABLE").unwrap_or("hotel_cluster".to_string());

    let user_id = format!("{}", std::process::id());
    let transaction = serde_json::json!({
        "user_id": user_id.parse::<u64>().unwrap(),
        "srch_destination_id": 8250,
        "is_mobile": 0,
        "is_package": 1,
        "channel": 9,
        "srch_adults_cnt": 2,
        "srch_children_cnt": 0,
        "srch_rm_cnt": 1
    });

    let kinesis_client = aws_sdk_kinesis::Client::new(&config);
    kinesis_client
        .put_record()
        .stream_name(&stream_name)
        .partition_key(&user_id)
        .data(Blob::new(transaction.to_string().into_bytes()))
        .send()
        .await
        .unwrap();

    let dynamodb_client = aws_sdk_dynamodb::Client::new(&config);
    let mut items = vec![];
    for _ in 0..12 {
        tokio::time::sleep(Duration::from_secs(5)).await;
        let scan = dynamodb_client
            .scan()
            .table_name(&table_name)
            .filter_expression("user_id = :uid")
            .expression_attribute_values(":uid", AttributeValue::S(user_id.clone()))
            .send()
            .await
            .unwrap();
        items = scan.items().to_vec();
        if !items.is_empty() {
            break;
        }
    }

    assert_eq!(items.len(), 1);
    assert!(items[0].contains_key("date_time"));
    assert!(items[0].contains_key(&predicted_variable));
}
