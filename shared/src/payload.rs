//! Turning a stream record into model input and a persisted prediction.
//!
//! The model was trained on the stream fields in payload order followed by
//! the feature-store fields in configured order. Nothing here can check
//! that the two orders still match the training set, so a reordered
//! producer or feature list silently yields wrong predictions.

use crate::core::{FeatureValue, Payload};
use crate::error::PipelineError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

pub const CSV_CONTENT_TYPE: &str = "text/csv";
pub const DATE_TIME_FIELD: &str = "date_time";

pub fn decode_payload(data: &[u8]) -> Result<Payload, PipelineError> {
    let text = std::str::from_utf8(data).map_err(|e| PipelineError::Decode(e.to_string()))?;
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(payload)) => Ok(payload),
        Ok(other) => Err(PipelineError::Decode(format!(
            "expected a JSON object, found {}",
            json_type_name(&other)
        ))),
        Err(e) => Err(PipelineError::Decode(e.to_string())),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Strings keep their raw text, everything else renders as JSON.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn lookup_key_value(payload: &Payload, key: &str) -> Result<String, PipelineError> {
    payload
        .get(key)
        .map(stringify_value)
        .ok_or_else(|| PipelineError::MissingField(key.to_string()))
}

/// Rearranges the store's answer into the requested name order.
pub fn order_features(
    identifier: &str,
    requested: &[String],
    fetched: Vec<FeatureValue>,
) -> Result<Vec<String>, PipelineError> {
    if fetched.is_empty() {
        return Err(PipelineError::RecordNotFound(identifier.to_string()));
    }
    requested
        .iter()
        .map(|name| {
            fetched
                .iter()
                .find(|feature| &feature.name == name)
                .map(|feature| feature.value.clone())
                .ok_or_else(|| PipelineError::MissingFeature {
                    identifier: identifier.to_string(),
                    feature: name.clone(),
                })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureVector(Vec<String>);

impl FeatureVector {
    pub fn assemble(payload: &Payload, from_store: Vec<String>) -> Self {
        let mut values: Vec<String> = payload.values().map(stringify_value).collect();
        values.extend(from_store);
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_csv_line(&self) -> String {
        self.0.join(",")
    }
}

/// Stamps the record with everything the prediction table expects.
pub fn augment_payload(
    payload: &mut Payload,
    subject_id_field: &str,
    processed_at: DateTime<Utc>,
    predicted_variable: &str,
    prediction: Value,
) -> Result<(), PipelineError> {
    let subject_id = payload
        .get(subject_id_field)
        .map(stringify_value)
        .ok_or_else(|| PipelineError::MissingField(subject_id_field.to_string()))?;
    payload.insert(subject_id_field.to_string(), Value::String(subject_id));
    payload.insert(
        DATE_TIME_FIELD.to_string(),
        Value::String(processed_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
    );
    payload.insert(predicted_variable.to_string(), prediction);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("test payload must be an object"),
        }
    }

    #[test]
    fn decode_keeps_fields_and_their_order() {
        let data = br#"{"user_id": 42, "srch_destination_id": "8250", "is_mobile": true, "orig_destination_distance": 590.21}"#;

        let decoded = decode_payload(data).unwrap();

        let keys: Vec<&str> = decoded.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "user_id",
                "srch_destination_id",
                "is_mobile",
                "orig_destination_distance"
            ]
        );
        assert_eq!(decoded["orig_destination_distance"], json!(590.21));
    }

    #[test]
    fn decode_rejects_anything_but_an_object() {
        assert!(matches!(
            decode_payload(b"[1, 2]"),
            Err(PipelineError::Decode(_))
        ));
        assert!(matches!(
            decode_payload(b"not json"),
            Err(PipelineError::Decode(_))
        ));
        assert!(matches!(
            decode_payload(&[0xff, 0xfe]),
            Err(PipelineError::Decode(_))
        ));
    }

    #[test]
    fn lookup_key_is_stringified() {
        let record = payload(json!({"user_id": 42, "srch_destination_id": "8250"}));

        assert_eq!(lookup_key_value(&record, "user_id").unwrap(), "42");
        assert_eq!(
            lookup_key_value(&record, "srch_destination_id").unwrap(),
            "8250"
        );
        assert!(matches!(
            lookup_key_value(&record, "hotel_market"),
            Err(PipelineError::MissingField(field)) if field == "hotel_market"
        ));
    }

    #[test]
    fn features_follow_requested_order_not_response_order() {
        let requested = vec!["ch_popularity".to_string(), "ch_mean_distance".to_string()];
        let fetched = vec![
            FeatureValue::new("ch_mean_distance", "1204.5"),
            FeatureValue::new("ch_popularity", "0.31"),
        ];

        let ordered = order_features("8250", &requested, fetched).unwrap();

        assert_eq!(ordered, vec!["0.31", "1204.5"]);
    }

    #[test]
    fn empty_store_answer_means_record_not_found() {
        let requested = vec!["ch_popularity".to_string()];

        let result = order_features("8250", &requested, vec![]);

        assert!(matches!(result, Err(PipelineError::RecordNotFound(id)) if id == "8250"));
    }

    #[test]
    fn absent_feature_is_reported_by_name() {
        let requested = vec!["ch_popularity".to_string(), "ch_mean_distance".to_string()];
        let fetched = vec![FeatureValue::new("ch_popularity", "0.31")];

        let result = order_features("8250", &requested, fetched);

        assert!(matches!(
            result,
            Err(PipelineError::MissingFeature { feature, .. }) if feature == "ch_mean_distance"
        ));
    }

    #[test]
    fn vector_puts_stream_values_before_store_values() {
        let record = payload(json!({"user_id": 42, "is_mobile": 0, "srch_destination_id": "8250"}));

        let vector = FeatureVector::assemble(&record, vec!["0.31".to_string(), "1204.5".to_string()]);

        assert_eq!(vector.len(), 5);
        assert_eq!(vector.to_csv_line(), "42,0,8250,0.31,1204.5");
    }

    #[test]
    fn augmented_payload_has_subject_timestamp_and_prediction() {
        let mut record = payload(json!({"user_id": 42, "srch_destination_id": "8250"}));
        let processed_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

        augment_payload(
            &mut record,
            "user_id",
            processed_at,
            "hotel_cluster",
            json!({"predictions": [{"score": 7}]}),
        )
        .unwrap();

        assert_eq!(record["user_id"], json!("42"));
        assert_eq!(record[DATE_TIME_FIELD], json!("2024-03-01T12:30:00.000000Z"));
        assert_eq!(record["hotel_cluster"], json!({"predictions": [{"score": 7}]}));
        assert_eq!(record["srch_destination_id"], json!("8250"));
    }

    #[test]
    fn augment_requires_the_subject_field() {
        let mut record = payload(json!({"srch_destination_id": "8250"}));

        let result = augment_payload(&mut record, "user_id", Utc::now(), "hotel_cluster", json!(3));

        assert!(matches!(result, Err(PipelineError::MissingField(field)) if field == "user_id"));
        assert!(!record.contains_key(DATE_TIME_FIELD));
    }
}
