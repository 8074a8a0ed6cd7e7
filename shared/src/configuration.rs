use figment::providers::Env;
use figment::Figment;
use serde::{Deserialize, Deserializer, Serialize};

const ENV_VARS: &[&str] = &[
    "ENDPOINT_NAME",
    "FG_NAME",
    "DDB_TABLE_NAME",
    "ONLINE_FEATURE_GROUP_KEY",
    "ONLINE_FEATURE_GROUP_FEATURES_OF_INTEREST",
    "PREDICTED_VARIABLE",
    "SUBJECT_ID_FIELD",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Extract(#[from] figment::Error),
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "scalar_as_string")]
    pub endpoint_name: String,
    #[serde(deserialize_with = "scalar_as_string")]
    pub fg_name: String,
    #[serde(deserialize_with = "scalar_as_string")]
    pub ddb_table_name: String,
    #[serde(deserialize_with = "scalar_as_string")]
    pub online_feature_group_key: String,
    /// Comma separated, in the order the model was trained on.
    #[serde(deserialize_with = "scalar_as_string")]
    pub online_feature_group_features_of_interest: String,
    #[serde(deserialize_with = "scalar_as_string")]
    pub predicted_variable: String,
    #[serde(
        default = "default_subject_id_field",
        deserialize_with = "scalar_as_string"
    )]
    pub subject_id_field: String,
}

/// `Env` parses values like `true` or `42` into bools and numbers; every
/// setting here is a name, so take them back as text.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Bool(bool),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(text) => text,
        Scalar::Bool(b) => b.to_string(),
        Scalar::Unsigned(n) => n.to_string(),
        Scalar::Signed(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
    })
}

fn default_subject_id_field() -> String {
    "user_id".to_string()
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let config: Config = Figment::new()
            .merge(Env::raw().only(ENV_VARS))
            .extract()?;
        config.validate()
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        let required = [
            ("ENDPOINT_NAME", &self.endpoint_name),
            ("FG_NAME", &self.fg_name),
            ("DDB_TABLE_NAME", &self.ddb_table_name),
            ("ONLINE_FEATURE_GROUP_KEY", &self.online_feature_group_key),
            ("PREDICTED_VARIABLE", &self.predicted_variable),
            ("SUBJECT_ID_FIELD", &self.subject_id_field),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Empty(*name));
        }
        if self.feature_names().is_empty() {
            return Err(ConfigError::Empty(
                "ONLINE_FEATURE_GROUP_FEATURES_OF_INTEREST",
            ));
        }
        Ok(self)
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.online_feature_group_features_of_interest
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}
