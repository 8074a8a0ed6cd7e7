use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use std::fmt::Debug;

/// Whether redelivering the same record could succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("record payload is not a UTF-8 JSON object: {0}")]
    Decode(String),
    #[error("record payload has no `{0}` field")]
    MissingField(String),
    #[error("feature store has no record for identifier `{0}`")]
    RecordNotFound(String),
    #[error("feature store record `{identifier}` is missing feature `{feature}`")]
    MissingFeature { identifier: String, feature: String },
    #[error("inference response could not be decoded: {0}")]
    InvalidPrediction(String),
    #[error("{service} call failed: {message}")]
    Service {
        service: &'static str,
        kind: ErrorKind,
        message: String,
    },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Service { kind, .. } => *kind,
            _ => ErrorKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn from_sdk<E, R>(service: &'static str, err: SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata + Debug,
        R: Debug,
    {
        PipelineError::Service {
            service,
            kind: classify_sdk_error(&err),
            message: format!("{:?}", err),
        }
    }
}

// Error codes the AWS services use for throttling and server-side faults.
const TRANSIENT_ERROR_CODES: &[&str] = &[
    "ThrottlingException",
    "Throttling",
    "ProvisionedThroughputExceededException",
    "RequestLimitExceeded",
    "TransactionConflictException",
    "InternalServerError",
    "InternalFailure",
    "InternalDependencyException",
    "ServiceUnavailable",
    "ServiceUnavailableException",
    "ModelNotReadyException",
];

/// Every AWS SDK crate re-exports the same `SdkError`, so this works for
/// the feature store, the inference runtime and DynamoDB alike.
pub fn classify_sdk_error<E: ProvideErrorMetadata, R>(err: &SdkError<E, R>) -> ErrorKind {
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ErrorKind::Transient
        }
        SdkError::ServiceError(context) => classify_error_code(context.err().code()),
        _ => ErrorKind::Permanent,
    }
}

pub fn classify_error_code(code: Option<&str>) -> ErrorKind {
    match code {
        Some(code) if TRANSIENT_ERROR_CODES.contains(&code) => ErrorKind::Transient,
        _ => ErrorKind::Permanent,
    }
}
