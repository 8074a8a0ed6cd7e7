#[derive(Debug, thiserror::Error)]
pub enum InfraError {
    #[error("{service} call failed: {message}")]
    Aws {
        service: &'static str,
        message: String,
    },
    #[error("{0} not found in the response")]
    Missing(&'static str),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl InfraError {
    pub fn aws(service: &'static str, err: impl std::fmt::Debug) -> Self {
        InfraError::Aws {
            service,
            message: format!("{:?}", err),
        }
    }
}
