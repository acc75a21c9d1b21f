use nlsub_client_core::newsletter::UrlProblem;

/// Failure talking to the remote job service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Transport or connectivity failure; the request may not have reached the service.
    #[error("job service unreachable: {0}")]
    Unreachable(String),
    /// The service answered with a non-2xx status.
    #[error("job service rejected request (http {status}){}", detail_suffix(.message))]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server-supplied message, if any.
        message: Option<String>,
    },
    /// A 2xx response whose body could not be decoded.
    #[error("job service sent an invalid response: {0}")]
    InvalidResponse(String),
}

/// Why a run could not be started. None of these change the controller state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    /// Local input check failed; nothing was sent.
    #[error("invalid start request: {0}")]
    Validation(String),
    /// A run is already starting, active or stopping.
    #[error("a run is already active")]
    AlreadyRunning,
    /// The job service could not be reached or refused the run.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// The controller task is gone.
    #[error("controller has shut down")]
    Shutdown,
}

/// Failure of `stop`, `reset` or `attach`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// The job service request failed; local state stays consistent.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// The controller task is gone.
    #[error("controller has shut down")]
    Shutdown,
}

/// Failure of a registry mutation or refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The URL was rejected locally; nothing was sent.
    #[error("invalid newsletter url: {0}")]
    InvalidUrl(UrlProblem),
    /// The job service request failed.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

fn detail_suffix(message: &Option<String>) -> String {
    match message.as_deref() {
        Some(m) if !m.is_empty() => format!(": {m}"),
        _ => String::new(),
    }
}

pub(crate) fn transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_decode() {
        ServiceError::InvalidResponse(format!("{err:#}"))
    } else {
        ServiceError::Unreachable(format!("{err:#}"))
    }
}
