use serde::{Deserialize, Serialize};

/// Status of a single (email, url) subscription task as reported by the job service.
///
/// The set is closed: anything the service sends that is not listed here, including a
/// missing, `null` or non-string value, is read as [`TaskStatus::UnknownResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "serde_json::Value")]
pub enum TaskStatus {
    Pending,
    Running,
    Ok,
    Captcha,
    Error,
    HttpError,
    NoEmailField,
    #[default]
    UnknownResult,
}

/// Coarse outcome bucket used for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    InProgress,
    Success,
    Warning,
    Failure,
}

impl TaskStatus {
    /// Map a wire status string to the closed set; unrecognized values become `UnknownResult`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "ok" => Self::Ok,
            "captcha" => Self::Captcha,
            "error" => Self::Error,
            "http_error" => Self::HttpError,
            "no_email_field" => Self::NoEmailField,
            _ => Self::UnknownResult,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Ok => "ok",
            Self::Captcha => "captcha",
            Self::Error => "error",
            Self::HttpError => "http_error",
            Self::NoEmailField => "no_email_field",
            Self::UnknownResult => "unknown_result",
        }
    }

    /// No further change is expected once a task reaches a terminal status.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    pub fn is_failure(self) -> bool {
        self.is_terminal() && !matches!(self, Self::Ok | Self::Captcha)
    }

    pub fn outcome(self) -> Outcome {
        match self {
            Self::Pending => Outcome::Pending,
            Self::Running => Outcome::InProgress,
            Self::Ok => Outcome::Success,
            Self::Captcha => Outcome::Warning,
            Self::Error | Self::HttpError | Self::NoEmailField | Self::UnknownResult => {
                Outcome::Failure
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Ok => "OK",
            Self::Captcha => "CAPTCHA",
            Self::Error => "Error",
            Self::HttpError => "HTTP Error",
            Self::NoEmailField => "No Email Field",
            Self::UnknownResult => "Unknown",
        }
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<serde_json::Value> for TaskStatus {
    fn from(raw: serde_json::Value) -> Self {
        match raw {
            serde_json::Value::String(s) => Self::parse(&s),
            _ => Self::UnknownResult,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scheduled subscription attempt. Snapshots are complete and ordered as the service
/// returned them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub email: String,
    pub url: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskRecord {
    pub fn new(email: impl Into<String>, url: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            email: email.into(),
            url: url.into(),
            status,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn key(&self) -> (&str, &str) {
        (&self.email, &self.url)
    }
}
