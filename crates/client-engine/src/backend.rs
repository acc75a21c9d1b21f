use std::time::Duration;

use nlsub_client_core::settings::Speed;
use nlsub_client_core::task::TaskRecord;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, transport_error};

/// Body of `GET /status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStatus {
    /// Authoritative "run in progress" flag.
    pub is_running: bool,
    /// Number of scheduled tasks, when the service reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    /// Number of finished tasks by the service's own count, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<usize>,
}

/// Body of a successful `POST /start`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StartAck {
    /// Service-side status string (e.g. `started`).
    #[serde(default)]
    pub status: Option<String>,
    /// Number of tasks scheduled for the run.
    #[serde(default)]
    pub total: Option<usize>,
}

/// One poll observation: the task list and the active flag, taken as a pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolledSnapshot {
    /// Complete ordered task list.
    pub tasks: Vec<TaskRecord>,
    /// Whether the service still reports the run as active.
    pub remote_active: bool,
}

#[derive(Debug, Serialize)]
struct StartBody<'a> {
    emails: &'a [String],
    urls: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<Speed>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryBody {
    #[serde(default)]
    urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    detail: serde_json::Value,
}

/// The remote job service as seen by the controller and the registry mirror.
#[async_trait::async_trait]
pub trait JobService: Send + Sync {
    /// `GET /status`.
    async fn status(&self) -> Result<RemoteStatus, ServiceError>;

    /// `GET /tasks`.
    async fn tasks(&self) -> Result<Vec<TaskRecord>, ServiceError>;

    /// `POST /start`.
    async fn start(
        &self,
        emails: &[String],
        urls: &[String],
        speed: Option<Speed>,
    ) -> Result<StartAck, ServiceError>;

    /// `POST /stop`. Only requests cancellation.
    async fn stop(&self) -> Result<(), ServiceError>;

    /// `POST /reset`.
    async fn reset(&self) -> Result<(), ServiceError>;

    /// `GET /newsletter/urls`.
    async fn registry(&self) -> Result<Vec<String>, ServiceError>;

    /// `POST /newsletter/urls`, replacing the whole registry.
    async fn replace_registry(&self, urls: &[String]) -> Result<(), ServiceError>;

    /// Read tasks and status for one poll tick. If either read fails the other is dropped.
    async fn poll_snapshot(&self) -> Result<PolledSnapshot, ServiceError> {
        let (tasks, status) = tokio::join!(self.tasks(), self.status());
        Ok(PolledSnapshot {
            tasks: tasks?,
            remote_active: status?.is_running,
        })
    }
}

/// HTTP+JSON implementation of [`JobService`].
#[derive(Debug, Clone)]
pub struct HttpJobService {
    http: reqwest::Client,
    base: Url,
}

impl HttpJobService {
    /// Build a client for `base_url` with a per-request `timeout`.
    pub fn new(base_url: Url, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Use an existing `reqwest` client.
    pub fn with_client(http: reqwest::Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http,
            base: base_url,
        }
    }

    /// Base address requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base
            .join(path)
            .map_err(|err| ServiceError::Unreachable(format!("bad endpoint {path:?}: {err}")))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let res = self
            .http
            .get(self.endpoint(path)?)
            .send()
            .await
            .map_err(transport_error)?;
        let res = ensure_success(res).await?;
        res.json().await.map_err(transport_error)
    }

    async fn post_empty(&self, path: &str) -> Result<(), ServiceError> {
        let res = self
            .http
            .post(self.endpoint(path)?)
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(res).await?;
        Ok(())
    }
}

async fn ensure_success(res: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    Err(ServiceError::Rejected {
        status,
        message: rejection_message(&body),
    })
}

fn rejection_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(err) = serde_json::from_str::<ApiErrorBody>(body) {
        return match err.detail {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        };
    }
    Some(body.to_string())
}

#[async_trait::async_trait]
impl JobService for HttpJobService {
    async fn status(&self) -> Result<RemoteStatus, ServiceError> {
        self.get_json("status").await
    }

    async fn tasks(&self) -> Result<Vec<TaskRecord>, ServiceError> {
        self.get_json("tasks").await
    }

    async fn start(
        &self,
        emails: &[String],
        urls: &[String],
        speed: Option<Speed>,
    ) -> Result<StartAck, ServiceError> {
        let res = self
            .http
            .post(self.endpoint("start")?)
            .json(&StartBody {
                emails,
                urls,
                speed,
            })
            .send()
            .await
            .map_err(transport_error)?;
        let res = ensure_success(res).await?;
        // The acknowledgement body is informational; a run that started is not undone by it.
        let body = res.text().await.unwrap_or_default();
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.post_empty("stop").await
    }

    async fn reset(&self) -> Result<(), ServiceError> {
        self.post_empty("reset").await
    }

    async fn registry(&self) -> Result<Vec<String>, ServiceError> {
        let body: RegistryBody = self.get_json("newsletter/urls").await?;
        Ok(body.urls)
    }

    async fn replace_registry(&self, urls: &[String]) -> Result<(), ServiceError> {
        let res = self
            .http
            .post(self.endpoint("newsletter/urls")?)
            .json(&RegistryBody {
                urls: urls.to_vec(),
            })
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(res).await?;
        Ok(())
    }
}
