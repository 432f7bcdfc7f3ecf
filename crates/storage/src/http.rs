//! REST client for a remote attempt backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quiz_core::model::{AnswerSnapshot, AssessmentDefinition, AttemptId, QuizId};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::repository::{
    AttemptStart, AttemptStore, QuizDefinitionRepository, Storage, StorageError, SubmissionReceipt,
};

/// Upper bound for one request, body included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug)]
pub struct HttpStoreConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
    /// A request still running after this long fails with
    /// [`StorageError::Network`].
    pub request_timeout: Duration,
}

impl HttpStoreConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Zero keeps the current timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.request_timeout = timeout;
        }
        self
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.bearer_token = Some(token).filter(|t| !t.trim().is_empty());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Attempt Store and Quiz Definition Service backed by HTTP endpoints:
///
/// - `POST {base}/quizzes/{quiz_id}/attempts`
/// - `PUT {base}/attempts/{attempt_id}/progress`
/// - `POST {base}/attempts/{attempt_id}/submit`
/// - `GET {base}/quizzes/{quiz_id}`
#[derive(Clone)]
pub struct HttpAttemptStore {
    client: Client,
    config: HttpStoreConfig,
}

#[derive(Debug, Serialize)]
struct ProgressRequest<'a> {
    answers: &'a [AnswerSnapshot],
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    answers: &'a [AnswerSnapshot],
    is_auto_submit: bool,
}

impl HttpAttemptStore {
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the HTTP client cannot be built.
    pub fn new(config: HttpStoreConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.config.url(path));
        match self.config.bearer_token.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(builder: reqwest::RequestBuilder) -> Result<Response, StorageError> {
        let response = builder.send().await.map_err(network)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(status_error(status))
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, StorageError> {
        response
            .json::<T>()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

fn network(e: reqwest::Error) -> StorageError {
    StorageError::Network(e.to_string())
}

fn status_error(status: StatusCode) -> StorageError {
    match status {
        StatusCode::NOT_FOUND => StorageError::NotFound,
        StatusCode::CONFLICT => StorageError::Conflict,
        other => StorageError::Network(format!("unexpected status {other}")),
    }
}

#[async_trait]
impl AttemptStore for HttpAttemptStore {
    async fn start(&self, quiz_id: QuizId) -> Result<AttemptStart, StorageError> {
        let path = format!("quizzes/{quiz_id}/attempts");
        let response = Self::send(self.request(reqwest::Method::POST, &path)).await?;
        let start: AttemptStart = Self::json(response).await?;
        for question in &start.questions {
            question
                .validate()
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
        }
        debug!(attempt_id = %start.attempt_id, %quiz_id, "attempt started remotely");
        Ok(start)
    }

    async fn save_progress(
        &self,
        attempt_id: AttemptId,
        answers: &[AnswerSnapshot],
    ) -> Result<(), StorageError> {
        let path = format!("attempts/{attempt_id}/progress");
        Self::send(
            self.request(reqwest::Method::PUT, &path)
                .json(&ProgressRequest { answers }),
        )
        .await?;
        Ok(())
    }

    async fn submit(
        &self,
        attempt_id: AttemptId,
        answers: &[AnswerSnapshot],
        is_auto_submit: bool,
    ) -> Result<SubmissionReceipt, StorageError> {
        let path = format!("attempts/{attempt_id}/submit");
        let response = Self::send(self.request(reqwest::Method::POST, &path).json(
            &SubmitRequest {
                answers,
                is_auto_submit,
            },
        ))
        .await?;
        Self::json(response).await
    }
}

#[async_trait]
impl QuizDefinitionRepository for HttpAttemptStore {
    async fn get_by_id(&self, quiz_id: QuizId) -> Result<AssessmentDefinition, StorageError> {
        let path = format!("quizzes/{quiz_id}");
        let response = Self::send(self.request(reqwest::Method::GET, &path)).await?;
        let definition: AssessmentDefinition = Self::json(response).await?;
        definition
            .validated()
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

impl Storage {
    /// Build a `Storage` that talks to a remote REST backend.
    ///
    /// # Errors
    ///
    /// See [`HttpAttemptStore::new`].
    pub fn http(config: HttpStoreConfig) -> Result<Self, StorageError> {
        let store = HttpAttemptStore::new(config)?;
        let attempts: Arc<dyn AttemptStore> = Arc::new(store.clone());
        let quizzes: Arc<dyn QuizDefinitionRepository> = Arc::new(store);
        Ok(Self { attempts, quizzes })
    }
}
