//! Blocking HTTP JSON client for the remote goal-map resource.

use super::{
    CompletionRequest, CompletionResponse, CreateGoalMapRequest, RemoteError, RemoteGoalMap,
    RemoteResult, RemoteStore, UpdateGoalMapRequest,
};
use crate::config::RemoteConfig;
use log::{debug, warn};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

const MAX_ERROR_BODY_CHARS: usize = 200;

/// `RemoteStore` over the conventional REST API.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    base_url: Url,
    api_token: Option<String>,
    client: Client,
}

impl HttpRemoteStore {
    /// Builds a client from validated configuration.
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        config
            .validate()
            .map_err(|err| RemoteError::InvalidConfig(err.to_string()))?;
        let base_url = Url::parse(config.normalized_base_url())
            .map_err(|err| RemoteError::InvalidConfig(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidConfig(format!(
                "base url cannot carry a path: {base_url}"
            )));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|err| RemoteError::InvalidConfig(err.to_string()))?;

        Ok(Self {
            base_url,
            api_token: config
                .api_token
                .as_deref()
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Appends percent-encoded path segments to the base url.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn send(&self, op: &'static str, builder: RequestBuilder) -> RemoteResult<Response> {
        let started_at = Instant::now();
        let result = self.authorized(builder).send();
        match result {
            Ok(response) => {
                debug!(
                    "event=remote_request module=remote op={op} status={} duration_ms={}",
                    response.status().as_u16(),
                    started_at.elapsed().as_millis()
                );
                Ok(response)
            }
            Err(err) => {
                warn!(
                    "event=remote_request module=remote op={op} status=error duration_ms={} timeout={}",
                    started_at.elapsed().as_millis(),
                    err.is_timeout()
                );
                Err(RemoteError::Network(err.to_string()))
            }
        }
    }
}

impl RemoteStore for HttpRemoteStore {
    fn fetch_by_project(&self, project_id: &str) -> RemoteResult<Option<RemoteGoalMap>> {
        let builder = self
            .client
            .get(self.endpoint(&["goal-maps"]))
            .query(&[("projectId", project_id)]);
        let response = self.send("fetch", builder)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_json::<Option<RemoteGoalMap>>(response)
    }

    fn create(&self, request: &CreateGoalMapRequest) -> RemoteResult<RemoteGoalMap> {
        let builder = self
            .client
            .post(self.endpoint(&["goal-maps"]))
            .json(request);
        read_json(self.send("create", builder)?)
    }

    fn update(&self, id: &str, request: &UpdateGoalMapRequest) -> RemoteResult<RemoteGoalMap> {
        let builder = self
            .client
            .put(self.endpoint(&["goal-maps", id]))
            .json(request);
        read_json(self.send("update", builder)?)
    }

    fn mark_complete(&self, request: &CompletionRequest) -> RemoteResult<CompletionResponse> {
        let builder = self
            .client
            .post(self.endpoint(&["project-progress", "goal-mapping", "complete"]))
            .json(request);
        let response = self.send("complete", builder)?;
        let body = ensure_success(response)?
            .text()
            .map_err(|err| RemoteError::Decode(err.to_string()))?;
        if body.trim().is_empty() {
            return Ok(CompletionResponse::default());
        }
        serde_json::from_str(&body).map_err(|err| RemoteError::Decode(err.to_string()))
    }
}

fn ensure_success(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound);
    }
    let body = response.text().unwrap_or_default();
    Err(RemoteError::Http {
        status: status.as_u16(),
        body: truncate_body(&body),
    })
}

fn read_json<T: DeserializeOwned>(response: Response) -> RemoteResult<T> {
    ensure_success(response)?
        .json::<T>()
        .map_err(|err| RemoteError::Decode(err.to_string()))
}

fn truncate_body(body: &str) -> String {
    let normalized = body.replace(['\n', '\r'], " ");
    let mut truncated = normalized
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect::<String>();
    if normalized.chars().count() > MAX_ERROR_BODY_CHARS {
        truncated.push_str("...");
    }
    truncated
}
