//! REST backend for the entity and identity capabilities.
//!
//! Entities live under `/api/entities/{entity}`; filters travel as a JSON
//! `q` query parameter. The current principal comes from `/api/auth/me`.

use crate::config::RemoteConfig;
use async_trait::async_trait;
use condor_core::{CondorError, CondorResult, Principal, RemoteError};
use condor_storage::{EntityStore, Filter, IdentityService};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    auth_header: HeaderMap,
    timeout_ms: u64,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .field("auth_headers", &self.auth_header.keys().collect::<Vec<_>>())
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl RestClient {
    pub fn new(config: &RemoteConfig) -> CondorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|err| RemoteError::Transport {
                reason: err.to_string(),
            })?;
        let auth_header = build_auth_headers(config)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header,
            timeout_ms: config.request_timeout_ms,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, url)
            .headers(self.auth_header.clone())
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> CondorResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|err| self.transport_error(operation, err))?;
        check_status(response).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> CondorResult<T> {
        let response = self.send(operation, request).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| self.transport_error(operation, err))
    }

    fn transport_error(&self, operation: &str, err: reqwest::Error) -> CondorError {
        let remote = if err.is_timeout() {
            RemoteError::Timeout {
                operation: operation.to_string(),
                timeout_ms: self.timeout_ms,
            }
        } else if err.is_decode() {
            RemoteError::InvalidResponse {
                reason: err.to_string(),
            }
        } else {
            RemoteError::Transport {
                reason: err.to_string(),
            }
        };
        remote.into()
    }
}

#[async_trait]
impl EntityStore for RestClient {
    async fn list(&self, entity: &str) -> CondorResult<Vec<Value>> {
        let request = self.request(Method::GET, &entity_path(entity));
        self.send_json("entities.list", request).await
    }

    async fn filter(&self, entity: &str, filter: &Filter) -> CondorResult<Vec<Value>> {
        let query = serde_json::to_string(filter)?;
        let request = self
            .request(Method::GET, &entity_path(entity))
            .query(&[("q", query)]);
        self.send_json("entities.filter", request).await
    }

    async fn get(&self, entity: &str, id: &str) -> CondorResult<Value> {
        let request = self.request(Method::GET, &record_path(entity, id));
        match self.send_json("entities.get", request).await {
            Err(CondorError::Remote(RemoteError::NotFound { .. })) => {
                Err(RemoteError::NotFound {
                    entity: entity.to_string(),
                    id: id.to_string(),
                }
                .into())
            }
            other => other,
        }
    }

    async fn create(&self, entity: &str, data: Value) -> CondorResult<Value> {
        let request = self.request(Method::POST, &entity_path(entity)).json(&data);
        self.send_json("entities.create", request).await
    }

    async fn update(&self, entity: &str, id: &str, patch: Value) -> CondorResult<Value> {
        let request = self
            .request(Method::PUT, &record_path(entity, id))
            .json(&patch);
        self.send_json("entities.update", request).await
    }

    async fn delete(&self, entity: &str, id: &str) -> CondorResult<()> {
        let request = self.request(Method::DELETE, &record_path(entity, id));
        self.send("entities.delete", request).await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityService for RestClient {
    async fn who_am_i(&self) -> CondorResult<Principal> {
        let request = self.request(Method::GET, "/api/auth/me");
        self.send_json("auth.me", request).await
    }

    async fn sign_out(&self) -> CondorResult<()> {
        let request = self.request(Method::POST, "/api/auth/logout");
        self.send("auth.logout", request).await?;
        Ok(())
    }
}

fn entity_path(entity: &str) -> String {
    format!("/api/entities/{}", entity)
}

fn record_path(entity: &str, id: &str) -> String {
    format!("/api/entities/{}/{}", entity, id)
}

async fn check_status(response: Response) -> CondorResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });
    Err(status_error(status, message).into())
}

fn status_error(status: StatusCode, message: String) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED => RemoteError::Unauthenticated { reason: message },
        StatusCode::FORBIDDEN => RemoteError::Forbidden { reason: message },
        StatusCode::NOT_FOUND => RemoteError::NotFound {
            entity: String::new(),
            id: message,
        },
        _ => RemoteError::Remote {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => ["message", "error", "detail"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .or_else(|| Some(trimmed.to_string())),
        Err(_) => Some(trimmed.to_string()),
    }
}

fn build_auth_headers(config: &RemoteConfig) -> CondorResult<HeaderMap> {
    let invalid = |err: reqwest::header::InvalidHeaderValue| {
        CondorError::from(RemoteError::Transport {
            reason: format!("invalid credential header: {}", err),
        })
    };
    let mut headers = HeaderMap::new();
    if let Some(api_key) = &config.api_key {
        let mut value = HeaderValue::from_str(api_key).map_err(invalid)?;
        value.set_sensitive(true);
        headers.insert(HeaderName::from_static("x-api-key"), value);
    }
    if let Some(token) = &config.bearer_token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(invalid)?;
        value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, value);
    }
    Ok(headers)
}
