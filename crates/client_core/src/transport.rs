//! Content-fetch surface: HTML fragments and JSON documents served by the application server.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use shared::{domain::HttpMethod, protocol::LayerContentRequest};
use tracing::debug;
use url::Url;

use crate::{config::join_under, error::FetchError};

#[derive(Debug, Clone, PartialEq)]
pub struct ContentRequest {
    pub path: String,
    pub method: HttpMethod,
    pub body: Option<Value>,
}

impl ContentRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Get,
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Post,
            body: Some(body),
        }
    }
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, request: ContentRequest) -> Result<String, FetchError>;
}

/// Fetches `request` and parses the response body as JSON.
pub async fn fetch_json(
    fetcher: &dyn ContentFetcher,
    request: ContentRequest,
) -> Result<Value, FetchError> {
    let path = request.path.clone();
    let text = fetcher.fetch(request).await?;
    serde_json::from_str(&text).map_err(|source| FetchError::Decode { path, source })
}

/// Ambient state attached to POST layer fetches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestScope {
    pub context: Map<String, Value>,
    pub settings: Map<String, Value>,
}

impl RequestScope {
    pub fn layer_request_body(&self, params: Option<&Value>) -> LayerContentRequest {
        LayerContentRequest {
            params: params.cloned().unwrap_or(Value::Null),
            context: self.context.clone(),
            settings: self.settings.clone(),
        }
    }
}

pub struct HttpContentFetcher {
    http: Client,
    base_url: Url,
}

impl HttpContentFetcher {
    pub fn new(server_url: &str) -> Result<Self, FetchError> {
        let base_url = Url::parse(server_url).map_err(|source| FetchError::InvalidUrl {
            path: server_url.to_string(),
            source,
        })?;
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    fn resolve(&self, path: &str) -> Result<Url, FetchError> {
        join_under(&self.base_url, path).map_err(|source| FetchError::InvalidUrl {
            path: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, request: ContentRequest) -> Result<String, FetchError> {
        let url = self.resolve(&request.path)?;
        debug!(url = %url, method = ?request.method, "fetching content");
        let builder = match request.method {
            HttpMethod::Get => self.http.get(url),
            HttpMethod::Post => {
                let body = request.body.unwrap_or(Value::Object(Map::new()));
                self.http.post(url).json(&body)
            }
        };
        let res = builder.send().await?.error_for_status()?;
        Ok(res.text().await?)
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
