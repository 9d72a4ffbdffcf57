//! HTTP transport for the Web App endpoint.
//!
//! Requests are posted as `text/plain` so the endpoint can be a script host
//! that refuses CORS preflights. The body is the JSON request regardless.

use futures::future::{FutureExt, LocalBoxFuture};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tally_engine::gateway::decode_body;
use tally_engine::{Action, ApiRequest, Error, Gateway, Result};

const CONTENT_TYPE_TEXT: &str = "text/plain;charset=utf-8";

/// [`Gateway`] over a single POST endpoint.
pub struct HttpGateway {
    client: reqwest::Client,
    url: Option<String>,
}

impl HttpGateway {
    pub fn new(url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    async fn post(&self, action: Action, token: &str, payload: Value) -> Result<Value> {
        let url = match self.url.as_deref() {
            Some(url) if self.is_configured() => url,
            _ => return Err(Error::MissingApiUrl),
        };

        let request = ApiRequest {
            action,
            token: token.to_string(),
            payload,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| Error::InvalidResponse(format!("unserializable request: {e}")))?;

        tracing::debug!(%action, "calling API");
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, CONTENT_TYPE_TEXT)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        if !status.is_success() {
            tracing::warn!(%action, %status, "API answered with an error status");
        }

        // The envelope decides, not the status code.
        decode_body(&text)
    }
}

impl Gateway for HttpGateway {
    fn is_configured(&self) -> bool {
        self.url
            .as_deref()
            .is_some_and(|url| url.trim_start().starts_with("http"))
    }

    fn call<'a>(
        &'a self,
        action: Action,
        token: &'a str,
        payload: Value,
    ) -> LocalBoxFuture<'a, Result<Value>> {
        self.post(action, token, payload).boxed_local()
    }
}
