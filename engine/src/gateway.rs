//! Remote API gateway.
//!
//! Every server interaction is a single action call carrying a bearer token
//! and a JSON payload. The server answers with an envelope:
//!
//! ```json
//! { "ok": true, "data": ... }
//! { "ok": false, "error": "message" }
//! ```
//!
//! Transports implement [`Gateway`]; [`RemoteApi`] adds typed wrappers on top.

use crate::entries::{decode_rows, lenient_rows, Entry, EntryUpdate};
use crate::error::{Error, Result};
use futures::future::LocalBoxFuture;
#[cfg(any(test, feature = "test-util"))]
use futures::future::{self, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
#[cfg(any(test, feature = "test-util"))]
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Maximum length of the response excerpt in a non-JSON error.
pub const SNIPPET_LIMIT: usize = 180;

/// Server actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    SaveEntry,
    ListEntries,
    UpdateEntry,
    DeleteEntry,
    GetInitialData,
}

impl Action {
    /// Wire name of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::SaveEntry => "saveEntry",
            Action::ListEntries => "listEntries",
            Action::UpdateEntry => "updateEntry",
            Action::DeleteEntry => "deleteEntry",
            Action::GetInitialData => "getInitialData",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body sent to the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub action: Action,
    pub token: String,
    pub payload: Value,
}

/// A transport able to perform one action call.
pub trait Gateway {
    /// Whether an endpoint is configured at all.
    fn is_configured(&self) -> bool;

    /// Perform `action` and return the envelope's `data` on success.
    fn call<'a>(
        &'a self,
        action: Action,
        token: &'a str,
        payload: Value,
    ) -> LocalBoxFuture<'a, Result<Value>>;
}

/// Decode a raw response body.
///
/// A body that is not JSON becomes [`Error::NonJsonResponse`] carrying a
/// short excerpt of what came back.
pub fn decode_body(body: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(body).map_err(|_| Error::NonJsonResponse {
        snippet: diagnostic_snippet(body),
    })?;
    decode_envelope(value)
}

/// Unwrap the `{ok, data | error}` envelope.
pub fn decode_envelope(value: Value) -> Result<Value> {
    if value.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(value.get("data").cloned().unwrap_or(Value::Null));
    }
    let message = value
        .get("error")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or("API error");
    Err(Error::Api(message.to_string()))
}

/// Collapse whitespace runs and truncate to [`SNIPPET_LIMIT`] characters.
pub fn diagnostic_snippet(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(SNIPPET_LIMIT).collect()
}

/// Data returned by `getInitialData`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialData {
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default, deserialize_with = "lenient_rows")]
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub rooms: Vec<String>,
}

/// Typed wrapper over a [`Gateway`].
#[derive(Clone)]
pub struct RemoteApi {
    gateway: Rc<dyn Gateway>,
}

impl RemoteApi {
    pub fn new(gateway: Rc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    pub fn is_configured(&self) -> bool {
        self.gateway.is_configured()
    }

    /// Raw call, for payloads that are already JSON.
    pub async fn call(&self, action: Action, token: &str, payload: Value) -> Result<Value> {
        if !self.gateway.is_configured() {
            return Err(Error::MissingApiUrl);
        }
        tracing::debug!(action = %action, "calling API");
        self.gateway.call(action, token, payload).await
    }

    /// Submit a new entry. Returns the stored entry when the server echoes one.
    pub async fn save_entry<T: Serialize>(&self, token: &str, entry: &T) -> Result<Option<Entry>> {
        let payload = to_payload(entry)?;
        let data = self.call(Action::SaveEntry, token, payload).await?;
        Ok(serde_json::from_value::<Entry>(data)
            .ok()
            .filter(|e| !e.id.is_empty()))
    }

    /// Fetch all entries. Accepts a bare list or `{entries: [...]}`.
    pub async fn list_entries(&self, token: &str) -> Result<Vec<Entry>> {
        let data = self.call(Action::ListEntries, token, json!({})).await?;
        parse_entry_list(data)
    }

    pub async fn update_entry(&self, token: &str, update: &EntryUpdate) -> Result<Entry> {
        let payload = to_payload(update)?;
        let data = self.call(Action::UpdateEntry, token, payload).await?;
        serde_json::from_value(data).map_err(|e| Error::InvalidResponse(e.to_string()))
    }

    pub async fn delete_entry(&self, token: &str, id: &str) -> Result<()> {
        self.call(Action::DeleteEntry, token, json!({ "id": id }))
            .await
            .map(|_| ())
    }

    pub async fn initial_data(&self, token: &str) -> Result<InitialData> {
        let data = self.call(Action::GetInitialData, token, json!({})).await?;
        serde_json::from_value(data).map_err(|e| Error::InvalidResponse(e.to_string()))
    }
}

fn to_payload<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::InvalidResponse(e.to_string()))
}

fn parse_entry_list(data: Value) -> Result<Vec<Entry>> {
    let list = match data {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("entries") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Value::Null => Vec::new(),
        other => {
            return Err(Error::InvalidResponse(format!(
                "expected entry list, got {other}"
            )))
        }
    };
    Ok(decode_rows(list))
}

#[cfg(any(test, feature = "test-util"))]
/// Handler signature for [`ScriptedGateway`].
pub type Responder = Box<dyn Fn(Action, &Value) -> Result<Value>>;

#[cfg(any(test, feature = "test-util"))]
/// In-process gateway answering from a closure and recording every request.
pub struct ScriptedGateway {
    configured: bool,
    responder: Responder,
    requests: RefCell<Vec<ApiRequest>>,
}

#[cfg(any(test, feature = "test-util"))]
impl ScriptedGateway {
    pub fn new(responder: impl Fn(Action, &Value) -> Result<Value> + 'static) -> Self {
        Self {
            configured: true,
            responder: Box::new(responder),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// A gateway with no endpoint configured.
    pub fn unconfigured() -> Self {
        let mut gateway = Self::new(|_, _| Err(Error::MissingApiUrl));
        gateway.configured = false;
        gateway
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.borrow().clone()
    }

    /// Number of calls made for `action`.
    pub fn count(&self, action: Action) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.action == action)
            .count()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Gateway for ScriptedGateway {
    fn is_configured(&self) -> bool {
        self.configured
    }

    fn call<'a>(
        &'a self,
        action: Action,
        token: &'a str,
        payload: Value,
    ) -> LocalBoxFuture<'a, Result<Value>> {
        let result = (self.responder)(action, &payload);
        self.requests.borrow_mut().push(ApiRequest {
            action,
            token: token.to_string(),
            payload,
        });
        future::ready(result).boxed_local()
    }
}
