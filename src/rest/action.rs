use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{http::http_request::HttpRequest, utils::error::Error};

/// Finds the action of an inbound call: request input first, then the
/// `action` field of the decoded body.
///
/// Only `[A-Za-z0-9_-]` survives cleaning; nothing left means the parameter is missing.
pub fn resolve_action(request: &HttpRequest, body: &Value) -> Result<String, Error> {
    let raw = request
        .param("action")
        .or_else(|| body.get("action"))
        .and_then(scalar_to_string)
        .unwrap_or_default();

    let action = clean_action(&raw);
    if action.is_empty() {
        return Err(Error::missing_param("action"));
    }
    Ok(action)
}

pub fn clean_action(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-').collect()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

/// What a handler gets for one dispatched call.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub request: HttpRequest,
    pub body: Value,
    pub action: String,
}

impl ActionContext {
    pub fn new(request: HttpRequest, body: Value, action: impl Into<String>) -> Self {
        ActionContext {
            request,
            body,
            action: action.into(),
        }
    }

    /// Decodes the body into the input type of this action.
    pub fn input<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(self.body.clone()).map_err(|err| Error::InvalidInput {
            action: self.action.clone(),
            message: err.to_string(),
        })
    }
}
