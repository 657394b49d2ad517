use std::{collections::HashMap, pin::Pin, sync::Arc};

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::{
    http::{http_method::HttpMethod, http_request::HttpRequest, http_response::HttpResponse, http_status::HttpStatus},
    rest::{action::{ActionContext, resolve_action}, dispatcher_config::{DispatchStyle, DispatcherConfig}},
    utils::error::Error,
};

type ActionHandler = Arc<dyn Fn(ActionContext) -> Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RouteKey {
    Action(String),
    Method(HttpMethod, String),
}

/// Maps inbound calls to action handlers and turns their results into JSON responses.
///
/// ```no_run
/// use serde_json::json;
/// use tlcore::rest::{dispatcher::Dispatcher, dispatcher_config::DispatcherConfig};
///
/// let dispatcher = Dispatcher::new(DispatcherConfig::new().token("secret"))
///     .action("ping", |_ctx| async { Ok(json!({"ok": true})) });
/// ```
pub struct Dispatcher {
    config: DispatcherConfig,
    routes: HashMap<RouteKey, ActionHandler>,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Dispatcher {
            config,
            routes: HashMap::new(),
        }
    }

    /// Registers a handler for an action name, used with [`DispatchStyle::Rest`].
    pub fn action<T, Fut, R>(mut self, name: impl Into<String>, handler: T) -> Self
    where
        T: Fn(ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        self.routes.insert(RouteKey::Action(name.into()), Self::boxed(handler));
        self
    }

    /// Registers a handler for a method and action pair, used with [`DispatchStyle::Router`].
    pub fn route<T, Fut, R>(mut self, method: HttpMethod, name: impl AsRef<str>, handler: T) -> Self
    where
        T: Fn(ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let key = RouteKey::Method(method, name.as_ref().to_lowercase());
        self.routes.insert(key, Self::boxed(handler));
        self
    }

    fn boxed<T, Fut, R>(handler: T) -> ActionHandler
    where
        T: Fn(ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        Arc::new(move |ctx| {
            let fut = handler(ctx);
            Box::pin(async move {
                let value = fut.await?;
                Ok::<Value, anyhow::Error>(serde_json::to_value(value)?)
            })
        })
    }

    /// Runs one inbound call through authorization, action resolution and the handler.
    ///
    /// A handler returning nothing (`()` or `null`) yields an empty mapping.
    pub async fn dispatch(&self, request: HttpRequest) -> anyhow::Result<Value> {
        self.authorize(&request)?;

        let body = Self::decode_body(request.body());
        let action = resolve_action(&request, &body)?;
        let key = self.route_key(&request, &action)?;

        let handler = self.routes.get(&key).ok_or_else(|| match &key {
            RouteKey::Action(action) => Error::Routing(format!("unknown action `{}`", action)),
            RouteKey::Method(method, action) => Error::Routing(format!("method `{}_{}` not found", method.as_lower_str(), action)),
        })?;

        tracing::trace!("dispatching {:?}", key);
        let value = handler(ActionContext::new(request, body, action)).await?;
        match value {
            Value::Null => Ok(Value::Object(Map::new())),
            value => Ok(value),
        }
    }

    /// Dispatches and renders the outcome; errors never escape this call.
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        let response = HttpResponse::for_request(request.clone()).set_content_type("application/json");

        match self.dispatch(request).await {
            Ok(value) => response.set_status_code(HttpStatus::Ok.code()).set_content(value.to_string()),
            Err(err) => match err.downcast_ref::<Error>() {
                Some(Error::Authorization) => {
                    tracing::trace!("rejected call with invalid token");
                    response
                        .set_status_code(HttpStatus::Unauthorized.code())
                        .set_content(json!({"error": "invalid token"}).to_string())
                },
                _ => {
                    tracing::error!("{:?}", err);
                    response
                        .set_status_code(HttpStatus::InternalServerError.code())
                        .set_content(Self::error_body(&err).to_string())
                },
            },
        }
    }

    fn authorize(&self, request: &HttpRequest) -> Result<(), Error> {
        let (Some(secret), Some(header)) = (&self.config.token, request.header("authorization")) else {
            return Ok(());
        };

        let token = match header.get(..7) {
            Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => &header[7..],
            _ => header,
        };
        if token.trim() != secret.as_str() {
            return Err(Error::Authorization);
        }
        Ok(())
    }

    fn decode_body(body: &str) -> Value {
        if body.trim().is_empty() {
            return Value::Object(Map::new());
        }
        match serde_json::from_str(body) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) | Err(_) => {
                tracing::debug!("request body is not a JSON object, using empty input");
                Value::Object(Map::new())
            },
        }
    }

    fn route_key(&self, request: &HttpRequest, action: &str) -> Result<RouteKey, Error> {
        match self.config.style {
            DispatchStyle::Rest => Ok(RouteKey::Action(action.to_string())),
            DispatchStyle::Router => {
                let action = action.to_lowercase();
                let method = HttpMethod::from_str(request.request_method()).map_err(|_| {
                    Error::Routing(format!("method `{}_{}` not found", request.request_method().to_lowercase(), action))
                })?;
                Ok(RouteKey::Method(method, action))
            },
        }
    }

    fn error_body(err: &anyhow::Error) -> Value {
        let (kind, errorcode) = match err.downcast_ref::<Error>() {
            Some(err) => (format!("{:?}", err.kind()), err.errorcode()),
            None => (String::from("Handler"), "generalexceptionmessage"),
        };
        let causes: Vec<String> = err.chain().skip(1).map(|cause| cause.to_string()).collect();

        json!({
            "error": err.to_string(),
            "errorcode": errorcode,
            "exception": {
                "kind": kind,
                "errorcode": errorcode,
                "message": err.to_string(),
                "causes": causes,
            },
        })
    }
}
