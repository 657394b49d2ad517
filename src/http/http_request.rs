use std::collections::HashMap;

use serde_json::{Map, Value};
use url::Url;

use crate::{http::{client::{http_client::HttpClient, transport::{Transport, TransportCall}}, http_query, http_response::HttpResponse, server_vars::ServerVars}, utils::error::Error};

pub const DEFAULT_REQUEST_METHOD: &str = "GET";
pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// A mutable, single-use description of an HTTP call.
///
/// Setters consume and return the request so calls can be chained:
///
/// ```no_run
/// # async fn run() -> Result<(), tlcore::utils::error::Error> {
/// use tlcore::http::http_request::HttpRequest;
///
/// let response = HttpRequest::new()
///     .set_url("https://api.example.com/users")?
///     .set_accept("application/json")
///     .set_param("page", 2)
///     .send()
///     .await?;
/// # Ok(())
/// # }
/// ```
///
/// The same type also describes the inbound call an endpoint is handling, see
/// [`HttpRequest::populate_from_environment`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    body: String,
    headers: HashMap<String, String>,
    host: String,
    input: Map<String, Value>,
    path_info: String,
    port: Option<u16>,
    protocol: String,
    request_method: String,
    request_uri: String,
}

impl HttpRequest {
    pub fn new() -> Self {
        HttpRequest {
            body: String::new(),
            headers: HashMap::new(),
            host: String::new(),
            input: Map::new(),
            path_info: String::new(),
            port: None,
            protocol: String::new(),
            request_method: String::from(DEFAULT_REQUEST_METHOD),
            request_uri: String::new(),
        }
    }

    pub fn set_protocol<T: Into<String>>(mut self, protocol: T) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Sets the host, e.g. `www.example.com`. Surrounding slashes are trimmed.
    pub fn set_host<T: AsRef<str>>(mut self, host: T) -> Self {
        self.host = host.as_ref().trim_matches('/').to_string();
        self
    }

    pub fn set_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the part after the host, e.g. `/course/view.php`.
    pub fn set_request_uri<T: Into<String>>(mut self, request_uri: T) -> Self {
        self.request_uri = request_uri.into();
        self
    }

    /// Sets the path info, the segment after the script name. It is never part of [`HttpRequest::url`].
    pub fn set_path_info<T: Into<String>>(mut self, path_info: T) -> Self {
        self.path_info = path_info.into();
        self
    }

    /// Sets the method verb. The case is kept as given.
    pub fn set_request_method<T: Into<String>>(mut self, method: T) -> Self {
        self.request_method = method.into();
        self
    }

    /// Sets the raw body. Ignored when the request is sent as a GET.
    pub fn set_body<T: Into<String>>(mut self, body: T) -> Self {
        self.body = body.into();
        self
    }

    pub fn set_header<K: AsRef<str>, V: Into<String>>(mut self, header: K, value: V) -> Self {
        self.headers.insert(header.as_ref().to_lowercase(), value.into());
        self
    }

    pub fn set_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        headers.into_iter().fold(self, |request, (header, value)| request.set_header(header, value))
    }

    pub fn delete_headers(mut self) -> Self {
        self.headers.clear();
        self
    }

    pub fn set_content_type<T: Into<String>>(self, content_type: T) -> Self {
        self.set_header("Content-Type", content_type)
    }

    pub fn set_accept<T: Into<String>>(self, accept: T) -> Self {
        self.set_header("Accept", accept)
    }

    /// Replaces all input parameters.
    pub fn set_input(mut self, input: Map<String, Value>) -> Self {
        self.input = input;
        self
    }

    pub fn set_param<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.input.insert(key.into(), value.into());
        self
    }

    /// Breaks a URL apart into protocol, host, port and request URI. A query
    /// string, when present, replaces the input parameters.
    pub fn set_url<T: AsRef<str>>(mut self, url: T) -> Result<Self, Error> {
        let raw = url.as_ref();
        let parsed = Url::parse(raw).map_err(|_| Error::InvalidUrl(raw.to_string()))?;

        self = self.set_protocol(parsed.scheme());
        if let Some(host) = parsed.host_str() {
            self = self.set_host(host);
        }
        if let Some(port) = parsed.port() {
            self = self.set_port(port);
        }
        // The parser reports "/" for URLs without any path; only an explicit path replaces ours.
        if Self::has_explicit_path(raw) {
            self = self.set_request_uri(parsed.path());
        }
        if let Some(query) = parsed.query() {
            self = self.set_input(http_query::parse_query(query));
        }

        Ok(self)
    }

    fn has_explicit_path(url: &str) -> bool {
        let after_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
        after_scheme
            .find(|c: char| matches!(c, '/' | '?' | '#'))
            .is_some_and(|index| after_scheme[index..].starts_with('/'))
    }

    /// Reconstructs the inbound call described by `server`.
    ///
    /// `CONTENT_TYPE`, `HTTP_HOST`, `REQUEST_METHOD` and `REQUEST_URI` go to
    /// their setters, then every `HTTP_*` key becomes a header
    /// (`HTTP_ACCEPT_LANGUAGE` -> `Accept-Language`).
    pub fn populate_from_environment(mut self, server: &ServerVars) -> Self {
        if let Some(content_type) = server.get("CONTENT_TYPE") {
            self = self.set_content_type(content_type);
        }
        if let Some(host) = server.get("HTTP_HOST") {
            self = self.set_host(host);
        }
        if let Some(method) = server.get("REQUEST_METHOD") {
            self = self.set_request_method(method);
        }
        if let Some(request_uri) = server.get("REQUEST_URI") {
            self = self.set_request_uri(request_uri);
        }

        for (name, value) in server.iter() {
            if let Some(header) = name.strip_prefix("HTTP_") {
                self = self.set_header(Self::header_case(header), value);
            }
        }
        self
    }

    fn header_case(name: &str) -> String {
        name.split('_')
            .map(|word| {
                let word = word.to_lowercase();
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join("-")
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn header(&self, header: &str) -> Option<&str> {
        self.headers.get(&header.to_lowercase()).map(String::as_str)
    }

    /// All headers, keyed by lower-cased name.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn require_header(&self, header: &str) -> Result<&str, Error> {
        self.header(header).ok_or_else(|| Error::missing_header(header.to_lowercase()))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn input(&self) -> &Map<String, Value> {
        &self.input
    }

    pub fn param(&self, param: &str) -> Option<&Value> {
        self.input.get(param)
    }

    pub fn require_param(&self, param: &str) -> Result<&Value, Error> {
        self.param(param).ok_or_else(|| Error::missing_param(param))
    }

    pub fn path_info(&self) -> &str {
        &self.path_info
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// The method verb, `GET` when none is set.
    pub fn request_method(&self) -> &str {
        if self.request_method.is_empty() {
            DEFAULT_REQUEST_METHOD
        } else {
            &self.request_method
        }
    }

    pub fn request_uri(&self) -> &str {
        &self.request_uri
    }

    pub fn content_type(&self) -> &str {
        self.header("Content-Type").unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    /// First entry of the `Accept` header, or `text/html` when there is none.
    pub fn best_accept(&self) -> &str {
        match self.header("Accept") {
            Some(accept) if !accept.is_empty() => accept.split(',').next().unwrap_or(accept),
            _ => DEFAULT_CONTENT_TYPE,
        }
    }

    /// Assembles `{protocol}://{host}[:{port}]{request_uri}`, or an empty
    /// string while protocol or host is unset.
    pub fn url(&self) -> String {
        if self.protocol.is_empty() || self.host.is_empty() {
            return String::new();
        }

        let mut url = format!("{}://{}", self.protocol, self.host);
        if let Some(port) = self.port {
            url.push_str(&format!(":{}", port));
        }
        url.push_str(&self.request_uri);
        url
    }

    fn is_get(&self) -> bool {
        self.request_method().eq_ignore_ascii_case("GET")
    }

    /// The call handed to the transport: GET input goes into the query string;
    /// other methods send the body, or the form-encoded input when the body is empty.
    fn transport_call(&self) -> TransportCall {
        let mut url = self.url();
        let mut headers = self.headers.clone();
        let mut body = String::new();

        if self.is_get() {
            if !self.input.is_empty() {
                url.push('?');
                url.push_str(&http_query::build_query(&self.input));
            }
        } else if !self.body.is_empty() {
            body = self.body.clone();
        } else if !self.input.is_empty() {
            body = http_query::build_query(&self.input);
            headers
                .entry(String::from("content-type"))
                .or_insert_with(|| String::from("application/x-www-form-urlencoded"));
        }

        TransportCall {
            url,
            method: self.request_method().to_string(),
            headers,
            body,
        }
    }

    /// Sends the request with a default [`HttpClient`].
    pub async fn send(self) -> Result<HttpResponse, Error> {
        self.send_with(&HttpClient::default()).await
    }

    /// Sends the request through `transport` and wraps the result. The
    /// response keeps this request as its owning request.
    pub async fn send_with<T: Transport>(self, transport: &T) -> Result<HttpResponse, Error> {
        let call = self.transport_call();
        let raw = transport.execute(call).await?;
        Ok(HttpResponse::from_raw(self, raw))
    }

    /// Shorthand for a GET of `url`.
    pub async fn get<T: AsRef<str>>(self, url: T) -> Result<HttpResponse, Error> {
        self.set_request_method("GET").set_url(url)?.send().await
    }
}

impl Default for HttpRequest {
    fn default() -> Self {
        HttpRequest::new()
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn new_request_is_empty_get() {
        let request = HttpRequest::new();
        assert_eq!(request.host(), "");
        assert_eq!(request.protocol(), "");
        assert_eq!(request.request_uri(), "");
        assert_eq!(request.path_info(), "");
        assert_eq!(request.url(), "");
        assert_eq!(request.request_method(), DEFAULT_REQUEST_METHOD);
    }

    #[test]
    fn url_excludes_path_info_and_follows_host_changes() {
        let request = HttpRequest::new()
            .set_host("www.example.com")
            .set_protocol("http")
            .set_request_uri("/somepage")
            .set_path_info("/somepath");
        assert_eq!(request.path_info(), "/somepath");
        assert_eq!(request.url(), "http://www.example.com/somepage");

        let request = request.set_host("new.host");
        assert_eq!(request.url(), "http://new.host/somepage");
    }

    #[test]
    fn url_needs_protocol_and_host() {
        assert_eq!(HttpRequest::new().set_protocol("https").url(), "");
        assert_eq!(HttpRequest::new().set_host("example.com").url(), "");
        assert_eq!(HttpRequest::new().set_protocol("https").set_host("example.com").url(), "https://example.com");
        assert_eq!(
            HttpRequest::new().set_protocol("http").set_host("/localhost/").set_port(8080).url(),
            "http://localhost:8080"
        );
    }

    #[test]
    fn headers_are_case_insensitive() {
        let request = HttpRequest::new().set_header("Content-Type", "application/json");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(request.headers().get("content-type").map(String::as_str), Some("application/json"));
        assert_eq!(request.content_type(), "application/json");

        let request = request.delete_headers();
        assert!(request.headers().is_empty());
        assert_eq!(request.content_type(), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn require_header_and_param() {
        let request = HttpRequest::new().set_header("X-Token", "abc").set_param("id", 7);
        assert_eq!(request.require_header("x-token").unwrap(), "abc");
        assert_eq!(request.require_param("id").unwrap(), &json!(7));

        let err = request.require_header("Authorization").unwrap_err();
        assert!(matches!(err, Error::MissingField { ref field, .. } if field == "authorization"));
        let err = request.require_param("missing").unwrap_err();
        assert_eq!(err.kind(), crate::utils::error::ErrorKind::Http);
    }

    #[test]
    fn input_replaced_and_extended() {
        let input = json!({"some_key": "some_val", "some_array": ["thing1", "thing2"]});
        let request = HttpRequest::new().set_input(input.as_object().cloned().unwrap_or_default());
        assert_eq!(request.param("some_array"), Some(&json!(["thing1", "thing2"])));

        let request = request.set_param("extra", "value");
        assert_eq!(request.input().len(), 3);
        assert_eq!(request.param("extra"), Some(&json!("value")));
    }

    #[test]
    fn best_accept_takes_first_entry() {
        assert_eq!(HttpRequest::new().best_accept(), "text/html");
        let request = HttpRequest::new().set_accept("application/json,text/plain;q=0.5");
        assert_eq!(request.best_accept(), "application/json");
    }

    #[test]
    fn set_url_splits_components_and_query() {
        let request = HttpRequest::new().set_url("http://www.example.com/some/page?key=value").unwrap();
        assert_eq!(request.host(), "www.example.com");
        assert_eq!(request.protocol(), "http");
        assert_eq!(request.request_uri(), "/some/page");
        assert_eq!(request.param("key"), Some(&json!("value")));
        assert_eq!(request.url(), "http://www.example.com/some/page");
    }

    #[test]
    fn set_url_keeps_port_and_skips_missing_path() {
        let request = HttpRequest::new().set_request_uri("/kept").set_url("https://example.com:8443").unwrap();
        assert_eq!(request.port(), Some(8443));
        assert_eq!(request.request_uri(), "/kept");
        assert_eq!(request.url(), "https://example.com:8443/kept");

        let request = HttpRequest::new().set_url("https://example.com?a=1").unwrap();
        assert_eq!(request.request_uri(), "");
        assert_eq!(request.param("a"), Some(&json!("1")));
    }

    #[test]
    fn set_url_rejects_garbage() {
        assert!(matches!(HttpRequest::new().set_url("not a url"), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn populates_from_environment() {
        let server = ServerVars::new()
            .var("CONTENT_TYPE", "application/json")
            .var("HTTP_HOST", "lms.example.com")
            .var("REQUEST_METHOD", "PUT")
            .var("REQUEST_URI", "/local/rest.php?action=ping")
            .var("HTTP_ACCEPT_LANGUAGE", "en-AU")
            .var("HTTP_AUTHORIZATION", "Bearer secret")
            .var("SERVER_NAME", "ignored");

        let request = HttpRequest::new().populate_from_environment(&server);
        assert_eq!(request.content_type(), "application/json");
        assert_eq!(request.host(), "lms.example.com");
        assert_eq!(request.request_method(), "PUT");
        assert_eq!(request.request_uri(), "/local/rest.php?action=ping");
        assert_eq!(request.header("Accept-Language"), Some("en-AU"));
        assert_eq!(request.header("authorization"), Some("Bearer secret"));
        assert_eq!(request.header("server-name"), None);
    }

    #[test]
    fn header_case_conversion() {
        assert_eq!(HttpRequest::header_case("ACCEPT_LANGUAGE"), "Accept-Language");
        assert_eq!(HttpRequest::header_case("X_REQUESTED_WITH"), "X-Requested-With");
    }

    #[test]
    fn get_input_goes_into_query_string() {
        let call = HttpRequest::new()
            .set_url("http://example.com/api")
            .unwrap()
            .set_param("q", "a b")
            .set_body("ignored")
            .transport_call();
        assert_eq!(call.url, "http://example.com/api?q=a+b");
        assert_eq!(call.method, "GET");
        assert_eq!(call.body, "");
    }

    #[test]
    fn post_sends_body_or_form_encoded_input() {
        let call = HttpRequest::new()
            .set_url("http://example.com/token")
            .unwrap()
            .set_request_method("post")
            .set_param("grant_type", "client_credentials")
            .transport_call();
        assert_eq!(call.url, "http://example.com/token");
        assert_eq!(call.body, "grant_type=client_credentials");
        assert_eq!(call.headers.get("content-type").map(String::as_str), Some("application/x-www-form-urlencoded"));

        let call = HttpRequest::new()
            .set_url("http://example.com/token")
            .unwrap()
            .set_request_method("POST")
            .set_content_type("application/json")
            .set_body("{\"a\":1}")
            .set_param("ignored", "x")
            .transport_call();
        assert_eq!(call.body, "{\"a\":1}");
        assert_eq!(call.headers.get("content-type").map(String::as_str), Some("application/json"));
    }
}
