use std::collections::BTreeMap;

/// CGI-style description of an inbound call (`REQUEST_METHOD`, `HTTP_HOST`,
/// `HTTP_*` headers, ...). Built once per call and handed to
/// [`HttpRequest::populate_from_environment`](crate::http::http_request::HttpRequest::populate_from_environment).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerVars {
    vars: BTreeMap<String, String>,
}

impl ServerVars {
    pub fn new() -> Self {
        ServerVars::default()
    }

    pub fn var<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Describes a hyper request head. Header names become `HTTP_` keys in
    /// upper snake case, except `Content-Type` and `Content-Length` which keep
    /// their unprefixed CGI names.
    pub fn from_parts(parts: &hyper::http::request::Parts) -> Self {
        let mut vars = ServerVars::new();
        vars.insert("REQUEST_METHOD", parts.method.as_str());

        let request_uri = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        vars.insert("REQUEST_URI", request_uri);
        if let Some(query) = parts.uri.query() {
            vars.insert("QUERY_STRING", query);
        }
        if let Some(authority) = parts.uri.authority() {
            vars.insert("HTTP_HOST", authority.as_str());
        }

        for (name, value) in parts.headers.iter() {
            let value = String::from_utf8_lossy(value.as_bytes()).to_string();
            let key = name.as_str().to_ascii_uppercase().replace('-', "_");
            if key == "CONTENT_TYPE" || key == "CONTENT_LENGTH" {
                vars.insert(key, value);
            } else {
                vars.insert(format!("HTTP_{}", key), value);
            }
        }
        vars
    }
}
