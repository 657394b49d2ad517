use std::{fs::File, path::{Path, PathBuf}, sync::LazyLock};

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{http::{client::transport::RawResult, http_request::HttpRequest, http_status::HttpStatus, mime}, utils::error::Error};

static STATUS_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"HTTP/1\.1").expect("status line pattern"));
static STATUS_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{3})").expect("status code pattern"));

/// The result of an HTTP call, or a response an endpoint is about to send.
///
/// Headers keep their original names and insertion order. A raw status line
/// such as `HTTP/1.1 200 OK` is stored as an entry whose name and value are
/// the same string.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    content: String,
    content_length: u64,
    filepath: Option<PathBuf>,
    filename: String,
    headers: Vec<(String, String)>,
    request: HttpRequest,
}

impl HttpResponse {
    pub fn new() -> Self {
        HttpResponse::for_request(HttpRequest::new())
    }

    pub fn for_request(request: HttpRequest) -> Self {
        HttpResponse {
            content: String::new(),
            content_length: 0,
            filepath: None,
            filename: String::new(),
            headers: Vec::new(),
            request,
        }
    }

    /// Wraps a transport result. The header block is parsed once, here.
    pub fn from_raw(request: HttpRequest, raw: RawResult) -> Self {
        let headers = Self::parse_header_block(&raw.header_block);
        HttpResponse::for_request(request).set_content(raw.body).set_headers(headers)
    }

    /// Splits a status + header block into entries.
    ///
    /// Each non-blank line is split on its first colon into a trimmed
    /// name/value pair; a line without one (the status line) maps to itself.
    pub fn parse_header_block(block: &str) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = Vec::new();
        for line in block.split('\n') {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (key, value) = match line.split_once(':') {
                Some((key, value)) => (key.to_string(), value.trim().to_string()),
                None => (line.to_string(), line.to_string()),
            };
            match headers.iter_mut().find(|(existing, _)| *existing == key) {
                Some(entry) => entry.1 = value,
                None => headers.push((key, value)),
            }
        }
        headers
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Decodes the content as a JSON tree; objects keep their key order.
    pub fn json_value(&self) -> Result<Value, Error> {
        Ok(serde_json::from_str(&self.content)?)
    }

    /// Decodes the content into a typed record.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_str(&self.content)?)
    }

    /// Size of the file to download; zero until [`HttpResponse::set_file_to_download`] succeeds.
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn content_type(&self) -> &str {
        self.header("Content-Type")
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn filepath(&self) -> Option<&Path> {
        self.filepath.as_deref()
    }

    /// Case-insensitive header lookup, empty when absent.
    pub fn header(&self, key: &str) -> &str {
        self.headers
            .iter()
            .rev()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The request that produced this response.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Code from the first header value that looks like an `HTTP/1.1` status line.
    ///
    /// Responses whose status line carries another version (`HTTP/1.0`,
    /// `HTTP/2.0`) have no code.
    pub fn status_code(&self) -> Option<u16> {
        let line = self.headers.iter().map(|(_, value)| value).find(|value| STATUS_LINE.is_match(value))?;
        let code = STATUS_CODE.captures(line)?.get(1)?;
        code.as_str().parse().ok()
    }

    /// True for 2xx status codes.
    pub fn is_successful(&self) -> bool {
        matches!(self.status_code(), Some(code) if (200..300).contains(&code))
    }

    pub fn set_content<T: Into<String>>(mut self, content: T) -> Self {
        self.content = content.into();
        self
    }

    pub fn set_content_type<T: Into<String>>(self, content_type: T) -> Self {
        self.set_header("Content-Type", content_type)
    }

    /// Turns this response into a download of `filepath`.
    ///
    /// The content type comes from the extension of `filename`, which may be
    /// empty; an empty filename also means the file is not sent as an attachment.
    pub fn set_file_to_download<P: AsRef<Path>, T: Into<String>>(mut self, filepath: P, filename: T) -> Result<Self, Error> {
        let filepath = filepath.as_ref();
        let metadata = File::open(filepath)
            .and_then(|file| file.metadata())
            .map_err(|_| Error::FileUnreadable(filepath.to_path_buf()))?;
        if !metadata.is_file() {
            return Err(Error::FileUnreadable(filepath.to_path_buf()));
        }

        let filename = filename.into();
        let extension = Path::new(&filename)
            .extension()
            .map(|extension| extension.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        self.filepath = Some(filepath.to_path_buf());
        self.content_length = metadata.len();
        self.filename = filename;

        let content_type = mime::mime_from_extension(&extension);
        if content_type.is_empty() {
            return Ok(self);
        }
        Ok(self.set_content_type(content_type))
    }

    /// Sets a header. An empty value stores the header as a bare line (name == value).
    pub fn set_header<K: Into<String>, V: Into<String>>(mut self, header: K, value: V) -> Self {
        let header = header.into();
        let mut value = value.into();
        if value.is_empty() {
            value = header.clone();
        }

        match self.headers.iter_mut().find(|(existing, _)| *existing == header) {
            Some(entry) => entry.1 = value,
            None => self.headers.push((header, value)),
        }
        self
    }

    pub fn set_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        headers.into_iter().fold(self, |response, (header, value)| response.set_header(header, value))
    }

    pub fn set_request(mut self, request: HttpRequest) -> Self {
        self.request = request;
        self
    }

    /// Replaces the status line with a synthesized `HTTP/1.1 {code} {reason}`.
    pub fn set_status_code(mut self, code: u16) -> Self {
        self.headers.retain(|(name, value)| !(name == value && STATUS_LINE.is_match(value)));
        let line = format!("HTTP/1.1 {} {}", code, HttpStatus::description(code).unwrap_or(""));
        self.set_header(line.trim_end(), "")
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        HttpResponse::new()
    }
}
