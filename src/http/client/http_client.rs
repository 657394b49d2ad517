use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, Response, Uri, Version, body::Incoming, header::{HeaderName, HeaderValue}};
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls_pki_types::ServerName;
use tokio::{io::{AsyncRead, AsyncWrite}, net::TcpStream, task::JoinHandle};
use tokio_rustls::TlsConnector;

use crate::{http::client::{http_client_config::HttpClientConfig, http_client_version::HttpClientVersion, transport::{RawResult, Transport, TransportCall}}, utils::error::Error};

/// Hyper-backed [`Transport`]. Every call opens its own connection and tears it
/// down when the call finishes; nothing is pooled.
#[derive(Clone)]
pub struct HttpClient {
    config: Arc<HttpClientConfig>,
}

/// Owns the spawned connection task and aborts it however the call ends.
struct ConnectionGuard(JoinHandle<()>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Self {
        HttpClient {
            config: Arc::new(config),
        }
    }

    async fn connect(&self, host: &str, port: u16) -> Result<TcpStream, Error> {
        let host = host.trim_start_matches('[').trim_end_matches(']');
        match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect((host, port))).await {
            Ok(stream) => Ok(stream?),
            Err(_) => Err(Error::transport(format!("Connection to {}:{} timed out", host, port), None)),
        }
    }

    async fn send_tcp(&self, url: Uri, call: TransportCall) -> Result<RawResult, Error> {
        let host = url.host().ok_or_else(|| Error::InvalidUrl(call.url.clone()))?;
        let port = url.port_u16().unwrap_or(80);

        let stream = self.connect(host, port).await?;
        Self::send_http1(TokioIo::new(stream), url, call).await
    }

    async fn send_tls(&self, url: Uri, call: TransportCall) -> Result<RawResult, Error> {
        let host = url.host().ok_or_else(|| Error::InvalidUrl(call.url.clone()))?;
        let port = url.port_u16().unwrap_or(443);
        let domain = ServerName::try_from(host.trim_start_matches('[').trim_end_matches(']').to_string())
            .map_err(|err| Error::transport(err, None))?;

        let mut tls_config = self.config.tls_config.clone();
        tls_config.alpn_protocols = self.config.http_version.alpn_protocols();

        let tcp_stream = self.connect(host, port).await?;
        let tls_connector = TlsConnector::from(Arc::new(tls_config));
        let tls_stream = tls_connector.connect(domain, tcp_stream).await?;

        let version = match self.config.http_version {
            HttpClientVersion::Auto => match tls_stream.get_ref().1.alpn_protocol() {
                Some(b"h2") => Version::HTTP_2,
                _ => Version::HTTP_11,
            },
            HttpClientVersion::Http1 => Version::HTTP_11,
            HttpClientVersion::Http2 => Version::HTTP_2,
        };

        match version {
            Version::HTTP_2 => Self::send_http2(TokioIo::new(tls_stream), url, call).await,
            _ => Self::send_http1(TokioIo::new(tls_stream), url, call).await,
        }
    }

    async fn send_http1<S>(io: TokioIo<S>, url: Uri, call: TransportCall) -> Result<RawResult, Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sender, connection) = hyper::client::conn::http1::handshake(io).await?;
        let _guard = ConnectionGuard(tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!("{:?}", err);
            }
        }));

        let request = Self::build_request(&url, call, Version::HTTP_11)?;
        let response = sender.send_request(request).await?;
        Self::read_response(response).await
    }

    async fn send_http2<S>(io: TokioIo<S>, url: Uri, call: TransportCall) -> Result<RawResult, Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sender, connection) = hyper::client::conn::http2::Builder::new(TokioExecutor::new()).handshake(io).await?;
        let _guard = ConnectionGuard(tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!("{:?}", err);
            }
        }));

        let request = Self::build_request(&url, call, Version::HTTP_2)?;
        let response = sender.send_request(request).await?;
        Self::read_response(response).await
    }

    fn build_request(url: &Uri, call: TransportCall, version: Version) -> Result<Request<Full<Bytes>>, Error> {
        let method = Method::from_bytes(call.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::Http(format!("Invalid HTTP method `{}`", call.method)))?;
        let authority = url.authority().ok_or_else(|| Error::InvalidUrl(call.url.clone()))?;

        let builder = Request::builder().version(version).method(method);
        let builder = match version {
            Version::HTTP_2 => builder.uri(url.clone()),
            _ => builder
                .uri(url.path_and_query().map(|pq| pq.as_str()).unwrap_or("/"))
                .header(hyper::header::HOST, authority.as_str()),
        };

        let mut request = builder
            .body(Full::new(Bytes::from(call.body)))
            .map_err(|err| Error::Http(err.to_string()))?;

        for (key, value) in call.headers {
            let header_name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|err| Error::Http(format!("Invalid header name `{}`: {}", key, err)))?;
            let header_value = HeaderValue::from_str(&value)
                .map_err(|err| Error::Http(format!("Invalid value for header `{}`: {}", key, err)))?;
            request.headers_mut().insert(header_name, header_value);
        }

        Ok(request)
    }

    async fn read_response(response: Response<Incoming>) -> Result<RawResult, Error> {
        let (parts, body) = response.into_parts();

        let mut header_block = format!("{:?} {}\r\n", parts.version, parts.status);
        for (name, value) in parts.headers.iter() {
            header_block.push_str(&format!("{}: {}\r\n", name, String::from_utf8_lossy(value.as_bytes())));
        }
        header_block.push_str("\r\n");

        let body = body.collect().await?.to_bytes();
        Ok(RawResult::new(header_block, String::from_utf8_lossy(&body)))
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        HttpClient::new(HttpClientConfig::new())
    }
}

impl Transport for HttpClient {
    /// Sends the call over a fresh connection.
    ///
    /// If the URL scheme is `"http"`, HTTP/1.1 is used. If it is `"https"`, a TLS
    /// connection is established first and the configured [`HttpClientVersion`]
    /// decides between HTTP/1.1, HTTP/2 or ALPN negotiation.
    async fn execute(&self, call: TransportCall) -> Result<RawResult, Error> {
        let url = call.url.parse::<Uri>().map_err(|_| Error::InvalidUrl(call.url.clone()))?;
        let scheme = url.scheme_str().ok_or_else(|| Error::InvalidUrl(call.url.clone()))?.to_string();
        tracing::trace!("{} {}", call.method, call.url);

        match scheme.as_str() {
            "http" => {
                if self.config.http_version == HttpClientVersion::Http2 {
                    return Err(Error::Http(String::from("https scheme is required for HTTP/2")));
                }
                self.send_tcp(url, call).await
            }
            "https" => self.send_tls(url, call).await,
            other => Err(Error::Http(format!("Unsupported scheme: {}", other))),
        }
    }
}
