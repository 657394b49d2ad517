use std::{convert::Infallible, panic::AssertUnwindSafe, pin::Pin, sync::Arc};

use bytes::Bytes;
use futures::FutureExt;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::{Request, Response, body::Incoming, header::{CONTENT_DISPOSITION, CONTENT_LENGTH, HeaderName, HeaderValue}, service::service_fn};
use hyper_util::rt::{TokioExecutor, TokioIo};
use matchit::Router;
use tokio::{io::{AsyncRead, AsyncWrite}, net::{TcpListener, TcpStream}, signal::unix::{SignalKind, signal}, task::JoinSet};
use tokio_rustls::TlsAcceptor;

use crate::{
    http::{http_query, http_request::HttpRequest, http_response::HttpResponse, http_status::HttpStatus, server::http_server_config::HttpServerConfig, server_vars::ServerVars},
    utils::error::Error,
};

type RouteCallback = Arc<dyn Fn(HttpRequest) -> Pin<Box<dyn Future<Output = HttpResponse> + Send>> + Send + Sync>;

/// What every connection task shares.
struct Routes {
    router: Router<RouteCallback>,
    max_body_size: usize,
}

pub struct HttpServer {
    config: HttpServerConfig,
    router: Router<RouteCallback>,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig) -> Self {
        HttpServer {
            config,
            router: Router::new(),
        }
    }

    /// Registers a route with a path, associating it with a handler callback.
    pub fn route<T, Fut>(mut self, path: impl Into<String>, callback: T) -> anyhow::Result<Self>
    where
        T: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        self.router.insert(path.into(), Arc::new(move |request| Box::pin(callback(request))))?;
        Ok(self)
    }

    /// Mounts a REST dispatcher on `path`. Every call to the path is one dispatch.
    #[cfg(feature = "rest")]
    pub fn dispatcher(self, path: impl Into<String>, dispatcher: crate::rest::dispatcher::Dispatcher) -> anyhow::Result<Self> {
        let dispatcher = Arc::new(dispatcher);
        self.route(path, move |request| {
            let dispatcher = dispatcher.clone();
            async move { dispatcher.handle(request).await }
        })
    }

    /// Starts the HTTP server and begins listening for incoming TCP connections (optionally over TLS).
    ///
    /// Runs until SIGINT or SIGTERM is received, then waits for open connections to finish.
    pub async fn receive(self) -> anyhow::Result<()> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        self.receive_until(async move {
            tokio::select! {
                _ = sigterm.recv() => {},
                _ = sigint.recv() => {},
            }
        })
        .await
    }

    /// Like [`HttpServer::receive`], but stops accepting connections once `shutdown` completes.
    pub async fn receive_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let host = self.config.host();
        let tls_acceptor = self.config.tls_config.map(|tls_config| {
            TlsAcceptor::from(Arc::new(tls_config))
        });

        let listener = TcpListener::bind(&host).await?;
        let mut receiver_join_set = JoinSet::new();
        let routes = Arc::new(Routes {
            router: self.router,
            max_body_size: self.config.max_body_size,
        });
        tokio::pin!(shutdown);

        tracing::trace!("started on {}", &host);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                result = listener.accept() => match result {
                    Ok((tcp_stream, client_addr)) => {
                        tracing::trace!("connection {:?}", client_addr);
                        receiver_join_set.spawn(Self::connection(tcp_stream, tls_acceptor.clone(), routes.clone()));
                    },
                    Err(err) => tracing::error!("{:?}", err),
                },
            }
        }

        drop(listener);
        tracing::trace!("shut down pending...");
        while receiver_join_set.join_next().await.is_some() {}
        tracing::trace!("shut down complete");
        Ok(())
    }

    async fn connection(tcp_stream: TcpStream, tls_acceptor: Option<TlsAcceptor>, routes: Arc<Routes>) {
        let Some(tls_acceptor) = tls_acceptor else {
            return Self::serve(TokioIo::new(tcp_stream), false, routes).await;
        };

        match tls_acceptor.accept(tcp_stream).await {
            Ok(tls_stream) => {
                let h2 = tls_stream.get_ref().1.alpn_protocol() == Some(b"h2".as_slice());
                Self::serve(TokioIo::new(tls_stream), h2, routes).await
            },
            Err(err) => tracing::error!("TLS handshake failed {:?}", err),
        }
    }

    async fn serve<S>(io: TokioIo<S>, h2: bool, routes: Arc<Routes>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let service = service_fn(move |req| Self::incoming_request(req, routes.clone()));
        let result = match h2 {
            true => hyper::server::conn::http2::Builder::new(TokioExecutor::new()).serve_connection(io, service).await,
            false => hyper::server::conn::http1::Builder::new().serve_connection(io, service).await,
        };
        if let Err(err) = result {
            tracing::error!("{:?}", err);
        }
    }

    async fn incoming_request(request: Request<Incoming>, routes: Arc<Routes>) -> Result<Response<Full<Bytes>>, Infallible> {
        let path = request.uri().path().to_string();
        let request = match Self::build_http_request(request, routes.max_body_size).await {
            Ok(request) => request,
            Err(err) => match err.downcast_ref::<Error>() {
                Some(Error::PayloadTooLarge(_)) => {
                    tracing::debug!("{} {}", path, err);
                    return Ok(Self::empty_response(hyper::StatusCode::PAYLOAD_TOO_LARGE));
                },
                _ => {
                    tracing::error!("{:?}", err);
                    return Ok(Self::empty_response(hyper::StatusCode::INTERNAL_SERVER_ERROR));
                },
            },
        };

        let response = match routes.router.at(&path) {
            Ok(matched) => {
                tracing::trace!("{} {}", request.request_method(), path);
                let callback = matched.value;
                match AssertUnwindSafe(callback(request)).catch_unwind().await {
                    Ok(response) => response,
                    Err(_) => {
                        tracing::error!("handler for {} panicked", path);
                        HttpResponse::new()
                            .set_status_code(HttpStatus::InternalServerError.code())
                            .set_content_type("application/json")
                            .set_content(serde_json::json!({"error": "handler panicked"}).to_string())
                    }
                }
            },
            Err(_) => HttpResponse::new().set_status_code(HttpStatus::NotFound.code()),
        };

        match Self::build_http_response(response).await {
            Ok(response) => {
                tracing::trace!("response sent");
                Ok(response)
            },
            Err(err) => {
                tracing::error!("{:?}", err);
                Ok(Self::empty_response(hyper::StatusCode::INTERNAL_SERVER_ERROR))
            },
        }
    }

    /// Describes the inbound call as server variables and rebuilds it as an
    /// [`HttpRequest`]; the query string and urlencoded form fields become its input.
    ///
    /// Reading stops with [`Error::PayloadTooLarge`] once the body passes `max_body_size`.
    async fn build_http_request(request: Request<Incoming>, max_body_size: usize) -> anyhow::Result<HttpRequest> {
        let (parts, body) = request.into_parts();
        let server = ServerVars::from_parts(&parts);
        let body = match Limited::new(body, max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.is::<LengthLimitError>() => return Err(Error::PayloadTooLarge(max_body_size).into()),
            Err(err) => return Err(anyhow::anyhow!(err)),
        };

        let request = HttpRequest::new()
            .populate_from_environment(&server)
            .set_body(String::from_utf8_lossy(&body));

        let mut input = server.get("QUERY_STRING").map(http_query::parse_query).unwrap_or_default();
        if request.content_type().starts_with("application/x-www-form-urlencoded") {
            input.extend(http_query::parse_query(request.body()));
        }
        Ok(request.set_input(input))
    }

    async fn build_http_response(response: HttpResponse) -> anyhow::Result<Response<Full<Bytes>>> {
        let status = response.status_code().unwrap_or(HttpStatus::Ok.code());
        let body = match response.filepath() {
            Some(path) => Bytes::from(tokio::fs::read(path).await?),
            None => Bytes::from(response.content().to_string()),
        };

        let mut res: Response<Full<Bytes>> = Response::builder().status(status).body(Full::new(body))?;
        for (key, value) in response.headers() {
            // status lines are carried by the response head
            if key.is_empty() || (key == value && key.starts_with("HTTP/")) {
                continue;
            }
            let header_name = HeaderName::from_bytes(key.as_bytes())?;
            let header_value = HeaderValue::from_str(value)?;
            res.headers_mut().insert(header_name, header_value);
        }

        if response.filepath().is_some() {
            res.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(response.content_length()));
            if !response.filename().is_empty() {
                let disposition = format!("attachment; filename=\"{}\"", response.filename());
                res.headers_mut().insert(CONTENT_DISPOSITION, HeaderValue::from_str(&disposition)?);
            }
        }
        Ok(res)
    }

    fn empty_response(status: hyper::StatusCode) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    }
}
