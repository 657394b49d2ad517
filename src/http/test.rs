use std::{sync::Mutex, time::Duration};

use serde_json::json;
use tokio::sync::oneshot;
use tokio_test::{assert_err, assert_ok};

use crate::{
    http::{
        client::{
            http_client::HttpClient,
            http_client_config::HttpClientConfig,
            http_client_version::HttpClientVersion,
            transport::{RawResult, Transport, TransportCall},
        },
        http_request::HttpRequest,
        http_response::HttpResponse,
        server::{http_server::HttpServer, http_server_config::HttpServerConfig},
    },
    utils::error::{Error, ErrorKind},
};
#[cfg(feature = "rest")]
use crate::rest::{dispatcher::Dispatcher, dispatcher_config::DispatcherConfig};

/// Records every call and answers with a canned result, or a transport failure when none is set.
#[derive(Default)]
struct ScriptedTransport {
    calls: Mutex<Vec<TransportCall>>,
    result: Option<RawResult>,
}

impl ScriptedTransport {
    fn answering(header_block: &str, body: &str) -> Self {
        ScriptedTransport {
            calls: Mutex::new(Vec::new()),
            result: Some(RawResult::new(header_block, body)),
        }
    }

    fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn execute(&self, call: TransportCall) -> Result<RawResult, Error> {
        self.calls.lock().unwrap().push(call);
        match &self.result {
            Some(result) => Ok(result.clone()),
            None => Err(Error::transport("Could not resolve host: lms.invalid", Some(6))),
        }
    }
}

#[tokio::test]
async fn send_with_builds_call_and_wraps_result() {
    let transport = ScriptedTransport::answering("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n", r#"{"id": 1}"#);
    let request = assert_ok!(HttpRequest::new().set_url("https://lms.example.com/webservice/rest"))
        .set_accept("application/json")
        .set_param("wsfunction", "core_course_get_courses")
        .set_param("options", json!({"ids": [1, 2]}));

    let response = assert_ok!(request.clone().send_with(&transport).await);

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, "GET");
    assert_eq!(
        calls[0].url,
        "https://lms.example.com/webservice/rest?wsfunction=core_course_get_courses&options%5Bids%5D%5B0%5D=1&options%5Bids%5D%5B1%5D=2"
    );
    assert_eq!(calls[0].headers.get("accept").map(String::as_str), Some("application/json"));
    assert_eq!(calls[0].body, "");

    assert_eq!(response.status_code(), Some(200));
    assert_eq!(assert_ok!(response.json_value()), json!({"id": 1}));
    assert_eq!(response.request(), &request);
}

#[tokio::test]
async fn error_status_is_not_a_transport_failure() {
    let transport = ScriptedTransport::answering("HTTP/1.1 500 Internal Server Error\r\n\r\n", "boom");
    let response = assert_ok!(HttpRequest::new().set_url("http://lms.example.com/").unwrap().send_with(&transport).await);

    assert_eq!(response.status_code(), Some(500));
    assert!(!response.is_successful());
    assert_eq!(response.content(), "boom");
}

#[tokio::test]
async fn transport_failure_propagates() {
    let transport = ScriptedTransport::default();
    let result = HttpRequest::new().set_url("http://lms.invalid/").unwrap().send_with(&transport).await;

    let err = assert_err!(result);
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(matches!(err, Error::Transport { code: Some(6), .. }));
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let client = HttpClient::new(HttpClientConfig::new().connect_timeout(Duration::from_millis(500)));
    let result = HttpRequest::new().set_url("http://127.0.0.1:1/").unwrap().send_with(&client).await;

    let err = assert_err!(result);
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[cfg(feature = "rest")]
#[tokio::test]
async fn server_and_client_over_loopback() {
    let _ = tracing_subscriber::fmt().try_init();
    let download = std::env::temp_dir().join(format!("tlcore-served-{}.csv", std::process::id()));
    std::fs::write(&download, "id,name\n1,rust\n").unwrap();

    let dispatcher = Dispatcher::new(DispatcherConfig::new().token("Moodle"))
        .action("ping", |_ctx| async { Ok(json!({"ok": true})) });

    let served = download.clone();
    let server = HttpServer::new(HttpServerConfig::new("127.0.0.1", 7879))
        .dispatcher("/rest", dispatcher)
        .unwrap()
        .route("/download", move |request| {
            let served = served.clone();
            async move {
                HttpResponse::for_request(request)
                    .set_file_to_download(&served, "courses.pdf")
                    .unwrap_or_else(|_| HttpResponse::new().set_status_code(500))
            }
        })
        .unwrap();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.receive_until(async move {
        let _ = shutdown_rx.await;
    }));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = assert_ok!(HttpRequest::new().get("http://127.0.0.1:7879/rest?action=ping").await);
    assert_eq!(response.status_code(), Some(200));
    assert_eq!(response.content(), r#"{"ok":true}"#);
    assert_eq!(response.content_type(), "application/json");

    let response = assert_ok!(
        HttpRequest::new()
            .set_header("Authorization", "Bearer wrong")
            .get("http://127.0.0.1:7879/rest?action=ping")
            .await
    );
    assert_eq!(response.status_code(), Some(401));
    assert_eq!(response.content(), r#"{"error":"invalid token"}"#);

    let response = assert_ok!(
        HttpRequest::new()
            .set_request_method("POST")
            .set_url("http://127.0.0.1:7879/rest")
            .unwrap()
            .set_param("action", "ping")
            .send()
            .await
    );
    assert_eq!(response.status_code(), Some(200));

    let response = assert_ok!(HttpRequest::new().get("http://127.0.0.1:7879/download").await);
    assert_eq!(response.status_code(), Some(200));
    assert_eq!(response.content(), "id,name\n1,rust\n");
    assert_eq!(response.content_type(), "application/pdf");
    assert_eq!(response.header("Content-Disposition"), r#"attachment; filename="courses.pdf""#);

    let response = assert_ok!(HttpRequest::new().get("http://127.0.0.1:7879/missing").await);
    assert_eq!(response.status_code(), Some(404));

    shutdown_tx.send(()).unwrap();
    assert_ok!(assert_ok!(handle.await));
    std::fs::remove_file(&download).unwrap();
}

fn testdata(name: &str) -> String {
    format!("{}/testdata/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn echo_server(config: HttpServerConfig) -> HttpServer {
    HttpServer::new(config)
        .route("/echo", |request| async move {
            let body = request.body().to_string();
            HttpResponse::for_request(request).set_content_type("text/plain").set_content(body)
        })
        .unwrap()
}

#[tokio::test]
async fn oversized_body_is_rejected_before_routing() {
    let _ = tracing_subscriber::fmt().try_init();
    let server = echo_server(HttpServerConfig::new("127.0.0.1", 7880).max_body_size(16));

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.receive_until(async move {
        let _ = shutdown_rx.await;
    }));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = assert_ok!(
        HttpRequest::new()
            .set_request_method("POST")
            .set_url("http://127.0.0.1:7880/echo")
            .unwrap()
            .set_body("short")
            .send()
            .await
    );
    assert_eq!(response.status_code(), Some(200));
    assert_eq!(response.content(), "short");

    let response = assert_ok!(
        HttpRequest::new()
            .set_request_method("POST")
            .set_url("http://127.0.0.1:7880/echo")
            .unwrap()
            .set_body("x".repeat(1024))
            .send()
            .await
    );
    assert_eq!(response.status_code(), Some(413));
    assert_eq!(response.content(), "");

    shutdown_tx.send(()).unwrap();
    assert_ok!(assert_ok!(handle.await));
}

#[tokio::test]
async fn server_and_client_over_tls() {
    let _ = tracing_subscriber::fmt().try_init();
    let config = assert_ok!(HttpServerConfig::new("127.0.0.1", 7881).tls(testdata("server.pem"), testdata("server.key")));
    let server = echo_server(config);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.receive_until(async move {
        let _ = shutdown_rx.await;
    }));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = HttpClient::new(assert_ok!(HttpClientConfig::new().root_ca(testdata("ca.pem"))));
    let response = assert_ok!(
        HttpRequest::new()
            .set_request_method("POST")
            .set_url("https://localhost:7881/echo")
            .unwrap()
            .set_body("over tls")
            .send_with(&client)
            .await
    );
    assert_eq!(response.status_code(), Some(200));
    assert_eq!(response.content(), "over tls");
    assert_eq!(response.content_type(), "text/plain");

    // h2 is picked through ALPN; the status line then reads HTTP/2.0
    let client = HttpClient::new(assert_ok!(HttpClientConfig::new().root_ca(testdata("ca.pem"))).http_version(HttpClientVersion::Http2));
    let response = assert_ok!(
        HttpRequest::new()
            .set_request_method("POST")
            .set_url("https://localhost:7881/echo")
            .unwrap()
            .set_body("over h2")
            .send_with(&client)
            .await
    );
    assert_eq!(response.content(), "over h2");
    assert_eq!(response.status_code(), None);

    // the default roots do not know the test CA
    let result = HttpRequest::new().get("https://localhost:7881/echo").await;
    let err = assert_err!(result);
    assert_eq!(err.kind(), ErrorKind::Transport);

    shutdown_tx.send(()).unwrap();
    assert_ok!(assert_ok!(handle.await));
}
