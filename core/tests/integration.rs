//! End-to-end calls against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port inside the test's own
//! runtime, then drives the client over real HTTP with the default reqwest
//! transport. The `/api/echo` route reflects requests back, so wire-level
//! details (headers, bodies, query strings) are asserted on what the server
//! actually received.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use reqcheck::{ApiClient, Arg, ClientConfig, Error, ErrorKind, ExpectationSpec, HttpMethod, RecordingHandle, Response};
use serde_json::{json, Value};

async fn start_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run(listener));
    addr
}

fn config_for(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        host: addr.ip().to_string(),
        port: Some(addr.port()),
        base_path: "/api".to_string(),
        ..ClientConfig::default()
    }
}

async fn client() -> ApiClient {
    ApiClient::new(config_for(start_server().await)).unwrap()
}

/// Send a call and hand back whatever reached its callback.
async fn fetch(call: reqcheck::Call<'_, reqcheck::ReqwestTransport>) -> (Option<Response>, Option<Error>) {
    let (tx, rx) = std::sync::mpsc::channel();
    call.callback(move |res, err| tx.send((res, err)).unwrap()).send().await.unwrap();
    rx.try_recv().expect("callback fired")
}

#[tokio::test]
async fn post_with_expectations_signals_done() {
    let api = client().await;
    let mut handle = RecordingHandle::new();
    api.call(
        HttpMethod::Post,
        Some(&mut handle as &mut dyn reqcheck::AssertionHandle),
        "/items",
        vec![
            Arg::Request(serde_json::from_value(json!({"data": {"name": "a"}})).unwrap()),
            Arg::Expect(ExpectationSpec::status(201)),
        ],
    )
    .unwrap()
    .send()
    .await
    .unwrap();
    assert!(handle.passed(), "completions: {:?}", handle.completions);

    let (res, err) = fetch(api.get("/items/1")).await;
    assert!(err.is_none());
    assert_eq!(res.unwrap().data(), Some(&json!({"id": 1, "name": "a"})));
}

#[tokio::test]
async fn created_item_data_matches_structurally() {
    let api = client().await;
    let (res, err) = fetch(api.post("/items").data(json!({"name": "a"})).expect_status(201)).await;
    assert!(err.is_none());
    let res = res.unwrap();
    assert_eq!(res.status(), 201);
    assert!(res.is_success());
    assert_eq!(res.data(), Some(&json!({"id": 1, "name": "a"})));
}

#[tokio::test]
async fn item_lifecycle() {
    let api = client().await;
    let mut handle = RecordingHandle::new();

    api.get("/items").expect_data(json!([])).handle(&mut handle).send().await.unwrap();
    api.post("/items")
        .data(json!({"name": "first"}))
        .expect_status(201)
        .expect_header("Content-Type", "application/json")
        .handle(&mut handle)
        .send()
        .await
        .unwrap();
    api.put("/items/1")
        .data(json!({"name": "renamed"}))
        .expect_data(json!({"id": 1, "name": "renamed"}))
        .handle(&mut handle)
        .send()
        .await
        .unwrap();
    api.delete("/items/1").expect_status(204).expect_body("").handle(&mut handle).send().await.unwrap();
    api.get("/items/1").expect_ok(false).handle(&mut handle).send().await.unwrap();

    assert_eq!(handle.completions.len(), 5);
    assert!(handle.completions.iter().all(Option::is_none), "{:?}", handle.completions);
}

#[tokio::test]
async fn status_mismatch_fails_once() {
    let api = client().await;
    let mut handle = RecordingHandle::new();
    api.get("/items/99")
        .expect_status(200)
        .expect_body("not this")
        .handle(&mut handle)
        .send()
        .await
        .unwrap();
    let failure = handle.failure().and_then(Error::as_assertion).unwrap();
    assert_eq!(failure.message, "status code");
    assert_eq!(failure.actual, json!(404));
    assert_eq!(handle.checks, vec!["status code"]);
}

#[tokio::test]
async fn assertion_failure_goes_to_callback() {
    let api = client().await;
    let mut handle = RecordingHandle::new();
    let mut seen = None;
    api.get("/status/503")
        .expect_status(200)
        .handle(&mut handle)
        .callback(|res, err| seen = Some((res.map(|r| r.status()), err)))
        .send()
        .await
        .unwrap();
    let (status, err) = seen.unwrap();
    assert_eq!(status, Some(503));
    assert_eq!(err.unwrap().kind(), ErrorKind::Assertion);
    assert!(handle.completions.is_empty());
}

#[tokio::test]
async fn json_body_goes_over_the_wire() {
    let api = client().await;
    let (res, _) = fetch(api.post("/echo").data(json!({"x": 1}))).await;
    let echo = res.unwrap().data().cloned().unwrap();
    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["headers"]["content-type"], "application/json");
    assert_eq!(echo["headers"]["content-length"], "7");
    let body: Value = serde_json::from_str(echo["body"].as_str().unwrap()).unwrap();
    assert_eq!(body, json!({"x": 1}));
}

#[tokio::test]
async fn get_data_is_sent_as_query() {
    let api = client().await;
    let (res, _) = fetch(api.get("/echo?fixed=yes").data(json!({"a": "1", "b": "two words"}))).await;
    let echo = res.unwrap().data().cloned().unwrap();
    assert_eq!(echo["path"], "/api/echo");
    assert_eq!(echo["query"], "fixed=yes&a=1&b=two+words");
    assert_eq!(echo["body"], "");
}

#[tokio::test]
async fn null_header_override_removes_default() {
    let mut config = config_for(start_server().await);
    config.default_headers.insert("Authorization".to_string(), "a".to_string());
    config.default_headers.insert("X-Suite".to_string(), "smoke".to_string());
    let api = ApiClient::new(config).unwrap();

    let (res, _) = fetch(api.get("/echo").remove_header("authorization")).await;
    let echo = res.unwrap().data().cloned().unwrap();
    assert!(echo["headers"].get("authorization").is_none());
    assert_eq!(echo["headers"]["x-suite"], "smoke");

    let (res, _) = fetch(api.get("/echo")).await;
    assert_eq!(res.unwrap().data().unwrap()["headers"]["authorization"], "a");
}

#[tokio::test]
async fn basic_auth_and_form_body() {
    let api = client().await;
    let form = json!({"user": "ann", "note": "a&b"}).as_object().cloned().unwrap();
    let (res, _) = fetch(api.post("/echo").auth("ann:pw").form(form)).await;
    let echo = res.unwrap().data().cloned().unwrap();
    assert_eq!(echo["headers"]["authorization"], "Basic YW5uOnB3");
    assert_eq!(echo["headers"]["content-type"], "application/x-www-form-urlencoded");
    assert_eq!(echo["body"], "note=a%26b&user=ann");
}

#[tokio::test]
async fn default_expected_headers_apply_to_every_call() {
    let mut config = config_for(start_server().await);
    config.expected_headers.insert("X-Echo".to_string(), "1".to_string());
    let api = ApiClient::new(config).unwrap();

    let mut handle = RecordingHandle::new();
    api.options("/echo").handle(&mut handle).send().await.unwrap();
    assert!(handle.passed());

    let mut handle = RecordingHandle::new();
    api.get("/text").handle(&mut handle).send().await.unwrap();
    assert_eq!(handle.failure().and_then(Error::as_assertion).unwrap().message, "header x-echo");
}

#[tokio::test]
async fn plain_text_and_head_responses() {
    let api = client().await;
    let (res, _) = fetch(api.get("/text").expect_body("hello, world")).await;
    let res = res.unwrap();
    assert_eq!(res.text(), "hello, world");
    assert!(res.data().is_none());

    let (res, err) = fetch(api.head("/echo")).await;
    assert!(err.is_none());
    let res = res.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text(), "");
}

#[tokio::test]
async fn malformed_json_is_recorded_not_raised() {
    let api = client().await;
    let (res, err) = fetch(api.get("/broken-json")).await;
    assert!(err.is_none());
    let res = res.unwrap();
    assert!(res.data().is_none());
    assert_eq!(res.parse_error().map(Error::kind), Some(ErrorKind::JsonParse));
}

#[tokio::test]
async fn status_classes() {
    let api = client().await;
    let (res, _) = fetch(api.get("/status/418")).await;
    assert!(res.as_ref().unwrap().is_client_error());
    let (res, _) = fetch(api.get("/status/502")).await;
    assert!(res.as_ref().unwrap().is_server_error());
}

#[tokio::test]
async fn timeout_aborts_hanging_request() {
    let api = client().await;
    let started = Instant::now();
    let (res, err) = fetch(api.get("/hang").timeout(Duration::from_millis(50))).await;
    let elapsed = started.elapsed();
    assert!(res.is_none());
    assert_eq!(err.unwrap().kind(), ErrorKind::Timeout);
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");
}

#[tokio::test]
async fn timeout_against_silent_socket() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let held = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let mut config = config_for(addr);
    config.timeout_millis = 50;
    let api = ApiClient::new(config).unwrap();
    let mut handle = RecordingHandle::new();
    api.get("/anything").handle(&mut handle).send().await.unwrap();
    assert!(handle.failure().unwrap().is_timeout());
    held.abort();
}

#[tokio::test]
async fn refused_connection_carries_request_context() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let api = ApiClient::new(config_for(addr)).unwrap();
    let err = api.get("/items").header("X-Trace", "t1").send().await.unwrap_err();
    match err {
        Error::Transport { method, url, headers, .. } => {
            assert_eq!(method, "GET");
            assert_eq!(url, format!("http://{addr}/api/items"));
            assert_eq!(headers, vec![("x-trace".to_string(), "t1".to_string())]);
        }
        other => panic!("expected transport error, got {other}"),
    }
}

#[tokio::test]
async fn concurrent_calls_are_independent() {
    let api = client().await;
    let (a, b, c) = tokio::join!(
        fetch(api.post("/items").data(json!({"name": "a"}))),
        fetch(api.get("/status/404")),
        fetch(api.get("/text")),
    );
    assert_eq!(a.0.unwrap().status(), 201);
    assert_eq!(b.0.unwrap().status(), 404);
    assert_eq!(c.0.unwrap().text(), "hello, world");
}

#[tokio::test]
async fn empty_path_is_rejected_synchronously() {
    let api = client().await;
    let err = api.get("").send().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}
