//! HTTP-level tests for `GithubWorkflowDispatcher` against an in-process stub
//! of the workflow-dispatch endpoint.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use forwarder::{
    Credential, DeviceModelName, DeviceRegistrationEvent, DeviceUdid, DispatchError,
    DispatchRequest, DispatchTarget, EventForwarder, ForwarderError, RetryPolicy, TesterEmail,
    WorkflowDispatcher,
};
use github::{GithubWorkflowDispatcher, GITHUB_API_VERSION};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const DISPATCH_PATH: &str =
    "/repos/customerio/apple-code-signing/actions/workflows/register-new-device.yml/dispatches";

#[derive(Clone, Debug)]
struct CapturedRequest {
    headers: HeaderMap,
    body: Value,
}

#[derive(Clone)]
struct StubState {
    status: StatusCode,
    response_body: &'static str,
    retry_after: Option<&'static str>,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

struct GithubStub {
    base_url: String,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl GithubStub {
    fn requests(&self) -> Vec<CapturedRequest> {
        self.captured.lock().unwrap().clone()
    }
}

async fn record_dispatch(
    State(state): State<StubState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state
        .captured
        .lock()
        .unwrap()
        .push(CapturedRequest { headers, body });

    let mut response = (state.status, state.response_body).into_response();
    if let Some(retry_after) = state.retry_after {
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from_static(retry_after));
    }
    response
}

async fn spawn_github_stub(
    status: StatusCode,
    response_body: &'static str,
    retry_after: Option<&'static str>,
) -> GithubStub {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        status,
        response_body,
        retry_after,
        captured: Arc::clone(&captured),
    };
    let app = Router::new()
        .route(DISPATCH_PATH, post(record_dispatch))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    GithubStub {
        base_url: format!("http://{addr}"),
        captured,
    }
}

fn sample_request() -> DispatchRequest {
    DispatchRequest::for_event(DispatchTarget::register_new_device(), &sample_event())
}

fn sample_event() -> DeviceRegistrationEvent {
    DeviceRegistrationEvent::new(
        DeviceUdid::new("ABCD-1234").unwrap(),
        DeviceModelName::new("iPhone 14").unwrap(),
        TesterEmail::new("qa@example.com").unwrap(),
    )
}

fn dispatcher_for(stub: &GithubStub) -> GithubWorkflowDispatcher {
    GithubWorkflowDispatcher::new(stub.base_url.clone(), Some(Duration::from_secs(5))).unwrap()
}

#[tokio::test]
async fn dispatch_sends_authenticated_workflow_dispatch() {
    let stub = spawn_github_stub(StatusCode::NO_CONTENT, "", None).await;
    let dispatcher = dispatcher_for(&stub);

    dispatcher
        .dispatch(&Credential::new("tok_123").unwrap(), &sample_request())
        .await
        .unwrap();

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.headers["authorization"], "Bearer tok_123");
    assert_eq!(request.headers["accept"], "application/vnd.github+json");
    assert_eq!(request.headers["x-github-api-version"], GITHUB_API_VERSION);
    assert_eq!(request.headers["content-type"], "application/json");
    assert!(request.headers.contains_key("user-agent"));
    assert_eq!(
        request.body,
        json!({
            "ref": "main",
            "inputs": {
                "ios_device_udid": "ABCD-1234",
                "device_model_name": "iPhone 14",
                "device_tester_email": "qa@example.com"
            }
        })
    );
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_ignored() {
    let stub = spawn_github_stub(StatusCode::NO_CONTENT, "", None).await;
    let dispatcher =
        GithubWorkflowDispatcher::new(format!("{}/", stub.base_url), None).unwrap();
    assert_eq!(dispatcher.api_base_url(), stub.base_url);

    dispatcher
        .dispatch(&Credential::new("tok_123").unwrap(), &sample_request())
        .await
        .unwrap();
    assert_eq!(stub.requests().len(), 1);
}

#[tokio::test]
async fn client_error_is_reported_once_with_body() {
    let stub = spawn_github_stub(
        StatusCode::UNPROCESSABLE_ENTITY,
        r#"{"message":"Unexpected inputs provided"}"#,
        None,
    )
    .await;
    let dispatcher = dispatcher_for(&stub);

    let err = dispatcher
        .dispatch(&Credential::new("tok_123").unwrap(), &sample_request())
        .await
        .unwrap_err();

    match &err {
        DispatchError::Status {
            status,
            body,
            retry_after,
        } => {
            assert_eq!(*status, 422);
            assert!(body.contains("Unexpected inputs provided"));
            assert!(retry_after.is_none());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.retry_policy(), RetryPolicy::NonRetryable);
    assert_eq!(stub.requests().len(), 1);
}

#[tokio::test]
async fn retry_after_header_is_surfaced_on_server_errors() {
    let stub = spawn_github_stub(StatusCode::SERVICE_UNAVAILABLE, "try later", Some("30")).await;
    let dispatcher = dispatcher_for(&stub);

    let err = dispatcher
        .dispatch(&Credential::new("tok_123").unwrap(), &sample_request())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(
        err.retry_policy(),
        RetryPolicy::Retryable {
            after: Some(Duration::from_secs(30))
        }
    );
    assert_eq!(stub.requests().len(), 1);
}

#[tokio::test]
async fn unreachable_api_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dispatcher =
        GithubWorkflowDispatcher::new(format!("http://{addr}"), Some(Duration::from_secs(5)))
            .unwrap();
    let err = dispatcher
        .dispatch(&Credential::new("tok_123").unwrap(), &sample_request())
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Transport { .. }));
}

#[tokio::test]
async fn forwarder_and_dispatcher_forward_the_scenario_event() {
    let stub = spawn_github_stub(StatusCode::NO_CONTENT, "", None).await;
    let forwarder = EventForwarder::new(
        Credential::new("tok_123").unwrap(),
        Arc::new(dispatcher_for(&stub)),
    );

    forwarder.forward(&sample_event()).await.unwrap();
    forwarder.forward(&sample_event()).await.unwrap();

    let requests = stub.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body, requests[1].body);
}

#[tokio::test]
async fn forwarder_surfaces_downstream_rejection() {
    let stub = spawn_github_stub(StatusCode::NOT_FOUND, r#"{"message":"Not Found"}"#, None).await;
    let forwarder = EventForwarder::new(
        Credential::new("tok_123").unwrap(),
        Arc::new(dispatcher_for(&stub)),
    );

    let err = forwarder.forward(&sample_event()).await.unwrap_err();
    assert!(matches!(
        err,
        ForwarderError::DispatchError(DispatchError::Status { status: 404, .. })
    ));
    assert_eq!(stub.requests().len(), 1);
}
