use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use forwarder::{Credential, DispatchError, DispatchRequest, WorkflowDispatcher};
use reqwest::StatusCode as ClientStatus;
use serde_json::json;
use tokio::sync::oneshot;

use super::*;

struct StubDispatcher {
    requests: Mutex<Vec<DispatchRequest>>,
    result: Result<(), DispatchError>,
}

#[async_trait]
impl WorkflowDispatcher for StubDispatcher {
    async fn dispatch(
        &self,
        _credential: &Credential,
        request: &DispatchRequest,
    ) -> Result<(), DispatchError> {
        self.requests.lock().unwrap().push(request.clone());
        self.result.clone()
    }
}

struct RunningListener {
    base_url: String,
    dispatcher: Arc<StubDispatcher>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl RunningListener {
    fn dispatched(&self) -> Vec<DispatchRequest> {
        self.dispatcher.requests.lock().unwrap().clone()
    }
}

impl Drop for RunningListener {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn start_listener(result: Result<(), DispatchError>) -> RunningListener {
    let dispatcher = Arc::new(StubDispatcher {
        requests: Mutex::new(Vec::new()),
        result,
    });
    let forwarder = EventForwarder::new(Credential::new("tok_123").unwrap(), dispatcher.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(serve(listener, forwarder, async move {
        let _ = shutdown_rx.await;
    }));

    RunningListener {
        base_url: format!("http://{addr}"),
        dispatcher,
        shutdown: Some(shutdown_tx),
    }
}

fn new_device_event() -> serde_json::Value {
    json!({
        "specversion": "1.0",
        "id": "evt-1",
        "source": "//firebasealerts.googleapis.com/projects/1234567890",
        "type": "google.firebase.firebasealerts.alerts.v1.published",
        "alerttype": "appDistribution.newTesterIosDevice",
        "data": {
            "payload": {
                "testerEmail": "qa@example.com",
                "testerDeviceModelName": "iPhone 14",
                "testerDeviceIdentifier": "ABCD-1234"
            }
        }
    })
}

async fn post_structured(base_url: &str, event: &serde_json::Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base_url}/"))
        .header("content-type", "application/cloudevents+json")
        .body(event.to_string())
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn structured_event_is_forwarded_and_accepted() {
    let running = start_listener(Ok(())).await;

    let response = post_structured(&running.base_url, &new_device_event()).await;

    assert_eq!(response.status(), ClientStatus::ACCEPTED);
    let dispatched = running.dispatched();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].inputs.ios_device_udid.as_str(), "ABCD-1234");
    assert_eq!(dispatched[0].inputs.device_model_name.as_str(), "iPhone 14");
    assert_eq!(
        dispatched[0].inputs.device_tester_email.as_str(),
        "qa@example.com"
    );
}

#[tokio::test]
async fn binary_event_is_forwarded_and_accepted() {
    let running = start_listener(Ok(())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/", running.base_url))
        .header("content-type", "application/json")
        .header("ce-id", "evt-2")
        .header("ce-specversion", "1.0")
        .header("ce-source", "//firebasealerts.googleapis.com/projects/1234567890")
        .header("ce-type", "google.firebase.firebasealerts.alerts.v1.published")
        .body(new_device_event()["data"].to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), ClientStatus::ACCEPTED);
    assert_eq!(running.dispatched().len(), 1);
}

#[tokio::test]
async fn missing_device_field_is_a_bad_request_without_dispatch() {
    let running = start_listener(Ok(())).await;
    let mut event = new_device_event();
    event["data"]["payload"]
        .as_object_mut()
        .unwrap()
        .remove("testerDeviceIdentifier");

    let response = post_structured(&running.base_url, &event).await;

    assert_eq!(response.status(), ClientStatus::BAD_REQUEST);
    let body = response.text().await.unwrap();
    assert!(body.contains("testerDeviceIdentifier"));
    assert!(running.dispatched().is_empty());
}

#[tokio::test]
async fn other_alert_types_are_skipped() {
    let running = start_listener(Ok(())).await;
    let mut event = new_device_event();
    event["alerttype"] = json!("crashlytics.newFatalIssue");

    let response = post_structured(&running.base_url, &event).await;

    assert_eq!(response.status(), ClientStatus::ACCEPTED);
    assert!(running.dispatched().is_empty());
}

#[tokio::test]
async fn rejected_dispatch_maps_to_bad_gateway() {
    let running = start_listener(Err(DispatchError::Status {
        status: 401,
        body: r#"{"message":"Bad credentials"}"#.to_string(),
        retry_after: None,
    }))
    .await;

    let response = post_structured(&running.base_url, &new_device_event()).await;

    assert_eq!(response.status(), ClientStatus::BAD_GATEWAY);
    let body = response.text().await.unwrap();
    assert!(body.contains("401"));
    assert_eq!(running.dispatched().len(), 1);
}

#[tokio::test]
async fn retryable_dispatch_failure_maps_to_service_unavailable() {
    let running = start_listener(Err(DispatchError::Status {
        status: 429,
        body: "rate limited".to_string(),
        retry_after: Some(Duration::from_secs(60)),
    }))
    .await;

    let response = post_structured(&running.base_url, &new_device_event()).await;

    assert_eq!(response.status(), ClientStatus::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()["retry-after"], "60");
    assert_eq!(running.dispatched().len(), 1);
}

#[tokio::test]
async fn non_cloud_event_request_is_rejected() {
    let running = start_listener(Ok(())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/", running.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), ClientStatus::BAD_REQUEST);
    assert!(running.dispatched().is_empty());
}

#[tokio::test]
async fn health_endpoint_answers_ok() {
    let running = start_listener(Ok(())).await;

    let response = reqwest::get(format!("{}/healthz", running.base_url))
        .await
        .unwrap();

    assert_eq!(response.status(), ClientStatus::OK);
    assert_eq!(response.text().await.unwrap(), "ok");
}
