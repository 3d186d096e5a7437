use std::{
	future::IntoFuture,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use axum::{
	Json, Router,
	extract::{Query, State},
	http::StatusCode,
	response::IntoResponse,
	routing,
};
use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};
use tokio::{
	net::TcpListener,
	sync::{oneshot, oneshot::Sender},
};

use scry_config::SearchProviderConfig;
use scry_providers::search::SearchClient;

#[derive(Clone)]
struct StubState {
	calls: Arc<AtomicUsize>,
	failures_before_success: usize,
}

async fn start_search_server(state: StubState) -> (String, Sender<()>) {
	let app = Router::new().route("/cards/search", routing::get(search_handler)).with_state(state);
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind search server.");
	let addr = listener.local_addr().expect("Failed to read search server address.");
	let (tx, rx) = oneshot::channel();
	let server = axum::serve(listener, app).with_graceful_shutdown(async move {
		let _ = rx.await;
	});

	tokio::spawn(async move {
		let _ = server.into_future().await;
	});

	(format!("http://{addr}"), tx)
}

async fn search_handler(
	State(state): State<StubState>,
	Query(params): Query<Map<String, Value>>,
) -> impl IntoResponse {
	let call_index = state.calls.fetch_add(1, Ordering::SeqCst);

	if call_index < state.failures_before_success {
		return StatusCode::SERVICE_UNAVAILABLE.into_response();
	}

	let query = params.get("q").and_then(Value::as_str).unwrap_or_default();

	if params.get("include_extras").and_then(Value::as_str) != Some("true") {
		return StatusCode::BAD_REQUEST.into_response();
	}
	if query.contains("is:reprint") {
		return (
			StatusCode::NOT_FOUND,
			Json(serde_json::json!({ "object": "error", "code": "not_found" })),
		)
			.into_response();
	}

	(StatusCode::OK, Json(serde_json::json!({ "object": "list", "total_cards": 100, "data": [] })))
		.into_response()
}

fn search_config(api_base: String, max_retries: u32) -> SearchProviderConfig {
	SearchProviderConfig {
		api_base,
		path: "/cards/search".to_string(),
		timeout_ms: 2_000,
		max_retries,
		base_backoff_ms: 5,
		max_backoff_ms: 20,
		user_agent: "scry-tests".to_string(),
		default_headers: Map::new(),
	}
}

#[test]
fn builds_bearer_auth_header() {
	let headers =
		scry_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn rejects_non_string_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("x-retries".to_string(), Value::from(3));

	assert!(scry_providers::extra_headers(&defaults).is_err());
}

#[test]
fn backoff_doubles_until_capped() {
	assert_eq!(scry_providers::backoff_for_attempt(0, 100, 1_000), Duration::from_millis(100));
	assert_eq!(scry_providers::backoff_for_attempt(2, 100, 1_000), Duration::from_millis(400));
	assert_eq!(scry_providers::backoff_for_attempt(8, 100, 1_000), Duration::from_millis(1_000));
	assert_eq!(scry_providers::backoff_for_attempt(64, 100, 1_000), Duration::from_millis(1_000));
}

#[tokio::test]
async fn probe_retries_server_errors() {
	let calls = Arc::new(AtomicUsize::new(0));
	let (api_base, shutdown) =
		start_search_server(StubState { calls: calls.clone(), failures_before_success: 2 }).await;
	let client = SearchClient::new(&search_config(api_base, 3)).expect("Failed to build client.");
	let probe = client.probe("t:creature c:r", 500).await;

	assert!(probe.ok);
	assert_eq!(probe.total_cards, Some(100));
	assert_eq!(calls.load(Ordering::SeqCst), 3);

	let _ = shutdown.send(());
}

#[tokio::test]
async fn probe_reports_zero_results_on_not_found() {
	let calls = Arc::new(AtomicUsize::new(0));
	let (api_base, shutdown) =
		start_search_server(StubState { calls, failures_before_success: 0 }).await;
	let client = SearchClient::new(&search_config(api_base, 0)).expect("Failed to build client.");
	let probe = client.probe("t:creature is:reprint", 500).await;

	assert!(!probe.ok);
	assert!(probe.zero_results);
	assert_eq!(probe.status, 404);

	let _ = shutdown.send(());
}

#[tokio::test]
async fn exhausted_retries_report_status_500() {
	let calls = Arc::new(AtomicUsize::new(0));
	let (api_base, shutdown) =
		start_search_server(StubState { calls: calls.clone(), failures_before_success: 10 }).await;
	let client = SearchClient::new(&search_config(api_base, 1)).expect("Failed to build client.");
	let probe = client.probe("t:creature", 500).await;

	assert!(!probe.ok);
	assert_eq!(probe.status, 503);
	assert_eq!(calls.load(Ordering::SeqCst), 2);

	let _ = shutdown.send(());
}

#[tokio::test]
async fn unreachable_service_reports_status_500() {
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind probe port.");
	let addr = listener.local_addr().expect("Failed to read probe port.");

	drop(listener);

	let client = SearchClient::new(&search_config(format!("http://{addr}"), 1))
		.expect("Failed to build client.");
	let probe = client.probe("t:creature", 500).await;

	assert!(!probe.ok);
	assert_eq!(probe.status, 500);
	assert!(probe.error.is_some());
}
