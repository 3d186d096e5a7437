use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode, header},
};
use serde_json::Value;
use tower::util::ServiceExt;

use scry_api::{routes, state::AppState};
use scry_config::Config;

fn test_config() -> Config {
	scry_testkit::memory_config().expect("Test config must be valid.")
}

async fn state(cfg: Config) -> AppState {
	AppState::new(cfg).await.expect("Failed to build app state.")
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
	Request::builder()
		.method(method)
		.uri(uri)
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(body.to_string()))
		.expect("Failed to build request.")
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
	Request::builder()
		.method(method)
		.uri(uri)
		.body(Body::empty())
		.expect("Failed to build request.")
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
	let response = app.clone().oneshot(req).await.expect("Failed to call router.");
	let status = response.status();
	let headers = response.headers().clone();
	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let json = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes).expect("Response must be JSON.")
	};

	(status, headers, json)
}

#[tokio::test]
async fn health_ok() {
	let app = routes::router(state(test_config()).await);
	let (status, headers, _) = send(&app, empty_request("GET", "/health")).await;

	assert_eq!(status, StatusCode::OK);
	assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn translate_returns_result_with_request_id_and_cors() {
	let app = routes::router(state(test_config()).await);
	let (status, headers, json) =
		send(&app, json_request("POST", "/translate", r#"{"query":"red creatures"}"#)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["scryfallQuery"], "c:r t:creature game:paper");
	assert_eq!(json["success"], true);
	assert_eq!(json["source"], "deterministic");
	assert!(json["responseTimeMs"].is_u64());
	assert!(headers.contains_key("x-request-id"));
	assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn preflight_is_no_content() {
	let app = routes::router(state(test_config()).await);
	let (status, headers, _) = send(&app, empty_request("OPTIONS", "/translate")).await;

	assert_eq!(status, StatusCode::NO_CONTENT);
	assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
}

#[tokio::test]
async fn malformed_and_empty_bodies_are_bad_requests() {
	let app = routes::router(state(test_config()).await);
	let (status, _, json) = send(&app, json_request("POST", "/translate", "{not json")).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["success"], false);

	let (status, _, json) =
		send(&app, json_request("POST", "/translate", r#"{"query":"   "}"#)).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(json["error"].is_string());
}

#[tokio::test]
async fn rate_limited_requests_carry_retry_after() {
	let mut cfg = test_config();

	cfg.rate_limit.session_limit = 1;

	let app = routes::router(state(cfg).await);
	let request = || {
		Request::builder()
			.method("POST")
			.uri("/translate")
			.header(header::CONTENT_TYPE, "application/json")
			.header("x-session-id", "session-a")
			.body(Body::from(r#"{"query":"red creatures"}"#))
			.expect("Failed to build request.")
	};
	let (first, _, _) = send(&app, request()).await;
	let (status, headers, json) = send(&app, request()).await;

	assert_eq!(first, StatusCode::OK);
	assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
	assert!(headers.contains_key(header::RETRY_AFTER));
	assert!(json["retryAfter"].as_u64().is_some_and(|secs| secs >= 1));
	assert_eq!(json["success"], false);
}

#[tokio::test]
async fn feedback_is_queued_and_listed_for_admins() {
	let state = state(test_config()).await;
	let app = routes::router(state.clone());
	let admin = routes::admin_router(state);
	let body = concat!(
		r#"{"originalQuery":"white creatures that go wide","#,
		r#""issueDescription":"Should use otag:synergy-token"}"#,
	);
	let (status, _, json) = send(&app, json_request("POST", "/feedback", body)).await;

	assert_eq!(status, StatusCode::CREATED);
	assert_eq!(json["status"], "pending");

	let id = json["id"].as_str().expect("Receipt must carry an id.").to_string();
	let (status, _, json) =
		send(&admin, empty_request("GET", "/v1/admin/feedback?status=pending")).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json.as_array().map(Vec::len), Some(1));
	assert_eq!(json[0]["id"], id.as_str());

	let (status, _, json) =
		send(&admin, empty_request("POST", &format!("/v1/admin/feedback/{id}/retrigger"))).await;

	assert_eq!(status, StatusCode::CONFLICT);
	assert_eq!(json["success"], false);

	let (status, _, _) =
		send(&admin, empty_request("GET", "/v1/admin/feedback?status=bogus")).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_ids_are_not_found_and_bad_ids_rejected() {
	let admin = routes::admin_router(state(test_config()).await);
	let (status, _, _) = send(
		&admin,
		json_request(
			"PUT",
			"/v1/admin/rules/6f1c2b8e-7d4a-4c1e-9a51-2f0c7b3d9e10/active",
			r#"{"isActive":true}"#,
		),
	)
	.await;

	assert_eq!(status, StatusCode::NOT_FOUND);

	let (status, _, _) =
		send(&admin, empty_request("POST", "/v1/admin/feedback/not-a-uuid/archive")).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);

	let (status, _, json) = send(&admin, empty_request("GET", "/v1/admin/rules")).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json, Value::Array(Vec::new()));
}

#[tokio::test]
async fn admin_token_is_enforced_when_configured() {
	let mut cfg = test_config();

	cfg.security.admin_auth_token = Some("s3cret".to_string());

	let admin = routes::admin_router(state(cfg).await);
	let (status, _, _) = send(&admin, empty_request("GET", "/v1/admin/rules")).await;

	assert_eq!(status, StatusCode::UNAUTHORIZED);

	let req = Request::builder()
		.method("GET")
		.uri("/v1/admin/rules")
		.header(header::AUTHORIZATION, "Bearer s3cret")
		.body(Body::empty())
		.expect("Failed to build request.");
	let (status, _, _) = send(&admin, req).await;

	assert_eq!(status, StatusCode::OK);
}
