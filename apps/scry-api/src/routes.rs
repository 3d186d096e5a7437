use axum::{
	Json, Router,
	body::Body,
	extract::{
		Path, Query, State,
		rejection::{JsonRejection, PathRejection},
	},
	http::{HeaderMap, HeaderValue, Request, StatusCode, header},
	middleware::{self, Next},
	response::{IntoResponse, Response},
	routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use scry_domain::{result::TranslationResult, rules::TranslationRule};
use scry_service::{
	Error as ServiceError, FeedbackReceipt, FeedbackRequest, RequestContext, TranslateRequest,
	sanitize_error_message, store::FeedbackItem,
};

use crate::state::AppState;

const HEADER_REQUEST_ID: &str = "x-request-id";
const HEADER_SESSION_ID: &str = "x-session-id";
const HEADER_FORWARDED_FOR: &str = "x-forwarded-for";
const HEADER_REAL_IP: &str = "x-real-ip";
const CORS_ALLOW_METHODS: &str = "POST, OPTIONS";
const CORS_ALLOW_HEADERS: &str = "content-type, x-session-id";
const CORS_MAX_AGE_SECONDS: &str = "86400";
const INTERNAL_ERROR_MESSAGE: &str = "Internal error. Please try again later.";

#[derive(Debug, Deserialize)]
struct FeedbackListQuery {
	status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleActiveRequest {
	is_active: bool,
}

#[derive(Debug, Serialize)]
struct StatusBody {
	status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
	error: String,
	success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	retry_after: Option<u64>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	message: String,
	retry_after: Option<u64>,
}
impl ApiError {
	fn new(status: StatusCode, message: impl Into<String>) -> Self {
		Self { status, message: message.into(), retry_after: None }
	}

	fn bad_request(message: impl Into<String>) -> Self {
		Self::new(StatusCode::BAD_REQUEST, sanitize_error_message(&message.into()))
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } => Self::bad_request(message),
			ServiceError::RateLimited { retry_after_secs } => Self {
				status: StatusCode::TOO_MANY_REQUESTS,
				message: format!("Too many requests. Retry in {retry_after_secs} seconds."),
				retry_after: Some(retry_after_secs),
			},
			ServiceError::NotFound { message } => Self::new(StatusCode::NOT_FOUND, message),
			ServiceError::Conflict { message } => Self::new(StatusCode::CONFLICT, message),
			err @ (ServiceError::Provider { .. } | ServiceError::Storage { .. }) => {
				tracing::error!(error = %err, "Request failed.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
			},
		}
	}
}
impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		Self::bad_request(rejection.body_text())
	}
}
impl From<PathRejection> for ApiError {
	fn from(rejection: PathRejection) -> Self {
		Self::bad_request(rejection.body_text())
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error: self.message, success: false, retry_after: self.retry_after };
		let mut response = (self.status, Json(body)).into_response();

		if let Some(retry_after) = self.retry_after
			&& let Ok(value) = HeaderValue::from_str(&retry_after.to_string())
		{
			response.headers_mut().insert(header::RETRY_AFTER, value);
		}

		response
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/translate", post(translate).options(preflight))
		.route("/feedback", post(submit_feedback))
		.layer(middleware::from_fn_with_state(state.clone(), public_headers))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/v1/admin/feedback", get(list_feedback))
		.route("/v1/admin/feedback/{id}/retrigger", post(retrigger_feedback))
		.route("/v1/admin/feedback/{id}/archive", post(archive_feedback))
		.route("/v1/admin/rules", get(list_rules))
		.route("/v1/admin/rules/{id}/active", put(set_rule_active))
		.layer(middleware::from_fn_with_state(state.clone(), admin_auth))
		.with_state(state)
}

/// First forwarded address, then the real-IP header, then the configured default.
pub fn client_ip(headers: &HeaderMap, default_ip: &str) -> String {
	if let Some(first) = read_header(headers, HEADER_FORWARDED_FOR)
		.and_then(|raw| raw.split(',').next().map(|ip| ip.trim().to_string()))
		.filter(|ip| !ip.is_empty())
	{
		return first;
	}

	read_header(headers, HEADER_REAL_IP).unwrap_or_else(|| default_ip.to_string())
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn preflight() -> StatusCode {
	StatusCode::NO_CONTENT
}

async fn translate(
	State(state): State<AppState>,
	headers: HeaderMap,
	payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Json<TranslationResult>, ApiError> {
	let Json(payload) = payload?;
	let ctx = RequestContext {
		session_id: read_header(&headers, HEADER_SESSION_ID),
		client_ip: client_ip(&headers, &state.default_client_ip),
	};
	let result = state.service.translate(payload, &ctx).await?;

	Ok(Json(result))
}

async fn submit_feedback(
	State(state): State<AppState>,
	payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<FeedbackReceipt>), ApiError> {
	let Json(payload) = payload?;
	let receipt = state.service.submit_feedback(payload).await?;

	Ok((StatusCode::CREATED, Json(receipt)))
}

async fn list_feedback(
	State(state): State<AppState>,
	Query(query): Query<FeedbackListQuery>,
) -> Result<Json<Vec<FeedbackItem>>, ApiError> {
	let items = state.service.list_feedback(query.status.as_deref()).await?;

	Ok(Json(items))
}

async fn retrigger_feedback(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<StatusBody>, ApiError> {
	let Path(id) = id?;
	let status = state.service.retrigger_feedback(id).await?;
	let service = state.service.clone();

	tokio::spawn(async move {
		if let Err(err) = service.process_feedback(id).await {
			tracing::warn!(
				feedback_id = %id,
				error = %err,
				"Retriggered feedback was not processed."
			);
		}
	});

	Ok(Json(StatusBody { status: status.as_str() }))
}

async fn archive_feedback(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<StatusBody>, ApiError> {
	let Path(id) = id?;
	let status = state.service.archive_feedback(id).await?;

	Ok(Json(StatusBody { status: status.as_str() }))
}

async fn list_rules(State(state): State<AppState>) -> Result<Json<Vec<TranslationRule>>, ApiError> {
	let rules = state.service.list_rules().await?;

	Ok(Json(rules))
}

async fn set_rule_active(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
	payload: Result<Json<RuleActiveRequest>, JsonRejection>,
) -> Result<Json<StatusBody>, ApiError> {
	let Path(id) = id?;
	let Json(payload) = payload?;

	state.service.set_rule_active(id, payload.is_active).await?;

	let status = if payload.is_active { "active" } else { "inactive" };

	Ok(Json(StatusBody { status }))
}

async fn public_headers(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
	let request_id = Uuid::new_v4().to_string();
	let span = tracing::info_span!(
		"request",
		request_id = %request_id,
		method = %req.method(),
		path = req.uri().path(),
	);
	let mut response = next.run(req).instrument(span).await;
	let headers = response.headers_mut();

	if let Ok(value) = HeaderValue::from_str(&request_id) {
		headers.insert(HEADER_REQUEST_ID, value);
	}

	let origin = HeaderValue::from_str(&state.cors_allow_origin)
		.unwrap_or_else(|_| HeaderValue::from_static("*"));

	headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
	headers.insert(
		header::ACCESS_CONTROL_ALLOW_METHODS,
		HeaderValue::from_static(CORS_ALLOW_METHODS),
	);
	headers.insert(
		header::ACCESS_CONTROL_ALLOW_HEADERS,
		HeaderValue::from_static(CORS_ALLOW_HEADERS),
	);
	headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(CORS_MAX_AGE_SECONDS));

	response
}

async fn admin_auth(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
	if let Some(expected) = state.admin_auth_token.as_deref()
		&& read_bearer_token(req.headers()) != Some(expected)
	{
		return ApiError::new(StatusCode::UNAUTHORIZED, "Admin token required.").into_response();
	}

	next.run(req).await
}

fn read_header(headers: &HeaderMap, name: &str) -> Option<String> {
	headers
		.get(name)
		.and_then(|value| value.to_str().ok())
		.map(|value| value.trim().to_string())
		.filter(|value| !value.is_empty())
}

fn read_bearer_token(headers: &HeaderMap) -> Option<&str> {
	let raw = headers.get(header::AUTHORIZATION)?;
	let value = raw.to_str().ok()?.trim();
	let token = value.strip_prefix("Bearer ")?.trim();

	if token.is_empty() { None } else { Some(token) }
}
