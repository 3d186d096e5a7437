use std::time::Duration;

use reqwest::{
	Client, StatusCode,
	header::{ACCEPT, HeaderValue, USER_AGENT},
};
use serde::Serialize;
use serde_json::Value;

use crate::Result;

/// Classified outcome of one dry-run search.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchProbe {
	pub ok: bool,
	pub status: u16,
	pub total_cards: Option<u64>,
	pub overly_broad: bool,
	pub zero_results: bool,
	pub warnings: Vec<String>,
	pub error: Option<String>,
}
impl SearchProbe {
	/// Retries are exhausted and no response was classified.
	pub fn network_failure(message: impl Into<String>) -> Self {
		Self { ok: false, status: 500, error: Some(message.into()), ..Self::default() }
	}
}

pub struct SearchClient {
	client: Client,
	url: String,
	max_retries: u32,
	base_backoff_ms: u64,
	max_backoff_ms: u64,
}
impl SearchClient {
	pub fn new(cfg: &scry_config::SearchProviderConfig) -> Result<Self> {
		let mut headers = crate::extra_headers(&cfg.default_headers)?;

		headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
		headers.insert(USER_AGENT, cfg.user_agent.parse()?);

		let client = Client::builder()
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.default_headers(headers)
			.build()?;

		Ok(Self {
			client,
			url: format!("{}{}", cfg.api_base.trim_end_matches('/'), cfg.path),
			max_retries: cfg.max_retries,
			base_backoff_ms: cfg.base_backoff_ms,
			max_backoff_ms: cfg.max_backoff_ms,
		})
	}

	/// Never fails. Transport errors, timeouts, 429 and 5xx are retried with backoff, and a
	/// final failure is reported as status 500.
	pub async fn probe(&self, query: &str, overly_broad_threshold: u64) -> SearchProbe {
		let mut attempt = 0;

		loop {
			let sent = self
				.client
				.get(&self.url)
				.query(&[("q", query), ("include_extras", "true")])
				.send()
				.await;
			let retry = attempt < self.max_retries;

			match sent {
				Ok(res) => {
					let status = res.status();

					if retry && is_retryable(status) {
						tracing::warn!(
							status = status.as_u16(),
							attempt,
							"Search service asked for a retry."
						);
					} else {
						let body: Value = res.json().await.unwrap_or(Value::Null);

						return classify(status.as_u16(), &body, overly_broad_threshold);
					}
				},
				Err(err) => {
					if !retry {
						return SearchProbe::network_failure(format!(
							"Search service unreachable: {err}"
						));
					}

					tracing::warn!(error = %err, attempt, "Search request failed.");
				},
			}

			tokio::time::sleep(crate::backoff_for_attempt(
				attempt,
				self.base_backoff_ms,
				self.max_backoff_ms,
			))
			.await;

			attempt += 1;
		}
	}
}

pub fn classify(status: u16, body: &Value, overly_broad_threshold: u64) -> SearchProbe {
	let warnings = body
		.get("warnings")
		.and_then(Value::as_array)
		.map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
		.unwrap_or_default();

	match status {
		200 => {
			let total = body.get("total_cards").and_then(Value::as_u64).unwrap_or(0);

			SearchProbe {
				ok: true,
				status,
				total_cards: Some(total),
				overly_broad: total > overly_broad_threshold,
				zero_results: total == 0,
				warnings,
				error: None,
			}
		},
		404 => SearchProbe {
			ok: false,
			status,
			zero_results: true,
			warnings,
			..SearchProbe::default()
		},
		_ => {
			let detail = body
				.get("details")
				.and_then(Value::as_str)
				.map(str::to_string)
				.unwrap_or_else(|| format!("Search service returned status {status}."));

			SearchProbe {
				ok: false,
				status,
				warnings,
				error: Some(detail),
				..SearchProbe::default()
			}
		},
	}
}

fn is_retryable(status: StatusCode) -> bool {
	status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ok_response_reports_total() {
		let body = serde_json::json!({ "object": "list", "total_cards": 100, "data": [] });
		let probe = classify(200, &body, 500);

		assert!(probe.ok);
		assert_eq!(probe.total_cards, Some(100));
		assert!(!probe.overly_broad);
		assert!(!probe.zero_results);
	}

	#[test]
	fn large_totals_are_overly_broad() {
		let body = serde_json::json!({ "total_cards": 12_000 });

		assert!(classify(200, &body, 500).overly_broad);
	}

	#[test]
	fn not_found_means_zero_results() {
		let body = serde_json::json!({ "object": "error", "code": "not_found" });
		let probe = classify(404, &body, 500);

		assert!(!probe.ok);
		assert!(probe.zero_results);
	}

	#[test]
	fn other_statuses_carry_details_and_warnings() {
		let body = serde_json::json!({
			"object": "error",
			"details": "All of your terms were ignored.",
			"warnings": ["Invalid expression \"x:y\" was ignored."]
		});
		let probe = classify(400, &body, 500);

		assert!(!probe.ok);
		assert_eq!(probe.error.as_deref(), Some("All of your terms were ignored."));
		assert_eq!(probe.warnings.len(), 1);
	}
}
