use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

const SYSTEM_PROMPT: &str = "You translate natural-language Magic: The Gathering card requests \
into Scryfall search syntax. Use only documented search keys. Reply with a JSON object: \
{\"query\": string, \"confidence\": number between 0 and 1, \"explanation\": string}. \
Do not add prose outside the JSON object.";

#[derive(Clone, Debug, Serialize)]
pub struct AssistantRequest<'a> {
	pub request: &'a str,
	/// Best deterministic attempt, offered as a starting point.
	pub base_query: &'a str,
	pub unresolved: &'a [String],
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AssistantSuggestion {
	pub query: String,
	#[serde(default)]
	pub confidence: Option<f32>,
	#[serde(default)]
	pub explanation: Option<String>,
}

pub async fn suggest_query(
	cfg: &scry_config::AssistantProviderConfig,
	request: &AssistantRequest<'_>,
) -> Result<AssistantSuggestion> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"response_format": { "type": "json_object" },
		"messages": [
			{ "role": "system", "content": SYSTEM_PROMPT },
			{ "role": "user", "content": serde_json::to_string(request)? },
		],
	});
	let mut last_error = None;

	for attempt in 0..=cfg.max_retries {
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		match parse_assistant_json(json) {
			Ok(suggestion) => return Ok(suggestion),
			Err(err) => {
				tracing::warn!(error = %err, attempt, "Assistant reply could not be parsed.");

				last_error = Some(err);
			},
		}
	}

	Err(last_error.unwrap_or_else(|| Error::InvalidResponse {
		message: "Assistant returned no usable reply.".to_string(),
	}))
}

fn parse_assistant_json(json: Value) -> Result<AssistantSuggestion> {
	let payload = match json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
	{
		Some(content) => serde_json::from_str::<Value>(strip_fences(content)).map_err(|_| {
			Error::InvalidResponse { message: "Assistant content is not valid JSON.".to_string() }
		})?,
		None if json.is_object() => json,
		None => {
			return Err(Error::InvalidResponse {
				message: "Assistant response is missing JSON content.".to_string(),
			});
		},
	};
	let mut suggestion: AssistantSuggestion = serde_json::from_value(payload)?;

	suggestion.query = suggestion.query.trim().to_string();

	if suggestion.query.is_empty() {
		return Err(Error::InvalidResponse {
			message: "Assistant returned an empty query.".to_string(),
		});
	}

	suggestion.confidence =
		suggestion.confidence.filter(|value| value.is_finite()).map(|value| value.clamp(0.0, 1.0));

	Ok(suggestion)
}

fn strip_fences(content: &str) -> &str {
	let trimmed = content.trim();
	let Some(inner) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let inner = inner.strip_prefix("json").unwrap_or(inner);

	inner.strip_suffix("```").unwrap_or(inner).trim()
}
