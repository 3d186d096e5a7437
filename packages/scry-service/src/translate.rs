use std::time::{Duration, Instant};

use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use scry_domain::{
	compiler::{self, Compiled},
	filters::{NormalizedFilters, SearchFilters},
	intent,
	result::{Explanation, TranslationResult, TranslationSource},
	rules::TranslationRule,
	syntax,
};
use scry_providers::assistant::AssistantRequest;

use crate::{
	Error, Result, ScryService,
	cache::{self, QueryCache},
	live::{self, LiveCheck, LiveOutcome},
	store::TranslationLog,
};

const DEFAULT_ASSISTANT_CONFIDENCE: f32 = 0.6;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
	pub query: String,
	#[serde(default)]
	pub filters: Option<SearchFilters>,
	#[serde(default)]
	pub use_cache: Option<bool>,
}

/// Caller identity used for rate limiting.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
	pub session_id: Option<String>,
	pub client_ip: String,
}

struct Draft {
	query: String,
	explanation: Explanation,
	source: TranslationSource,
	model_used: Option<String>,
}

impl ScryService {
	pub async fn translate(
		&self,
		req: TranslateRequest,
		ctx: &RequestContext,
	) -> Result<TranslationResult> {
		let started = Instant::now();

		self.limiter.check(ctx.session_id.as_deref(), &ctx.client_ip)?;

		syntax::check_input(&req.query, &self.opts.limits)
			.map_err(|rejection| Error::InvalidRequest { message: rejection.message() })?;

		let filters = match &req.filters {
			Some(filters) => filters
				.normalize()
				.map_err(|rejection| Error::InvalidRequest { message: rejection.message() })?,
			None => NormalizedFilters::default(),
		};
		let normalized = intent::normalize_query(&req.query);
		let use_cache = self.cfg.cache.enabled && req.use_cache.unwrap_or(true);
		let cache_key = if use_cache {
			Some(cache::build_translation_cache_key(&normalized, &filters)?)
		} else {
			None
		};

		if let Some(key) = cache_key.as_deref()
			&& let Some(mut hit) = self.cached(key, &req.query).await
		{
			hit.response_time_ms = Some(elapsed_ms(started));

			tracing::info!(
				source = hit.source.as_str(),
				confidence = hit.explanation.confidence,
				key_prefix = cache::cache_key_prefix(key),
				"Translation served from cache."
			);

			self.record(&hit, None, &[], &[]).await;

			return Ok(hit);
		}

		let rules = self.active_rules().await;
		let compiled =
			compiler::translate(&req.query, &filters, &rules, self.matcher.as_ref(), &self.opts);
		let mut draft = self.resolve(&req.query, &compiled).await;
		let mut validation = None;

		if self.cfg.validation.enabled {
			let outcome = self.validate_live(&draft, &compiled).await;

			draft.query = outcome.query;
			draft.explanation.assumptions.extend(outcome.assumptions);
			draft.explanation.set_confidence(outcome.confidence);
			validation = Some(outcome.summary);
		}

		let mut result = TranslationResult {
			original_query: req.query.clone(),
			scryfall_query: draft.query,
			explanation: draft.explanation,
			success: true,
			source: draft.source,
			validation,
			response_time_ms: None,
		};

		if let Some(key) = cache_key.as_deref() {
			self.remember(key, &normalized, &result).await;
		}

		result.response_time_ms = Some(elapsed_ms(started));

		tracing::info!(
			source = result.source.as_str(),
			confidence = result.explanation.confidence,
			response_time_ms = result.response_time_ms,
			"Translation compiled."
		);

		self.record(&result, draft.model_used, &compiled.syntax_issues, &compiled.warnings).await;

		Ok(result)
	}

	async fn cached(&self, key: &str, original_query: &str) -> Option<TranslationResult> {
		match self.cache.get(key, original_query).await {
			Ok(hit) => hit,
			Err(err) => {
				tracing::warn!(error = %err, "Cache lookup failed. Compiling without cache.");

				None
			},
		}
	}

	async fn remember(&self, key: &str, normalized: &str, result: &TranslationResult) {
		if let Err(err) = write_cache(&self.cache, key, normalized, result).await {
			tracing::error!(error = %err, "Failed to write translation cache entry.");
		}
	}

	async fn active_rules(&self) -> Vec<TranslationRule> {
		match self.stores.rules.active_rules().await {
			Ok(rules) => rules,
			Err(err) => {
				tracing::warn!(error = %err, "Failed to load translation rules.");

				Vec::new()
			},
		}
	}

	/// The deterministic draft, or the assistant's suggestion when fragments remain unexplained.
	async fn resolve(&self, original_query: &str, compiled: &Compiled) -> Draft {
		let explanation = Explanation::new(
			compiled.readable.clone(),
			compiled.assumptions.clone(),
			compiled.confidence,
		);
		let mut draft = Draft {
			query: compiled.query.clone(),
			explanation,
			source: compiled.source,
			model_used: None,
		};

		if !compiled.needs_ai {
			return draft;
		}

		let Some(cfg) = self.assistant_config() else {
			return draft;
		};
		let request = AssistantRequest {
			request: original_query,
			base_query: &compiled.base_query,
			unresolved: &compiled.unresolved,
		};

		match self.providers.assistant.suggest(cfg, &request).await {
			Ok(suggestion) => {
				let report = syntax::validate_syntax(&suggestion.query, self.opts.max_params);

				if report.valid && !report.sanitized.is_empty() {
					let confidence = suggestion
						.confidence
						.filter(|confidence| confidence.is_finite())
						.unwrap_or(DEFAULT_ASSISTANT_CONFIDENCE)
						.clamp(0.0, 1.0);

					draft.query = with_game_filter(
						&report.sanitized,
						&self.opts.game_filter,
						self.opts.max_params,
					);
					draft.explanation.set_confidence(confidence);

					if let Some(readable) =
						suggestion.explanation.filter(|text| !text.trim().is_empty())
					{
						draft.explanation.readable = readable;
					}

					draft.source = TranslationSource::Ai;
					draft.model_used = Some(cfg.model.clone());

					return draft;
				}

				tracing::warn!(
					issues = ?report.issues,
					"Assistant suggestion failed syntax validation."
				);
			},
			Err(err) => {
				tracing::warn!(error = %err, "Assistant fallback failed.");
			},
		}

		draft.query = compiled.base_query.clone();
		draft.source = TranslationSource::ForcedFallback;
		draft.explanation.assumptions.push(
			"Used the deterministic query because no usable suggestion was available.".to_string(),
		);

		draft
	}

	async fn validate_live(&self, draft: &Draft, compiled: &Compiled) -> LiveOutcome {
		let fallback = (compiled.base_query != draft.query).then_some(compiled.base_query.as_str());

		live::validate(
			self.providers.search.as_ref(),
			LiveCheck {
				query: &draft.query,
				fallback,
				confidence: draft.explanation.confidence,
				overly_broad_threshold: self.cfg.validation.overly_broad_threshold,
				deadline: Duration::from_millis(self.cfg.validation.deadline_ms),
				weights: &self.opts.weights,
			},
		)
		.await
	}

	async fn record(
		&self,
		result: &TranslationResult,
		model_used: Option<String>,
		syntax_issues: &[String],
		warnings: &[String],
	) {
		let mut validation_issues: Vec<String> =
			syntax_issues.iter().chain(warnings).cloned().collect();
		let mut quality_flags = Vec::new();

		if let Some(summary) = &result.validation {
			validation_issues.extend(summary.warnings.iter().cloned());
			validation_issues.extend(summary.error.as_deref().map(crate::sanitize_error_message));

			if !summary.ok && !summary.zero_results {
				quality_flags.push("validation_unavailable".to_string());
			}
			if summary.overly_broad {
				quality_flags.push("overly_broad".to_string());
			}
			if summary.zero_results {
				quality_flags.push("zero_results".to_string());
			}
			if !summary.relaxed.is_empty() {
				quality_flags.push("relaxed".to_string());
			}
			if summary.used_fallback_query {
				quality_flags.push("used_fallback_query".to_string());
			}
		}

		let log = TranslationLog {
			id: Uuid::new_v4(),
			natural_language_query: result.original_query.clone(),
			translated_query: result.scryfall_query.clone(),
			confidence_score: result.explanation.confidence,
			response_time_ms: result.response_time_ms.unwrap_or_default(),
			source: result.source,
			fallback_used: matches!(
				result.source,
				TranslationSource::Fallback | TranslationSource::ForcedFallback
			),
			model_used,
			validation_issues,
			quality_flags,
			created_at: OffsetDateTime::now_utc(),
		};

		if let Err(err) = self.stores.logs.record(log).await {
			tracing::error!(error = %err, "Failed to record translation log.");
		}
	}
}

async fn write_cache(
	cache: &QueryCache,
	key: &str,
	normalized: &str,
	result: &TranslationResult,
) -> Result<()> {
	let written = cache.set(key, normalized, result).await?;

	tracing::debug!(written, key_prefix = cache::cache_key_prefix(key), "Cache write finished.");

	Ok(())
}

/// Appends the game filter unless one is present. A top-level `or` is grouped first and one
/// parameter slot is kept free for the filter.
fn with_game_filter(query: &str, game_filter: &str, max_params: usize) -> String {
	let has_game = query
		.split_whitespace()
		.any(|term| syntax::term_key(term.trim_start_matches('(')) == Some("game"));

	if has_game {
		return query.to_string();
	}

	let report = syntax::validate_syntax(query, max_params.saturating_sub(1));
	let grouped = syntax::group_disjunction(&report.sanitized);

	if grouped.is_empty() {
		format!("game:{game_filter}")
	} else {
		format!("{grouped} game:{game_filter}")
	}
}

fn elapsed_ms(started: Instant) -> u64 {
	u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn game_filter_is_appended_once() {
		assert_eq!(with_game_filter("t:dragon", "paper", 15), "t:dragon game:paper");
		assert_eq!(with_game_filter("t:dragon game:arena", "paper", 15), "t:dragon game:arena");
	}

	#[test]
	fn game_filter_groups_a_disjunction() {
		assert_eq!(
			with_game_filter("t:dragon or t:angel", "paper", 15),
			"(t:dragon or t:angel) game:paper"
		);
		assert_eq!(
			with_game_filter("(t:dragon or t:angel) c:r", "paper", 15),
			"(t:dragon or t:angel) c:r game:paper"
		);
	}

	#[test]
	fn game_filter_stays_within_the_parameter_ceiling() {
		let query = with_game_filter("t:elf c:g mv<=2 f:modern", "paper", 3);

		assert_eq!(query, "t:elf c:g game:paper");
		assert_eq!(syntax::parameter_count(&query), 3);
	}

	#[test]
	fn request_accepts_camel_case_fields() {
		let req: TranslateRequest = serde_json::from_str(
			r#"{"query":"red creatures","useCache":false,"filters":{"format":"modern"}}"#,
		)
		.expect("Request must parse.");

		assert_eq!(req.use_cache, Some(false));
		assert_eq!(req.filters.and_then(|filters| filters.format), Some("modern".to_string()));
	}
}
