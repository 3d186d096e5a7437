mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	AssistantProviderConfig, Cache, Compiler, CompilerBudget, CompilerConfidence, CompilerInput,
	Config, Feedback, Postgres, Providers, RateLimit, SearchProviderConfig, Security, Service,
	Storage, Validation,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(&raw).map_err(|err| match err {
		ParseOrValidate::Parse(source) => Error::ParseConfig { path: path.to_path_buf(), source },
		ParseOrValidate::Validate(err) => err,
	})
}

/// Parses, normalizes and validates a config held in memory.
pub fn from_toml_str(raw: &str) -> Result<Config> {
	parse(raw).map_err(|err| match err {
		ParseOrValidate::Parse(source) => Error::ParseInline { source },
		ParseOrValidate::Validate(err) => err,
	})
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(validation("service.http_bind must be non-empty."));
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(validation("service.admin_bind must be non-empty."));
	}

	match cfg.storage.backend.as_str() {
		"memory" => {},
		"postgres" => {
			let Some(postgres) = cfg.storage.postgres.as_ref() else {
				return Err(validation(
					"storage.postgres is required when storage.backend is postgres.",
				));
			};

			if postgres.dsn.trim().is_empty() {
				return Err(validation("storage.postgres.dsn must be non-empty."));
			}
			if postgres.pool_max_conns == 0 {
				return Err(validation(
					"storage.postgres.pool_max_conns must be greater than zero.",
				));
			}
		},
		_ => {
			return Err(validation("storage.backend must be one of postgres or memory."));
		},
	}

	let search = &cfg.providers.search;

	if search.api_base.trim().is_empty() {
		return Err(validation("providers.search.api_base must be non-empty."));
	}
	if search.timeout_ms == 0 {
		return Err(validation("providers.search.timeout_ms must be greater than zero."));
	}
	if search.max_backoff_ms < search.base_backoff_ms {
		return Err(validation(
			"providers.search.max_backoff_ms must be at least providers.search.base_backoff_ms.",
		));
	}

	let assistant_enabled = cfg.providers.assistant.as_ref().is_some_and(|a| a.enabled);

	if let Some(assistant) = cfg.providers.assistant.as_ref()
		&& assistant.enabled
	{
		if assistant.api_key.trim().is_empty() {
			return Err(validation("providers.assistant.api_key must be non-empty when enabled."));
		}
		if assistant.model.trim().is_empty() {
			return Err(validation("providers.assistant.model must be non-empty when enabled."));
		}
		if assistant.timeout_ms == 0 {
			return Err(validation("providers.assistant.timeout_ms must be greater than zero."));
		}
	}

	validate_compiler(cfg)?;

	if cfg.validation.overly_broad_threshold == 0 {
		return Err(validation("validation.overly_broad_threshold must be greater than zero."));
	}
	if cfg.validation.deadline_ms == 0 {
		return Err(validation("validation.deadline_ms must be greater than zero."));
	}
	if cfg.cache.ttl_seconds <= 0 {
		return Err(validation("cache.ttl_seconds must be greater than zero."));
	}

	validate_rate_limit(cfg)?;

	let feedback = &cfg.feedback;

	if feedback.poll_interval_ms == 0 {
		return Err(validation("feedback.poll_interval_ms must be greater than zero."));
	}
	if feedback.cache_sweep_interval_seconds <= 0 {
		return Err(validation("feedback.cache_sweep_interval_seconds must be greater than zero."));
	}
	if !feedback.default_rule_confidence.is_finite()
		|| feedback.default_rule_confidence <= 0.0
		|| feedback.default_rule_confidence > 1.0
	{
		return Err(validation("feedback.default_rule_confidence must be in the range (0.0, 1.0]."));
	}
	if feedback.use_assistant && !assistant_enabled {
		return Err(validation(
			"feedback.use_assistant requires providers.assistant to be enabled.",
		));
	}

	Ok(())
}

enum ParseOrValidate {
	Parse(toml::de::Error),
	Validate(Error),
}

fn parse(raw: &str) -> std::result::Result<Config, ParseOrValidate> {
	let mut cfg: Config = toml::from_str(raw).map_err(ParseOrValidate::Parse)?;

	normalize(&mut cfg);

	validate(&cfg).map_err(ParseOrValidate::Validate)?;

	Ok(cfg)
}

fn validate_compiler(cfg: &Config) -> Result<()> {
	let compiler = &cfg.compiler;

	if compiler.game_filter.trim().is_empty()
		|| !compiler.game_filter.chars().all(|ch| ch.is_ascii_alphanumeric())
	{
		return Err(validation("compiler.game_filter must be a non-empty alphanumeric word."));
	}
	if let Some(format) = compiler.default_format.as_deref()
		&& !format.chars().all(|ch| ch.is_ascii_alphanumeric())
	{
		return Err(validation("compiler.default_format must be an alphanumeric word."));
	}
	if compiler.max_params == 0 {
		return Err(validation("compiler.max_params must be greater than zero."));
	}
	if compiler.input.max_chars == 0 {
		return Err(validation("compiler.input.max_chars must be greater than zero."));
	}
	if compiler.input.max_repeated_chars < 2 {
		return Err(validation("compiler.input.max_repeated_chars must be at least 2."));
	}
	if !compiler.input.min_alnum_ratio.is_finite()
		|| !(0.0..=1.0).contains(&compiler.input.min_alnum_ratio)
	{
		return Err(validation("compiler.input.min_alnum_ratio must be in the range 0.0-1.0."));
	}

	let confidence = &compiler.confidence;

	for (label, weight) in [
		("floor", confidence.floor),
		("warning_penalty", confidence.warning_penalty),
		("ambiguity_penalty", confidence.ambiguity_penalty),
		("empty_intent", confidence.empty_intent),
		("broad_penalty", confidence.broad_penalty),
		("zero_results_penalty", confidence.zero_results_penalty),
	] {
		if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
			return Err(validation(format!(
				"compiler.confidence.{label} must be a finite number in the range 0.0-1.0."
			)));
		}
	}

	let budget = &compiler.budget;

	for (label, usd) in [
		("very_cheap_usd", budget.very_cheap_usd),
		("cheap_usd", budget.cheap_usd),
		("expensive_usd", budget.expensive_usd),
	] {
		if !usd.is_finite() || usd <= 0.0 {
			return Err(validation(format!(
				"compiler.budget.{label} must be a finite number greater than zero."
			)));
		}
	}

	if budget.very_cheap_usd >= budget.cheap_usd {
		return Err(validation(
			"compiler.budget.very_cheap_usd must be less than compiler.budget.cheap_usd.",
		));
	}
	if budget.cheap_usd >= budget.expensive_usd {
		return Err(validation(
			"compiler.budget.cheap_usd must be less than compiler.budget.expensive_usd.",
		));
	}

	Ok(())
}

fn validate_rate_limit(cfg: &Config) -> Result<()> {
	let limits = &cfg.rate_limit;

	if limits.window_ms <= 0 {
		return Err(validation("rate_limit.window_ms must be greater than zero."));
	}
	if limits.session_limit == 0 || limits.ip_limit == 0 || limits.global_limit == 0 {
		return Err(validation("rate_limit limits must be greater than zero."));
	}
	if limits.session_limit > limits.ip_limit {
		return Err(validation("rate_limit.session_limit must not exceed rate_limit.ip_limit."));
	}
	if limits.ip_limit > limits.global_limit {
		return Err(validation("rate_limit.ip_limit must not exceed rate_limit.global_limit."));
	}
	if limits.max_tracked_keys == 0 {
		return Err(validation("rate_limit.max_tracked_keys must be greater than zero."));
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.storage.backend = cfg.storage.backend.trim().to_ascii_lowercase();

	if cfg.security.admin_auth_token.as_deref().is_some_and(|token| token.trim().is_empty())
	{
		cfg.security.admin_auth_token = None;
	}

	cfg.compiler.default_format = cfg
		.compiler
		.default_format
		.take()
		.map(|format| format.trim().to_ascii_lowercase())
		.filter(|format| !format.is_empty());
	cfg.compiler.game_filter = cfg.compiler.game_filter.trim().to_ascii_lowercase();
}

fn validation(message: impl Into<String>) -> Error {
	Error::Validation { message: message.into() }
}
