pub mod admin;
pub mod cache;
pub mod feedback;
pub mod live;
pub mod rate_limit;
pub mod store;
pub mod translate;

mod error;

pub use error::{Error, Result};
pub use feedback::{FeedbackOutcome, FeedbackReceipt, FeedbackRequest};
pub use translate::{RequestContext, TranslateRequest};

use std::{future::Future, pin::Pin, sync::Arc};

use scry_config::{AssistantProviderConfig, Config};
use scry_domain::{
	compiler::CompileOptions,
	rules::{AliasRuleMatcher, RuleMatcher},
};
use scry_providers::{
	assistant::{self, AssistantRequest, AssistantSuggestion},
	search::{SearchClient, SearchProbe},
};

use crate::{cache::QueryCache, rate_limit::RateLimiter, store::Stores};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const MAX_ERROR_CHARS: usize = 512;

/// Dry-run access to the card search service.
pub trait SearchValidator
where
	Self: Send + Sync,
{
	fn probe<'a>(
		&'a self,
		query: &'a str,
		overly_broad_threshold: u64,
	) -> BoxFuture<'a, SearchProbe>;
}

pub trait AssistantProvider
where
	Self: Send + Sync,
{
	fn suggest<'a>(
		&'a self,
		cfg: &'a AssistantProviderConfig,
		request: &'a AssistantRequest<'a>,
	) -> BoxFuture<'a, scry_providers::Result<AssistantSuggestion>>;
}

#[derive(Clone)]
pub struct Providers {
	pub search: Arc<dyn SearchValidator>,
	pub assistant: Arc<dyn AssistantProvider>,
}
impl Providers {
	pub fn new(search: Arc<dyn SearchValidator>, assistant: Arc<dyn AssistantProvider>) -> Self {
		Self { search, assistant }
	}

	pub fn from_config(cfg: &Config) -> Result<Self> {
		let search = SearchClient::new(&cfg.providers.search)?;

		Ok(Self { search: Arc::new(search), assistant: Arc::new(DefaultAssistant) })
	}
}

pub struct ScryService {
	pub cfg: Config,
	pub stores: Stores,
	pub providers: Providers,
	pub cache: QueryCache,
	pub limiter: RateLimiter,
	pub matcher: Arc<dyn RuleMatcher>,
	pub(crate) opts: CompileOptions,
}
impl ScryService {
	pub fn new(cfg: Config, stores: Stores) -> Result<Self> {
		let providers = Providers::from_config(&cfg)?;

		Ok(Self::with_providers(cfg, stores, providers))
	}

	pub fn with_providers(cfg: Config, stores: Stores, providers: Providers) -> Self {
		let cache = QueryCache::new(stores.cache.clone(), cfg.cache.ttl_seconds);
		let limiter = RateLimiter::from_config(&cfg.rate_limit);
		let opts = CompileOptions::from_config(&cfg);

		Self {
			cfg,
			stores,
			providers,
			cache,
			limiter,
			matcher: Arc::new(AliasRuleMatcher::default()),
			opts,
		}
	}

	pub fn compile_options(&self) -> &CompileOptions {
		&self.opts
	}

	/// The assistant config, when one is present and enabled.
	pub(crate) fn assistant_config(&self) -> Option<&AssistantProviderConfig> {
		self.cfg.providers.assistant.as_ref().filter(|assistant| assistant.enabled)
	}
}

struct DefaultAssistant;
impl AssistantProvider for DefaultAssistant {
	fn suggest<'a>(
		&'a self,
		cfg: &'a AssistantProviderConfig,
		request: &'a AssistantRequest<'a>,
	) -> BoxFuture<'a, scry_providers::Result<AssistantSuggestion>> {
		Box::pin(assistant::suggest_query(cfg, request))
	}
}

impl SearchValidator for SearchClient {
	fn probe<'a>(
		&'a self,
		query: &'a str,
		overly_broad_threshold: u64,
	) -> BoxFuture<'a, SearchProbe> {
		Box::pin(SearchClient::probe(self, query, overly_broad_threshold))
	}
}

/// Strips bearer tokens, `key=value` secrets, connection strings and filesystem paths from a
/// message before it is stored or shown.
pub fn sanitize_error_message(text: &str) -> String {
	let mut parts = Vec::new();
	let mut redact_next = false;

	for raw in text.split_whitespace() {
		let mut word = raw.to_string();

		if redact_next {
			word = "[REDACTED]".to_string();
			redact_next = false;
		}
		if raw.eq_ignore_ascii_case("bearer") {
			redact_next = true;
		}

		let lowered = raw.to_ascii_lowercase();

		if lowered.contains("://") && lowered.contains('@') {
			word = "[REDACTED_DSN]".to_string();
		} else if looks_like_path(raw) {
			word = "[PATH]".to_string();
		} else {
			for key in ["api_key", "apikey", "password", "secret", "token"] {
				if lowered.contains(key) && (lowered.contains('=') || lowered.contains(':')) {
					let sep = if raw.contains('=') { '=' } else { ':' };
					let prefix = raw.split(sep).next().unwrap_or(raw);

					word = format!("{prefix}{sep}[REDACTED]");

					break;
				}
			}
		}

		parts.push(word);
	}

	let mut out = parts.join(" ");

	if out.chars().count() > MAX_ERROR_CHARS {
		out = out.chars().take(MAX_ERROR_CHARS).collect();
		out.push_str("...");
	}

	out
}

fn looks_like_path(word: &str) -> bool {
	let trimmed = word.trim_matches(|c: char| matches!(c, '"' | '\'' | '(' | ')' | ',' | ':'));

	(trimmed.starts_with('/') && trimmed[1..].contains('/'))
		|| (trimmed.len() > 3
			&& trimmed.as_bytes()[1] == b':'
			&& matches!(trimmed.as_bytes()[2], b'\\' | b'/'))
}
