use std::sync::Arc;

use serde_json::Value;
use time::{Duration, OffsetDateTime};

use scry_domain::{
	filters::NormalizedFilters,
	result::{TranslationResult, TranslationSource},
	syntax,
};

use crate::{
	Error, Result,
	store::{CacheEntry, CacheStore},
};

const TRANSLATION_CACHE_SCHEMA_VERSION: i32 = 1;

/// Translation cache over an injected store. Entries live for a fixed TTL.
pub struct QueryCache {
	store: Arc<dyn CacheStore>,
	ttl: Duration,
}
impl QueryCache {
	pub fn new(store: Arc<dyn CacheStore>, ttl_seconds: i64) -> Self {
		Self { store, ttl: Duration::seconds(ttl_seconds) }
	}

	/// A live entry as a `cache` result. The hit is counted.
	pub async fn get(&self, key: &str, original_query: &str) -> Result<Option<TranslationResult>> {
		let now = OffsetDateTime::now_utc();
		let Some(entry) = self.store.hit(key, now).await? else {
			return Ok(None);
		};

		Ok(Some(TranslationResult {
			original_query: original_query.to_string(),
			scryfall_query: entry.scryfall_query,
			explanation: entry.explanation,
			success: true,
			source: TranslationSource::Cache,
			validation: None,
			response_time_ms: None,
		}))
	}

	/// Stores a result unless its source is not worth remembering. Returns whether it was written.
	pub async fn set(
		&self,
		key: &str,
		normalized_query: &str,
		result: &TranslationResult,
	) -> Result<bool> {
		if !result.source.is_cacheable() {
			return Ok(false);
		}

		let now = OffsetDateTime::now_utc();
		let entry = CacheEntry {
			query_hash: key.to_string(),
			normalized_query: normalized_query.to_string(),
			scryfall_query: result.scryfall_query.clone(),
			confidence: result.explanation.confidence,
			explanation: result.explanation.clone(),
			source: result.source,
			show_affiliate: has_price_filter(&result.scryfall_query),
			hit_count: 0,
			last_hit_at: None,
			created_at: now,
			expires_at: now + self.ttl,
		};

		self.store.put(entry).await?;

		Ok(true)
	}

	pub async fn sweep_expired(&self, now: OffsetDateTime) -> Result<u64> {
		self.store.purge_expired(now).await
	}
}

pub fn hash_cache_key(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload).map_err(|err| Error::Storage {
		message: format!("Failed to encode cache key payload: {err}"),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

pub fn cache_key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}

/// Key over the normalized text and the structured filters that shaped the result.
pub fn build_translation_cache_key(
	normalized_query: &str,
	filters: &NormalizedFilters,
) -> Result<String> {
	let filters = serde_json::to_value(filters).map_err(|err| Error::Storage {
		message: format!("Failed to encode filters for cache key: {err}"),
	})?;
	let payload = serde_json::json!({
		"kind": "translation",
		"schema_version": TRANSLATION_CACHE_SCHEMA_VERSION,
		"query": normalized_query.trim(),
		"filters": filters,
	});

	hash_cache_key(&payload)
}

fn has_price_filter(query: &str) -> bool {
	query.split_whitespace().any(|term| {
		syntax::term_key(term.trim_start_matches(['-', '(']))
			.is_some_and(|key| matches!(key, "usd" | "eur" | "tix"))
	})
}
