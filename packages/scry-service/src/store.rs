//! Persistence seams. Every store has a Postgres and an in-memory backend.

use std::{
	collections::VecDeque,
	sync::{Arc, Mutex, MutexGuard},
};

use ahash::AHashMap;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use scry_config::Config;
use scry_domain::{
	feedback::FeedbackStatus,
	result::{Explanation, TranslationSource},
	rules::TranslationRule,
};
use scry_storage::{
	cache as pg_cache,
	db::Db,
	feedback as pg_feedback, logs as pg_logs,
	models::{FeedbackRow, QueryCacheRow, TranslationLogRow, TranslationRuleRow},
	rules as pg_rules,
};

use crate::{BoxFuture, Error, Result};

/// Translation logs the in-memory backend keeps. Older logs are dropped first.
const MAX_MEMORY_LOGS: usize = 10_000;

#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
	pub query_hash: String,
	pub normalized_query: String,
	pub scryfall_query: String,
	pub confidence: f32,
	pub explanation: Explanation,
	/// Source of the translation that was stored.
	pub source: TranslationSource,
	pub show_affiliate: bool,
	pub hit_count: i64,
	pub last_hit_at: Option<OffsetDateTime>,
	pub created_at: OffsetDateTime,
	pub expires_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackItem {
	pub id: Uuid,
	pub original_query: String,
	pub translated_query: Option<String>,
	pub issue_description: String,
	pub processing_status: FeedbackStatus,
	pub generated_rule_id: Option<Uuid>,
	pub last_error: Option<String>,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339::option")]
	pub processed_at: Option<OffsetDateTime>,
	/// When the current `processing` claim is considered abandoned.
	#[serde(with = "time::serde::rfc3339::option")]
	pub lease_until: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TranslationLog {
	pub id: Uuid,
	pub natural_language_query: String,
	pub translated_query: String,
	pub confidence_score: f32,
	pub response_time_ms: u64,
	pub source: TranslationSource,
	pub fallback_used: bool,
	pub model_used: Option<String>,
	pub validation_issues: Vec<String>,
	pub quality_flags: Vec<String>,
	pub created_at: OffsetDateTime,
}

pub trait CacheStore
where
	Self: Send + Sync,
{
	/// Returns a live entry and counts the hit.
	fn hit<'a>(
		&'a self,
		query_hash: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<CacheEntry>>>;

	fn put<'a>(&'a self, entry: CacheEntry) -> BoxFuture<'a, Result<()>>;

	fn purge_expired<'a>(&'a self, now: OffsetDateTime) -> BoxFuture<'a, Result<u64>>;
}

pub trait RuleStore
where
	Self: Send + Sync,
{
	/// Active rules, highest priority first.
	fn active_rules<'a>(&'a self) -> BoxFuture<'a, Result<Vec<TranslationRule>>>;

	fn list_rules<'a>(&'a self, limit: i64) -> BoxFuture<'a, Result<Vec<TranslationRule>>>;

	fn find_by_pattern<'a>(
		&'a self,
		pattern: &'a str,
	) -> BoxFuture<'a, Result<Option<TranslationRule>>>;

	fn insert_rule<'a>(&'a self, rule: TranslationRule) -> BoxFuture<'a, Result<()>>;

	/// New syntax for an existing rule. The rule is deactivated until reviewed again.
	fn replace_syntax<'a>(
		&'a self,
		id: Uuid,
		syntax: &'a str,
		category: &'a str,
		source_feedback_id: Uuid,
	) -> BoxFuture<'a, Result<bool>>;

	/// Returns false for an unknown id.
	fn set_active<'a>(&'a self, id: Uuid, is_active: bool) -> BoxFuture<'a, Result<bool>>;
}

pub trait FeedbackStore
where
	Self: Send + Sync,
{
	fn insert_feedback<'a>(&'a self, item: FeedbackItem) -> BoxFuture<'a, Result<()>>;

	fn get_feedback<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<FeedbackItem>>>;

	fn list_feedback<'a>(
		&'a self,
		status: Option<FeedbackStatus>,
		limit: i64,
	) -> BoxFuture<'a, Result<Vec<FeedbackItem>>>;

	/// Compare-and-set. False when the item is missing or not in one of `from`.
	fn transition<'a>(
		&'a self,
		id: Uuid,
		from: &'a [FeedbackStatus],
		to: FeedbackStatus,
	) -> BoxFuture<'a, Result<bool>>;

	/// Claims the oldest pending item for exactly one caller, leased until `lease_until`.
	fn claim_next_pending<'a>(
		&'a self,
		lease_until: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<FeedbackItem>>>;

	/// Claims one pending item. False when it is missing or not pending.
	fn claim<'a>(&'a self, id: Uuid, lease_until: OffsetDateTime) -> BoxFuture<'a, Result<bool>>;

	/// Moves `processing` items whose lease has run out to `failed`. Returns their ids.
	fn fail_expired_claims<'a>(
		&'a self,
		now: OffsetDateTime,
		last_error: &'a str,
	) -> BoxFuture<'a, Result<Vec<Uuid>>>;

	/// Only a `processing` item can finish.
	fn finish<'a>(
		&'a self,
		id: Uuid,
		status: FeedbackStatus,
		generated_rule_id: Option<Uuid>,
		last_error: Option<&'a str>,
	) -> BoxFuture<'a, Result<bool>>;
}

pub trait TranslationLogSink
where
	Self: Send + Sync,
{
	fn record<'a>(&'a self, log: TranslationLog) -> BoxFuture<'a, Result<()>>;
}

#[derive(Clone)]
pub struct Stores {
	pub cache: Arc<dyn CacheStore>,
	pub rules: Arc<dyn RuleStore>,
	pub feedback: Arc<dyn FeedbackStore>,
	pub logs: Arc<dyn TranslationLogSink>,
}
impl Stores {
	pub fn memory() -> Self {
		Self::with_memory(Arc::new(MemoryStore::default()))
	}

	/// Shares one in-memory backend so callers can inspect it.
	pub fn with_memory(store: Arc<MemoryStore>) -> Self {
		Self::from_shared(store)
	}

	pub fn postgres(db: Db) -> Self {
		Self::from_shared(Arc::new(PgStore { db }))
	}

	/// Opens the backend named by `storage.backend`, bootstrapping the schema for Postgres.
	pub async fn open(cfg: &Config) -> Result<Self> {
		match (cfg.storage.backend.as_str(), cfg.storage.postgres.as_ref()) {
			("memory", _) => Ok(Self::memory()),
			("postgres", Some(postgres)) => {
				let db = Db::connect(postgres).await?;

				db.ensure_schema().await?;

				Ok(Self::postgres(db))
			},
			(backend, _) => Err(Error::InvalidRequest {
				message: format!("Storage backend {backend:?} is not usable."),
			}),
		}
	}

	fn from_shared<S>(store: Arc<S>) -> Self
	where
		S: CacheStore + RuleStore + FeedbackStore + TranslationLogSink + 'static,
	{
		Self { cache: store.clone(), rules: store.clone(), feedback: store.clone(), logs: store }
	}
}

struct PgStore {
	db: Db,
}

impl CacheStore for PgStore {
	fn hit<'a>(
		&'a self,
		query_hash: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<CacheEntry>>> {
		Box::pin(async move {
			pg_cache::hit_cache_entry(&self.db.pool, query_hash, now)
				.await?
				.map(cache_entry_from_row)
				.transpose()
		})
	}

	fn put<'a>(&'a self, entry: CacheEntry) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let row = cache_row_from_entry(&entry)?;

			pg_cache::upsert_cache_entry(&self.db.pool, &row).await?;

			Ok(())
		})
	}

	fn purge_expired<'a>(&'a self, now: OffsetDateTime) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move { Ok(pg_cache::purge_expired_cache(&self.db.pool, now).await?) })
	}
}

impl RuleStore for PgStore {
	fn active_rules<'a>(&'a self) -> BoxFuture<'a, Result<Vec<TranslationRule>>> {
		Box::pin(async move {
			let rows = pg_rules::list_active_rules(&self.db.pool).await?;

			Ok(rows.into_iter().map(rule_from_row).collect())
		})
	}

	fn list_rules<'a>(&'a self, limit: i64) -> BoxFuture<'a, Result<Vec<TranslationRule>>> {
		Box::pin(async move {
			let rows = pg_rules::list_rules(&self.db.pool, limit).await?;

			Ok(rows.into_iter().map(rule_from_row).collect())
		})
	}

	fn find_by_pattern<'a>(
		&'a self,
		pattern: &'a str,
	) -> BoxFuture<'a, Result<Option<TranslationRule>>> {
		Box::pin(async move {
			Ok(pg_rules::find_rule_by_pattern(&self.db.pool, pattern).await?.map(rule_from_row))
		})
	}

	fn insert_rule<'a>(&'a self, rule: TranslationRule) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let row = TranslationRuleRow {
				id: rule.id,
				pattern: rule.pattern,
				scryfall_syntax: rule.scryfall_syntax,
				scryfall_templates: rule.scryfall_templates,
				aliases: rule.aliases,
				confidence: rule.confidence,
				priority: rule.priority,
				category: rule.category,
				is_active: rule.is_active,
				source_feedback_id: rule.source_feedback_id,
				created_at: now,
				updated_at: now,
			};

			pg_rules::insert_rule(&self.db.pool, &row).await?;

			Ok(())
		})
	}

	fn replace_syntax<'a>(
		&'a self,
		id: Uuid,
		syntax: &'a str,
		category: &'a str,
		source_feedback_id: Uuid,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();

			Ok(pg_rules::replace_rule_syntax(
				&self.db.pool,
				id,
				syntax,
				category,
				source_feedback_id,
				now,
			)
			.await?)
		})
	}

	fn set_active<'a>(&'a self, id: Uuid, is_active: bool) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();

			Ok(pg_rules::set_rule_active(&self.db.pool, id, is_active, now).await?)
		})
	}
}

impl FeedbackStore for PgStore {
	fn insert_feedback<'a>(&'a self, item: FeedbackItem) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let row = FeedbackRow {
				id: item.id,
				original_query: item.original_query,
				translated_query: item.translated_query,
				issue_description: item.issue_description,
				processing_status: item.processing_status.as_str().to_string(),
				generated_rule_id: item.generated_rule_id,
				last_error: item.last_error,
				created_at: item.created_at,
				processed_at: item.processed_at,
				lease_until: item.lease_until,
			};

			pg_feedback::insert_feedback(&self.db.pool, &row).await?;

			Ok(())
		})
	}

	fn get_feedback<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<FeedbackItem>>> {
		Box::pin(async move {
			pg_feedback::get_feedback(&self.db.pool, id).await?.map(feedback_from_row).transpose()
		})
	}

	fn list_feedback<'a>(
		&'a self,
		status: Option<FeedbackStatus>,
		limit: i64,
	) -> BoxFuture<'a, Result<Vec<FeedbackItem>>> {
		Box::pin(async move {
			let rows = pg_feedback::list_feedback(
				&self.db.pool,
				status.map(FeedbackStatus::as_str),
				limit,
			)
			.await?;

			rows.into_iter().map(feedback_from_row).collect()
		})
	}

	fn transition<'a>(
		&'a self,
		id: Uuid,
		from: &'a [FeedbackStatus],
		to: FeedbackStatus,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let from: Vec<&str> = from
				.iter()
				.copied()
				.filter(|status| status.can_transition_to(to))
				.map(FeedbackStatus::as_str)
				.collect();

			if from.is_empty() {
				return Ok(false);
			}

			Ok(pg_feedback::transition_feedback(&self.db.pool, id, &from, to.as_str()).await?)
		})
	}

	fn claim_next_pending<'a>(
		&'a self,
		lease_until: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<FeedbackItem>>> {
		Box::pin(async move {
			pg_feedback::claim_next_pending_feedback(&self.db, lease_until)
				.await?
				.map(feedback_from_row)
				.transpose()
		})
	}

	fn claim<'a>(&'a self, id: Uuid, lease_until: OffsetDateTime) -> BoxFuture<'a, Result<bool>> {
		Box::pin(
			async move { Ok(pg_feedback::claim_feedback(&self.db.pool, id, lease_until).await?) },
		)
	}

	fn fail_expired_claims<'a>(
		&'a self,
		now: OffsetDateTime,
		last_error: &'a str,
	) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		Box::pin(async move {
			Ok(pg_feedback::fail_expired_claims(&self.db.pool, now, last_error).await?)
		})
	}

	fn finish<'a>(
		&'a self,
		id: Uuid,
		status: FeedbackStatus,
		generated_rule_id: Option<Uuid>,
		last_error: Option<&'a str>,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			if !FeedbackStatus::Processing.can_transition_to(status) {
				return Ok(false);
			}

			let now = OffsetDateTime::now_utc();

			Ok(pg_feedback::finish_feedback(
				&self.db.pool,
				id,
				status.as_str(),
				generated_rule_id,
				last_error,
				now,
			)
			.await?)
		})
	}
}

impl TranslationLogSink for PgStore {
	fn record<'a>(&'a self, log: TranslationLog) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let row = TranslationLogRow {
				id: log.id,
				natural_language_query: log.natural_language_query,
				translated_query: log.translated_query,
				confidence_score: log.confidence_score,
				response_time_ms: i32::try_from(log.response_time_ms).unwrap_or(i32::MAX),
				source: log.source.as_str().to_string(),
				fallback_used: log.fallback_used,
				model_used: log.model_used,
				validation_issues: log.validation_issues,
				quality_flags: log.quality_flags,
				created_at: log.created_at,
			};

			pg_logs::insert_translation_log(&self.db.pool, &row).await?;

			Ok(())
		})
	}
}

/// Process-local backend. Each collection sits behind its own mutex and no lock is held across
/// an await point.
#[derive(Default)]
pub struct MemoryStore {
	cache: Mutex<AHashMap<String, CacheEntry>>,
	rules: Mutex<AHashMap<Uuid, TranslationRule>>,
	feedback: Mutex<AHashMap<Uuid, FeedbackItem>>,
	logs: Mutex<VecDeque<TranslationLog>>,
}
impl MemoryStore {
	pub fn log_count(&self) -> usize {
		lock(&self.logs).len()
	}

	/// Reads a cache entry without counting a hit.
	pub fn cached_entry(&self, query_hash: &str) -> Option<CacheEntry> {
		lock(&self.cache).get(query_hash).cloned()
	}

	fn sorted_rules(&self, active_only: bool) -> Vec<TranslationRule> {
		let mut rules: Vec<TranslationRule> = lock(&self.rules)
			.values()
			.filter(|rule| !active_only || rule.is_active)
			.cloned()
			.collect();

		rules.sort_by(|a, b| {
			b.priority.cmp(&a.priority).then(b.confidence.total_cmp(&a.confidence))
		});

		rules
	}
}

impl CacheStore for MemoryStore {
	fn hit<'a>(
		&'a self,
		query_hash: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<CacheEntry>>> {
		let mut cache = lock(&self.cache);
		let entry = cache.get_mut(query_hash).filter(|entry| entry.expires_at > now).map(|entry| {
			entry.hit_count += 1;
			entry.last_hit_at = Some(now);

			entry.clone()
		});

		Box::pin(async move { Ok(entry) })
	}

	fn put<'a>(&'a self, entry: CacheEntry) -> BoxFuture<'a, Result<()>> {
		let mut cache = lock(&self.cache);
		let hit_count = cache.get(&entry.query_hash).map(|existing| existing.hit_count);
		let mut entry = entry;

		if let Some(hit_count) = hit_count {
			entry.hit_count = hit_count;
		}

		cache.insert(entry.query_hash.clone(), entry);

		Box::pin(async move { Ok(()) })
	}

	fn purge_expired<'a>(&'a self, now: OffsetDateTime) -> BoxFuture<'a, Result<u64>> {
		let mut cache = lock(&self.cache);
		let before = cache.len();

		cache.retain(|_, entry| entry.expires_at > now);

		let purged = (before - cache.len()) as u64;

		Box::pin(async move { Ok(purged) })
	}
}

impl RuleStore for MemoryStore {
	fn active_rules<'a>(&'a self) -> BoxFuture<'a, Result<Vec<TranslationRule>>> {
		let rules = self.sorted_rules(true);

		Box::pin(async move { Ok(rules) })
	}

	fn list_rules<'a>(&'a self, limit: i64) -> BoxFuture<'a, Result<Vec<TranslationRule>>> {
		let result = if limit <= 0 {
			Err(Error::InvalidRequest { message: "List limit must be positive.".to_string() })
		} else {
			let mut rules = self.sorted_rules(false);

			rules.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

			Ok(rules)
		};

		Box::pin(async move { result })
	}

	fn find_by_pattern<'a>(
		&'a self,
		pattern: &'a str,
	) -> BoxFuture<'a, Result<Option<TranslationRule>>> {
		let rule = lock(&self.rules).values().find(|rule| rule.pattern == pattern).cloned();

		Box::pin(async move { Ok(rule) })
	}

	fn insert_rule<'a>(&'a self, rule: TranslationRule) -> BoxFuture<'a, Result<()>> {
		let mut rules = lock(&self.rules);
		let result = if rules.values().any(|existing| existing.pattern == rule.pattern) {
			Err(Error::Conflict { message: format!("A rule for {:?} exists.", rule.pattern) })
		} else {
			rules.insert(rule.id, rule);

			Ok(())
		};

		Box::pin(async move { result })
	}

	fn replace_syntax<'a>(
		&'a self,
		id: Uuid,
		syntax: &'a str,
		category: &'a str,
		source_feedback_id: Uuid,
	) -> BoxFuture<'a, Result<bool>> {
		let mut rules = lock(&self.rules);
		let updated = match rules.get_mut(&id) {
			Some(rule) => {
				rule.scryfall_syntax = syntax.to_string();
				rule.scryfall_templates.clear();
				rule.category = category.to_string();
				rule.source_feedback_id = Some(source_feedback_id);
				rule.is_active = false;

				true
			},
			None => false,
		};

		Box::pin(async move { Ok(updated) })
	}

	fn set_active<'a>(&'a self, id: Uuid, is_active: bool) -> BoxFuture<'a, Result<bool>> {
		let updated = match lock(&self.rules).get_mut(&id) {
			Some(rule) => {
				rule.is_active = is_active;

				true
			},
			None => false,
		};

		Box::pin(async move { Ok(updated) })
	}
}

impl FeedbackStore for MemoryStore {
	fn insert_feedback<'a>(&'a self, item: FeedbackItem) -> BoxFuture<'a, Result<()>> {
		lock(&self.feedback).insert(item.id, item);

		Box::pin(async move { Ok(()) })
	}

	fn get_feedback<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<FeedbackItem>>> {
		let item = lock(&self.feedback).get(&id).cloned();

		Box::pin(async move { Ok(item) })
	}

	fn list_feedback<'a>(
		&'a self,
		status: Option<FeedbackStatus>,
		limit: i64,
	) -> BoxFuture<'a, Result<Vec<FeedbackItem>>> {
		let result = if limit <= 0 {
			Err(Error::InvalidRequest { message: "List limit must be positive.".to_string() })
		} else {
			let mut items: Vec<FeedbackItem> = lock(&self.feedback)
				.values()
				.filter(|item| status.is_none_or(|status| item.processing_status == status))
				.cloned()
				.collect();

			items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
			items.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

			Ok(items)
		};

		Box::pin(async move { result })
	}

	fn transition<'a>(
		&'a self,
		id: Uuid,
		from: &'a [FeedbackStatus],
		to: FeedbackStatus,
	) -> BoxFuture<'a, Result<bool>> {
		let mut feedback = lock(&self.feedback);
		let changed = match feedback.get_mut(&id) {
			Some(item)
				if from.contains(&item.processing_status)
					&& item.processing_status.can_transition_to(to) =>
			{
				item.processing_status = to;
				item.lease_until = None;

				if to == FeedbackStatus::Pending {
					item.last_error = None;
					item.processed_at = None;
				}

				true
			},
			_ => false,
		};

		Box::pin(async move { Ok(changed) })
	}

	fn claim_next_pending<'a>(
		&'a self,
		lease_until: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<FeedbackItem>>> {
		let mut feedback = lock(&self.feedback);
		let claimed = feedback
			.values_mut()
			.filter(|item| item.processing_status == FeedbackStatus::Pending)
			.min_by_key(|item| item.created_at)
			.map(|item| {
				item.processing_status = FeedbackStatus::Processing;
				item.lease_until = Some(lease_until);

				item.clone()
			});

		Box::pin(async move { Ok(claimed) })
	}

	fn claim<'a>(&'a self, id: Uuid, lease_until: OffsetDateTime) -> BoxFuture<'a, Result<bool>> {
		let mut feedback = lock(&self.feedback);
		let claimed = match feedback.get_mut(&id) {
			Some(item) if item.processing_status == FeedbackStatus::Pending => {
				item.processing_status = FeedbackStatus::Processing;
				item.lease_until = Some(lease_until);

				true
			},
			_ => false,
		};

		Box::pin(async move { Ok(claimed) })
	}

	fn fail_expired_claims<'a>(
		&'a self,
		now: OffsetDateTime,
		last_error: &'a str,
	) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		let mut feedback = lock(&self.feedback);
		let mut expired = Vec::new();

		for item in feedback.values_mut() {
			if item.processing_status == FeedbackStatus::Processing
				&& item.lease_until.is_none_or(|lease_until| lease_until <= now)
			{
				item.processing_status = FeedbackStatus::Failed;
				item.last_error = Some(last_error.to_string());
				item.processed_at = Some(now);
				item.lease_until = None;

				expired.push(item.id);
			}
		}

		Box::pin(async move { Ok(expired) })
	}

	fn finish<'a>(
		&'a self,
		id: Uuid,
		status: FeedbackStatus,
		generated_rule_id: Option<Uuid>,
		last_error: Option<&'a str>,
	) -> BoxFuture<'a, Result<bool>> {
		let mut feedback = lock(&self.feedback);
		let finished = match feedback.get_mut(&id) {
			Some(item)
				if item.processing_status == FeedbackStatus::Processing
					&& FeedbackStatus::Processing.can_transition_to(status) =>
			{
				item.processing_status = status;
				item.generated_rule_id = generated_rule_id;
				item.last_error = last_error.map(str::to_string);
				item.processed_at = Some(OffsetDateTime::now_utc());
				item.lease_until = None;

				true
			},
			_ => false,
		};

		Box::pin(async move { Ok(finished) })
	}
}

impl TranslationLogSink for MemoryStore {
	fn record<'a>(&'a self, log: TranslationLog) -> BoxFuture<'a, Result<()>> {
		let mut logs = lock(&self.logs);

		if logs.len() >= MAX_MEMORY_LOGS {
			logs.pop_front();
		}

		logs.push_back(log);

		Box::pin(async move { Ok(()) })
	}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}

fn cache_entry_from_row(row: QueryCacheRow) -> Result<CacheEntry> {
	let explanation: Explanation = serde_json::from_value(row.explanation).map_err(|err| {
		Error::Storage { message: format!("Invalid cached explanation: {err}") }
	})?;
	let source = TranslationSource::parse(&row.source).ok_or_else(|| Error::Storage {
		message: format!("Invalid cached source {:?}.", row.source),
	})?;

	Ok(CacheEntry {
		query_hash: row.query_hash,
		normalized_query: row.normalized_query,
		scryfall_query: row.scryfall_query,
		confidence: row.confidence,
		explanation,
		source,
		show_affiliate: row.show_affiliate,
		hit_count: row.hit_count,
		last_hit_at: row.last_hit_at,
		created_at: row.created_at,
		expires_at: row.expires_at,
	})
}

fn cache_row_from_entry(entry: &CacheEntry) -> Result<QueryCacheRow> {
	let explanation = serde_json::to_value(&entry.explanation).map_err(|err| Error::Storage {
		message: format!("Failed to encode explanation: {err}"),
	})?;

	Ok(QueryCacheRow {
		query_hash: entry.query_hash.clone(),
		normalized_query: entry.normalized_query.clone(),
		scryfall_query: entry.scryfall_query.clone(),
		confidence: entry.confidence,
		explanation,
		source: entry.source.as_str().to_string(),
		show_affiliate: entry.show_affiliate,
		hit_count: entry.hit_count,
		last_hit_at: entry.last_hit_at,
		created_at: entry.created_at,
		expires_at: entry.expires_at,
	})
}

fn rule_from_row(row: TranslationRuleRow) -> TranslationRule {
	TranslationRule {
		id: row.id,
		pattern: row.pattern,
		scryfall_syntax: row.scryfall_syntax,
		scryfall_templates: row.scryfall_templates,
		aliases: row.aliases,
		confidence: row.confidence,
		priority: row.priority,
		is_active: row.is_active,
		category: row.category,
		source_feedback_id: row.source_feedback_id,
	}
}

fn feedback_from_row(row: FeedbackRow) -> Result<FeedbackItem> {
	let status = FeedbackStatus::parse(&row.processing_status).ok_or_else(|| Error::Storage {
		message: format!("Unknown feedback status {:?}.", row.processing_status),
	})?;

	Ok(FeedbackItem {
		id: row.id,
		original_query: row.original_query,
		translated_query: row.translated_query,
		issue_description: row.issue_description,
		processing_status: status,
		generated_rule_id: row.generated_rule_id,
		last_error: row.last_error,
		created_at: row.created_at,
		processed_at: row.processed_at,
		lease_until: row.lease_until,
	})
}
