use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct QueryCacheRow {
	pub query_hash: String,
	pub normalized_query: String,
	pub scryfall_query: String,
	pub confidence: f32,
	pub explanation: Value,
	pub source: String,
	pub show_affiliate: bool,
	pub hit_count: i64,
	pub last_hit_at: Option<OffsetDateTime>,
	pub created_at: OffsetDateTime,
	pub expires_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct TranslationRuleRow {
	pub id: Uuid,
	pub pattern: String,
	pub scryfall_syntax: String,
	pub scryfall_templates: Vec<String>,
	pub aliases: Vec<String>,
	pub confidence: f32,
	pub priority: i32,
	pub category: String,
	pub is_active: bool,
	pub source_feedback_id: Option<Uuid>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct FeedbackRow {
	pub id: Uuid,
	pub original_query: String,
	pub translated_query: Option<String>,
	pub issue_description: String,
	pub processing_status: String,
	pub generated_rule_id: Option<Uuid>,
	pub last_error: Option<String>,
	pub created_at: OffsetDateTime,
	pub processed_at: Option<OffsetDateTime>,
	/// Set while the item is `processing`. A claim past its lease is abandoned.
	pub lease_until: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct TranslationLogRow {
	pub id: Uuid,
	pub natural_language_query: String,
	pub translated_query: String,
	pub confidence_score: f32,
	pub response_time_ms: i32,
	pub source: String,
	pub fallback_used: bool,
	pub model_used: Option<String>,
	pub validation_issues: Vec<String>,
	pub quality_flags: Vec<String>,
	pub created_at: OffsetDateTime,
}
