use sqlx::PgExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result, models::TranslationRuleRow};

const RULE_SELECT: &str = "\
SELECT
	id,
	pattern,
	scryfall_syntax,
	scryfall_templates,
	aliases,
	confidence,
	priority,
	category,
	is_active,
	source_feedback_id,
	created_at,
	updated_at
FROM translation_rules";

pub async fn list_active_rules<'e, E>(executor: E) -> Result<Vec<TranslationRuleRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!("{RULE_SELECT}\nWHERE is_active\nORDER BY priority DESC, confidence DESC");
	let rows = sqlx::query_as::<_, TranslationRuleRow>(&sql).fetch_all(executor).await?;

	Ok(rows)
}

pub async fn list_rules<'e, E>(executor: E, limit: i64) -> Result<Vec<TranslationRuleRow>>
where
	E: PgExecutor<'e>,
{
	if limit <= 0 {
		return Err(Error::InvalidArgument("List limit must be positive.".to_string()));
	}

	let sql = format!("{RULE_SELECT}\nORDER BY updated_at DESC\nLIMIT $1");
	let rows = sqlx::query_as::<_, TranslationRuleRow>(&sql).bind(limit).fetch_all(executor).await?;

	Ok(rows)
}

pub async fn find_rule_by_pattern<'e, E>(
	executor: E,
	pattern: &str,
) -> Result<Option<TranslationRuleRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!("{RULE_SELECT}\nWHERE pattern = $1");
	let row = sqlx::query_as::<_, TranslationRuleRow>(&sql)
		.bind(pattern)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

pub async fn insert_rule<'e, E>(executor: E, rule: &TranslationRuleRow) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO translation_rules (
	id,
	pattern,
	scryfall_syntax,
	scryfall_templates,
	aliases,
	confidence,
	priority,
	category,
	is_active,
	source_feedback_id,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
	)
	.bind(rule.id)
	.bind(rule.pattern.as_str())
	.bind(rule.scryfall_syntax.as_str())
	.bind(&rule.scryfall_templates)
	.bind(&rule.aliases)
	.bind(rule.confidence)
	.bind(rule.priority)
	.bind(rule.category.as_str())
	.bind(rule.is_active)
	.bind(rule.source_feedback_id)
	.bind(rule.created_at)
	.bind(rule.updated_at)
	.execute(executor)
	.await?;

	Ok(())
}

/// Replaces the syntax of an existing rule and sends it back to review.
pub async fn replace_rule_syntax<'e, E>(
	executor: E,
	id: Uuid,
	scryfall_syntax: &str,
	category: &str,
	source_feedback_id: Uuid,
	now: OffsetDateTime,
) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
UPDATE translation_rules
SET
	scryfall_syntax = $2,
	scryfall_templates = '{}',
	category = $3,
	source_feedback_id = $4,
	is_active = false,
	updated_at = $5
WHERE id = $1",
	)
	.bind(id)
	.bind(scryfall_syntax)
	.bind(category)
	.bind(source_feedback_id)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() == 1)
}

/// Returns false when no rule has the id. Setting the current value again succeeds.
pub async fn set_rule_active<'e, E>(
	executor: E,
	id: Uuid,
	is_active: bool,
	now: OffsetDateTime,
) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"UPDATE translation_rules SET is_active = $2, updated_at = $3 WHERE id = $1",
	)
	.bind(id)
	.bind(is_active)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() == 1)
}
