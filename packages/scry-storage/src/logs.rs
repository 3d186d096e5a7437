use sqlx::PgExecutor;

use crate::{Result, models::TranslationLogRow};

pub async fn insert_translation_log<'e, E>(executor: E, row: &TranslationLogRow) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO translation_logs (
	id,
	natural_language_query,
	translated_query,
	confidence_score,
	response_time_ms,
	source,
	fallback_used,
	model_used,
	validation_issues,
	quality_flags,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
	)
	.bind(row.id)
	.bind(row.natural_language_query.as_str())
	.bind(row.translated_query.as_str())
	.bind(row.confidence_score)
	.bind(row.response_time_ms)
	.bind(row.source.as_str())
	.bind(row.fallback_used)
	.bind(row.model_used.as_deref())
	.bind(&row.validation_issues)
	.bind(&row.quality_flags)
	.bind(row.created_at)
	.execute(executor)
	.await?;

	Ok(())
}
