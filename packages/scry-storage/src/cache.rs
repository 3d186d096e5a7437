use sqlx::PgExecutor;
use time::OffsetDateTime;

use crate::{Result, models::QueryCacheRow};

const CACHE_COLUMNS: &str = "\
query_hash,
	normalized_query,
	scryfall_query,
	confidence,
	explanation,
	source,
	show_affiliate,
	hit_count,
	last_hit_at,
	created_at,
	expires_at";

/// Returns a live entry and records the hit in the same statement.
pub async fn hit_cache_entry<'e, E>(
	executor: E,
	query_hash: &str,
	now: OffsetDateTime,
) -> Result<Option<QueryCacheRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
UPDATE query_cache
SET hit_count = hit_count + 1, last_hit_at = $2
WHERE query_hash = $1 AND expires_at > $2
RETURNING
	{CACHE_COLUMNS}"
	);
	let row = sqlx::query_as::<_, QueryCacheRow>(&sql)
		.bind(query_hash)
		.bind(now)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

/// Last write wins. The hit counter of an existing entry is kept.
pub async fn upsert_cache_entry<'e, E>(executor: E, row: &QueryCacheRow) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO query_cache (
	query_hash,
	normalized_query,
	scryfall_query,
	confidence,
	explanation,
	source,
	show_affiliate,
	hit_count,
	last_hit_at,
	created_at,
	expires_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
ON CONFLICT (query_hash) DO UPDATE
SET
	normalized_query = EXCLUDED.normalized_query,
	scryfall_query = EXCLUDED.scryfall_query,
	confidence = EXCLUDED.confidence,
	explanation = EXCLUDED.explanation,
	source = EXCLUDED.source,
	show_affiliate = EXCLUDED.show_affiliate,
	created_at = EXCLUDED.created_at,
	expires_at = EXCLUDED.expires_at",
	)
	.bind(row.query_hash.as_str())
	.bind(row.normalized_query.as_str())
	.bind(row.scryfall_query.as_str())
	.bind(row.confidence)
	.bind(&row.explanation)
	.bind(row.source.as_str())
	.bind(row.show_affiliate)
	.bind(row.hit_count)
	.bind(row.last_hit_at)
	.bind(row.created_at)
	.bind(row.expires_at)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn purge_expired_cache<'e, E>(executor: E, now: OffsetDateTime) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM query_cache WHERE expires_at <= $1")
		.bind(now)
		.execute(executor)
		.await?;

	Ok(result.rows_affected())
}
