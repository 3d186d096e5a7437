use sqlx::PgExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result, db::Db, models::FeedbackRow};

const FEEDBACK_COLUMNS: &str = "\
id,
	original_query,
	translated_query,
	issue_description,
	processing_status,
	generated_rule_id,
	last_error,
	created_at,
	processed_at,
	lease_until";

pub async fn insert_feedback<'e, E>(executor: E, row: &FeedbackRow) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO search_feedback (
	id,
	original_query,
	translated_query,
	issue_description,
	processing_status,
	generated_rule_id,
	last_error,
	created_at,
	processed_at,
	lease_until
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
	)
	.bind(row.id)
	.bind(row.original_query.as_str())
	.bind(row.translated_query.as_deref())
	.bind(row.issue_description.as_str())
	.bind(row.processing_status.as_str())
	.bind(row.generated_rule_id)
	.bind(row.last_error.as_deref())
	.bind(row.created_at)
	.bind(row.processed_at)
	.bind(row.lease_until)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn get_feedback<'e, E>(executor: E, id: Uuid) -> Result<Option<FeedbackRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!("SELECT\n\t{FEEDBACK_COLUMNS}\nFROM search_feedback\nWHERE id = $1");
	let row = sqlx::query_as::<_, FeedbackRow>(&sql).bind(id).fetch_optional(executor).await?;

	Ok(row)
}

pub async fn list_feedback<'e, E>(
	executor: E,
	status: Option<&str>,
	limit: i64,
) -> Result<Vec<FeedbackRow>>
where
	E: PgExecutor<'e>,
{
	if limit <= 0 {
		return Err(Error::InvalidArgument("List limit must be positive.".to_string()));
	}

	let sql = format!(
		"\
SELECT
	{FEEDBACK_COLUMNS}
FROM search_feedback
WHERE $1::text IS NULL OR processing_status = $1
ORDER BY created_at DESC
LIMIT $2"
	);
	let rows = sqlx::query_as::<_, FeedbackRow>(&sql)
		.bind(status)
		.bind(limit)
		.fetch_all(executor)
		.await?;

	Ok(rows)
}

/// Compare-and-set on the status column. Returns false when the row is missing or its status is
/// not one of `from`.
pub async fn transition_feedback<'e, E>(
	executor: E,
	id: Uuid,
	from: &[&str],
	to: &str,
) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let from = from.iter().map(|status| status.to_string()).collect::<Vec<_>>();
	let result = sqlx::query(
		"\
UPDATE search_feedback
SET
	processing_status = $3,
	last_error = CASE WHEN $3 = 'pending' THEN NULL ELSE last_error END,
	processed_at = CASE WHEN $3 = 'pending' THEN NULL ELSE processed_at END,
	lease_until = NULL
WHERE id = $1 AND processing_status = ANY($2)",
	)
	.bind(id)
	.bind(from)
	.bind(to)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() == 1)
}

/// Moves the oldest pending item to `processing` under a lease. Concurrent workers never claim
/// the same row.
pub async fn claim_next_pending_feedback(
	db: &Db,
	lease_until: OffsetDateTime,
) -> Result<Option<FeedbackRow>> {
	let mut tx = db.pool.begin().await?;
	let sql = format!(
		"\
SELECT
	{FEEDBACK_COLUMNS}
FROM search_feedback
WHERE processing_status = 'pending'
ORDER BY created_at ASC
LIMIT 1
FOR UPDATE SKIP LOCKED"
	);
	let row = sqlx::query_as::<_, FeedbackRow>(&sql).fetch_optional(&mut *tx).await?;
	let claimed = if let Some(mut row) = row {
		sqlx::query(
			"\
UPDATE search_feedback
SET processing_status = 'processing', lease_until = $2
WHERE id = $1",
		)
		.bind(row.id)
		.bind(lease_until)
		.execute(&mut *tx)
		.await?;

		row.processing_status = "processing".to_string();
		row.lease_until = Some(lease_until);

		Some(row)
	} else {
		None
	};

	tx.commit().await?;

	Ok(claimed)
}

/// Claims one specific pending item under a lease. Returns false unless it was `pending`.
pub async fn claim_feedback<'e, E>(
	executor: E,
	id: Uuid,
	lease_until: OffsetDateTime,
) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
UPDATE search_feedback
SET processing_status = 'processing', lease_until = $2
WHERE id = $1 AND processing_status = 'pending'",
	)
	.bind(id)
	.bind(lease_until)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() == 1)
}

/// Fails every `processing` item whose lease ran out, so it can be retriggered. Items without a
/// lease predate leases and count as expired.
pub async fn fail_expired_claims<'e, E>(
	executor: E,
	now: OffsetDateTime,
	last_error: &str,
) -> Result<Vec<Uuid>>
where
	E: PgExecutor<'e>,
{
	let ids = sqlx::query_scalar::<_, Uuid>(
		"\
UPDATE search_feedback
SET
	processing_status = 'failed',
	last_error = $2,
	processed_at = $1,
	lease_until = NULL
WHERE processing_status = 'processing' AND (lease_until IS NULL OR lease_until <= $1)
RETURNING id",
	)
	.bind(now)
	.bind(last_error)
	.fetch_all(executor)
	.await?;

	Ok(ids)
}

/// Records the outcome of a claimed item. Returns false unless the item was `processing`.
pub async fn finish_feedback<'e, E>(
	executor: E,
	id: Uuid,
	status: &str,
	generated_rule_id: Option<Uuid>,
	last_error: Option<&str>,
	now: OffsetDateTime,
) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
UPDATE search_feedback
SET
	processing_status = $2,
	generated_rule_id = $3,
	last_error = $4,
	processed_at = $5,
	lease_until = NULL
WHERE id = $1 AND processing_status = 'processing'",
	)
	.bind(id)
	.bind(status)
	.bind(generated_rule_id)
	.bind(last_error)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() == 1)
}
