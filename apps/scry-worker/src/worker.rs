use std::time::Duration as StdDuration;

use time::{Duration, OffsetDateTime};
use tokio::time as tokio_time;

use scry_service::{FeedbackOutcome, ScryService};

use crate::{Error, Result};

const MAX_ITEMS_PER_TICK: usize = 32;

pub struct WorkerState {
	pub service: ScryService,
	pub poll_interval: StdDuration,
	pub sweep_interval: Duration,
}
impl WorkerState {
	pub fn new(service: ScryService) -> Result<Self> {
		let poll_interval = StdDuration::from_millis(service.cfg.feedback.poll_interval_ms);
		let sweep_interval = Duration::seconds(service.cfg.feedback.cache_sweep_interval_seconds);

		if poll_interval.is_zero() || !sweep_interval.is_positive() {
			return Err(Error::Validation(
				"Worker intervals must be greater than zero.".to_string(),
			));
		}

		Ok(Self { service, poll_interval, sweep_interval })
	}
}

pub async fn run_worker(state: WorkerState) -> Result<()> {
	let mut last_sweep = OffsetDateTime::now_utc();

	tracing::info!(
		poll_interval_ms = state.poll_interval.as_millis() as u64,
		"Feedback worker started."
	);

	loop {
		if let Err(err) = reclaim_expired_once(&state.service, OffsetDateTime::now_utc()).await {
			tracing::error!(error = %err, "Expired claim reclaim failed.");
		}
		if let Err(err) = process_feedback_once(&state.service).await {
			tracing::error!(error = %err, "Feedback processing failed.");
		}

		let now = OffsetDateTime::now_utc();

		if now - last_sweep >= state.sweep_interval {
			match sweep_cache_once(&state.service, now).await {
				Ok(_) => last_sweep = now,
				Err(err) => tracing::error!(error = %err, "Cache sweep failed."),
			}
		}

		tokio_time::sleep(state.poll_interval).await;
	}
}

/// Drains pending feedback, at most a bounded batch per call.
pub async fn process_feedback_once(service: &ScryService) -> Result<Vec<FeedbackOutcome>> {
	let mut outcomes = Vec::new();

	while outcomes.len() < MAX_ITEMS_PER_TICK {
		match service.process_next_feedback().await? {
			Some(outcome) => outcomes.push(outcome),
			None => break,
		}
	}

	if !outcomes.is_empty() {
		tracing::info!(processed = outcomes.len(), "Feedback batch processed.");
	}

	Ok(outcomes)
}

/// Fails claims abandoned past their lease, for example by a worker that crashed mid-item.
pub async fn reclaim_expired_once(service: &ScryService, now: OffsetDateTime) -> Result<usize> {
	let expired = service.reclaim_expired_feedback(now).await?;

	if !expired.is_empty() {
		tracing::info!(reclaimed = expired.len(), "Expired feedback claims failed.");
	}

	Ok(expired.len())
}

pub async fn sweep_cache_once(service: &ScryService, now: OffsetDateTime) -> Result<u64> {
	let removed = service.cache.sweep_expired(now).await?;

	if removed > 0 {
		tracing::info!(removed, "Expired cache entries swept.");
	}

	Ok(removed)
}
