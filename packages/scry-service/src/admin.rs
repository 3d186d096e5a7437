//! Reviewer actions over the feedback queue and learned rules.

use uuid::Uuid;

use scry_domain::{feedback::FeedbackStatus, rules::TranslationRule};

use crate::{Error, Result, ScryService, store::FeedbackItem};

const LIST_LIMIT: i64 = 200;

impl ScryService {
	/// Sends a failed or skipped item back to the queue. Processing is the caller's decision.
	pub async fn retrigger_feedback(&self, id: Uuid) -> Result<FeedbackStatus> {
		let from = [FeedbackStatus::Failed, FeedbackStatus::Skipped];

		self.move_feedback(id, &from, FeedbackStatus::Pending).await
	}

	pub async fn archive_feedback(&self, id: Uuid) -> Result<FeedbackStatus> {
		let terminal: Vec<FeedbackStatus> =
			FeedbackStatus::ALL.into_iter().filter(|status| status.is_terminal()).collect();

		self.move_feedback(id, &terminal, FeedbackStatus::Archived).await
	}

	/// Idempotent. Unknown ids are not found.
	pub async fn set_rule_active(&self, id: Uuid, is_active: bool) -> Result<()> {
		if !self.stores.rules.set_active(id, is_active).await? {
			return Err(Error::NotFound { message: format!("Rule {id} does not exist.") });
		}

		tracing::info!(rule_id = %id, is_active, "Rule activation changed.");

		Ok(())
	}

	pub async fn list_feedback(&self, status: Option<&str>) -> Result<Vec<FeedbackItem>> {
		let status = match status.map(str::trim).filter(|raw| !raw.is_empty()) {
			Some(raw) => Some(FeedbackStatus::parse(raw).ok_or_else(|| Error::InvalidRequest {
				message: format!("Unknown feedback status {raw:?}."),
			})?),
			None => None,
		};

		self.stores.feedback.list_feedback(status, LIST_LIMIT).await
	}

	pub async fn list_rules(&self) -> Result<Vec<TranslationRule>> {
		self.stores.rules.list_rules(LIST_LIMIT).await
	}

	async fn move_feedback(
		&self,
		id: Uuid,
		from: &[FeedbackStatus],
		to: FeedbackStatus,
	) -> Result<FeedbackStatus> {
		let Some(item) = self.stores.feedback.get_feedback(id).await? else {
			return Err(Error::NotFound { message: format!("Feedback {id} does not exist.") });
		};

		if !self.stores.feedback.transition(id, from, to).await? {
			return Err(Error::Conflict {
				message: format!(
					"Feedback {id} cannot move from {} to {}.",
					item.processing_status.as_str(),
					to.as_str()
				),
			});
		}

		tracing::info!(feedback_id = %id, status = to.as_str(), "Feedback status changed.");

		Ok(to)
	}
}
