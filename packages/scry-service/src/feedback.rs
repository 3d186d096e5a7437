//! Feedback intake and rule synthesis.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use scry_domain::{
	feedback::{self, FeedbackStatus, RuleDecision},
	intent,
	rules::TranslationRule,
	syntax,
};
use scry_providers::assistant::AssistantRequest;

use crate::{Error, Result, ScryService, sanitize_error_message, store::FeedbackItem};

const MAX_ISSUE_CHARS: usize = 2_000;
/// How long a claim may stay `processing` before it counts as abandoned.
const CLAIM_LEASE_SECONDS: i64 = 300;
const LEASE_EXPIRED_MESSAGE: &str = "Processing did not finish before its claim lease expired.";

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
	pub original_query: String,
	#[serde(default)]
	pub translated_query: Option<String>,
	pub issue_description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeedbackReceipt {
	pub id: Uuid,
	pub status: FeedbackStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackOutcome {
	pub id: Uuid,
	pub status: FeedbackStatus,
	pub generated_rule_id: Option<Uuid>,
	/// Why the item was skipped or failed.
	pub reason: Option<String>,
}

struct Synthesis {
	status: FeedbackStatus,
	rule_id: Option<Uuid>,
	reason: Option<String>,
}
impl Synthesis {
	fn skipped(reason: impl Into<String>) -> Self {
		Self { status: FeedbackStatus::Skipped, rule_id: None, reason: Some(reason.into()) }
	}

	fn linked(status: FeedbackStatus, rule_id: Uuid) -> Self {
		Self { status, rule_id: Some(rule_id), reason: None }
	}
}

impl ScryService {
	pub async fn submit_feedback(&self, req: FeedbackRequest) -> Result<FeedbackReceipt> {
		let original_query = req.original_query.trim();
		let issue_description = req.issue_description.trim();

		if original_query.is_empty() {
			return Err(Error::InvalidRequest { message: "originalQuery is required.".to_string() });
		}
		if original_query.chars().count() > self.opts.limits.max_chars {
			return Err(Error::InvalidRequest {
				message: format!(
					"originalQuery must be at most {} characters.",
					self.opts.limits.max_chars
				),
			});
		}
		if issue_description.is_empty() {
			return Err(Error::InvalidRequest {
				message: "issueDescription is required.".to_string(),
			});
		}
		if issue_description.chars().count() > MAX_ISSUE_CHARS {
			return Err(Error::InvalidRequest {
				message: format!("issueDescription must be at most {MAX_ISSUE_CHARS} characters."),
			});
		}

		let item = FeedbackItem {
			id: Uuid::new_v4(),
			original_query: original_query.to_string(),
			translated_query: req
				.translated_query
				.map(|query| query.trim().to_string())
				.filter(|query| !query.is_empty()),
			issue_description: issue_description.to_string(),
			processing_status: FeedbackStatus::Pending,
			generated_rule_id: None,
			last_error: None,
			created_at: OffsetDateTime::now_utc(),
			processed_at: None,
			lease_until: None,
		};
		let id = item.id;

		self.stores.feedback.insert_feedback(item).await?;

		tracing::info!(feedback_id = %id, "Feedback queued.");

		Ok(FeedbackReceipt { id, status: FeedbackStatus::Pending })
	}

	/// Claims and processes the oldest pending item. `None` when the queue is empty.
	pub async fn process_next_feedback(&self) -> Result<Option<FeedbackOutcome>> {
		let lease_until = OffsetDateTime::now_utc() + Duration::seconds(CLAIM_LEASE_SECONDS);
		let Some(item) = self.stores.feedback.claim_next_pending(lease_until).await? else {
			return Ok(None);
		};

		Ok(Some(self.run_claimed(item).await?))
	}

	/// Processes one item. It must be pending; the claim is exclusive.
	pub async fn process_feedback(&self, id: Uuid) -> Result<FeedbackOutcome> {
		let Some(mut item) = self.stores.feedback.get_feedback(id).await? else {
			return Err(Error::NotFound { message: format!("Feedback {id} does not exist.") });
		};

		let lease_until = OffsetDateTime::now_utc() + Duration::seconds(CLAIM_LEASE_SECONDS);

		if !self.stores.feedback.claim(id, lease_until).await? {
			return Err(Error::Conflict {
				message: format!("Feedback {id} is not pending."),
			});
		}

		item.processing_status = FeedbackStatus::Processing;
		item.lease_until = Some(lease_until);

		self.run_claimed(item).await
	}

	/// Fails claims whose lease ran out so an admin can retrigger them.
	pub async fn reclaim_expired_feedback(&self, now: OffsetDateTime) -> Result<Vec<Uuid>> {
		let expired = self.stores.feedback.fail_expired_claims(now, LEASE_EXPIRED_MESSAGE).await?;

		for id in &expired {
			tracing::warn!(feedback_id = %id, "Feedback claim lease expired.");
		}

		Ok(expired)
	}

	async fn run_claimed(&self, item: FeedbackItem) -> Result<FeedbackOutcome> {
		let synthesis = match self.synthesize(&item).await {
			Ok(synthesis) => synthesis,
			Err(err) => {
				tracing::error!(feedback_id = %item.id, error = %err, "Rule synthesis failed.");

				Synthesis {
					status: FeedbackStatus::Failed,
					rule_id: None,
					reason: Some(sanitize_error_message(&err.to_string())),
				}
			},
		};
		let finished = self
			.stores
			.feedback
			.finish(item.id, synthesis.status, synthesis.rule_id, synthesis.reason.as_deref())
			.await?;

		if !finished {
			return Err(Error::Conflict {
				message: format!("Feedback {} was no longer processing.", item.id),
			});
		}

		tracing::info!(
			feedback_id = %item.id,
			status = synthesis.status.as_str(),
			rule_id = ?synthesis.rule_id,
			"Feedback processed."
		);

		Ok(FeedbackOutcome {
			id: item.id,
			status: synthesis.status,
			generated_rule_id: synthesis.rule_id,
			reason: synthesis.reason,
		})
	}

	async fn synthesize(&self, item: &FeedbackItem) -> Result<Synthesis> {
		if let Err(rejection) = syntax::check_input(&item.original_query, &self.opts.limits) {
			return Ok(Synthesis::skipped(rejection.message()));
		}

		let pattern = intent::normalize_query(&item.original_query);
		let candidate = match feedback::suggested_syntax(&item.issue_description) {
			Some(candidate) => candidate,
			None => match self.assistant_candidate(item).await? {
				Some(candidate) => candidate,
				None =>
					return Ok(Synthesis::skipped(
						"No search syntax found in the issue description.",
					)),
			},
		};
		let report = syntax::validate_syntax(&candidate, self.opts.max_params);

		if !report.valid || report.sanitized.is_empty() {
			return Ok(Synthesis::skipped(format!(
				"Suggested syntax is invalid: {}",
				report.issues.join("; ")
			)));
		}

		let syntax_text = report.sanitized;
		let category = feedback::rule_category(&syntax_text);
		let existing = self.stores.rules.find_by_pattern(&pattern).await?;

		match feedback::decide_rule(&syntax_text, existing.as_ref()) {
			RuleDecision::Duplicate { rule_id } =>
				Ok(Synthesis::linked(FeedbackStatus::Duplicate, rule_id)),
			RuleDecision::UpdateExisting { rule_id } => {
				let updated = self
					.stores
					.rules
					.replace_syntax(rule_id, &syntax_text, &category, item.id)
					.await?;

				if !updated {
					return Err(Error::NotFound {
						message: format!("Rule {rule_id} disappeared during update."),
					});
				}

				Ok(Synthesis::linked(FeedbackStatus::UpdatedExisting, rule_id))
			},
			RuleDecision::Create => {
				let rule = TranslationRule {
					id: Uuid::new_v4(),
					pattern,
					scryfall_syntax: syntax_text,
					scryfall_templates: Vec::new(),
					aliases: Vec::new(),
					confidence: self.cfg.feedback.default_rule_confidence,
					priority: self.cfg.feedback.default_rule_priority,
					is_active: false,
					category,
					source_feedback_id: Some(item.id),
				};
				let rule_id = rule.id;

				self.stores.rules.insert_rule(rule).await?;

				Ok(Synthesis::linked(FeedbackStatus::Completed, rule_id))
			},
		}
	}

	async fn assistant_candidate(&self, item: &FeedbackItem) -> Result<Option<String>> {
		if !self.cfg.feedback.use_assistant {
			return Ok(None);
		}

		let Some(cfg) = self.assistant_config() else {
			return Ok(None);
		};
		let context =
			format!("{}\nReported issue: {}", item.original_query, item.issue_description);
		let request = AssistantRequest {
			request: &context,
			base_query: item.translated_query.as_deref().unwrap_or_default(),
			unresolved: &[],
		};
		let suggestion = self.providers.assistant.suggest(cfg, &request).await?;

		Ok(Some(suggestion.query))
	}
}
