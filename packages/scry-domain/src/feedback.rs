//! Feedback lifecycle and rule synthesis decisions.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{rules::TranslationRule, syntax};

static SYNTAX_TOKEN_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(r#"(?:^|[\s`'(])(-?[a-z]+(?:!=|<=|>=|:|=|<|>)(?:"[^"]*"|[^\s"'`,;()]+))"#).ok()
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
	Pending,
	Processing,
	Completed,
	UpdatedExisting,
	Failed,
	Skipped,
	Duplicate,
	Archived,
}
impl FeedbackStatus {
	pub const ALL: [Self; 8] = [
		Self::Pending,
		Self::Processing,
		Self::Completed,
		Self::UpdatedExisting,
		Self::Failed,
		Self::Skipped,
		Self::Duplicate,
		Self::Archived,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Processing => "processing",
			Self::Completed => "completed",
			Self::UpdatedExisting => "updated_existing",
			Self::Failed => "failed",
			Self::Skipped => "skipped",
			Self::Duplicate => "duplicate",
			Self::Archived => "archived",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|status| status.as_str() == raw)
	}

	pub fn is_terminal(self) -> bool {
		matches!(
			self,
			Self::Completed | Self::UpdatedExisting | Self::Failed | Self::Skipped | Self::Duplicate
		)
	}

	/// Only failed and skipped items may go back to the queue.
	pub fn is_retriggerable(self) -> bool {
		matches!(self, Self::Failed | Self::Skipped)
	}

	pub fn can_transition_to(self, next: Self) -> bool {
		match (self, next) {
			(Self::Pending, Self::Processing) => true,
			(Self::Processing, next) => next.is_terminal(),
			(current, Self::Archived) => current.is_terminal(),
			(current, Self::Pending) => current.is_retriggerable(),
			_ => false,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleDecision {
	/// Same pattern, same syntax.
	Duplicate { rule_id: Uuid },
	/// Same pattern, new syntax. The rule is rewritten and sent back for review.
	UpdateExisting { rule_id: Uuid },
	Create,
}

/// Allow-listed search terms quoted or written inline in an issue description.
pub fn suggested_syntax(issue_description: &str) -> Option<String> {
	let re = SYNTAX_TOKEN_RE.as_ref()?;
	let lowered = issue_description.to_lowercase();
	let mut terms: Vec<String> = Vec::new();

	for caps in re.captures_iter(&lowered) {
		let Some(token) = caps.get(1).map(|m| m.as_str().trim_end_matches('.')) else {
			continue;
		};

		if syntax::term_key(token).is_some_and(syntax::is_allowed_key)
			&& !terms.iter().any(|existing| existing == token)
		{
			terms.push(token.to_string());
		}
	}

	(!terms.is_empty()).then(|| terms.join(" "))
}

/// Rule category from the keys a syntax uses; mixed keys give `composite`.
pub fn rule_category(syntax_text: &str) -> String {
	let (items, _) = syntax::tokenize(syntax_text);
	let mut category: Option<&'static str> = None;

	for item in &items {
		let syntax::Item::Term(term) = item else {
			continue;
		};
		let Some(key) = syntax::term_key(term) else {
			continue;
		};
		let current = key_category(key);

		match category {
			None => category = Some(current),
			Some(existing) if existing != current => return "composite".to_string(),
			Some(_) => {},
		}
	}

	category.unwrap_or("general").to_string()
}

pub fn decide_rule(syntax_text: &str, existing: Option<&TranslationRule>) -> RuleDecision {
	match existing {
		Some(rule) if same_syntax(&rule.scryfall_syntax, syntax_text) =>
			RuleDecision::Duplicate { rule_id: rule.id },
		Some(rule) => RuleDecision::UpdateExisting { rule_id: rule.id },
		None => RuleDecision::Create,
	}
}

fn same_syntax(a: &str, b: &str) -> bool {
	let a: Vec<&str> = a.split_whitespace().collect();
	let b: Vec<&str> = b.split_whitespace().collect();

	a == b
}

fn key_category(key: &str) -> &'static str {
	match key {
		"c" | "color" | "id" | "identity" | "ci" | "commander" => "color",
		"t" | "type" => "type",
		"o" | "oracle" | "fo" | "fulloracle" | "kw" | "keyword" | "otag" | "oracletag"
		| "function" => "mechanic",
		"mv" | "cmc" | "manavalue" | "pow" | "power" | "tou" | "toughness" | "pt" | "powtou"
		| "loy" | "loyalty" => "stats",
		"usd" | "eur" | "tix" => "price",
		"f" | "format" | "legal" | "banned" | "restricted" => "format",
		"r" | "rarity" => "rarity",
		_ => "general",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pending_cannot_skip_processing() {
		assert!(!FeedbackStatus::Pending.can_transition_to(FeedbackStatus::Completed));
		assert!(FeedbackStatus::Pending.can_transition_to(FeedbackStatus::Processing));
		assert!(FeedbackStatus::Processing.can_transition_to(FeedbackStatus::Completed));
	}

	#[test]
	fn only_failed_and_skipped_are_retriggerable() {
		for status in FeedbackStatus::ALL {
			let expected = matches!(status, FeedbackStatus::Failed | FeedbackStatus::Skipped);

			assert_eq!(status.can_transition_to(FeedbackStatus::Pending), expected, "{status:?}");
		}
	}

	#[test]
	fn archive_is_reachable_from_terminal_states_only() {
		assert!(FeedbackStatus::Duplicate.can_transition_to(FeedbackStatus::Archived));
		assert!(!FeedbackStatus::Pending.can_transition_to(FeedbackStatus::Archived));
		assert!(!FeedbackStatus::Processing.can_transition_to(FeedbackStatus::Archived));
		assert!(!FeedbackStatus::Archived.can_transition_to(FeedbackStatus::Archived));
	}

	#[test]
	fn status_round_trips_through_text() {
		for status in FeedbackStatus::ALL {
			assert_eq!(FeedbackStatus::parse(status.as_str()), Some(status));
		}

		assert_eq!(FeedbackStatus::parse("done"), None);
	}

	#[test]
	fn suggestions_keep_only_allowed_terms() {
		let suggestion =
			suggested_syntax("Should have been `otag:go-wide t:creature` and not foo:bar.");

		assert_eq!(suggestion.as_deref(), Some("otag:go-wide t:creature"));
		assert_eq!(suggested_syntax("The results were wrong."), None);
	}

	#[test]
	fn categories_follow_keys() {
		assert_eq!(rule_category("otag:ramp o:\"add {g}\""), "mechanic");
		assert_eq!(rule_category("t:elf c:g"), "composite");
		assert_eq!(rule_category("lightning"), "general");
	}
}
