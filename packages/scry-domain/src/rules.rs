//! Learned translation rules and the strategy that matches them against a request.

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::vocab;

pub const NUMBER_PLACEHOLDER: &str = "{n}";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRule {
	pub id: Uuid,
	pub pattern: String,
	pub scryfall_syntax: String,
	pub scryfall_templates: Vec<String>,
	pub aliases: Vec<String>,
	pub confidence: f32,
	pub priority: i32,
	pub is_active: bool,
	pub category: String,
	pub source_feedback_id: Option<Uuid>,
}
impl TranslationRule {
	/// Syntax with `{n}` replaced by the captured number, when there is one.
	pub fn render(&self, number: Option<&str>) -> String {
		let body = if self.scryfall_templates.is_empty() {
			self.scryfall_syntax.clone()
		} else {
			self.scryfall_templates.join(" ")
		};

		match number {
			Some(number) => body.replace(NUMBER_PLACEHOLDER, number),
			None => body,
		}
	}

	fn phrases(&self) -> impl Iterator<Item = &str> {
		std::iter::once(self.pattern.as_str()).chain(self.aliases.iter().map(String::as_str))
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMatch {
	pub rule_id: Uuid,
	pub syntax: String,
	/// Rule confidence scaled by how well the phrase matched.
	pub confidence: f32,
	/// Unresolved fragments this match accounts for.
	pub covered: Vec<String>,
}

pub struct RuleInput<'a> {
	pub normalized: &'a str,
	pub unresolved: &'a [String],
}

/// Strategy for looking up learned rules.
pub trait RuleMatcher: Send + Sync {
	fn match_rules(&self, input: &RuleInput<'_>, rules: &[TranslationRule]) -> Vec<RuleMatch>;
}

/// Phrase containment over the pattern and aliases, then keyword overlap.
#[derive(Clone, Debug)]
pub struct AliasRuleMatcher {
	pub min_similarity: f32,
}
impl AliasRuleMatcher {
	fn phrase_match(
		&self,
		rule: &TranslationRule,
		input: &RuleInput<'_>,
		open: &[&String],
	) -> Option<RuleMatch> {
		for phrase in rule.phrases() {
			let Some(re) = phrase_regex(phrase) else {
				continue;
			};
			let Some(caps) = re.captures(input.normalized) else {
				continue;
			};
			let span = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
			let covered: Vec<String> = open
				.iter()
				.filter(|fragment| contains_words(span, fragment))
				.map(|fragment| (*fragment).clone())
				.collect();

			if covered.is_empty() {
				continue;
			}

			let number = caps.get(1).map(|m| m.as_str());

			return Some(RuleMatch {
				rule_id: rule.id,
				syntax: rule.render(number),
				confidence: rule.confidence,
				covered,
			});
		}

		None
	}

	fn similarity_match(&self, rule: &TranslationRule, open: &[&String]) -> Option<RuleMatch> {
		let mut best: Option<(f32, &String)> = None;

		for phrase in rule.phrases().filter(|phrase| !phrase.contains(NUMBER_PLACEHOLDER)) {
			let phrase_words = content_words(phrase);

			for fragment in open {
				let score = jaccard(&phrase_words, &content_words(fragment));

				if score >= self.min_similarity && best.is_none_or(|(top, _)| score > top) {
					best = Some((score, fragment));
				}
			}
		}

		best.map(|(score, fragment)| RuleMatch {
			rule_id: rule.id,
			syntax: rule.render(None),
			confidence: round2(rule.confidence * score),
			covered: vec![fragment.clone()],
		})
	}
}
impl Default for AliasRuleMatcher {
	fn default() -> Self {
		Self { min_similarity: 0.6 }
	}
}
impl RuleMatcher for AliasRuleMatcher {
	fn match_rules(&self, input: &RuleInput<'_>, rules: &[TranslationRule]) -> Vec<RuleMatch> {
		let mut candidates: Vec<&TranslationRule> =
			rules.iter().filter(|rule| rule.is_active).collect();

		candidates.sort_by(|a, b| {
			b.priority.cmp(&a.priority).then_with(|| b.confidence.total_cmp(&a.confidence))
		});

		let mut matches = Vec::new();
		let mut covered: BTreeSet<String> = BTreeSet::new();

		for rule in candidates {
			let open: Vec<&String> =
				input.unresolved.iter().filter(|fragment| !covered.contains(*fragment)).collect();

			if open.is_empty() {
				break;
			}

			let found = self
				.phrase_match(rule, input, &open)
				.or_else(|| self.similarity_match(rule, &open));

			if let Some(found) = found {
				covered.extend(found.covered.iter().cloned());
				matches.push(found);
			}
		}

		matches
	}
}

/// Word-boundary regex for a phrase; `{n}` captures a number.
fn phrase_regex(phrase: &str) -> Option<Regex> {
	let phrase = phrase.trim();

	if phrase.is_empty() {
		return None;
	}

	let escaped: Vec<String> = phrase.split(NUMBER_PLACEHOLDER).map(regex::escape).collect();
	let body = escaped.join(r"(\d+(?:\.\d+)?)");

	Regex::new(&format!(r"(?:^|\s){body}(?:$|\s)")).ok()
}

fn contains_words(haystack: &str, needle: &str) -> bool {
	let haystack: Vec<&str> = haystack.split_whitespace().collect();
	let needle: Vec<&str> = needle.split_whitespace().collect();

	!needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle.as_slice())
}

fn content_words(text: &str) -> BTreeSet<String> {
	text.split_whitespace()
		.map(|word| word.trim_matches(|ch: char| !ch.is_alphanumeric()).to_string())
		.filter(|word| !word.is_empty() && !vocab::is_stop_word(word))
		.collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
	if a.is_empty() || b.is_empty() {
		return 0.0;
	}

	let shared = a.intersection(b).count();
	let total = a.union(b).count();

	shared as f32 / total as f32
}

fn round2(value: f32) -> f32 {
	(value * 100.0).round() / 100.0
}
