//! Free text to [`SearchIntent`].
//!
//! Extraction never fails. Unrecognized input only produces an emptier intent, with every
//! fragment it could not place recorded in `unresolved` and mirrored in `warnings`.

use std::{collections::BTreeSet, sync::LazyLock};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::{
	syntax,
	vocab::{self, BudgetLevel, Color, Modifier, Term},
};

const BOUNDARY: &str = "|";

static RAW_TOKEN_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(r#"(?:^|[\s(])(-?[a-z]+(?:!=|<=|>=|:|=|<|>)(?:"[^"]*"|[^\s",;()]+))"#).ok()
});
static NUMERIC_PATTERNS: LazyLock<Vec<NumericPattern>> = LazyLock::new(build_numeric_patterns);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
	#[serde(rename = "=")]
	Eq,
	#[serde(rename = "<")]
	Lt,
	#[serde(rename = "<=")]
	Le,
	#[serde(rename = ">")]
	Gt,
	#[serde(rename = ">=")]
	Ge,
}
impl Comparator {
	pub fn symbol(self) -> &'static str {
		match self {
			Self::Eq => "=",
			Self::Lt => "<",
			Self::Le => "<=",
			Self::Gt => ">",
			Self::Ge => ">=",
		}
	}

	fn phrase(self) -> &'static str {
		match self {
			Self::Eq => "exactly",
			Self::Lt => "under",
			Self::Le => "at most",
			Self::Gt => "over",
			Self::Ge => "at least",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NumericConstraint {
	pub op: Comparator,
	pub value: f32,
}
impl NumericConstraint {
	pub fn new(op: Comparator, value: f32) -> Self {
		Self { op, value }
	}

	/// Renders `mv>=5` style clauses for the given key.
	pub fn clause(&self, key: &str) -> String {
		format!("{key}{}{}", self.op.symbol(), format_number(self.value))
	}

	pub fn describe(&self) -> String {
		format!("{} {}", self.op.phrase(), format_number(self.value))
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorIntent {
	pub values: BTreeSet<Color>,
	pub is_identity: bool,
	pub is_exact: bool,
	/// The colors were joined with "or".
	pub any_of: bool,
	/// Color words appeared side by side with no connective.
	pub ambiguous: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIntent {
	/// The input after [`normalize_query`].
	pub normalized_query: String,
	pub colors: ColorIntent,
	pub types: Vec<String>,
	pub cmc: Option<NumericConstraint>,
	pub power: Option<NumericConstraint>,
	pub toughness: Option<NumericConstraint>,
	pub price: Option<NumericConstraint>,
	pub tags: Vec<String>,
	pub oracle_patterns: Vec<String>,
	pub format: Option<String>,
	pub rarity: Option<String>,
	pub warnings: Vec<String>,
	/// Search syntax the user typed directly, kept verbatim.
	pub deterministic_query: Option<String>,
	pub mapped: Vec<String>,
	pub unresolved: Vec<String>,
	pub assumptions: Vec<String>,
}
impl SearchIntent {
	pub fn is_empty(&self) -> bool {
		self.mapped.is_empty() && self.unresolved.is_empty()
	}

	/// Share of recognized units among everything the extractor saw.
	pub fn coverage(&self) -> f32 {
		let total = self.mapped.len() + self.unresolved.len();

		if total == 0 {
			return 0.0;
		}

		self.mapped.len() as f32 / total as f32
	}

	fn push_type(&mut self, value: &str) {
		push_unique(&mut self.types, value);
	}

	fn push_tag(&mut self, clause: &str) {
		push_unique(&mut self.tags, clause);
	}

	fn push_oracle(&mut self, fragment: &str) {
		push_unique(&mut self.oracle_patterns, fragment);
	}

	fn push_unresolved(&mut self, fragment: String) {
		self.warnings.push(unresolved_warning(&fragment));
		self.unresolved.push(fragment);
	}
}

/// Budget adjective thresholds in USD.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BudgetThresholds {
	pub very_cheap: f32,
	pub cheap: f32,
	pub expensive: f32,
}
impl BudgetThresholds {
	pub fn from_config(cfg: &scry_config::CompilerBudget) -> Self {
		Self { very_cheap: cfg.very_cheap_usd, cheap: cfg.cheap_usd, expensive: cfg.expensive_usd }
	}

	fn constraint(&self, level: BudgetLevel) -> NumericConstraint {
		match level {
			BudgetLevel::VeryCheap => NumericConstraint::new(Comparator::Lt, self.very_cheap),
			BudgetLevel::Cheap => NumericConstraint::new(Comparator::Lt, self.cheap),
			BudgetLevel::Expensive => NumericConstraint::new(Comparator::Gt, self.expensive),
		}
	}
}
impl Default for BudgetThresholds {
	fn default() -> Self {
		Self::from_config(&scry_config::CompilerBudget::default())
	}
}

#[derive(Clone, Copy)]
enum Target {
	Power,
	Toughness,
	ManaValue,
	Price,
	PowerToughness,
}

struct NumericPattern {
	regex: Regex,
	target: Target,
	op: Comparator,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Previous {
	Other,
	Color { named: bool },
	ColorThen(Modifier),
}

/// NFKC, lower-case, whitespace collapsed. Also the basis of cache keys and rule patterns.
pub fn normalize_query(text: &str) -> String {
	let folded: String = text.nfkc().collect::<String>().to_lowercase();

	folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn unresolved_warning(fragment: &str) -> String {
	format!("Could not interpret \"{fragment}\".")
}

pub fn extract(text: &str, budget: &BudgetThresholds) -> SearchIntent {
	let normalized = normalize_query(text);
	let mut intent =
		SearchIntent { normalized_query: normalized.clone(), ..SearchIntent::default() };
	let work = take_raw_syntax(&normalized, &mut intent);
	let work = split_punctuation(&work);
	let work = take_numeric(&work, &mut intent);

	match_phrases(&work, budget, &mut intent);

	intent
}

fn take_raw_syntax(normalized: &str, intent: &mut SearchIntent) -> String {
	let Some(re) = RAW_TOKEN_RE.as_ref() else {
		return normalized.to_string();
	};
	let mut spans = Vec::new();
	let work = replace_matches(re, normalized, |caps| {
		let Some(token) = caps.get(1) else {
			return false;
		};

		if syntax::term_key(token.as_str()).is_some_and(syntax::is_allowed_key) {
			spans.push((token.start(), token.end()));

			true
		} else {
			false
		}
	});

	if spans.is_empty() {
		return work;
	}

	let mut pieces: Vec<String> = leading_parens(&normalized[..spans[0].0]);

	for (idx, &(start, end)) in spans.iter().enumerate() {
		let token = &normalized[start..end];

		intent.mapped.push(token.to_string());
		pieces.push(token.to_string());

		let gap_end = spans.get(idx + 1).map_or(normalized.len(), |next| next.0);
		let gap = connective_items(&normalized[end..gap_end]);

		if idx + 1 == spans.len() {
			pieces.extend(gap.into_iter().take_while(|item| item == ")"));
		} else if gap.iter().all(|item| matches!(item.as_str(), "or" | "and" | "(" | ")")) {
			pieces.extend(gap.into_iter().filter(|item| item != "and"));
		} else {
			pieces.extend(gap.iter().take_while(|item| *item == ")").cloned());

			// Free text between the terms hides what an "or" was meant to join.
			if gap.iter().any(|item| item == "or") {
				intent.push_unresolved("or".to_string());
			}
		}
	}

	let (mut items, _) = syntax::tokenize(&pieces.join(" "));

	// Unbalanced groups would hide a top-level "or" from the compiler.
	if !syntax::is_balanced(&syntax::render(&items)) {
		items.retain(|item| matches!(item, syntax::Item::Term(_)));
	}

	intent.deterministic_query = Some(syntax::render(&items));

	work
}

/// Parentheses that open directly before the first raw term.
fn leading_parens(prefix: &str) -> Vec<String> {
	let opens = prefix
		.trim_end()
		.chars()
		.rev()
		.take_while(|ch| *ch == '(' || ch.is_whitespace())
		.filter(|ch| *ch == '(')
		.count();

	vec!["(".to_string(); opens]
}

/// Words between two raw terms, with parentheses split out as their own items.
fn connective_items(gap: &str) -> Vec<String> {
	gap.replace('(', " ( ")
		.replace(')', " ) ")
		.split_whitespace()
		.map(str::to_string)
		.collect()
}

fn split_punctuation(text: &str) -> String {
	let chars: Vec<char> = text.chars().collect();
	let mut out = String::with_capacity(text.len());
	let mut in_quote = false;

	for (idx, ch) in chars.iter().copied().enumerate() {
		if ch == '"' {
			in_quote = !in_quote;
			out.push(' ');

			continue;
		}
		if in_quote {
			out.push(ch);

			continue;
		}

		let separator = match ch {
			',' | ';' | '!' | '?' | '(' | ')' => true,
			'.' => {
				let digit_before = idx > 0 && chars[idx - 1].is_ascii_digit();
				let digit_after = chars.get(idx + 1).is_some_and(char::is_ascii_digit);

				!(digit_before && digit_after)
			},
			_ => false,
		};

		if separator {
			out.push_str(" | ");
		} else {
			out.push(ch);
		}
	}

	out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn take_numeric(text: &str, intent: &mut SearchIntent) -> String {
	let mut work = text.to_string();

	for pattern in NUMERIC_PATTERNS.iter() {
		work = replace_matches(&pattern.regex, &work, |caps| apply_numeric(pattern, caps, intent));
	}

	work
}

fn apply_numeric(pattern: &NumericPattern, caps: &Captures<'_>, intent: &mut SearchIntent) -> bool {
	let matched = caps.get(0).map(|m| m.as_str().trim()).unwrap_or_default().to_string();

	if let Target::PowerToughness = pattern.target {
		let power = caps.name("a").and_then(|m| m.as_str().parse::<f32>().ok());
		let toughness = caps.name("b").and_then(|m| m.as_str().parse::<f32>().ok());
		let (Some(power), Some(toughness)) = (power, toughness) else {
			return false;
		};

		if intent.power.is_some() || intent.toughness.is_some() {
			return false;
		}

		intent.power = Some(NumericConstraint::new(Comparator::Eq, power));
		intent.toughness = Some(NumericConstraint::new(Comparator::Eq, toughness));
		intent.mapped.push(matched);

		return true;
	}

	let Some(value) = caps
		.name("n")
		.or_else(|| caps.name("m"))
		.and_then(|m| m.as_str().parse::<f32>().ok())
		.filter(|value| value.is_finite())
	else {
		return false;
	};
	let slot = match pattern.target {
		Target::Power => &mut intent.power,
		Target::Toughness => &mut intent.toughness,
		Target::ManaValue => &mut intent.cmc,
		Target::Price => &mut intent.price,
		Target::PowerToughness => return false,
	};

	if slot.is_some() {
		return false;
	}

	*slot = Some(NumericConstraint::new(pattern.op, value));
	intent.mapped.push(matched);

	true
}

fn match_phrases(text: &str, budget: &BudgetThresholds, intent: &mut SearchIntent) {
	let words = words(text);
	let mut residual: Vec<&str> = Vec::new();
	let mut previous = Previous::Other;
	let mut idx = 0;

	while idx < words.len() {
		let word = words[idx].as_str();

		if word == BOUNDARY {
			flush_residual(&mut residual, intent);

			previous = Previous::Other;
			idx += 1;

			continue;
		}

		let window = words[idx..]
			.iter()
			.take(vocab::MAX_PHRASE_WORDS)
			.take_while(|word| word.as_str() != BOUNDARY)
			.count();
		let found = (1..=window).rev().find_map(|len| {
			let phrase = words[idx..idx + len].join(" ");

			vocab::lookup(&phrase).map(|term| (phrase, term, len))
		});

		if let Some((phrase, term, len)) = found {
			flush_residual(&mut residual, intent);

			previous = apply_term(&phrase, term, previous, budget, intent);
			idx += len;

			continue;
		}

		if vocab::is_stop_word(word) {
			flush_residual(&mut residual, intent);
		} else {
			residual.push(word);
		}

		idx += 1;
	}

	flush_residual(&mut residual, intent);
}

fn apply_term(
	phrase: &str,
	term: Term,
	previous: Previous,
	budget: &BudgetThresholds,
	intent: &mut SearchIntent,
) -> Previous {
	match term {
		Term::Color { colors, named } => {
			match previous {
				Previous::Color { named: previous_named } if !named && !previous_named => {
					if !intent.colors.ambiguous {
						intent.assumptions.push(format!(
							"Read adjacent colors ending in \"{phrase}\" as requiring all of them."
						));
					}

					intent.colors.ambiguous = true;
				},
				Previous::ColorThen(Modifier::Or) => intent.colors.any_of = true,
				_ => {},
			}

			intent.colors.values.extend(colors.iter().copied());
			intent.mapped.push(phrase.to_string());

			return Previous::Color { named };
		},
		Term::Type(value) => intent.push_type(value),
		Term::Tag(clause) => intent.push_tag(clause),
		Term::Oracle(fragment) => intent.push_oracle(fragment),
		Term::Format(format) =>
			if intent.format.is_none() {
				intent.format = Some(format.to_string());
			},
		Term::Rarity(rarity) =>
			if intent.rarity.is_none() {
				intent.rarity = Some(rarity.to_string());
			},
		Term::Budget(level) =>
			if intent.price.is_none() {
				let constraint = budget.constraint(level);

				intent.assumptions.push(format!(
					"Interpreted \"{phrase}\" as a price {} ${}.",
					constraint.op.phrase(),
					format_number(constraint.value)
				));
				intent.price = Some(constraint);
			},
		Term::Modifier(modifier @ (Modifier::And | Modifier::Or)) => {
			return match previous {
				Previous::Color { .. } => Previous::ColorThen(modifier),
				other => other,
			};
		},
		Term::Modifier(Modifier::Identity) => intent.colors.is_identity = true,
		Term::Modifier(Modifier::Exact) => intent.colors.is_exact = true,
	}

	intent.mapped.push(phrase.to_string());

	Previous::Other
}

fn flush_residual(residual: &mut Vec<&str>, intent: &mut SearchIntent) {
	if residual.is_empty() {
		return;
	}

	let fragment = residual.join(" ");

	residual.clear();
	intent.push_unresolved(fragment);
}

fn words(text: &str) -> Vec<String> {
	let mut out = Vec::new();

	for raw in text.split_whitespace() {
		let token = raw.trim_matches(|ch: char| matches!(ch, '\'' | '"' | '.' | '`'));
		let token = token.strip_suffix("'s").unwrap_or(token);

		if token.is_empty() {
			continue;
		}
		if token.contains('-') && token.chars().all(|ch| ch.is_alphabetic() || ch == '-') {
			out.extend(token.split('-').filter(|part| !part.is_empty()).map(str::to_string));
		} else {
			out.push(token.to_string());
		}
	}

	out
}

/// Replaces every accepted match with a phrase boundary, one match at a time so matches that
/// share a separating space are all seen.
fn replace_matches<F>(re: &Regex, text: &str, mut accept: F) -> String
where
	F: FnMut(&Captures<'_>) -> bool,
{
	let mut out = String::with_capacity(text.len());
	let mut copied = 0;
	let mut pos = 0;

	while pos < text.len() {
		let Some(caps) = re.captures_at(text, pos) else {
			break;
		};
		let Some(whole) = caps.get(0) else {
			break;
		};

		if whole.as_str().trim().is_empty() {
			break;
		}
		if accept(&caps) {
			out.push_str(&text[copied..whole.start().max(copied)]);
			out.push_str(" | ");

			copied = whole.end();
		}

		// A consumed trailing space must stay available as the next match's leading space.
		pos = if whole.as_str().ends_with(' ') { whole.end() - 1 } else { whole.end() };
	}

	out.push_str(&text[copied..]);

	out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn build_numeric_patterns() -> Vec<NumericPattern> {
	const NUM: &str = r"(?P<n>\d+(?:\.\d+)?)";
	const POWER: &str = "(?:power|pow)";
	const TOUGHNESS: &str = "(?:toughness|tou)";
	const MANA: &str = "(?:converted mana cost|mana value|mana cost|cmc|mv)";
	const MORE: &str = "(?:more|greater|higher|above)";
	const LESS: &str = "(?:less|fewer|lower|below)";

	let mut specs: Vec<(String, Target, Comparator)> = vec![
		(r"(?P<a>\d+)/(?P<b>\d+)".to_string(), Target::PowerToughness, Comparator::Eq),
		(format!(r"{NUM}[- ]drops?"), Target::ManaValue, Comparator::Eq),
		(format!("costs? {NUM} or {LESS}"), Target::ManaValue, Comparator::Le),
		(format!("costs? {NUM} or {MORE}"), Target::ManaValue, Comparator::Ge),
		(format!("costs? less than {NUM}"), Target::ManaValue, Comparator::Lt),
		(format!("{NUM} mana or {LESS}"), Target::ManaValue, Comparator::Le),
		(format!("{NUM} mana or {MORE}"), Target::ManaValue, Comparator::Ge),
		(format!("costs? (?:exactly )?{NUM}(?: mana)?"), Target::ManaValue, Comparator::Eq),
	];
	let currency = r"(?:\$ ?(?P<n>\d+(?:\.\d+)?)|(?P<m>\d+(?:\.\d+)?) ?(?:dollars?|bucks|usd))";

	specs.extend([
		(
			format!("(?:under|below|less than|cheaper than) {currency}"),
			Target::Price,
			Comparator::Lt,
		),
		(
			format!("(?:at most|max|up to|no more than) {currency}"),
			Target::Price,
			Comparator::Le,
		),
		(format!("{currency} or (?:less|under|cheaper)"), Target::Price, Comparator::Le),
		(
			format!("(?:over|above|more than|pricier than) {currency}"),
			Target::Price,
			Comparator::Gt,
		),
		(format!("(?:at least) {currency}"), Target::Price, Comparator::Ge),
		(format!("{currency} or more"), Target::Price, Comparator::Ge),
	]);

	let fields =
		[(POWER, Target::Power), (TOUGHNESS, Target::Toughness), (MANA, Target::ManaValue)];
	let templates: Vec<(Vec<String>, Comparator)> = vec![
		(
			vec![
				format!("{NUM} or {MORE} {{f}}"),
				format!(r"{NUM}\+ {{f}}"),
				format!("{{f}} (?:of )?{NUM} or {MORE}"),
				format!(r"{{f}} {NUM}\+"),
				format!("at least {NUM} {{f}}"),
				format!("{{f}} (?:of )?at least {NUM}"),
			],
			Comparator::Ge,
		),
		(
			vec![
				format!("{NUM} or {LESS} {{f}}"),
				format!("{{f}} (?:of )?{NUM} or {LESS}"),
				format!("at most {NUM} {{f}}"),
				format!("{{f}} (?:of )?at most {NUM}"),
			],
			Comparator::Le,
		),
		(
			vec![
				format!("(?:more|greater|higher) than {NUM} {{f}}"),
				format!("{{f}} (?:greater|more|higher) than {NUM}"),
				format!("(?:over|above) {NUM} {{f}}"),
				format!("{{f}} (?:over|above) {NUM}"),
			],
			Comparator::Gt,
		),
		(
			vec![
				format!("(?:less|fewer|lower) than {NUM} {{f}}"),
				format!("{{f}} (?:less|lower|fewer) than {NUM}"),
				format!("(?:under|below) {NUM} {{f}}"),
				format!("{{f}} (?:under|below) {NUM}"),
			],
			Comparator::Lt,
		),
		(
			vec![format!("{{f}} (?:of |equal to |= ?)?{NUM}"), format!("{NUM} {{f}}")],
			Comparator::Eq,
		),
	];

	for (group, op) in &templates {
		for template in group {
			for (field, target) in fields {
				specs.push((template.replace("{f}", field), target, *op));
			}
		}
	}

	specs
		.into_iter()
		.filter_map(|(source, target, op)| {
			Regex::new(&format!(r"(?:^|\s)(?:{source})(?:$|\s)"))
				.ok()
				.map(|regex| NumericPattern { regex, target, op })
		})
		.collect()
}

pub(crate) fn format_number(value: f32) -> String {
	if value.fract() == 0.0 && value.abs() < 1e9 {
		format!("{}", value as i64)
	} else {
		let rendered = format!("{value:.2}");

		rendered.trim_end_matches('0').trim_end_matches('.').to_string()
	}
}

fn push_unique(values: &mut Vec<String>, value: &str) {
	if !values.iter().any(|existing| existing == value) {
		values.push(value.to_string());
	}
}
