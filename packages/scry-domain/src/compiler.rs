//! Deterministic compilation of a [`SearchIntent`] into search syntax.

use crate::{
	filters::NormalizedFilters,
	intent::{self, BudgetThresholds, ColorIntent, Comparator, NumericConstraint, SearchIntent},
	result::{Explanation, TranslationResult, TranslationSource},
	rules::{RuleInput, RuleMatch, RuleMatcher, TranslationRule},
	syntax::{self, InputLimits},
};

/// Tunable confidence weights.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfidenceWeights {
	pub floor: f32,
	pub warning_penalty: f32,
	pub ambiguity_penalty: f32,
	pub empty_intent: f32,
	pub broad_penalty: f32,
	pub zero_results_penalty: f32,
}
impl ConfidenceWeights {
	pub fn from_config(cfg: &scry_config::CompilerConfidence) -> Self {
		Self {
			floor: cfg.floor,
			warning_penalty: cfg.warning_penalty,
			ambiguity_penalty: cfg.ambiguity_penalty,
			empty_intent: cfg.empty_intent,
			broad_penalty: cfg.broad_penalty,
			zero_results_penalty: cfg.zero_results_penalty,
		}
	}
}
impl Default for ConfidenceWeights {
	fn default() -> Self {
		Self::from_config(&scry_config::CompilerConfidence::default())
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompileOptions {
	pub default_format: Option<String>,
	pub game_filter: String,
	pub max_params: usize,
	pub weights: ConfidenceWeights,
	pub budget: BudgetThresholds,
	pub limits: InputLimits,
}
impl CompileOptions {
	pub fn from_config(cfg: &scry_config::Config) -> Self {
		Self::from_compiler(&cfg.compiler)
	}

	pub fn from_compiler(compiler: &scry_config::Compiler) -> Self {
		Self {
			default_format: compiler.default_format.clone(),
			game_filter: compiler.game_filter.clone(),
			max_params: compiler.max_params as usize,
			weights: ConfidenceWeights::from_config(&compiler.confidence),
			budget: BudgetThresholds::from_config(&compiler.budget),
			limits: InputLimits::from_config(&compiler.input),
		}
	}
}
impl Default for CompileOptions {
	fn default() -> Self {
		Self::from_compiler(&scry_config::Compiler::default())
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Compiled {
	/// Sanitized query, learned rule clauses included.
	pub query: String,
	/// Sanitized query built from the intent and filters alone.
	pub base_query: String,
	pub readable: String,
	pub assumptions: Vec<String>,
	pub warnings: Vec<String>,
	pub confidence: f32,
	pub source: TranslationSource,
	/// Fragments remain that neither the vocabulary nor a learned rule explains.
	pub needs_ai: bool,
	/// Fragments still unexplained after learned rules were applied.
	pub unresolved: Vec<String>,
	pub rule_matches: Vec<RuleMatch>,
	pub syntax_issues: Vec<String>,
}
impl Compiled {
	pub fn into_result(self, original_query: &str) -> TranslationResult {
		TranslationResult {
			original_query: original_query.to_string(),
			scryfall_query: self.query,
			explanation: Explanation::new(self.readable, self.assumptions, self.confidence),
			success: true,
			source: self.source,
			validation: None,
			response_time_ms: None,
		}
	}
}

/// Extraction followed by compilation.
pub fn translate(
	text: &str,
	filters: &NormalizedFilters,
	rules: &[TranslationRule],
	matcher: &dyn RuleMatcher,
	opts: &CompileOptions,
) -> Compiled {
	let intent = intent::extract(text, &opts.budget);

	compile(&intent, filters, rules, matcher, opts)
}

pub fn compile(
	intent: &SearchIntent,
	filters: &NormalizedFilters,
	rules: &[TranslationRule],
	matcher: &dyn RuleMatcher,
	opts: &CompileOptions,
) -> Compiled {
	let mut assumptions = intent.assumptions.clone();
	let merged = merge_filters(intent, filters, opts, &mut assumptions);
	let rule_matches = if intent.unresolved.is_empty() {
		Vec::new()
	} else {
		let input =
			RuleInput { normalized: &intent.normalized_query, unresolved: &intent.unresolved };

		matcher.match_rules(&input, rules)
	};
	let mut syntax_issues = Vec::new();
	let base = sanitize(&render_clauses(&merged, &[], opts), opts, &mut syntax_issues)
		.unwrap_or_else(|| game_clause(opts));
	let (query, rule_matches) = if rule_matches.is_empty() {
		(base.clone(), rule_matches)
	} else {
		let rule_clauses: Vec<String> = rule_matches.iter().map(|m| m.syntax.clone()).collect();
		let mut rule_issues = Vec::new();

		match sanitize(&render_clauses(&merged, &rule_clauses, opts), opts, &mut rule_issues) {
			Some(query) => {
				syntax_issues = rule_issues;

				(query, rule_matches)
			},
			None => {
				syntax_issues.extend(rule_issues);

				(base.clone(), Vec::new())
			},
		}
	};
	let covered: Vec<&String> = rule_matches.iter().flat_map(|m| m.covered.iter()).collect();
	let remaining: Vec<&String> =
		intent.unresolved.iter().filter(|fragment| !covered.contains(fragment)).collect();
	let warnings: Vec<String> = intent
		.warnings
		.iter()
		.filter(|warning| {
			!covered.iter().any(|fragment| **warning == intent::unresolved_warning(fragment))
		})
		.cloned()
		.collect();
	let recognized = intent.mapped.len() + covered.len() + filter_units(filters);
	let mut confidence = score_confidence(
		recognized,
		remaining.len(),
		warnings.len(),
		merged.colors.ambiguous,
		&opts.weights,
	);

	if let Some(best) = rule_matches.iter().map(|m| m.confidence).reduce(f32::max) {
		confidence = confidence.min(best);
	}

	let needs_ai = !remaining.is_empty() || recognized == 0;
	let source = if needs_ai {
		TranslationSource::Fallback
	} else if rule_matches.is_empty() {
		TranslationSource::Deterministic
	} else {
		TranslationSource::PatternMatch
	};

	Compiled {
		readable: describe(&merged, &rule_matches),
		query,
		base_query: base,
		assumptions,
		warnings,
		confidence: round2(confidence),
		source,
		needs_ai,
		unresolved: remaining.into_iter().cloned().collect(),
		rule_matches,
		syntax_issues,
	}
}

/// `floor + (1 - floor) * coverage`, minus warning and ambiguity penalties, in `[0, 1]`.
pub fn score_confidence(
	recognized: usize,
	unresolved: usize,
	warnings: usize,
	ambiguous: bool,
	weights: &ConfidenceWeights,
) -> f32 {
	let total = recognized + unresolved;

	if total == 0 {
		return weights.empty_intent;
	}

	let coverage = recognized as f32 / total as f32;
	let mut score = weights.floor + (1.0 - weights.floor) * coverage;

	score -= weights.warning_penalty * warnings as f32;

	if ambiguous {
		score -= weights.ambiguity_penalty;
	}

	round2(score.clamp(0.0, 1.0))
}

pub fn penalize(confidence: f32, penalty: f32) -> f32 {
	round2((confidence - penalty).clamp(0.0, 1.0))
}

/// Intent fields after structured filters have been applied.
struct Merged {
	colors: ColorIntent,
	types: Vec<String>,
	cmc: Option<NumericConstraint>,
	power: Option<NumericConstraint>,
	toughness: Option<NumericConstraint>,
	tags: Vec<String>,
	oracle: Vec<String>,
	raw: Option<String>,
	format: Option<String>,
	rarity: Option<String>,
	price: Option<NumericConstraint>,
}

fn merge_filters(
	intent: &SearchIntent,
	filters: &NormalizedFilters,
	opts: &CompileOptions,
	assumptions: &mut Vec<String>,
) -> Merged {
	let mut colors = intent.colors.clone();

	if !filters.color_identity.is_empty() {
		if !colors.values.is_empty() && colors.values != filters.color_identity {
			assumptions.push(
				"Used the colorIdentity filter instead of the colors named in the text.".to_string(),
			);
		}

		colors = ColorIntent {
			values: filters.color_identity.clone(),
			is_identity: true,
			..ColorIntent::default()
		};
	}

	let format = match (&filters.format, &intent.format) {
		(Some(filter), Some(text)) if filter != text => {
			assumptions.push(format!("Used the format filter {filter} instead of {text}."));

			Some(filter.clone())
		},
		(Some(filter), _) => Some(filter.clone()),
		(None, Some(text)) => Some(text.clone()),
		(None, None) => opts.default_format.as_ref().map(|format| {
			assumptions
				.push(format!("Assumed {} format since no format stated.", capitalize(format)));

			format.clone()
		}),
	};
	let cmc = override_constraint(
		intent.cmc,
		filters.max_cmc.map(|value| NumericConstraint::new(Comparator::Le, value)),
		"maxCmc",
		assumptions,
	);
	let price = override_constraint(
		intent.price,
		filters.max_price.map(|value| NumericConstraint::new(Comparator::Le, value)),
		"maxPrice",
		assumptions,
	);
	let rarity = match (&filters.rarity, &intent.rarity) {
		(Some(filter), Some(text)) if filter != text => {
			assumptions.push(format!("Used the rarity filter {filter} instead of {text}."));

			Some(filter.clone())
		},
		(Some(filter), _) => Some(filter.clone()),
		(None, text) => text.clone(),
	};
	let mut types = intent.types.clone();

	for value in &filters.types {
		if !types.contains(value) {
			types.push(value.clone());
		}
	}

	Merged {
		colors,
		types,
		cmc,
		power: intent.power,
		toughness: intent.toughness,
		tags: intent.tags.clone(),
		oracle: intent.oracle_patterns.clone(),
		raw: intent.deterministic_query.clone(),
		format,
		rarity,
		price,
	}
}

fn override_constraint(
	extracted: Option<NumericConstraint>,
	filter: Option<NumericConstraint>,
	field: &str,
	assumptions: &mut Vec<String>,
) -> Option<NumericConstraint> {
	match (filter, extracted) {
		(Some(filter), Some(extracted)) if filter != extracted => {
			assumptions.push(format!("Used the {field} filter instead of the value in the text."));

			Some(filter)
		},
		(Some(filter), _) => Some(filter),
		(None, extracted) => extracted,
	}
}

fn render_clauses(merged: &Merged, rule_clauses: &[String], opts: &CompileOptions) -> String {
	let mut clauses: Vec<String> = Vec::new();

	if let Some(clause) = color_clause(&merged.colors) {
		clauses.push(clause);
	}

	clauses.extend(merged.types.iter().map(|value| format!("t:{value}")));

	if let Some(cmc) = &merged.cmc {
		clauses.push(cmc.clause("mv"));
	}
	if let Some(power) = &merged.power {
		clauses.push(power.clause("pow"));
	}
	if let Some(toughness) = &merged.toughness {
		clauses.push(toughness.clause("tou"));
	}

	clauses.extend(merged.tags.iter().cloned());
	clauses.extend(merged.oracle.iter().map(|fragment| oracle_clause(fragment)));
	clauses.extend(merged.raw.iter().map(|raw| syntax::group_disjunction(raw)));
	clauses.extend(rule_clauses.iter().cloned());

	if let Some(format) = &merged.format {
		clauses.push(format!("f:{format}"));
	}
	if let Some(rarity) = &merged.rarity {
		clauses.push(format!("r:{rarity}"));
	}
	if let Some(price) = &merged.price {
		clauses.push(price.clause("usd"));
	}

	clauses.push(game_clause(opts));
	clauses.join(" ")
}

fn sanitize(query: &str, opts: &CompileOptions, issues: &mut Vec<String>) -> Option<String> {
	let report = syntax::validate_syntax(query, opts.max_params);

	issues.extend(report.issues);

	report.valid.then_some(report.sanitized)
}

fn game_clause(opts: &CompileOptions) -> String {
	format!("game:{}", opts.game_filter)
}

pub(crate) fn color_clause(colors: &ColorIntent) -> Option<String> {
	if colors.values.is_empty() {
		return None;
	}

	let letters: String = colors.values.iter().map(|color| color.letter()).collect();

	if colors.is_identity {
		let op = if colors.is_exact { "=" } else { "<=" };

		return Some(format!("id{op}{letters}"));
	}
	if colors.any_of && colors.values.len() > 1 {
		let alternatives: Vec<String> =
			colors.values.iter().map(|color| format!("c:{}", color.letter())).collect();

		return Some(format!("({})", alternatives.join(" or ")));
	}
	if colors.is_exact {
		return Some(format!("c={letters}"));
	}

	Some(format!("c:{letters}"))
}

fn oracle_clause(fragment: &str) -> String {
	let escaped = fragment.replace('\\', "").replace('"', "'");

	format!("o:\"{escaped}\"")
}

fn describe(merged: &Merged, rule_matches: &[RuleMatch]) -> String {
	let names: Vec<&str> = merged.colors.values.iter().map(|color| color.name()).collect();
	let mut subject: Vec<String> = Vec::new();
	let mut details: Vec<String> = Vec::new();

	if !names.is_empty() {
		if merged.colors.is_identity {
			details.push(format!("within a {} color identity", names.join("/")));
		} else if merged.colors.any_of {
			subject.push(names.join(" or "));
		} else if merged.colors.is_exact {
			subject.push(format!("exactly {}", names.join(" and ")));
		} else {
			subject.push(names.join(" and "));
		}
	}

	subject.extend(merged.types.iter().cloned());
	subject.push("cards".to_string());

	for (label, constraint) in
		[("mana value", merged.cmc), ("power", merged.power), ("toughness", merged.toughness)]
	{
		if let Some(constraint) = constraint {
			details.push(format!("{label} {}", constraint.describe()));
		}
	}

	if !merged.tags.is_empty() {
		details.push(format!("matching {}", merged.tags.join(", ")));
	}
	if !merged.oracle.is_empty() {
		let quoted: Vec<String> =
			merged.oracle.iter().map(|fragment| format!("\"{fragment}\"")).collect();

		details.push(format!("with rules text mentioning {}", quoted.join(", ")));
	}
	if let Some(raw) = &merged.raw {
		details.push(format!("using {raw}"));
	}
	if !rule_matches.is_empty() {
		let syntaxes: Vec<&str> = rule_matches.iter().map(|m| m.syntax.as_str()).collect();

		details.push(format!("using learned rules {}", syntaxes.join(", ")));
	}
	if let Some(format) = &merged.format {
		details.push(format!("legal in {}", capitalize(format)));
	}
	if let Some(rarity) = &merged.rarity {
		details.push(format!("at {rarity} rarity"));
	}
	if let Some(price) = &merged.price {
		details.push(format!("priced {} USD", price.describe()));
	}

	let mut readable = format!("Searching for {}", subject.join(" "));

	if !details.is_empty() {
		readable.push_str(", ");
		readable.push_str(&details.join(", "));
	}

	readable.push('.');
	readable
}

fn filter_units(filters: &NormalizedFilters) -> usize {
	[
		filters.format.is_some(),
		!filters.color_identity.is_empty(),
		filters.max_cmc.is_some(),
		filters.max_price.is_some(),
		filters.rarity.is_some(),
	]
	.into_iter()
	.filter(|present| *present)
	.count()
		+ filters.types.len()
}

fn capitalize(word: &str) -> String {
	let mut chars = word.chars();

	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}

fn round2(value: f32) -> f32 {
	(value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;

	use super::*;
	use crate::{rules::AliasRuleMatcher, vocab::Color};

	fn compile_text(text: &str) -> Compiled {
		translate(
			text,
			&NormalizedFilters::default(),
			&[],
			&AliasRuleMatcher::default(),
			&CompileOptions::default(),
		)
	}

	#[test]
	fn clauses_follow_the_fixed_order() {
		let compiled = compile_text(
			"cheap red legendary creatures with 3 or more power with flying that draw cards for \
			 commander",
		);

		assert_eq!(
			compiled.query,
			"c:r t:legendary t:creature pow>=3 keyword:flying o:\"draw\" f:commander usd<5 game:paper"
		);
		assert_eq!(compiled.source, TranslationSource::Deterministic);
		assert!(!compiled.needs_ai);
	}

	#[test]
	fn full_coverage_scores_high() {
		let compiled = compile_text("red creatures");

		assert_eq!(compiled.query, "c:r t:creature game:paper");
		assert_eq!(compiled.confidence, 1.0);
	}

	#[test]
	fn raw_disjunctions_are_grouped_before_other_clauses() {
		let compiled = compile_text("t:elf or t:goblin");

		assert_eq!(compiled.query, "(t:elf or t:goblin) game:paper");
		assert_eq!(compiled.source, TranslationSource::Deterministic);

		let split = compile_text("t:elf or maybe t:goblin");

		assert!(split.needs_ai);
		assert!(split.confidence < 1.0);
	}

	#[test]
	fn ambiguity_and_warnings_are_penalized() {
		let ambiguous = compile_text("red white creatures");

		assert_eq!(ambiguous.confidence, 0.9);

		let partial = compile_text("red creatures that go wide");

		assert!(partial.needs_ai);
		assert_eq!(partial.source, TranslationSource::Fallback);
		assert!(partial.confidence < 0.75);
		assert_eq!(partial.base_query, "c:r t:creature game:paper");
	}

	#[test]
	fn empty_intent_uses_its_own_confidence() {
		let compiled = compile_text("show me the cards");

		assert_eq!(compiled.confidence, 0.3);
		assert!(compiled.needs_ai);
		assert_eq!(compiled.query, "game:paper");
	}

	#[test]
	fn filters_take_precedence() {
		let filters = NormalizedFilters {
			format: Some("modern".to_string()),
			color_identity: BTreeSet::from([Color::Green]),
			max_cmc: Some(2.0),
			..NormalizedFilters::default()
		};
		let intent = intent::extract("red creatures for commander", &BudgetThresholds::default());
		let compiled = compile(
			&intent,
			&filters,
			&[],
			&AliasRuleMatcher::default(),
			&CompileOptions::default(),
		);

		assert_eq!(compiled.query, "id<=g t:creature mv<=2 f:modern game:paper");
		assert_eq!(compiled.assumptions.len(), 2);
	}

	#[test]
	fn default_format_is_recorded_as_an_assumption() {
		let opts = CompileOptions {
			default_format: Some("commander".to_string()),
			..CompileOptions::default()
		};
		let compiled = translate(
			"elves",
			&NormalizedFilters::default(),
			&[],
			&AliasRuleMatcher::default(),
			&opts,
		);

		assert_eq!(compiled.query, "t:elf f:commander game:paper");
		assert_eq!(
			compiled.assumptions,
			vec!["Assumed Commander format since no format stated.".to_string()]
		);
	}

	#[test]
	fn color_clause_shapes() {
		let mut colors = ColorIntent {
			values: BTreeSet::from([Color::Red, Color::Green]),
			..ColorIntent::default()
		};

		assert_eq!(color_clause(&colors).as_deref(), Some("c:rg"));

		colors.any_of = true;

		assert_eq!(color_clause(&colors).as_deref(), Some("(c:r or c:g)"));

		colors.any_of = false;
		colors.is_exact = true;

		assert_eq!(color_clause(&colors).as_deref(), Some("c=rg"));

		colors.is_identity = true;

		assert_eq!(color_clause(&colors).as_deref(), Some("id=rg"));
	}

	#[test]
	fn penalties_clamp_at_zero() {
		assert_eq!(penalize(0.1, 0.15), 0.0);
		assert_eq!(penalize(0.9, 0.05), 0.85);
	}
}
