use scry_config::Config;
use scry_domain::{
	compiler::{self, CompileOptions, Compiled},
	filters::{NormalizedFilters, SearchFilters},
	relax,
	result::TranslationSource,
	rules::{AliasRuleMatcher, TranslationRule},
	syntax,
};
use uuid::Uuid;

const CONFIG_TOML: &str = r#"
[service]
http_bind = "127.0.0.1:8080"
admin_bind = "127.0.0.1:8081"
log_level = "info"

[storage]
backend = "memory"

[providers.search]
api_base = "https://api.scryfall.com"
timeout_ms = 2000
max_retries = 2
base_backoff_ms = 100
max_backoff_ms = 800

[compiler]
game_filter = "paper"
max_params = 15

[security]
bind_localhost_only = true
"#;

fn config() -> Config {
	scry_config::from_toml_str(CONFIG_TOML).expect("Test config must be valid.")
}

fn run(text: &str, rules: &[TranslationRule]) -> Compiled {
	let opts = CompileOptions::from_config(&config());

	compiler::translate(
		text,
		&NormalizedFilters::default(),
		rules,
		&AliasRuleMatcher::default(),
		&opts,
	)
}

fn learned_rule(pattern: &str, syntax: &str) -> TranslationRule {
	TranslationRule {
		id: Uuid::new_v4(),
		pattern: pattern.to_string(),
		scryfall_syntax: syntax.to_string(),
		scryfall_templates: Vec::new(),
		aliases: Vec::new(),
		confidence: 0.85,
		priority: 50,
		is_active: true,
		category: "mechanic".to_string(),
		source_feedback_id: None,
	}
}

#[test]
fn red_creatures_compile_deterministically() {
	let compiled = run("red creatures", &[]);

	assert!(compiled.query.contains("t:creature"));
	assert!(compiled.query.contains("c:r") || compiled.query.contains("c=r"));
	assert_eq!(compiled.source, TranslationSource::Deterministic);
}

#[test]
fn white_enchantments_for_commander() {
	let compiled = run("white enchantments for commander", &[]);

	assert!(compiled.query.contains("t:enchantment"));
	assert!(compiled.query.contains("f:commander"));
	assert!(compiled.query.ends_with("game:paper"));
}

#[test]
fn compilation_is_idempotent() {
	let text = "cheap green ramp creatures with 2 or less mana value and reach";
	let first = run(text, &[]);
	let second = run(text, &[]);

	assert_eq!(first.query, second.query);
	assert_eq!(first.confidence, second.confidence);
}

#[test]
fn compiled_queries_are_always_balanced() {
	let inputs = [
		"red creatures",
		"blue or black instants that draw cards",
		"o:\"draw a card",
		"t:elf (c:g",
		"mono-white 2/2 soldiers under $1",
		"izzet spells with prowess for modern",
		"legendary dragons with flying and 6 or more power",
	];

	for input in inputs {
		let compiled = run(input, &[]);

		assert!(
			syntax::is_balanced(&compiled.query),
			"Unbalanced query for {input:?}: {}",
			compiled.query
		);
		assert!(syntax::validate_syntax(&compiled.query, 15).valid);
	}
}

#[test]
fn learned_rules_resolve_leftover_fragments() {
	let rules = vec![learned_rule("go wide", "otag:synergy-token")];
	let compiled = run("white creatures that go wide", &rules);

	assert_eq!(compiled.source, TranslationSource::PatternMatch);
	assert!(!compiled.needs_ai);
	assert!(compiled.query.contains("otag:synergy-token"));
	assert!(compiled.confidence <= 0.85);
	assert!(compiled.warnings.is_empty());
}

#[test]
fn invalid_rule_syntax_falls_back_to_the_base_query() {
	let rules = vec![learned_rule("go wide", "bogus:value")];
	let compiled = run("white creatures that go wide", &rules);

	assert_eq!(compiled.query, compiled.base_query);
	assert!(compiled.needs_ai);
	assert!(compiled.rule_matches.is_empty());
}

#[test]
fn structured_filters_are_validated_then_applied() {
	let filters = SearchFilters {
		format: Some("Pauper".to_string()),
		rarity: Some("common".to_string()),
		..SearchFilters::default()
	}
	.normalize()
	.expect("Filters must be valid.");
	let compiled = compiler::translate(
		"black removal",
		&filters,
		&[],
		&AliasRuleMatcher::default(),
		&CompileOptions::from_config(&config()),
	);

	assert_eq!(compiled.query, "c:b otag:removal f:pauper r:common game:paper");
}

#[test]
fn relaxation_example() {
	let relaxed = relax::relax_speculative_clauses("t:creature is:reprint usd<10");

	assert_eq!(relaxed.relaxed_query, "t:creature");
	assert!(relaxed.removed.contains(&"is:reprint".to_string()));
	assert!(relaxed.removed.contains(&"usd<10".to_string()));

	let untouched = relax::relax_speculative_clauses("t:creature c:r");

	assert!(untouched.removed.is_empty());
}

#[test]
fn result_labels_match_confidence() {
	let compiled = run("red creatures", &[]);
	let result = compiled.into_result("red creatures");

	assert_eq!(result.original_query, "red creatures");
	assert!(result.success);
	assert_eq!(result.explanation.confidence, 1.0);

	let value = serde_json::to_value(&result).expect("Result must serialize.");

	assert_eq!(value["explanation"]["confidenceLabel"], "High");
}
