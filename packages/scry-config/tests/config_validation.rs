use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use scry_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let mut table = root.as_table_mut().expect("Template config must be a table.");

	for part in section.split('.') {
		table = table
			.get_mut(part)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Template config must include [{section}]."));
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("scry_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn base_config() -> Config {
	scry_config::from_toml_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse test config.")
}

fn expect_validation(section: &str, key: &str, value: Value, expected: &str) {
	let payload = sample_toml_with(section, key, value);
	let err = scry_config::from_toml_str(&payload).expect_err("Expected validation error.");

	assert!(err.to_string().contains(expected), "Unexpected error: {err}");
}

#[test]
fn sample_config_loads_from_disk() {
	let path = write_temp_config(SAMPLE_CONFIG_TEMPLATE_TOML.to_string());
	let result = scry_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Sample config must be valid.");

	assert_eq!(cfg.storage.backend, "memory");
	assert_eq!(cfg.compiler.max_params, 15);
	assert_eq!(cfg.compiler.input.max_chars, 500);
	assert_eq!(cfg.rate_limit.session_limit, 20);
}

#[test]
fn blank_admin_token_normalizes_to_none() {
	let cfg = base_config();

	assert!(cfg.security.admin_auth_token.is_none());
}

#[test]
fn missing_file_reports_read_error() {
	let path = env::temp_dir().join("scry_config_missing_file.toml");
	let err = scry_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }), "Unexpected error: {err}");
}

#[test]
fn malformed_toml_reports_parse_error() {
	let path = write_temp_config("[service\nhttp_bind = ".to_string());
	let result = scry_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	assert!(matches!(result, Err(Error::ParseConfig { .. })));
}

#[test]
fn storage_backend_must_be_known() {
	expect_validation(
		"storage",
		"backend",
		Value::String("redis".to_string()),
		"storage.backend must be one of postgres or memory.",
	);
}

#[test]
fn postgres_backend_requires_positive_pool() {
	let mut cfg = base_config();

	cfg.storage.backend = "postgres".to_string();
	cfg.storage.postgres.as_mut().expect("Template config must include postgres.").pool_max_conns =
		0;

	let err = scry_config::validate(&cfg).expect_err("Expected pool validation error.");

	assert!(
		err.to_string().contains("storage.postgres.pool_max_conns must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn rate_limits_must_be_ordered() {
	expect_validation(
		"rate_limit",
		"session_limit",
		Value::Integer(100),
		"rate_limit.session_limit must not exceed rate_limit.ip_limit.",
	);
	expect_validation(
		"rate_limit",
		"ip_limit",
		Value::Integer(5_000),
		"rate_limit.ip_limit must not exceed rate_limit.global_limit.",
	);
}

#[test]
fn confidence_weights_must_be_in_range() {
	expect_validation(
		"compiler.confidence",
		"warning_penalty",
		Value::Float(1.5),
		"compiler.confidence.warning_penalty must be a finite number in the range 0.0-1.0.",
	);
}

#[test]
fn budget_thresholds_must_be_increasing() {
	expect_validation(
		"compiler.budget",
		"very_cheap_usd",
		Value::Float(6.0),
		"compiler.budget.very_cheap_usd must be less than compiler.budget.cheap_usd.",
	);
}

#[test]
fn cache_ttl_must_be_positive() {
	expect_validation(
		"cache",
		"ttl_seconds",
		Value::Integer(0),
		"cache.ttl_seconds must be greater than zero.",
	);
}

#[test]
fn assistant_requires_key_when_enabled() {
	let mut cfg = base_config();
	let assistant =
		cfg.providers.assistant.as_mut().expect("Template config must include assistant.");

	assistant.enabled = true;
	assistant.api_key = "  ".to_string();

	let err = scry_config::validate(&cfg).expect_err("Expected assistant key validation error.");

	assert!(
		err.to_string().contains("providers.assistant.api_key must be non-empty when enabled."),
		"Unexpected error: {err}"
	);
}

#[test]
fn feedback_assistant_requires_enabled_provider() {
	expect_validation(
		"feedback",
		"use_assistant",
		Value::Boolean(true),
		"feedback.use_assistant requires providers.assistant to be enabled.",
	);
}

#[test]
fn default_format_is_normalized() {
	let payload =
		sample_toml_with("compiler", "default_format", Value::String(" Commander ".to_string()));
	let cfg = scry_config::from_toml_str(&payload).expect("Config must be valid.");

	assert_eq!(cfg.compiler.default_format.as_deref(), Some("commander"));
}
