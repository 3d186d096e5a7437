use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub compiler: Compiler,
	#[serde(default)]
	pub validation: Validation,
	#[serde(default)]
	pub cache: Cache,
	#[serde(default)]
	pub rate_limit: RateLimit,
	#[serde(default)]
	pub feedback: Feedback,
	pub security: Security,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
	#[serde(default = "default_cors_allow_origin")]
	pub cors_allow_origin: String,
	/// Used as the rate-limit key when no forwarding header names the client.
	#[serde(default = "default_client_ip")]
	pub default_client_ip: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	/// One of "postgres" or "memory".
	#[serde(default = "default_storage_backend")]
	pub backend: String,
	pub postgres: Option<Postgres>,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub search: SearchProviderConfig,
	pub assistant: Option<AssistantProviderConfig>,
}

#[derive(Debug, Deserialize)]
pub struct SearchProviderConfig {
	pub api_base: String,
	#[serde(default = "default_search_path")]
	pub path: String,
	pub timeout_ms: u64,
	pub max_retries: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
	#[serde(default = "default_user_agent")]
	pub user_agent: String,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct AssistantProviderConfig {
	pub enabled: bool,
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default = "default_assistant_retries")]
	pub max_retries: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Compiler {
	/// Format assumed when the request names none. Unset means no format clause.
	pub default_format: Option<String>,
	/// Appended to every query as `game:<value>`.
	pub game_filter: String,
	pub max_params: u32,
	pub input: CompilerInput,
	pub confidence: CompilerConfidence,
	pub budget: CompilerBudget,
}
impl Default for Compiler {
	fn default() -> Self {
		Self {
			default_format: None,
			game_filter: "paper".to_string(),
			max_params: 15,
			input: CompilerInput::default(),
			confidence: CompilerConfidence::default(),
			budget: CompilerBudget::default(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CompilerInput {
	pub max_chars: u32,
	pub max_repeated_chars: u32,
	pub min_alnum_ratio: f32,
}
impl Default for CompilerInput {
	fn default() -> Self {
		Self { max_chars: 500, max_repeated_chars: 6, min_alnum_ratio: 0.5 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CompilerConfidence {
	pub floor: f32,
	pub warning_penalty: f32,
	pub ambiguity_penalty: f32,
	pub empty_intent: f32,
	pub broad_penalty: f32,
	pub zero_results_penalty: f32,
}
impl Default for CompilerConfidence {
	fn default() -> Self {
		Self {
			floor: 0.35,
			warning_penalty: 0.08,
			ambiguity_penalty: 0.1,
			empty_intent: 0.3,
			broad_penalty: 0.05,
			zero_results_penalty: 0.15,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CompilerBudget {
	pub very_cheap_usd: f32,
	pub cheap_usd: f32,
	pub expensive_usd: f32,
}
impl Default for CompilerBudget {
	fn default() -> Self {
		Self { very_cheap_usd: 1.0, cheap_usd: 5.0, expensive_usd: 20.0 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Validation {
	pub enabled: bool,
	pub overly_broad_threshold: u64,
	/// Upper bound for the whole live validation, retries and relaxation included.
	pub deadline_ms: u64,
}
impl Default for Validation {
	fn default() -> Self {
		Self { enabled: true, overly_broad_threshold: 500, deadline_ms: 4_000 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub enabled: bool,
	pub ttl_seconds: i64,
}
impl Default for Cache {
	fn default() -> Self {
		Self { enabled: true, ttl_seconds: 86_400 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RateLimit {
	pub enabled: bool,
	pub window_ms: i64,
	pub session_limit: u32,
	pub ip_limit: u32,
	pub global_limit: u32,
	pub max_tracked_keys: usize,
}
impl Default for RateLimit {
	fn default() -> Self {
		Self {
			enabled: true,
			window_ms: 60_000,
			session_limit: 20,
			ip_limit: 60,
			global_limit: 1_000,
			max_tracked_keys: 10_000,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Feedback {
	pub poll_interval_ms: u64,
	pub cache_sweep_interval_seconds: i64,
	pub default_rule_confidence: f32,
	pub default_rule_priority: i32,
	/// Ask the assistant for a candidate rule when the issue text carries no query syntax.
	pub use_assistant: bool,
}
impl Default for Feedback {
	fn default() -> Self {
		Self {
			poll_interval_ms: 1_000,
			cache_sweep_interval_seconds: 900,
			default_rule_confidence: 0.7,
			default_rule_priority: 50,
			use_assistant: false,
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
	pub admin_auth_token: Option<String>,
}

fn default_cors_allow_origin() -> String {
	"*".to_string()
}

fn default_client_ip() -> String {
	"0.0.0.0".to_string()
}

fn default_storage_backend() -> String {
	"postgres".to_string()
}

fn default_search_path() -> String {
	"/cards/search".to_string()
}

fn default_user_agent() -> String {
	concat!("scry/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_assistant_retries() -> u32 {
	2
}
