//! Glue shared by the `scry-*` binaries: build identity, help styling, and log setup.

use clap::builder::{
	Styles,
	styling::{AnsiColor, Effects, Style},
};
use tracing_subscriber::EnvFilter;

/// Crate version, git revision, and target triple, as `--version` prints them.
pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

const FALLBACK_LOG_LEVEL: &str = "info";

pub fn styles() -> Styles {
	let heading: Style = AnsiColor::Magenta.on_default() | Effects::BOLD;

	Styles::styled()
		.header(heading)
		.usage(heading)
		.literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Yellow.on_default())
		.error(AnsiColor::Red.on_default() | Effects::BOLD)
		.valid(AnsiColor::Green.on_default())
		.invalid(AnsiColor::Yellow.on_default() | Effects::BOLD)
}

/// The configured directives, or plain `info` when they do not parse.
pub fn log_filter(directives: &str) -> EnvFilter {
	EnvFilter::try_new(directives).unwrap_or_else(|err| {
		eprintln!("Ignoring log level {directives:?}: {err}. Using {FALLBACK_LOG_LEVEL}.");

		EnvFilter::new(FALLBACK_LOG_LEVEL)
	})
}

pub fn init_tracing(directives: &str) {
	tracing_subscriber::fmt().with_env_filter(log_filter(directives)).init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn version_leads_with_the_package_version() {
		assert!(VERSION.starts_with(concat!(env!("CARGO_PKG_VERSION"), "-")));
	}

	#[test]
	fn valid_directives_are_kept() {
		assert_eq!(log_filter("scry_service=debug").to_string(), "scry_service=debug");
	}

	#[test]
	fn invalid_directives_fall_back_to_info() {
		assert_eq!(log_filter("scry_service=loud").to_string(), "info");
	}
}
