//! Live validation against the search service, with clause relaxation on empty results.

use std::time::Duration;

use scry_domain::{
	compiler::{self, ConfidenceWeights},
	relax,
	result::ValidationSummary,
};
use scry_providers::search::SearchProbe;

use crate::SearchValidator;

#[derive(Clone, Debug, PartialEq)]
pub struct LiveOutcome {
	/// Query to return. Differs from the input when clauses were relaxed or the fallback was used.
	pub query: String,
	pub summary: ValidationSummary,
	pub confidence: f32,
	pub assumptions: Vec<String>,
}

pub struct LiveCheck<'a> {
	pub query: &'a str,
	/// Deterministic query substituted when relaxation cannot find results.
	pub fallback: Option<&'a str>,
	pub confidence: f32,
	pub overly_broad_threshold: u64,
	pub deadline: Duration,
	pub weights: &'a ConfidenceWeights,
}

/// Never fails. A network failure or a missed deadline leaves the query untouched and reports
/// status 500.
pub async fn validate(search: &dyn SearchValidator, check: LiveCheck<'_>) -> LiveOutcome {
	let deadline = check.deadline;
	let query = check.query.to_string();
	let confidence = check.confidence;

	match tokio::time::timeout(deadline, run(search, &check)).await {
		Ok(outcome) => outcome,
		Err(_) => {
			tracing::warn!(deadline_ms = deadline.as_millis() as u64, "Live validation timed out.");

			LiveOutcome {
				query,
				summary: summary_from_probe(&SearchProbe::network_failure(
					"Live validation deadline exceeded.",
				)),
				confidence,
				assumptions: Vec::new(),
			}
		},
	}
}

async fn run(search: &dyn SearchValidator, check: &LiveCheck<'_>) -> LiveOutcome {
	let threshold = check.overly_broad_threshold;
	let first = search.probe(check.query, threshold).await;
	let mut outcome = LiveOutcome {
		query: check.query.to_string(),
		summary: summary_from_probe(&first),
		confidence: check.confidence,
		assumptions: Vec::new(),
	};

	if first.ok && first.overly_broad {
		outcome.confidence = compiler::penalize(outcome.confidence, check.weights.broad_penalty);
	}
	if !first.zero_results {
		if !first.ok {
			tracing::warn!(
				status = first.status,
				error = first.error.as_deref().unwrap_or_default(),
				"Live validation degraded."
			);
		}

		return outcome;
	}

	let mut removed = Vec::new();

	if relax::has_filter_clause(check.query) {
		for pass in relax::relaxation_passes(check.query) {
			removed.extend(pass.removed);

			let probe = search.probe(&pass.query, threshold).await;

			if probe.zero_results {
				continue;
			}
			if !probe.ok {
				tracing::warn!(status = probe.status, "Relaxation probe failed.");

				break;
			}

			outcome
				.assumptions
				.push(format!("Removed {} to find matching cards.", removed.join(", ")));
			outcome.query = pass.query;
			outcome.summary = summary_from_probe(&probe);
			outcome.summary.relaxed = removed;

			return outcome;
		}

		tracing::info!(tried = ?removed, "No relaxation pass found results.");
	}

	if let Some(fallback) = check.fallback.filter(|fallback| *fallback != check.query) {
		let probe = search.probe(fallback, threshold).await;

		outcome
			.assumptions
			.push("Used the base query because no refinement had results.".to_string());
		outcome.query = fallback.to_string();
		outcome.summary = summary_from_probe(&probe);
		outcome.summary.used_fallback_query = true;
		outcome.summary.relaxed = removed.clone();

		if !probe.zero_results {
			return outcome;
		}
	}

	outcome.summary.relaxed = removed;
	outcome.confidence = compiler::penalize(outcome.confidence, check.weights.zero_results_penalty);

	outcome
}

fn summary_from_probe(probe: &SearchProbe) -> ValidationSummary {
	ValidationSummary {
		ok: probe.ok,
		status: probe.status,
		total_cards: probe.total_cards,
		overly_broad: probe.overly_broad,
		zero_results: probe.zero_results,
		relaxed: Vec::new(),
		used_fallback_query: false,
		warnings: probe.warnings.clone(),
		error: probe.error.clone(),
	}
}
