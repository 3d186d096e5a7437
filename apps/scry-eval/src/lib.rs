use std::{
	fs,
	path::{Path, PathBuf},
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};

use scry_domain::{
	compiler::{self, CompileOptions},
	filters::NormalizedFilters,
	result::ConfidenceLabel,
	rules::AliasRuleMatcher,
};

#[derive(Debug, Parser)]
#[command(
	version = scry_cli::VERSION,
	rename_all = "kebab",
	styles = scry_cli::styles(),
)]
pub struct Args {
	/// Compiler settings and confidence weights. Built-in defaults when omitted.
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: Option<PathBuf>,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
	/// Exit with an error when the pass rate falls below this fraction.
	#[arg(long, value_name = "RATE")]
	pub min_pass_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct EvalDataset {
	name: Option<String>,
	cases: Vec<EvalCase>,
}

#[derive(Debug, Deserialize)]
struct EvalCase {
	id: Option<String>,
	query: String,
	#[serde(default)]
	expect_contains: Vec<String>,
	#[serde(default)]
	expect_absent: Vec<String>,
	min_confidence: Option<f32>,
	needs_ai: Option<bool>,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
	dataset: EvalDatasetInfo,
	summary: EvalSummary,
	cases: Vec<CaseReport>,
}

#[derive(Debug, Serialize)]
struct EvalDatasetInfo {
	name: String,
	case_count: usize,
}

#[derive(Debug, Serialize)]
struct EvalSummary {
	passed: usize,
	failed: usize,
	pass_rate: f64,
	mean_confidence: f64,
	confidence_p10: f64,
	confidence_p50: f64,
	needs_ai: usize,
	buckets: BucketCounts,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
struct BucketCounts {
	high: usize,
	good: usize,
	moderate: usize,
	low: usize,
}
impl BucketCounts {
	fn add(&mut self, label: ConfidenceLabel) {
		match label {
			ConfidenceLabel::High => self.high += 1,
			ConfidenceLabel::Good => self.good += 1,
			ConfidenceLabel::Moderate => self.moderate += 1,
			ConfidenceLabel::Low => self.low += 1,
		}
	}
}

#[derive(Debug, Serialize)]
struct CaseReport {
	id: String,
	query: String,
	scryfall_query: String,
	confidence: f32,
	confidence_label: ConfidenceLabel,
	needs_ai: bool,
	passed: bool,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	failures: Vec<String>,
}

pub fn run(args: Args) -> color_eyre::Result<()> {
	let opts = match &args.config {
		Some(path) => {
			let config = scry_config::load(path)?;

			scry_cli::init_tracing(&config.service.log_level);

			CompileOptions::from_config(&config)
		},
		None => {
			scry_cli::init_tracing("warn");

			CompileOptions::default()
		},
	};
	let dataset = load_dataset(args.dataset.as_path())?;
	let output = evaluate(&dataset, &opts);
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	if let Some(min) = args.min_pass_rate
		&& output.summary.pass_rate < min
	{
		return Err(eyre::eyre!(
			"Pass rate {:.3} is below the required {min:.3}.",
			output.summary.pass_rate
		));
	}

	Ok(())
}

fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	if dataset.cases.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one case."));
	}

	Ok(dataset)
}

fn evaluate(dataset: &EvalDataset, opts: &CompileOptions) -> EvalOutput {
	let matcher = AliasRuleMatcher::default();
	let cases: Vec<CaseReport> = dataset
		.cases
		.iter()
		.enumerate()
		.map(|(idx, case)| evaluate_case(idx, case, &matcher, opts))
		.collect();
	let summary = summarize(&cases);

	tracing::info!(
		passed = summary.passed,
		failed = summary.failed,
		"Golden corpus evaluated."
	);

	EvalOutput {
		dataset: EvalDatasetInfo {
			name: dataset.name.clone().unwrap_or_else(|| "unnamed".to_string()),
			case_count: cases.len(),
		},
		summary,
		cases,
	}
}

fn evaluate_case(
	idx: usize,
	case: &EvalCase,
	matcher: &AliasRuleMatcher,
	opts: &CompileOptions,
) -> CaseReport {
	let compiled =
		compiler::translate(&case.query, &NormalizedFilters::default(), &[], matcher, opts);
	let mut failures = Vec::new();

	for expected in &case.expect_contains {
		if !compiled.query.contains(expected.as_str()) {
			failures.push(format!("Missing {expected:?}."));
		}
	}
	for unexpected in &case.expect_absent {
		if compiled.query.contains(unexpected.as_str()) {
			failures.push(format!("Unexpected {unexpected:?}."));
		}
	}
	if let Some(min) = case.min_confidence
		&& compiled.confidence < min
	{
		failures.push(format!("Confidence {:.2} is below {min:.2}.", compiled.confidence));
	}
	if let Some(expected) = case.needs_ai
		&& compiled.needs_ai != expected
	{
		failures.push(format!("needs_ai was {}, expected {expected}.", compiled.needs_ai));
	}

	CaseReport {
		id: case.id.clone().unwrap_or_else(|| format!("case-{}", idx + 1)),
		query: case.query.clone(),
		confidence_label: ConfidenceLabel::from_score(compiled.confidence),
		confidence: compiled.confidence,
		needs_ai: compiled.needs_ai,
		scryfall_query: compiled.query,
		passed: failures.is_empty(),
		failures,
	}
}

fn summarize(cases: &[CaseReport]) -> EvalSummary {
	let passed = cases.iter().filter(|case| case.passed).count();
	let mut buckets = BucketCounts::default();
	let mut confidences: Vec<f64> = Vec::with_capacity(cases.len());

	for case in cases {
		buckets.add(case.confidence_label);
		confidences.push(f64::from(case.confidence));
	}

	confidences.sort_by(|a, b| a.total_cmp(b));

	let count = cases.len().max(1) as f64;

	EvalSummary {
		passed,
		failed: cases.len() - passed,
		pass_rate: passed as f64 / count,
		mean_confidence: confidences.iter().sum::<f64>() / count,
		confidence_p10: percentile(&confidences, 0.1),
		confidence_p50: percentile(&confidences, 0.5),
		needs_ai: cases.iter().filter(|case| case.needs_ai).count(),
		buckets,
	}
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let clamped = percentile.clamp(0.0, 1.0);
	let pos = clamped * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;

		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}
