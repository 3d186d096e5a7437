use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationSource {
	Deterministic,
	PatternMatch,
	Ai,
	Cache,
	Fallback,
	ForcedFallback,
}
impl TranslationSource {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Deterministic => "deterministic",
			Self::PatternMatch => "pattern_match",
			Self::Ai => "ai",
			Self::Cache => "cache",
			Self::Fallback => "fallback",
			Self::ForcedFallback => "forced_fallback",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"deterministic" => Some(Self::Deterministic),
			"pattern_match" => Some(Self::PatternMatch),
			"ai" => Some(Self::Ai),
			"cache" => Some(Self::Cache),
			"fallback" => Some(Self::Fallback),
			"forced_fallback" => Some(Self::ForcedFallback),
			_ => None,
		}
	}

	/// Only these sources are worth remembering.
	pub fn is_cacheable(self) -> bool {
		matches!(self, Self::Deterministic | Self::PatternMatch | Self::Ai)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLabel {
	High,
	Good,
	Moderate,
	Low,
}
impl ConfidenceLabel {
	pub fn from_score(score: f32) -> Self {
		if score >= 0.9 {
			Self::High
		} else if score >= 0.75 {
			Self::Good
		} else if score >= 0.6 {
			Self::Moderate
		} else {
			Self::Low
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
	pub readable: String,
	pub assumptions: Vec<String>,
	pub confidence: f32,
	pub confidence_label: ConfidenceLabel,
}
impl Explanation {
	pub fn new(readable: String, assumptions: Vec<String>, confidence: f32) -> Self {
		let confidence_label = ConfidenceLabel::from_score(confidence);

		Self { readable, assumptions, confidence, confidence_label }
	}

	pub fn set_confidence(&mut self, confidence: f32) {
		self.confidence = confidence;
		self.confidence_label = ConfidenceLabel::from_score(confidence);
	}
}

/// Outcome of the dry-run check against the search service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
	pub ok: bool,
	pub status: u16,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub total_cards: Option<u64>,
	pub overly_broad: bool,
	pub zero_results: bool,
	/// Clauses removed while looking for results, including every clause tried when no pass
	/// found any.
	pub relaxed: Vec<String>,
	pub used_fallback_query: bool,
	pub warnings: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
	pub original_query: String,
	pub scryfall_query: String,
	pub explanation: Explanation,
	pub success: bool,
	pub source: TranslationSource,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub validation: Option<ValidationSummary>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub response_time_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn labels_follow_bucket_edges() {
		assert_eq!(ConfidenceLabel::from_score(0.9), ConfidenceLabel::High);
		assert_eq!(ConfidenceLabel::from_score(0.89), ConfidenceLabel::Good);
		assert_eq!(ConfidenceLabel::from_score(0.75), ConfidenceLabel::Good);
		assert_eq!(ConfidenceLabel::from_score(0.6), ConfidenceLabel::Moderate);
		assert_eq!(ConfidenceLabel::from_score(0.59), ConfidenceLabel::Low);
	}

	#[test]
	fn result_serializes_with_camel_case_and_snake_source() {
		let result = TranslationResult {
			original_query: "red creatures".to_string(),
			scryfall_query: "c:r t:creature game:paper".to_string(),
			explanation: Explanation::new(
				"Searching for red creatures.".to_string(),
				Vec::new(),
				1.0,
			),
			success: true,
			source: TranslationSource::PatternMatch,
			validation: None,
			response_time_ms: Some(3),
		};
		let value = serde_json::to_value(&result).expect("Result must serialize.");

		assert_eq!(value["originalQuery"], "red creatures");
		assert_eq!(value["scryfallQuery"], "c:r t:creature game:paper");
		assert_eq!(value["source"], "pattern_match");
		assert_eq!(value["explanation"]["confidenceLabel"], "High");
		assert_eq!(value["responseTimeMs"], 3);
		assert!(value.get("validation").is_none());
	}
}
