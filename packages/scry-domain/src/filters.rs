use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::vocab::{self, Color, Term};

/// Structured filters sent alongside free text.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
	pub format: Option<String>,
	pub color_identity: Vec<String>,
	pub max_cmc: Option<f32>,
	pub max_price: Option<f32>,
	pub rarity: Option<String>,
	pub types: Vec<String>,
}
impl SearchFilters {
	pub fn is_empty(&self) -> bool {
		self == &Self::default()
	}

	/// Canonicalizes every field, or names the first field that cannot be used.
	pub fn normalize(&self) -> Result<NormalizedFilters, FilterRejection> {
		let format = match clean(self.format.as_deref()) {
			Some(format) if vocab::is_known_format(&format) => Some(format),
			Some(format) => return Err(FilterRejection::UnknownFormat(format)),
			None => None,
		};
		let mut color_identity = BTreeSet::new();

		for raw in &self.color_identity {
			let value = raw.trim().to_lowercase();

			if value.is_empty() {
				continue;
			}

			color_identity.extend(parse_colors(&value)?);
		}

		let max_cmc = check_number(self.max_cmc, "maxCmc")?;
		let max_price = check_number(self.max_price, "maxPrice")?;
		let rarity = match clean(self.rarity.as_deref()) {
			Some(rarity) if vocab::is_known_rarity(&rarity) => Some(rarity),
			Some(rarity) => return Err(FilterRejection::UnknownRarity(rarity)),
			None => None,
		};
		let mut types = Vec::new();

		for raw in &self.types {
			let value = raw.trim().to_lowercase();

			if value.is_empty() {
				continue;
			}
			if !value.chars().all(|ch| ch.is_ascii_alphabetic() || ch == '-') {
				return Err(FilterRejection::InvalidType(value));
			}
			if !types.contains(&value) {
				types.push(value);
			}
		}

		Ok(NormalizedFilters { format, color_identity, max_cmc, max_price, rarity, types })
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedFilters {
	pub format: Option<String>,
	pub color_identity: BTreeSet<Color>,
	pub max_cmc: Option<f32>,
	pub max_price: Option<f32>,
	pub rarity: Option<String>,
	pub types: Vec<String>,
}
impl NormalizedFilters {
	pub fn is_empty(&self) -> bool {
		self == &Self::default()
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterRejection {
	UnknownFormat(String),
	UnknownColor(String),
	UnknownRarity(String),
	InvalidType(String),
	InvalidNumber(&'static str),
}
impl FilterRejection {
	pub fn message(&self) -> String {
		match self {
			Self::UnknownFormat(value) => format!("Unknown format filter \"{value}\"."),
			Self::UnknownColor(value) => format!("Unknown color in colorIdentity: \"{value}\"."),
			Self::UnknownRarity(value) => format!("Unknown rarity filter \"{value}\"."),
			Self::InvalidType(value) => format!("Invalid type filter \"{value}\"."),
			Self::InvalidNumber(field) =>
				format!("{field} must be a finite, non-negative number."),
		}
	}
}

fn clean(value: Option<&str>) -> Option<String> {
	value.map(|value| value.trim().to_lowercase()).filter(|value| !value.is_empty())
}

fn check_number(value: Option<f32>, field: &'static str) -> Result<Option<f32>, FilterRejection> {
	match value {
		Some(value) if !value.is_finite() || value < 0.0 =>
			Err(FilterRejection::InvalidNumber(field)),
		other => Ok(other),
	}
}

/// Accepts color names, guild names, or letter strings such as `wub`.
fn parse_colors(value: &str) -> Result<Vec<Color>, FilterRejection> {
	if let Some(Term::Color { colors, .. }) = vocab::lookup(value) {
		return Ok(colors.to_vec());
	}

	value
		.chars()
		.map(|letter| {
			Color::from_letter(letter)
				.ok_or_else(|| FilterRejection::UnknownColor(value.to_string()))
		})
		.collect()
}
