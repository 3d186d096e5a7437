//! Clause relaxation for queries that return nothing.

use serde::{Deserialize, Serialize};

use crate::syntax::{self, Item};

/// Removal order, most speculative first.
pub const RELAXATION_ORDER: [SpeculativeClause; 5] = [
	SpeculativeClause::Reprint,
	SpeculativeClause::FirstPrint,
	SpeculativeClause::Format,
	SpeculativeClause::ExactIdentity,
	SpeculativeClause::Price,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeculativeClause {
	Reprint,
	FirstPrint,
	Format,
	ExactIdentity,
	Price,
}
impl SpeculativeClause {
	pub fn matches(self, term: &str) -> bool {
		let term = term.to_ascii_lowercase();

		match self {
			Self::Reprint => term == "is:reprint",
			Self::FirstPrint => term == "is:firstprint" || term == "is:firstprinting",
			Self::Format => ["f:", "format:", "legal:", "f=", "format="]
				.iter()
				.any(|prefix| term.starts_with(prefix)),
			Self::ExactIdentity => ["id=", "id:", "identity=", "identity:"]
				.iter()
				.any(|prefix| term.starts_with(prefix)),
			Self::Price =>
				term.starts_with("usd<") || term.starts_with("usd>") || term.starts_with("usd="),
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Reprint => "reprint",
			Self::FirstPrint => "first_print",
			Self::Format => "format",
			Self::ExactIdentity => "exact_identity",
			Self::Price => "price",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relaxation {
	pub relaxed_query: String,
	pub removed: Vec<String>,
}

/// One cumulative step: the query after removing this category and every earlier one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelaxationPass {
	pub clause: SpeculativeClause,
	pub query: String,
	pub removed: Vec<String>,
}

/// Strips every speculative clause at once.
pub fn relax_speculative_clauses(query: &str) -> Relaxation {
	let (mut items, _) = syntax::tokenize(query);
	let mut removed = Vec::new();

	for clause in RELAXATION_ORDER {
		items = strip(items, clause, &mut removed);
	}

	if removed.is_empty() {
		return Relaxation { relaxed_query: query.trim().to_string(), removed };
	}

	Relaxation { relaxed_query: syntax::render(&syntax::tidy(items)), removed }
}

/// Per-category passes in removal order, skipping categories the query does not use.
pub fn relaxation_passes(query: &str) -> Vec<RelaxationPass> {
	let (mut items, _) = syntax::tokenize(query);
	let mut passes = Vec::new();

	for clause in RELAXATION_ORDER {
		let mut removed = Vec::new();

		items = strip(items, clause, &mut removed);

		if removed.is_empty() {
			continue;
		}

		items = syntax::tidy(items);

		passes.push(RelaxationPass { clause, query: syntax::render(&items), removed });
	}

	passes
}

/// Whether the query carries at least one `key:value` clause other than the game filter.
pub fn has_filter_clause(query: &str) -> bool {
	let (items, _) = syntax::tokenize(query);

	items.iter().any(|item| match item {
		Item::Term(term) => syntax::term_key(term).is_some_and(|key| key != "game"),
		_ => false,
	})
}

fn strip(items: Vec<Item>, clause: SpeculativeClause, removed: &mut Vec<String>) -> Vec<Item> {
	items
		.into_iter()
		.filter(|item| match item {
			Item::Term(term) if clause.matches(term) => {
				removed.push(term.clone());

				false
			},
			_ => true,
		})
		.collect()
}
