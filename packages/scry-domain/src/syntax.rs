//! Sanitizer for compiled search syntax and spam checks for raw input.
//!
//! The sanitizer works on a quote-aware, paren-aware token stream. Repairs only ever remove
//! whole items or close a dangling quote, so a repaired query is balanced by construction.

use serde::{Deserialize, Serialize};

/// Search keys the external syntax understands, short and long forms.
pub const ALLOWED_KEYS: &[&str] = &[
	"a", "art", "artist", "atag", "arttag", "b", "banned", "block", "border", "c", "cmc", "cn",
	"color", "commander", "ci", "cube", "date", "devotion", "direction", "e", "edition", "eur",
	"f", "flavor", "fo", "format", "frame", "ft", "fulloracle", "function", "game", "has", "id",
	"identity", "in", "include", "is", "keyword", "kw", "lang", "language", "legal", "loy",
	"loyalty", "m", "mana", "manavalue", "mv", "name", "new", "not", "number", "o", "oracle",
	"oracletag", "order", "otag", "pow", "power", "powtou", "prefer", "prints", "produces",
	"pt", "r", "rarity", "restricted", "s", "set", "sets", "st", "stamp", "t", "tix", "tou",
	"toughness", "type", "unique", "usd", "watermark", "wildpair", "wm", "year",
];

const OPERATORS: &[&str] = &["!=", "<=", ">=", ":", "=", "<", ">"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxReport {
	pub valid: bool,
	pub sanitized: String,
	pub issues: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Item {
	Open,
	Close,
	Term(String),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputLimits {
	pub max_chars: usize,
	pub max_repeated_chars: usize,
	pub min_alnum_ratio: f32,
}
impl InputLimits {
	pub fn from_config(cfg: &scry_config::CompilerInput) -> Self {
		Self {
			max_chars: cfg.max_chars as usize,
			max_repeated_chars: cfg.max_repeated_chars as usize,
			min_alnum_ratio: cfg.min_alnum_ratio,
		}
	}
}
impl Default for InputLimits {
	fn default() -> Self {
		Self::from_config(&scry_config::CompilerInput::default())
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputRejection {
	Empty,
	TooLong { max_chars: usize },
	RepeatedCharacters,
	LowSignal,
}
impl InputRejection {
	pub fn message(&self) -> String {
		match self {
			Self::Empty => "Query must be non-empty.".to_string(),
			Self::TooLong { max_chars } => format!("Query must be at most {max_chars} characters."),
			Self::RepeatedCharacters => "Query contains too many repeated characters.".to_string(),
			Self::LowSignal => "Query contains too few letters or digits.".to_string(),
		}
	}
}

pub fn is_allowed_key(key: &str) -> bool {
	ALLOWED_KEYS.contains(&key)
}

/// The key of a `key:value` style term, if the term has one.
pub fn term_key(term: &str) -> Option<&str> {
	let body = term.strip_prefix('-').unwrap_or(term);
	let key_len = body.chars().take_while(char::is_ascii_alphabetic).count();

	if key_len == 0 {
		return None;
	}

	let rest = &body[key_len..];

	OPERATORS.iter().any(|op| rest.starts_with(op)).then(|| &body[..key_len])
}

fn term_value(term: &str) -> &str {
	let body = term.strip_prefix('-').unwrap_or(term);
	let key_len = body.chars().take_while(char::is_ascii_alphabetic).count();
	let rest = &body[key_len..];

	OPERATORS
		.iter()
		.find_map(|op| rest.strip_prefix(op))
		.unwrap_or(rest)
}

pub fn check_input(text: &str, limits: &InputLimits) -> Result<(), InputRejection> {
	let trimmed = text.trim();

	if trimmed.is_empty() {
		return Err(InputRejection::Empty);
	}
	if trimmed.chars().count() > limits.max_chars {
		return Err(InputRejection::TooLong { max_chars: limits.max_chars });
	}

	let mut run = 0;
	let mut last = None;

	for ch in trimmed.chars() {
		if Some(ch) == last {
			run += 1;
		} else {
			run = 1;
			last = Some(ch);
		}

		if run >= limits.max_repeated_chars {
			return Err(InputRejection::RepeatedCharacters);
		}
	}

	let visible = trimmed.chars().filter(|ch| !ch.is_whitespace()).count();
	let alnum = trimmed.chars().filter(|ch| ch.is_alphanumeric()).count();

	if visible > 0 && (alnum as f32 / visible as f32) < limits.min_alnum_ratio {
		return Err(InputRejection::LowSignal);
	}

	Ok(())
}

/// Quotes are even and parentheses outside quotes nest properly.
pub fn is_balanced(query: &str) -> bool {
	let mut depth = 0_i32;
	let mut in_quote = false;

	for ch in query.chars() {
		match ch {
			'"' => in_quote = !in_quote,
			'(' if !in_quote => depth += 1,
			')' if !in_quote => {
				depth -= 1;

				if depth < 0 {
					return false;
				}
			},
			_ => {},
		}
	}

	!in_quote && depth == 0
}

/// Number of `key:value` terms in a query.
pub fn parameter_count(query: &str) -> usize {
	let (items, _) = tokenize(query);

	keyed_terms(&items)
}

/// `or` outside every parenthesized group, which would bind looser than the implicit `and`.
pub fn has_top_level_or(query: &str) -> bool {
	let (items, _) = tokenize(query);
	let mut depth = 0_usize;

	for item in &items {
		match item {
			Item::Open => depth += 1,
			Item::Close => depth = depth.saturating_sub(1),
			Item::Term(term) if depth == 0 && term.eq_ignore_ascii_case("or") => return true,
			Item::Term(_) => {},
		}
	}

	false
}

/// Wraps a fragment in parentheses when it has a top-level `or`, so it can be joined with other
/// clauses without changing its meaning.
pub fn group_disjunction(fragment: &str) -> String {
	if has_top_level_or(fragment) { format!("({fragment})") } else { fragment.to_string() }
}

pub fn validate_syntax(query: &str, max_params: usize) -> SyntaxReport {
	let mut issues = Vec::new();
	let (items, closed_quote) = tokenize(query);

	let unknown: Vec<&str> = items
		.iter()
		.filter_map(|item| match item {
			Item::Term(term) => term_key(term).filter(|key| !is_allowed_key(key)),
			_ => None,
		})
		.collect();

	if !unknown.is_empty() {
		for key in unknown {
			issues.push(format!("Unknown search key \"{key}\"."));
		}

		return SyntaxReport {
			valid: false,
			sanitized: query.split_whitespace().collect::<Vec<_>>().join(" "),
			issues,
		};
	}

	if closed_quote {
		issues.push("Closed an unterminated quote.".to_string());
	}

	let items = repair_parens(items, &mut issues);
	let items = drop_empty_values(items, &mut issues);
	let items = dedup_top_level(items, &mut issues);
	let items = enforce_ceiling(items, max_params, &mut issues);
	let items = tidy(items);

	SyntaxReport { valid: true, sanitized: render(&items), issues }
}

pub(crate) fn tokenize(query: &str) -> (Vec<Item>, bool) {
	let mut items = Vec::new();
	let mut current = String::new();
	let mut in_quote = false;

	for ch in query.chars() {
		if in_quote {
			current.push(ch);

			if ch == '"' {
				in_quote = false;
			}

			continue;
		}

		match ch {
			'"' => {
				in_quote = true;

				current.push(ch);
			},
			'(' | ')' => {
				flush_term(&mut current, &mut items);
				items.push(if ch == '(' { Item::Open } else { Item::Close });
			},
			ch if ch.is_whitespace() => flush_term(&mut current, &mut items),
			ch => current.push(ch),
		}
	}

	if in_quote {
		current.push('"');
	}

	flush_term(&mut current, &mut items);

	(items, in_quote)
}

pub(crate) fn render(items: &[Item]) -> String {
	let mut out = String::new();
	let mut previous: Option<&Item> = None;

	for item in items {
		let glue = match (previous, item) {
			(None, _) => true,
			(Some(Item::Open), _) => true,
			(_, Item::Close) => true,
			(Some(Item::Term(term)), Item::Open) if term == "-" => true,
			_ => false,
		};

		if !glue {
			out.push(' ');
		}

		match item {
			Item::Open => out.push('('),
			Item::Close => out.push(')'),
			Item::Term(term) => out.push_str(term),
		}

		previous = Some(item);
	}

	out
}

/// Removes connectives left dangling by other removals, then empty groups, until stable.
pub(crate) fn tidy(mut items: Vec<Item>) -> Vec<Item> {
	loop {
		let before = items.len();

		items = drop_dangling_connectives(items);
		items = drop_empty_groups(items);

		if items.len() == before {
			return items;
		}
	}
}

fn flush_term(current: &mut String, items: &mut Vec<Item>) {
	if !current.is_empty() {
		items.push(Item::Term(std::mem::take(current)));
	}
}

fn is_connective(item: &Item) -> bool {
	matches!(
		item,
		Item::Term(term) if term.eq_ignore_ascii_case("or") || term.eq_ignore_ascii_case("and")
	)
}

fn keyed_terms(items: &[Item]) -> usize {
	items
		.iter()
		.filter(|item| matches!(item, Item::Term(term) if term_key(term).is_some()))
		.count()
}

fn repair_parens(items: Vec<Item>, issues: &mut Vec<String>) -> Vec<Item> {
	let mut keep = vec![true; items.len()];
	let mut open = Vec::new();
	let mut stray_close = 0;

	for (idx, item) in items.iter().enumerate() {
		match item {
			Item::Open => open.push(idx),
			Item::Close =>
				if open.pop().is_none() {
					keep[idx] = false;
					stray_close += 1;
				},
			Item::Term(_) => {},
		}
	}

	for idx in &open {
		keep[*idx] = false;
	}

	if stray_close > 0 {
		issues.push(format!("Removed {stray_close} unmatched closing parenthesis."));
	}
	if !open.is_empty() {
		issues.push(format!("Removed {} unmatched opening parenthesis.", open.len()));
	}

	items.into_iter().zip(keep).filter_map(|(item, keep)| keep.then_some(item)).collect()
}

fn drop_empty_values(items: Vec<Item>, issues: &mut Vec<String>) -> Vec<Item> {
	items
		.into_iter()
		.filter(|item| {
			let Item::Term(term) = item else {
				return true;
			};

			if term_key(term).is_none() {
				return true;
			}

			let value = term_value(term);

			if value.is_empty() || value == "\"\"" {
				issues.push(format!("Removed empty search parameter \"{term}\"."));

				return false;
			}

			true
		})
		.collect()
}

fn dedup_top_level(items: Vec<Item>, issues: &mut Vec<String>) -> Vec<Item> {
	let mut seen: Vec<String> = Vec::new();
	let mut depth = 0_usize;
	let mut out = Vec::with_capacity(items.len());

	for item in items {
		match &item {
			Item::Open => depth += 1,
			Item::Close => depth = depth.saturating_sub(1),
			Item::Term(term) if depth == 0 && !is_connective(&item) => {
				let folded = term.to_lowercase();

				if seen.contains(&folded) {
					issues.push(format!("Removed duplicate parameter \"{term}\"."));

					continue;
				}

				seen.push(folded);
			},
			Item::Term(_) => {},
		}

		out.push(item);
	}

	out
}

fn enforce_ceiling(items: Vec<Item>, max_params: usize, issues: &mut Vec<String>) -> Vec<Item> {
	let mut total = keyed_terms(&items);

	if total <= max_params {
		return items;
	}

	// Top-level units: a single term or a whole parenthesized group.
	let mut units: Vec<(usize, usize)> = Vec::new();
	let mut depth = 0_usize;
	let mut start = 0;

	for (idx, item) in items.iter().enumerate() {
		match item {
			Item::Open => {
				if depth == 0 {
					start = idx;
				}

				depth += 1;
			},
			Item::Close => {
				depth = depth.saturating_sub(1);

				if depth == 0 {
					units.push((start, idx + 1));
				}
			},
			Item::Term(_) =>
				if depth == 0 {
					units.push((idx, idx + 1));
				},
		}
	}

	let mut cut = items.len();

	while total > max_params {
		let Some((start, end)) = units.pop() else {
			break;
		};

		total -= keyed_terms(&items[start..end]);
		cut = start;
	}

	issues.push(format!("Truncated query to {max_params} search parameters."));

	let mut items = items;

	items.truncate(cut);

	items
}

fn drop_dangling_connectives(items: Vec<Item>) -> Vec<Item> {
	let mut out: Vec<Item> = Vec::with_capacity(items.len());

	for (idx, item) in items.iter().enumerate() {
		if is_connective(item) {
			let after_gap = match out.last() {
				None | Some(Item::Open) => true,
				Some(previous) => is_connective(previous),
			};
			let before_gap = matches!(items.get(idx + 1), None | Some(Item::Close));

			if after_gap || before_gap {
				continue;
			}
		}

		out.push(item.clone());
	}

	out
}

fn drop_empty_groups(items: Vec<Item>) -> Vec<Item> {
	let mut out: Vec<Item> = Vec::with_capacity(items.len());

	for item in items {
		if item == Item::Close && out.last() == Some(&Item::Open) {
			out.pop();

			if out.last() == Some(&Item::Term("-".to_string())) {
				out.pop();
			}

			continue;
		}

		out.push(item);
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn term_keys_cover_every_operator() {
		assert_eq!(term_key("t:creature"), Some("t"));
		assert_eq!(term_key("-is:reprint"), Some("is"));
		assert_eq!(term_key("usd<=5"), Some("usd"));
		assert_eq!(term_key("o:\"draw a card\""), Some("o"));
		assert_eq!(term_key("lightning"), None);
		assert_eq!(term_key("+1/+1"), None);
	}

	#[test]
	fn unterminated_quote_is_closed() {
		let report = validate_syntax("o:\"draw a card", 15);

		assert!(report.valid);
		assert_eq!(report.sanitized, "o:\"draw a card\"");
		assert!(is_balanced(&report.sanitized));
	}

	#[test]
	fn stray_parens_are_stripped() {
		let report = validate_syntax("(c:r or c:g t:creature) )", 15);

		assert!(report.valid);
		assert_eq!(report.sanitized, "(c:r or c:g t:creature)");

		let report = validate_syntax("((c:r or c:g) t:creature", 15);

		assert_eq!(report.sanitized, "(c:r or c:g) t:creature");
	}

	#[test]
	fn unknown_keys_are_terminal() {
		let report = validate_syntax("t:creature foo:bar", 15);

		assert!(!report.valid);
		assert!(report.issues.iter().any(|issue| issue.contains("Unknown search key")));
	}

	#[test]
	fn duplicates_collapse_at_top_level_only() {
		let report = validate_syntax("t:elf t:elf (t:elf or t:goblin)", 15);

		assert_eq!(report.sanitized, "t:elf (t:elf or t:goblin)");
	}

	#[test]
	fn empty_values_are_removed() {
		let report = validate_syntax("t: c:r o:\"\"", 15);

		assert_eq!(report.sanitized, "c:r");
		assert_eq!(report.issues.len(), 2);
	}

	#[test]
	fn parameter_ceiling_truncates_whole_units() {
		let report = validate_syntax("t:elf c:g (mv<=2 or mv>=6) f:modern", 3);

		assert_eq!(report.sanitized, "t:elf c:g");
		assert!(parameter_count(&report.sanitized) <= 3);
	}

	#[test]
	fn dangling_connectives_are_removed() {
		let report = validate_syntax("or t:elf or", 15);

		assert_eq!(report.sanitized, "t:elf");
	}

	#[test]
	fn spam_heuristics_reject_bad_input() {
		let limits = InputLimits::default();

		assert_eq!(check_input("   ", &limits), Err(InputRejection::Empty));
		assert_eq!(
			check_input(&"a".repeat(501), &limits),
			Err(InputRejection::TooLong { max_chars: 500 })
		);
		assert_eq!(check_input("reddddddd", &limits), Err(InputRejection::RepeatedCharacters));
		assert_eq!(check_input("!!?? $$ ## ok", &limits), Err(InputRejection::LowSignal));
		assert_eq!(check_input("red creatures with +1/+1 counters", &limits), Ok(()));
	}

	#[test]
	fn disjunctions_are_grouped_before_joining() {
		assert!(has_top_level_or("t:elf or t:goblin"));
		assert!(!has_top_level_or("(t:elf or t:goblin) c:g"));
		assert!(!has_top_level_or("o:\"draw or discard\""));
		assert_eq!(group_disjunction("t:elf or t:goblin"), "(t:elf or t:goblin)");
		assert_eq!(group_disjunction("(t:elf or t:goblin) c:g"), "(t:elf or t:goblin) c:g");
		assert_eq!(group_disjunction("t:elf"), "t:elf");
	}

	#[test]
	fn balance_detection() {
		assert!(is_balanced("(a (b)) \"x)\""));
		assert!(!is_balanced("(a"));
		assert!(!is_balanced(")a("));
		assert!(!is_balanced("\"a"));
	}
}
