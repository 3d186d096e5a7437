pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_search_feedback.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_search_feedback.sql")),
				"tables/002_translation_rules.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_translation_rules.sql")),
				"tables/003_feedback_rule_link.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_feedback_rule_link.sql")),
				"tables/004_query_cache.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_query_cache.sql")),
				"tables/005_translation_logs.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_translation_logs.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn includes_are_expanded() {
		let sql = render_schema();

		assert!(!sql.contains("\\ir "));

		for table in ["search_feedback", "translation_rules", "query_cache", "translation_logs"] {
			assert!(
				sql.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")),
				"Missing table {table}."
			);
		}
	}

	#[test]
	fn statements_split_cleanly() {
		let sql = render_schema();
		let statements = sql.split(';').map(str::trim).filter(|s| !s.is_empty()).count();

		assert!(statements >= 10);
		assert!(!sql.contains("$$"));
	}
}
