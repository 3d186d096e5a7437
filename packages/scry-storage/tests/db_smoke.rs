use serde_json::json;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use scry_config::Postgres;
use scry_storage::{
	cache, db::Db, feedback, logs,
	models::{FeedbackRow, QueryCacheRow, TranslationLogRow, TranslationRuleRow},
	rules,
};
use scry_testkit::TestDatabase;

async fn bootstrap(test_db: &TestDatabase) -> Db {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	db
}

fn pending_feedback(query: &str) -> FeedbackRow {
	FeedbackRow {
		id: Uuid::new_v4(),
		original_query: query.to_string(),
		translated_query: Some("t:creature".to_string()),
		issue_description: "Should use `otag:synergy-token`.".to_string(),
		processing_status: "pending".to_string(),
		generated_rule_id: None,
		last_error: None,
		created_at: OffsetDateTime::now_utc(),
		processed_at: None,
		lease_until: None,
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set SCRY_PG_DSN to run."]
async fn schema_bootstrap_is_repeatable() {
	let Some(base_dsn) = scry_testkit::env_dsn() else {
		eprintln!("Skipping schema_bootstrap_is_repeatable; set SCRY_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	db.ensure_schema().await.expect("Second bootstrap must succeed.");

	for table in ["query_cache", "translation_rules", "search_feedback", "translation_logs"] {
		let count: i64 = sqlx::query_scalar(
			"SELECT count(*) FROM information_schema.tables WHERE table_name = $1",
		)
		.bind(table)
		.fetch_one(&db.pool)
		.await
		.expect("Failed to query schema tables.");

		assert_eq!(count, 1, "Missing table {table}.");
	}

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set SCRY_PG_DSN to run."]
async fn cache_hits_are_counted_and_expired_rows_purged() {
	let Some(base_dsn) = scry_testkit::env_dsn() else {
		eprintln!("Skipping cache_hits_are_counted_and_expired_rows_purged; set SCRY_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let now = OffsetDateTime::now_utc();
	let live = QueryCacheRow {
		query_hash: "live".to_string(),
		normalized_query: "red creatures".to_string(),
		scryfall_query: "c:r t:creature game:paper".to_string(),
		confidence: 1.0,
		explanation: json!({ "readable": "Red creatures.", "assumptions": [] }),
		source: "deterministic".to_string(),
		show_affiliate: false,
		hit_count: 0,
		last_hit_at: None,
		created_at: now,
		expires_at: now + Duration::hours(1),
	};
	let stale = QueryCacheRow {
		query_hash: "stale".to_string(),
		expires_at: now - Duration::seconds(1),
		..live.clone()
	};

	cache::upsert_cache_entry(&db.pool, &live).await.expect("Failed to insert live entry.");
	cache::upsert_cache_entry(&db.pool, &stale).await.expect("Failed to insert stale entry.");

	let first = cache::hit_cache_entry(&db.pool, "live", now).await.expect("Lookup failed.");
	let second = cache::hit_cache_entry(&db.pool, "live", now).await.expect("Lookup failed.");

	assert_eq!(first.map(|row| row.hit_count), Some(1));
	assert_eq!(second.map(|row| row.hit_count), Some(2));
	let stale = cache::hit_cache_entry(&db.pool, "stale", now).await.expect("Lookup failed.");

	assert!(stale.is_none());
	assert_eq!(cache::purge_expired_cache(&db.pool, now).await.expect("Purge failed."), 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set SCRY_PG_DSN to run."]
async fn feedback_claims_are_exclusive() {
	let Some(base_dsn) = scry_testkit::env_dsn() else {
		eprintln!("Skipping feedback_claims_are_exclusive; set SCRY_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let item = pending_feedback("white creatures that go wide");

	feedback::insert_feedback(&db.pool, &item).await.expect("Failed to insert feedback.");

	assert!(
		!feedback::finish_feedback(&db.pool, item.id, "completed", None, None, item.created_at)
			.await
			.expect("Finish failed."),
		"Pending items must be claimed before they finish."
	);

	let lease_until = OffsetDateTime::now_utc() + Duration::minutes(5);
	let claimed = feedback::claim_next_pending_feedback(&db, lease_until)
		.await
		.expect("Claim failed.")
		.expect("Pending item must be claimable.");

	assert_eq!(claimed.id, item.id);
	assert!(claimed.lease_until.is_some());
	assert!(
		feedback::claim_next_pending_feedback(&db, lease_until)
			.await
			.expect("Claim failed.")
			.is_none()
	);

	let rule = TranslationRuleRow {
		id: Uuid::new_v4(),
		pattern: "white creatures that go wide".to_string(),
		scryfall_syntax: "otag:synergy-token".to_string(),
		scryfall_templates: Vec::new(),
		aliases: Vec::new(),
		confidence: 0.7,
		priority: 50,
		category: "mechanic".to_string(),
		is_active: false,
		source_feedback_id: Some(item.id),
		created_at: item.created_at,
		updated_at: item.created_at,
	};

	rules::insert_rule(&db.pool, &rule).await.expect("Failed to insert rule.");

	assert!(
		feedback::finish_feedback(
			&db.pool,
			item.id,
			"completed",
			Some(rule.id),
			None,
			OffsetDateTime::now_utc()
		)
		.await
		.expect("Finish failed.")
	);
	assert!(
		!feedback::transition_feedback(&db.pool, item.id, &["failed", "skipped"], "pending")
			.await
			.expect("Transition failed.")
	);

	let stored = feedback::get_feedback(&db.pool, item.id)
		.await
		.expect("Lookup failed.")
		.expect("Feedback must exist.");

	assert_eq!(stored.processing_status, "completed");
	assert_eq!(stored.generated_rule_id, Some(rule.id));
	assert!(stored.processed_at.is_some());
	assert!(stored.lease_until.is_none());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set SCRY_PG_DSN to run."]
async fn expired_claims_fail_and_can_be_retriggered() {
	let Some(base_dsn) = scry_testkit::env_dsn() else {
		eprintln!(
			"Skipping expired_claims_fail_and_can_be_retriggered; set SCRY_PG_DSN to run this test."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let item = pending_feedback("green ramp spells");
	let now = OffsetDateTime::now_utc();

	feedback::insert_feedback(&db.pool, &item).await.expect("Failed to insert feedback.");

	assert!(
		feedback::claim_feedback(&db.pool, item.id, now + Duration::seconds(30))
			.await
			.expect("Claim failed.")
	);
	assert!(
		feedback::fail_expired_claims(&db.pool, now, "Claim lease expired.")
			.await
			.expect("Reclaim failed.")
			.is_empty(),
		"A live lease must not be reclaimed."
	);

	let reclaimed =
		feedback::fail_expired_claims(&db.pool, now + Duration::minutes(1), "Claim lease expired.")
			.await
			.expect("Reclaim failed.");

	assert_eq!(reclaimed, vec![item.id]);
	assert!(
		!feedback::finish_feedback(&db.pool, item.id, "completed", None, None, now)
			.await
			.expect("Finish failed."),
		"A reclaimed item must not finish."
	);

	let stored = feedback::get_feedback(&db.pool, item.id)
		.await
		.expect("Lookup failed.")
		.expect("Feedback must exist.");

	assert_eq!(stored.processing_status, "failed");
	assert_eq!(stored.last_error.as_deref(), Some("Claim lease expired."));
	assert!(stored.lease_until.is_none());
	assert!(
		feedback::transition_feedback(&db.pool, item.id, &["failed"], "pending")
			.await
			.expect("Transition failed.")
	);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set SCRY_PG_DSN to run."]
async fn rules_toggle_and_list_by_priority() {
	let Some(base_dsn) = scry_testkit::env_dsn() else {
		eprintln!("Skipping rules_toggle_and_list_by_priority; set SCRY_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let now = OffsetDateTime::now_utc();
	let low = TranslationRuleRow {
		id: Uuid::new_v4(),
		pattern: "mana rocks".to_string(),
		scryfall_syntax: "t:artifact otag:mana-rock".to_string(),
		scryfall_templates: Vec::new(),
		aliases: vec!["rocks".to_string()],
		confidence: 0.8,
		priority: 10,
		category: "composite".to_string(),
		is_active: true,
		source_feedback_id: None,
		created_at: now,
		updated_at: now,
	};
	let high = TranslationRuleRow {
		id: Uuid::new_v4(),
		pattern: "{n} or more power".to_string(),
		scryfall_syntax: "pow>={n}".to_string(),
		priority: 90,
		category: "stats".to_string(),
		aliases: Vec::new(),
		..low.clone()
	};

	rules::insert_rule(&db.pool, &low).await.expect("Failed to insert rule.");
	rules::insert_rule(&db.pool, &high).await.expect("Failed to insert rule.");

	let active = rules::list_active_rules(&db.pool).await.expect("List failed.");

	assert_eq!(active.iter().map(|rule| rule.id).collect::<Vec<_>>(), vec![high.id, low.id]);
	assert!(rules::set_rule_active(&db.pool, low.id, false, now).await.expect("Toggle failed."));
	assert!(rules::set_rule_active(&db.pool, low.id, false, now).await.expect("Toggle failed."));
	assert!(
		!rules::set_rule_active(&db.pool, Uuid::new_v4(), true, now).await.expect("Toggle failed.")
	);
	assert_eq!(rules::list_active_rules(&db.pool).await.expect("List failed.").len(), 1);

	let log = TranslationLogRow {
		id: Uuid::new_v4(),
		natural_language_query: "mana rocks".to_string(),
		translated_query: "t:artifact otag:mana-rock game:paper".to_string(),
		confidence_score: 0.8,
		response_time_ms: 12,
		source: "pattern_match".to_string(),
		fallback_used: false,
		model_used: None,
		validation_issues: Vec::new(),
		quality_flags: vec!["rule_match".to_string()],
		created_at: now,
	};

	logs::insert_translation_log(&db.pool, &log).await.expect("Failed to insert log.");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
