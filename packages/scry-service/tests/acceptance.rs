use scry_domain::{feedback::FeedbackStatus, result::TranslationSource};
use scry_service::{FeedbackRequest, RequestContext, ScryService, TranslateRequest, store::Stores};
use scry_testkit::TestDatabase;

async fn postgres_service(test_db: &TestDatabase) -> ScryService {
	let cfg = scry_testkit::postgres_config(test_db.dsn()).expect("Test config must be valid.");
	let stores = Stores::open(&cfg).await.expect("Failed to open Postgres stores.");

	ScryService::new(cfg, stores).expect("Failed to build service.")
}

fn ctx() -> RequestContext {
	RequestContext {
		session_id: Some("acceptance".to_string()),
		client_ip: "10.1.0.1".to_string(),
	}
}

fn request(query: &str) -> TranslateRequest {
	TranslateRequest { query: query.to_string(), filters: None, use_cache: None }
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set SCRY_PG_DSN to run."]
async fn translations_are_cached_and_logged_in_postgres() {
	let Some(base_dsn) = scry_testkit::env_dsn() else {
		eprintln!(
			"Skipping translations_are_cached_and_logged_in_postgres; set SCRY_PG_DSN to run this \
			 test."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = postgres_service(&test_db).await;
	let first = service.translate(request("red creatures"), &ctx()).await.expect("First call.");
	let second = service.translate(request("Red   Creatures"), &ctx()).await.expect("Cached call.");

	assert_eq!(first.source, TranslationSource::Deterministic);
	assert_eq!(second.source, TranslationSource::Cache);
	assert_eq!(second.scryfall_query, first.scryfall_query);
	assert_eq!(second.original_query, "Red   Creatures");

	test_db.cleanup().await.expect("Failed to clean up test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set SCRY_PG_DSN to run."]
async fn feedback_becomes_an_active_rule_in_postgres() {
	let Some(base_dsn) = scry_testkit::env_dsn() else {
		eprintln!(
			"Skipping feedback_becomes_an_active_rule_in_postgres; set SCRY_PG_DSN to run this \
			 test."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = postgres_service(&test_db).await;
	let receipt = service
		.submit_feedback(FeedbackRequest {
			original_query: "white creatures that go wide".to_string(),
			translated_query: Some("c:w t:creature game:paper".to_string()),
			issue_description: "Should include otag:synergy-token".to_string(),
		})
		.await
		.expect("Failed to submit feedback.");
	let outcome = service
		.process_next_feedback()
		.await
		.expect("Failed to process feedback.")
		.expect("A pending item must be claimed.");

	assert_eq!(outcome.id, receipt.id);
	assert_eq!(outcome.status, FeedbackStatus::Completed);
	assert!(service.process_next_feedback().await.expect("Queue read.").is_none());

	let rule_id = outcome.generated_rule_id.expect("Completed feedback links its rule.");

	service.set_rule_active(rule_id, true).await.expect("Failed to activate rule.");

	let mut req = request("white creatures that go wide");

	req.use_cache = Some(false);

	let result = service.translate(req, &ctx()).await.expect("Failed to translate.");

	assert_eq!(result.source, TranslationSource::PatternMatch);
	assert!(result.scryfall_query.contains("otag:synergy-token"));

	test_db.cleanup().await.expect("Failed to clean up test database.");
}
