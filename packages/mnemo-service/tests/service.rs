use std::sync::Arc;

use serde_json::Map;
use time::OffsetDateTime;

use mnemo_config::Config;
use mnemo_domain::record::{MemoryCategory, MemorySourceData, ToolInvocation};
use mnemo_service::{MemoryRepository, MemoryService, Providers};
use mnemo_storage::{db::Db, vector::VectorIndex};
use mnemo_testkit::{HashEmbedding, ScriptedGeneration, TestStore, embedding_cfg, generation_cfg};

const DIMENSION: u32 = 16;

fn test_config(store: &TestStore) -> Config {
	Config {
		service: mnemo_config::Service { log_level: "info".to_string() },
		storage: mnemo_config::Storage {
			database_path: "unused-in-tests".to_string(),
			index_path: store.index_path().display().to_string(),
		},
		providers: mnemo_config::Providers {
			embedding: embedding_cfg(DIMENSION),
			generation: generation_cfg(),
		},
		capture: mnemo_config::Capture {
			require_final_response: true,
			dup_sim_threshold: 0.85,
			tag_sim_threshold: 0.75,
		},
		retrieval: mnemo_config::Retrieval {
			hybrid: mnemo_config::Hybrid {
				vector_weight: 0.6,
				keyword_weight: 0.4,
				rrf_k: 60,
				top_k: 10,
			},
			cascade: mnemo_config::Cascade {
				top_k: 5,
				max_depth: 3,
				min_score: 0.35,
				max_no_new_results: 2,
			},
		},
		importance: mnemo_config::Importance {
			frequency_weight: 0.25,
			recency_weight: 0.25,
			success_weight: 0.20,
			feedback_weight: 0.15,
			entity_weight: 0.15,
			decay_halflife_days: 30.0,
		},
	}
}

fn repository(store: &TestStore) -> Arc<MemoryRepository> {
	let db = Db { pool: store.db.pool.clone() };
	let embedding = Arc::new(HashEmbedding::new(DIMENSION as usize));

	Arc::new(MemoryRepository::from_parts(
		db,
		Some(VectorIndex::in_memory(DIMENSION as usize)),
		Some((embedding, embedding_cfg(DIMENSION))),
	))
}

fn service(store: &TestStore, generation: Arc<ScriptedGeneration>) -> MemoryService {
	let cfg = test_config(store);
	let providers =
		Providers::new(Arc::new(HashEmbedding::new(DIMENSION as usize)), generation);

	MemoryService::build(&cfg, repository(store), &providers)
}

fn source() -> MemorySourceData {
	MemorySourceData {
		goal: "organise the week".to_string(),
		user_request: "help me structure the next few days".to_string(),
		plan_checklist: "- [x] collect events".to_string(),
		scratchpad_digest: "walked the calendar and grouped events".to_string(),
		tool_invocations: Vec::new(),
		failure_log: String::new(),
		final_response_draft: Some("Here is your weekly outline.".to_string()),
		metadata: Map::new(),
	}
}

fn curator_reply(summary: &str, category: &str) -> String {
	serde_json::json!({
		"summary": summary,
		"user_intent": "help me structure the next few days",
		"outcome": "produced a weekly outline",
		"category": category,
		"tools_used": ["calendar"],
		"tags": ["planning", "success"],
	})
	.to_string()
}

#[tokio::test]
async fn uneventful_success_is_not_stored() {
	let store = TestStore::new().await.expect("test store failed");
	let generation = ScriptedGeneration::new(Vec::<String>::new());
	let service = service(&store, generation.clone());
	let result = service.capture(&source()).await.expect("capture failed");

	assert!(!result.should_store);
	assert!(!result.stored);
	assert_eq!(result.reason, "no retention signal");
	assert!(result.record_id.is_none());
	// Neither the classifier nor the curator ran.
	assert!(generation.calls().is_empty());

	let records = service.repository().list_all().await.expect("list failed");

	assert!(records.is_empty());
}

#[tokio::test]
async fn missing_final_response_short_circuits() {
	let store = TestStore::new().await.expect("test store failed");
	let generation = ScriptedGeneration::new(Vec::<String>::new());
	let service = service(&store, generation);
	let mut src = source();

	src.final_response_draft = None;
	// Even an obvious failure signal does not override the missing final
	// response.
	src.failure_log = "calendar timeout".to_string();

	let result = service.capture(&src).await.expect("capture failed");

	assert!(!result.should_store);
	assert_eq!(result.reason, "no final response");
}

#[tokio::test]
async fn pii_regex_fast_path_stores_without_classification() {
	let store = TestStore::new().await.expect("test store failed");
	// One reply only: the curator. The regex fast path must not consume a
	// classification call.
	let generation =
		ScriptedGeneration::new([curator_reply("Noted the user's contact email", "user_pattern")]);
	let service = service(&store, generation.clone());
	let mut src = source();

	src.scratchpad_digest = "noted a@b.com while drafting the reply".to_string();

	let result = service.capture(&src).await.expect("capture failed");

	assert!(result.should_store);
	assert!(result.stored);
	assert!(result.reason.contains("personal information"));
	assert_eq!(generation.calls().len(), 1);

	let record = result.record.expect("record missing");

	assert_eq!(record.category, MemoryCategory::UserPattern);
	assert_eq!(
		record.source_metadata.get("retention_reason").and_then(|v| v.as_str()),
		Some("contains personal information")
	);
	assert!(record.source_metadata.contains_key("retention_timestamp"));
	assert!(record.embedding.is_some());
}

#[tokio::test]
async fn keyword_gate_sends_bounded_prompt_and_trusts_exact_yes_only() {
	let store = TestStore::new().await.expect("test store failed");
	let generation = ScriptedGeneration::new([
		"YES".to_string(),
		curator_reply("Captured a preference", "user_pattern"),
	]);
	let service = service(&store, generation.clone());
	let mut src = source();

	src.scratchpad_digest =
		format!("user preference: dark mode. {}", "padding ".repeat(200));

	let result = service.capture(&src).await.expect("capture failed");

	assert!(result.stored);
	assert!(result.reason.contains("personal information"));

	let calls = generation.calls();

	assert_eq!(calls.len(), 2);
	// The classification prompt carries at most the bounded excerpt, not
	// the whole scratchpad.
	assert!(calls[0].len() < src.scratchpad_digest.len());

	// A hedged reply is not an exact YES and must read as no.
	let store = TestStore::new().await.expect("test store failed");
	let generation = ScriptedGeneration::new(["yes, probably".to_string()]);
	let service = self::service(&store, generation);
	let result = service.capture(&src).await.expect("capture failed");

	assert!(!result.should_store);
	assert_eq!(result.reason, "no retention signal");
}

#[tokio::test]
async fn resolved_failure_is_stored_with_reason() {
	let store = TestStore::new().await.expect("test store failed");
	let generation =
		ScriptedGeneration::new([curator_reply("Recovered from a calendar timeout", "error_solution")]);
	let service = service(&store, generation);
	let mut src = source();

	src.tool_invocations.push(ToolInvocation {
		tool: "calendar".to_string(),
		description: "list events".to_string(),
		outcome: "failed".to_string(),
		data: None,
		error_reason: Some("timeout".to_string()),
	});

	let result = service.capture(&src).await.expect("capture failed");

	assert!(result.stored);
	assert_eq!(result.reason, "resolved failure");
	assert_eq!(result.category, Some(MemoryCategory::ErrorSolution));
}

#[tokio::test]
async fn curation_failure_is_contained() {
	let store = TestStore::new().await.expect("test store failed");
	let generation = ScriptedGeneration::new(["this is not json".to_string()]);
	let service = service(&store, generation);
	let mut src = source();

	src.failure_log = "calendar timeout".to_string();

	let result = service.capture(&src).await.expect("capture must not propagate curation errors");

	assert!(result.should_store);
	assert!(!result.stored);
	assert!(result.record_id.is_none());

	let records = service.repository().list_all().await.expect("list failed");

	assert!(records.is_empty());
}

#[tokio::test]
async fn near_duplicate_capture_merges_into_existing_record() {
	let store = TestStore::new().await.expect("test store failed");
	let generation = ScriptedGeneration::new([
		curator_reply("User recorded schedule-planning experience", "full_experience"),
		curator_reply("User recorded the schedule-planning experience", "full_experience"),
	]);
	let service = service(&store, generation);
	let mut src = source();

	src.failure_log = "calendar timeout".to_string();

	let first = service.capture(&src).await.expect("first capture failed");

	assert!(first.stored);
	assert!(first.duplicate_id.is_none());

	let second = service.capture(&src).await.expect("second capture failed");

	assert!(second.stored);
	assert_eq!(second.duplicate_id, first.record_id);
	assert_eq!(second.record_id, first.record_id);

	let records = service.repository().list_all().await.expect("list failed");

	assert_eq!(records.len(), 1);
	// The longer summary survives the merge and the history records it.
	assert_eq!(records[0].summary, "User recorded the schedule-planning experience");
	assert!(records[0].source_metadata.contains_key("merge_history"));
	assert!(records[0].source_metadata.contains_key("last_merged_at"));

	let snapshot = service.metrics_snapshot();

	assert_eq!(snapshot.capture.attempts, 2);
	assert_eq!(snapshot.capture.stored, 2);
	assert_eq!(snapshot.capture.duplicates, 1);
}

#[tokio::test]
async fn retrieval_metrics_accumulate_via_the_service() {
	let store = TestStore::new().await.expect("test store failed");
	let generation = ScriptedGeneration::new(Vec::<String>::new());
	let service = service(&store, generation);

	service.record_retrieval("hybrid", 3, 10.0, true);
	service.record_retrieval("cascade", 0, 5.0, true);

	let snapshot = service.metrics_snapshot();

	assert_eq!(snapshot.retrieval.requests, 2);
	assert_eq!(snapshot.retrieval.hits, 1);
	assert_eq!(snapshot.retrieval.misses, 1);
	assert_eq!(snapshot.retrieval.operation_counts.get("hybrid"), Some(&1));
}

#[test]
fn capture_timestamp_is_rfc3339() {
	let now = OffsetDateTime::UNIX_EPOCH;
	let formatted = mnemo_storage::models::format_timestamp(now);

	assert_eq!(formatted, "1970-01-01T00:00:00Z");
}
