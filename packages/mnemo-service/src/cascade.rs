use std::{
	collections::{HashSet, VecDeque},
	sync::Arc,
	time::Instant,
};

use serde_json::Value;
use uuid::Uuid;

use mnemo_config::GenerationProviderConfig;
use mnemo_domain::record::MemoryRecord;

use crate::{GenerationProvider, MemoryRepository, Result};

const MAX_FOLLOW_UP_QUERIES: usize = 3;
const FALLBACK_REASON: &str = "score_above_threshold";

/// One accepted memory from a cascaded run.
#[derive(Debug)]
pub struct CascadedMatch {
	pub record: MemoryRecord,
	pub score: f32,
	pub reason: Option<String>,
}

/// Telemetry produced per worklist iteration, in order.
#[derive(Debug, Clone)]
pub struct IterationMetrics {
	pub query: String,
	pub depth: u32,
	pub total_candidates: usize,
	pub kept: usize,
	pub follow_up_queries: Vec<String>,
	pub duration_ms: f64,
}

#[derive(Debug)]
pub struct CascadedResult {
	pub matches: Vec<CascadedMatch>,
	pub iterations: Vec<IterationMetrics>,
}

struct FilterOutcome {
	keep: Vec<(MemoryRecord, f32, Option<String>)>,
	follow_up_queries: Vec<String>,
}

/// Expands one query into a bounded, LLM-guided breadth-first search over
/// the repository. Matches accumulate unordered; there is no cross-hop
/// re-ranking. Total call count is bounded by depth and breadth, not
/// wall-clock time.
pub struct CascadedRetriever {
	repository: Arc<MemoryRepository>,
	generation: Arc<dyn GenerationProvider>,
	generation_cfg: GenerationProviderConfig,
	cfg: mnemo_config::Cascade,
}
impl CascadedRetriever {
	pub fn new(
		repository: Arc<MemoryRepository>,
		generation: Arc<dyn GenerationProvider>,
		generation_cfg: GenerationProviderConfig,
		cfg: mnemo_config::Cascade,
	) -> Self {
		Self { repository, generation, generation_cfg, cfg }
	}

	pub async fn retrieve(&self, user_request: &str) -> Result<CascadedResult> {
		let mut pending: VecDeque<(String, u32)> = VecDeque::new();
		let mut visited: HashSet<String> = HashSet::new();
		let mut seen_ids: HashSet<Uuid> = HashSet::new();
		let mut matches: Vec<CascadedMatch> = Vec::new();
		let mut iterations: Vec<IterationMetrics> = Vec::new();
		let mut no_new_results = 0_u32;

		pending.push_back((user_request.to_string(), 0));

		while let Some((query, depth)) = pending.pop_front() {
			let query = query.trim().to_string();

			if query.is_empty() || !visited.insert(query.to_lowercase()) {
				continue;
			}
			if depth >= self.cfg.max_depth {
				tracing::debug!(query = %query, depth, "Max depth reached; pruned.");

				continue;
			}

			let started = Instant::now();
			let candidates = self.repository.search(&query, self.cfg.top_k).await?;
			let duration_ms = started.elapsed().as_secs_f64() * 1_000.0;
			let mut metrics = IterationMetrics {
				query: query.clone(),
				depth,
				total_candidates: candidates.len(),
				kept: 0,
				follow_up_queries: Vec::new(),
				duration_ms,
			};

			if candidates.is_empty() {
				iterations.push(metrics);

				no_new_results += 1;

				if no_new_results >= self.cfg.max_no_new_results {
					break;
				}

				continue;
			}

			let filtered = self.filter_candidates(user_request, &query, depth, &candidates).await;
			let mut new_matches = 0_usize;

			for (record, score, reason) in filtered.keep {
				let Some(record_id) = record.id else {
					continue;
				};

				// Defense in depth: the filter may keep a low-scoring or
				// already-matched candidate; neither becomes a match.
				if score < self.cfg.min_score || !seen_ids.insert(record_id) {
					continue;
				}

				matches.push(CascadedMatch { record, score, reason });

				new_matches += 1;
			}

			metrics.kept = new_matches;
			metrics.follow_up_queries = filtered.follow_up_queries.clone();

			iterations.push(metrics);

			if new_matches == 0 {
				no_new_results += 1;
			} else {
				no_new_results = 0;
			}

			if no_new_results >= self.cfg.max_no_new_results {
				break;
			}

			for follow_up in filtered.follow_up_queries {
				if visited.contains(&follow_up.to_lowercase()) {
					continue;
				}

				pending.push_back((follow_up, depth + 1));
			}
		}

		Ok(CascadedResult { matches, iterations })
	}

	async fn filter_candidates(
		&self,
		user_request: &str,
		query: &str,
		depth: u32,
		candidates: &[(MemoryRecord, f32)],
	) -> FilterOutcome {
		let prompt = render_filter_prompt(user_request, query, depth, candidates);
		let reply = match self.generation.generate(&self.generation_cfg, &prompt).await {
			Ok(reply) => reply,
			Err(err) => {
				tracing::warn!(error = %err, "Cascade filter call failed; score-threshold fallback.");

				return self.fallback_filter(candidates);
			},
		};
		let Ok(parsed) = serde_json::from_str::<Value>(reply.trim()) else {
			tracing::warn!("Cascade filter returned non-JSON; score-threshold fallback.");

			return self.fallback_filter(candidates);
		};
		let keep = collect_keep_entries(&parsed, candidates);
		let follow_up_queries = collect_follow_up_queries(&parsed);

		if keep.is_empty() {
			let fallback = self.fallback_filter(candidates);

			return FilterOutcome { keep: fallback.keep, follow_up_queries };
		}

		FilterOutcome { keep, follow_up_queries }
	}

	/// Deterministic local recovery: keep every candidate at or above the
	/// score threshold, no follow-ups.
	fn fallback_filter(&self, candidates: &[(MemoryRecord, f32)]) -> FilterOutcome {
		let keep = candidates
			.iter()
			.filter(|(_, score)| *score >= self.cfg.min_score)
			.map(|(record, score)| {
				(record.clone(), *score, Some(FALLBACK_REASON.to_string()))
			})
			.collect();

		FilterOutcome { keep, follow_up_queries: Vec::new() }
	}
}

fn render_filter_prompt(
	user_request: &str,
	query: &str,
	depth: u32,
	candidates: &[(MemoryRecord, f32)],
) -> String {
	let payload: Vec<Value> = candidates
		.iter()
		.map(|(record, score)| {
			serde_json::json!({
				"id": record.id.map(|id| id.to_string()).unwrap_or_default(),
				"summary": record.summary,
				"user_intent": record.user_intent,
				"outcome": record.outcome,
				"tags": record.tags,
				"score": score,
			})
		})
		.collect();
	let candidates_json =
		serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "[]".to_string());

	format!(
		"You filter retrieved memories for relevance to a user's request and \
propose at most {MAX_FOLLOW_UP_QUERIES} follow-up queries.\n\
Return JSON only, matching exactly:\n\
{{\"keep\": [{{\"id\": \"...\", \"reason\": \"...\"}}], \"follow_up_queries\": [\"...\"]}}\n\n\
User request:\n{user_request}\n\nCurrent query (depth {depth}):\n{query}\n\n\
Candidates:\n{candidates_json}\n"
	)
}

/// Keep entries are accepted only when their id resolves inside the
/// candidate set; anything else is ignored.
fn collect_keep_entries(
	parsed: &Value,
	candidates: &[(MemoryRecord, f32)],
) -> Vec<(MemoryRecord, f32, Option<String>)> {
	let Some(raw_keep) = parsed.get("keep").and_then(Value::as_array) else {
		return Vec::new();
	};
	let mut out = Vec::new();

	for entry in raw_keep {
		let Some(raw_id) = entry.get("id").and_then(Value::as_str) else {
			continue;
		};
		let Ok(entry_id) = Uuid::parse_str(raw_id.trim()) else {
			continue;
		};
		let Some((record, score)) =
			candidates.iter().find(|(record, _)| record.id == Some(entry_id))
		else {
			continue;
		};
		let reason = entry
			.get("reason")
			.and_then(Value::as_str)
			.map(str::trim)
			.filter(|reason| !reason.is_empty())
			.map(str::to_string);

		out.push((record.clone(), *score, reason));
	}

	out
}

/// Trimmed, deduplicated case-insensitively, capped at three.
fn collect_follow_up_queries(parsed: &Value) -> Vec<String> {
	let Some(raw) = parsed.get("follow_up_queries").and_then(Value::as_array) else {
		return Vec::new();
	};
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for entry in raw.iter().filter_map(Value::as_str).map(str::trim) {
		if entry.is_empty() || !seen.insert(entry.to_lowercase()) {
			continue;
		}

		out.push(entry.to_string());

		if out.len() >= MAX_FOLLOW_UP_QUERIES {
			break;
		}
	}

	out
}
