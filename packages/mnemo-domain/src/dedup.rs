use std::collections::BTreeSet;

use serde_json::{Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{record::MemoryRecord, similarity};

pub const DEFAULT_DUP_SIM_THRESHOLD: f64 = 0.85;
pub const DEFAULT_TAG_SIM_THRESHOLD: f64 = 0.75;

/// Detects near-duplicate records and merges their details.
///
/// Two records are duplicates iff goal and user intent match exactly
/// (case-insensitive, trimmed) and the summaries are similar enough:
/// either at `dup_sim_threshold` outright, or at `tag_sim_threshold` when
/// the records share at least one tag.
#[derive(Clone, Copy, Debug)]
pub struct Deduplicator {
	dup_sim_threshold: f64,
	tag_sim_threshold: f64,
}
impl Deduplicator {
	pub fn new(dup_sim_threshold: f64, tag_sim_threshold: f64) -> Self {
		Self { dup_sim_threshold, tag_sim_threshold }
	}

	pub fn find_duplicate<'a>(
		&self,
		candidate: &MemoryRecord,
		existing: &'a [MemoryRecord],
	) -> Option<&'a MemoryRecord> {
		existing.iter().find(|record| self.is_duplicate(record, candidate))
	}

	pub fn is_duplicate(&self, record: &MemoryRecord, candidate: &MemoryRecord) -> bool {
		if !eq_folded(&record.goal, &candidate.goal)
			|| !eq_folded(&record.user_intent, &candidate.user_intent)
		{
			return false;
		}

		let score =
			similarity::ratio(&record.summary.to_lowercase(), &candidate.summary.to_lowercase());

		if score >= self.dup_sim_threshold {
			return true;
		}

		let shares_tag = record.tags.iter().any(|tag| candidate.tags.contains(tag));

		shares_tag && score >= self.tag_sim_threshold
	}

	/// Merges `other` into `base` and returns the combined record. Keeps the
	/// longer summary, prefers a non-empty outcome from `other`, unions
	/// tools and tags, and appends a merge-history entry to the metadata.
	/// Pure; never fails.
	pub fn merge(&self, base: &MemoryRecord, other: &MemoryRecord, now: OffsetDateTime) -> MemoryRecord {
		let summary = if base.summary.len() >= other.summary.len() {
			base.summary.clone()
		} else {
			other.summary.clone()
		};
		let outcome =
			if other.outcome.is_empty() { base.outcome.clone() } else { other.outcome.clone() };
		let tools_used = sorted_union(&base.tools_used, &other.tools_used);
		let tags = sorted_union(&base.tags, &other.tags);
		let merged_at = format_timestamp(now);
		let mut source_metadata = base.source_metadata.clone();
		let history = source_metadata
			.entry("merge_history".to_string())
			.or_insert_with(|| Value::Array(Vec::new()));

		if let Some(entries) = history.as_array_mut() {
			entries.push(json!({
				"merged_at": merged_at,
				"summary": other.summary,
				"outcome": other.outcome,
				"tags": other.tags,
			}));
		}

		source_metadata.insert("last_merged_at".to_string(), Value::String(merged_at));

		let embedding = base.embedding.clone().or_else(|| other.embedding.clone());

		MemoryRecord {
			id: base.id,
			summary,
			goal: base.goal.clone(),
			user_intent: base.user_intent.clone(),
			outcome,
			category: base.category,
			tools_used,
			tags,
			created_at: base.created_at,
			source_metadata,
			embedding,
		}
	}
}
impl Default for Deduplicator {
	fn default() -> Self {
		Self::new(DEFAULT_DUP_SIM_THRESHOLD, DEFAULT_TAG_SIM_THRESHOLD)
	}
}

fn eq_folded(left: &str, right: &str) -> bool {
	left.trim().to_lowercase() == right.trim().to_lowercase()
}

fn sorted_union(left: &[String], right: &[String]) -> Vec<String> {
	left.iter().chain(right.iter()).cloned().collect::<BTreeSet<_>>().into_iter().collect()
}

fn format_timestamp(now: OffsetDateTime) -> String {
	now.format(&Rfc3339).unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
	use serde_json::Map;
	use time::OffsetDateTime;
	use uuid::Uuid;

	use super::*;
	use crate::record::MemoryCategory;

	fn sorted_union_is_deduplicated(values: &[String]) -> bool {
		values.windows(2).all(|pair| pair[0] < pair[1])
	}

	fn record(summary: &str, goal: &str, intent: &str, tags: &[&str]) -> MemoryRecord {
		MemoryRecord {
			id: Some(Uuid::new_v4()),
			summary: summary.to_string(),
			goal: goal.to_string(),
			user_intent: intent.to_string(),
			outcome: "done".to_string(),
			category: MemoryCategory::FullExperience,
			tools_used: Vec::new(),
			tags: tags.iter().map(|tag| tag.to_string()).collect(),
			created_at: OffsetDateTime::UNIX_EPOCH,
			source_metadata: Map::new(),
			embedding: None,
		}
	}

	#[test]
	fn flags_high_similarity_with_matching_goal_and_intent() {
		let dedup = Deduplicator::default();
		let existing = record(
			"User recorded schedule-planning experience",
			"plan schedule",
			"plan my schedule",
			&[],
		);
		let candidate = record(
			"User recorded the schedule-planning experience",
			"Plan Schedule",
			"plan my schedule",
			&[],
		);

		assert!(dedup.is_duplicate(&existing, &candidate));
	}

	#[test]
	fn rejects_low_similarity_with_disjoint_tags() {
		let dedup = Deduplicator::default();
		let existing = record("Summarised a research paper", "research", "read paper", &["paper"]);
		let candidate = record("Booked a dentist appointment", "research", "read paper", &["dentist"]);

		assert!(!dedup.is_duplicate(&existing, &candidate));
	}

	#[test]
	fn shared_tag_lowers_the_similarity_bar() {
		let dedup = Deduplicator::new(0.9, 0.5);
		let existing = record("Weekly planning session for work", "plan", "plan week", &["planning"]);
		let candidate = record("Weekly planning session at home", "plan", "plan week", &["planning"]);

		assert!(dedup.is_duplicate(&existing, &candidate));
	}

	#[test]
	fn goal_mismatch_is_never_a_duplicate() {
		let dedup = Deduplicator::default();
		let existing = record("Same summary text", "goal one", "intent", &[]);
		let candidate = record("Same summary text", "goal two", "intent", &[]);

		assert!(!dedup.is_duplicate(&existing, &candidate));
	}

	#[test]
	fn merge_keeps_longer_summary_and_unions_tags() {
		let dedup = Deduplicator::default();
		let base = record("Short summary", "goal", "intent", &["b", "a"]);
		let mut other = record("A noticeably longer summary text", "goal", "intent", &["c", "a"]);

		other.outcome = "resolved".to_string();

		let merged = dedup.merge(&base, &other, OffsetDateTime::UNIX_EPOCH);

		assert_eq!(merged.summary, "A noticeably longer summary text");
		assert_eq!(merged.outcome, "resolved");
		assert_eq!(merged.tags, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
		assert!(sorted_union_is_deduplicated(&merged.tags));
		assert_eq!(merged.id, base.id);

		let history = merged.source_metadata.get("merge_history").and_then(|v| v.as_array());

		assert_eq!(history.map(|entries| entries.len()), Some(1));
		assert!(merged.source_metadata.contains_key("last_merged_at"));
	}

	#[test]
	fn merge_prefers_base_embedding() {
		let dedup = Deduplicator::default();
		let mut base = record("Summary", "goal", "intent", &[]);
		let mut other = record("Summary", "goal", "intent", &[]);

		base.embedding = Some(vec![1.0, 0.0]);
		other.embedding = Some(vec![0.0, 1.0]);

		let merged = dedup.merge(&base, &other, OffsetDateTime::UNIX_EPOCH);

		assert_eq!(merged.embedding, Some(vec![1.0, 0.0]));

		base.embedding = None;

		let merged = dedup.merge(&base, &other, OffsetDateTime::UNIX_EPOCH);

		assert_eq!(merged.embedding, Some(vec![0.0, 1.0]));
	}
}
