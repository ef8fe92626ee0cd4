use std::{cmp::Ordering, sync::Arc};

use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use mnemo_domain::record::{ImportanceScore, MemoryCategory};
use mnemo_storage::models::{format_timestamp, parse_timestamp};

use crate::{EntityLinkSource, Error, Result};

/// Diminishing returns past roughly this many accesses.
const FREQUENCY_SATURATION: f64 = 100.0;
/// Entity richness saturates around this many links.
const ENTITY_SATURATION: f64 = 10.0;

const POSITIVE_TAGS: [&str; 5] = ["success", "solved", "completed", "optimized", "improved"];
const NEGATIVE_TAGS: [&str; 4] = ["failed", "error", "incomplete", "blocked"];

/// Multi-factor importance over the access log, the feedback table, and
/// record metadata. Owns both auxiliary tables.
pub struct ImportanceScorer {
	pool: SqlitePool,
	cfg: mnemo_config::Importance,
	entity_links: Option<Arc<dyn EntityLinkSource>>,
}
impl ImportanceScorer {
	pub fn new(
		pool: SqlitePool,
		cfg: mnemo_config::Importance,
		entity_links: Option<Arc<dyn EntityLinkSource>>,
	) -> Self {
		let weight_sum = cfg.frequency_weight
			+ cfg.recency_weight
			+ cfg.success_weight
			+ cfg.feedback_weight
			+ cfg.entity_weight;

		if (weight_sum - 1.0).abs() > 0.01 {
			tracing::warn!(weight_sum, "Importance weights do not sum to 1.0.");
		}

		Self { pool, cfg, entity_links }
	}

	pub async fn record_access(&self, memory_id: Uuid, access_type: &str) -> Result<()> {
		sqlx::query(
			"\
INSERT INTO memory_access_log (memory_id, accessed_at, access_type)
VALUES (?1, ?2, ?3)",
		)
		.bind(memory_id.to_string())
		.bind(format_timestamp(OffsetDateTime::now_utc()))
		.bind(access_type)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	/// Upserts the single current rating for a memory. Ratings outside
	/// [0, 1] are rejected before any write.
	pub async fn record_feedback(&self, memory_id: Uuid, rating: f64, comment: &str) -> Result<()> {
		if !(0.0..=1.0).contains(&rating) {
			return Err(Error::InvalidRequest {
				message: format!("Feedback rating must lie in [0, 1], got {rating}."),
			});
		}

		sqlx::query(
			"\
INSERT INTO memory_feedback (memory_id, rating, comment, updated_at)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(memory_id) DO UPDATE SET
	rating = excluded.rating,
	comment = excluded.comment,
	updated_at = excluded.updated_at",
		)
		.bind(memory_id.to_string())
		.bind(rating)
		.bind(comment)
		.bind(format_timestamp(OffsetDateTime::now_utc()))
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	pub async fn calculate_importance(
		&self,
		memory_id: Uuid,
		now: OffsetDateTime,
	) -> Result<ImportanceScore> {
		let row: Option<(String, String, String)> = sqlx::query_as(
			"SELECT created_at, category, tags FROM memories WHERE external_id = ?1",
		)
		.bind(memory_id.to_string())
		.fetch_optional(&self.pool)
		.await?;
		let Some((created_raw, category, tags_raw)) = row else {
			tracing::warn!(memory_id = %memory_id, "Memory not found; zero importance.");

			return Ok(ImportanceScore::ZERO);
		};
		let created_at = parse_timestamp(&created_raw).unwrap_or(now);
		let tags: Vec<String> = serde_json::from_str(&tags_raw).unwrap_or_default();
		let (access_count, last_access) = self.access_stats(memory_id).await?;
		let rating = self.feedback_rating(memory_id).await?;
		let link_count = self
			.entity_links
			.as_ref()
			.map(|source| source.link_count(memory_id))
			.unwrap_or(0);
		let frequency = frequency_score(access_count);
		let recency =
			recency_score(last_access, created_at, now, self.cfg.decay_halflife_days);
		let success = success_score(&category, &tags);
		let feedback = feedback_score(rating);
		let entity = entity_score(link_count);
		let total = (self.cfg.frequency_weight * frequency
			+ self.cfg.recency_weight * recency
			+ self.cfg.success_weight * success
			+ self.cfg.feedback_weight * feedback
			+ self.cfg.entity_weight * entity)
			.clamp(0.0, 1.0);

		Ok(ImportanceScore { total, frequency, recency, success, feedback, entity })
	}

	/// Scores a bounded candidate window of `limit * 2` records rather
	/// than the full corpus, then sorts and truncates.
	pub async fn get_top_memories(
		&self,
		limit: u32,
		category: Option<MemoryCategory>,
		now: OffsetDateTime,
	) -> Result<Vec<(Uuid, ImportanceScore)>> {
		let window = i64::from(limit) * 2;
		let raw_ids: Vec<(String,)> = match category {
			Some(category) =>
				sqlx::query_as(
					"SELECT external_id FROM memories WHERE category = ?1 LIMIT ?2",
				)
				.bind(category.as_str())
				.bind(window)
				.fetch_all(&self.pool)
				.await?,
			None =>
				sqlx::query_as("SELECT external_id FROM memories LIMIT ?1")
					.bind(window)
					.fetch_all(&self.pool)
					.await?,
		};
		let mut scored = Vec::with_capacity(raw_ids.len());

		for (raw_id,) in raw_ids {
			let Ok(memory_id) = Uuid::parse_str(&raw_id) else {
				continue;
			};

			scored.push((memory_id, self.calculate_importance(memory_id, now).await?));
		}

		scored.sort_by(|(left_id, left), (right_id, right)| {
			right
				.total
				.partial_cmp(&left.total)
				.unwrap_or(Ordering::Equal)
				.then_with(|| left_id.cmp(right_id))
		});
		scored.truncate(limit as usize);

		Ok(scored)
	}

	async fn access_stats(&self, memory_id: Uuid) -> Result<(u64, Option<OffsetDateTime>)> {
		let row: (i64, Option<String>) = sqlx::query_as(
			"SELECT COUNT(*), MAX(accessed_at) FROM memory_access_log WHERE memory_id = ?1",
		)
		.bind(memory_id.to_string())
		.fetch_one(&self.pool)
		.await?;
		let last_access = row.1.as_deref().and_then(parse_timestamp);

		Ok((row.0.max(0) as u64, last_access))
	}

	async fn feedback_rating(&self, memory_id: Uuid) -> Result<Option<f64>> {
		let row: Option<(f64,)> =
			sqlx::query_as("SELECT rating FROM memory_feedback WHERE memory_id = ?1")
				.bind(memory_id.to_string())
				.fetch_optional(&self.pool)
				.await?;

		Ok(row.map(|(rating,)| rating))
	}
}

fn frequency_score(access_count: u64) -> f64 {
	if access_count == 0 {
		return 0.0;
	}

	((1.0 + access_count as f64).ln() / (1.0 + FREQUENCY_SATURATION).ln()).clamp(0.0, 1.0)
}

fn recency_score(
	last_access: Option<OffsetDateTime>,
	created_at: OffsetDateTime,
	now: OffsetDateTime,
	halflife_days: f64,
) -> f64 {
	let reference = last_access.unwrap_or(created_at);
	let age_days = (now - reference).as_seconds_f64() / 86_400.0;

	2.0_f64.powf(-age_days / halflife_days).clamp(0.0, 1.0)
}

fn success_score(category: &str, tags: &[String]) -> f64 {
	let mut score: f64 = 0.5;

	if category == MemoryCategory::WorkflowOptimisation.as_str() {
		score += 0.3;
	} else if category == MemoryCategory::ErrorSolution.as_str() {
		score += 0.2;
	}

	for tag in tags {
		let folded = tag.to_lowercase();

		if POSITIVE_TAGS.contains(&folded.as_str()) {
			score += 0.1;
		} else if NEGATIVE_TAGS.contains(&folded.as_str()) {
			score -= 0.15;
		}
	}

	score.clamp(0.0, 1.0)
}

fn feedback_score(rating: Option<f64>) -> f64 {
	rating.map(|value| value.clamp(0.0, 1.0)).unwrap_or(0.5)
}

fn entity_score(link_count: u32) -> f64 {
	if link_count == 0 {
		return 0.0;
	}

	((1.0 + f64::from(link_count)).ln() / (1.0 + ENTITY_SATURATION).ln()).clamp(0.0, 1.0)
}
