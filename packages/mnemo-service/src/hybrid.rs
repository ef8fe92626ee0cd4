use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use uuid::Uuid;

use mnemo_domain::record::MemoryRecord;
use mnemo_storage::store;

use crate::{MemoryRepository, Result, repository::join_records};

/// Fixed empirical range over which raw bm25 relevance (more negative =
/// better) is clamped into [0, 1].
const KEYWORD_RANK_FLOOR: f64 = -20.0;

/// One fused search hit: raw per-source scores, the fused score, and the
/// final 1-based rank.
#[derive(Debug)]
pub struct SearchResult {
	pub record: MemoryRecord,
	pub vector_score: f32,
	pub keyword_score: f64,
	pub rrf_score: f64,
	pub rank: u32,
}

#[derive(Debug, Clone, Copy)]
struct FusedHit {
	vector_score: f32,
	keyword_score: f64,
	rrf_score: f64,
}

/// Runs a vector lookup and a keyword lookup for the same query and merges
/// them with weighted Reciprocal Rank Fusion. Either leg failing degrades
/// to the other leg's results.
pub struct HybridRetriever {
	repository: Arc<MemoryRepository>,
	cfg: mnemo_config::Hybrid,
}
impl HybridRetriever {
	pub fn new(repository: Arc<MemoryRepository>, cfg: mnemo_config::Hybrid) -> Self {
		let weight_sum = cfg.vector_weight + cfg.keyword_weight;

		if (weight_sum - 1.0).abs() > 0.01 {
			tracing::warn!(
				vector_weight = cfg.vector_weight,
				keyword_weight = cfg.keyword_weight,
				"Hybrid weights do not sum to 1.0."
			);
		}

		Self { repository, cfg }
	}

	pub async fn search(&self, query: &str, top_k: u32) -> Result<Vec<SearchResult>> {
		let top_k = top_k.max(1);
		// Overfetch from each source so fusion has material to reorder.
		let per_source_k = top_k * 2;
		let vector_hits = match self.repository.search_ids(query, per_source_k).await {
			Ok(hits) => hits,
			Err(err) => {
				tracing::warn!(error = %err, "Vector leg failed; keyword-only results.");

				Vec::new()
			},
		};
		let keyword_hits: Vec<(Uuid, f64)> =
			match store::keyword_search(self.repository.pool(), query, per_source_k).await {
				Ok(hits) => hits
					.into_iter()
					.map(|(id, raw_rank)| (id, normalize_keyword_rank(raw_rank)))
					.collect(),
				Err(err) => {
					tracing::warn!(error = %err, "Keyword leg failed; vector-only results.");

					Vec::new()
				},
			};
		let fused = reciprocal_rank_fusion(
			&vector_hits,
			&keyword_hits,
			self.cfg.vector_weight,
			self.cfg.keyword_weight,
			self.cfg.rrf_k,
		);
		let ordered_ids: Vec<(Uuid, f32)> =
			fused.iter().take(top_k as usize).map(|(id, hit)| (*id, hit.vector_score)).collect();
		let by_id: HashMap<Uuid, FusedHit> = fused.into_iter().collect();
		let records = join_records(self.repository.list_all().await?, &ordered_ids);
		let mut out = Vec::with_capacity(records.len());

		for (rank, (record, _)) in records.into_iter().enumerate() {
			let Some(id) = record.id else {
				continue;
			};
			let Some(hit) = by_id.get(&id) else {
				continue;
			};

			out.push(SearchResult {
				record,
				vector_score: hit.vector_score,
				keyword_score: hit.keyword_score,
				rrf_score: hit.rrf_score,
				rank: rank as u32 + 1,
			});
		}

		tracing::debug!(
			vector = vector_hits.len(),
			keyword = keyword_hits.len(),
			fused = out.len(),
			"Hybrid search complete."
		);

		Ok(out)
	}
}

/// Maps a raw bm25 rank onto [0, 1] over the fixed empirical range; values
/// outside it saturate.
fn normalize_keyword_rank(raw_rank: f64) -> f64 {
	((raw_rank - KEYWORD_RANK_FLOOR) / -KEYWORD_RANK_FLOOR).clamp(0.0, 1.0)
}

/// Weighted RRF over two 1-indexed rank lists. A source that did not
/// return an id contributes 0 for that term. Pure and deterministic:
/// output is ordered by fused score descending with ties broken by id
/// ascending.
fn reciprocal_rank_fusion(
	vector_hits: &[(Uuid, f32)],
	keyword_hits: &[(Uuid, f64)],
	vector_weight: f64,
	keyword_weight: f64,
	rrf_k: u32,
) -> Vec<(Uuid, FusedHit)> {
	let k = f64::from(rrf_k);
	let mut fused: HashMap<Uuid, FusedHit> = HashMap::new();

	for (position, (id, score)) in vector_hits.iter().enumerate() {
		let rank = position as f64 + 1.0;
		let entry = fused
			.entry(*id)
			.or_insert(FusedHit { vector_score: 0.0, keyword_score: 0.0, rrf_score: 0.0 });

		entry.vector_score = *score;
		entry.rrf_score += vector_weight / (k + rank);
	}
	for (position, (id, score)) in keyword_hits.iter().enumerate() {
		let rank = position as f64 + 1.0;
		let entry = fused
			.entry(*id)
			.or_insert(FusedHit { vector_score: 0.0, keyword_score: 0.0, rrf_score: 0.0 });

		entry.keyword_score = *score;
		entry.rrf_score += keyword_weight / (k + rank);
	}

	let mut out: Vec<(Uuid, FusedHit)> = fused.into_iter().collect();

	out.sort_by(|(left_id, left), (right_id, right)| {
		right
			.rrf_score
			.partial_cmp(&left.rrf_score)
			.unwrap_or(Ordering::Equal)
			.then_with(|| left_id.cmp(right_id))
	});

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn id(n: u128) -> Uuid {
		Uuid::from_u128(n)
	}

	#[test]
	fn fusion_matches_the_reference_example() {
		// m1 is vector-rank 1 and keyword-rank 3; m2 is vector-rank 2 only.
		let vector = vec![(id(1), 0.9), (id(2), 0.8)];
		let keyword = vec![(id(7), 1.0), (id(8), 0.9), (id(1), 0.5)];
		let fused = reciprocal_rank_fusion(&vector, &keyword, 0.6, 0.4, 60);
		let m1 = fused.iter().find(|(fid, _)| *fid == id(1)).expect("m1 missing").1;
		let m2 = fused.iter().find(|(fid, _)| *fid == id(2)).expect("m2 missing").1;

		assert!((m1.rrf_score - (0.6 / 61.0 + 0.4 / 63.0)).abs() < 1e-9);
		assert!((m2.rrf_score - 0.6 / 62.0).abs() < 1e-9);
		assert_eq!(fused[0].0, id(1));
		assert!(
			fused.iter().position(|(fid, _)| *fid == id(1))
				< fused.iter().position(|(fid, _)| *fid == id(2))
		);
	}

	#[test]
	fn fusion_is_deterministic_with_id_tie_break() {
		let vector = vec![(id(9), 0.5)];
		let keyword = vec![(id(3), 0.5)];
		// Equal weights and equal ranks produce equal scores; the lower id
		// must come first.
		let first = reciprocal_rank_fusion(&vector, &keyword, 0.5, 0.5, 60);
		let second = reciprocal_rank_fusion(&vector, &keyword, 0.5, 0.5, 60);

		assert_eq!(first[0].0, id(3));
		assert_eq!(first[1].0, id(9));
		assert_eq!(first.len(), second.len());

		for (left, right) in first.iter().zip(second.iter()) {
			assert_eq!(left.0, right.0);
			assert!((left.1.rrf_score - right.1.rrf_score).abs() < f64::EPSILON);
		}
	}

	#[test]
	fn keyword_rank_normalization_saturates() {
		assert!((normalize_keyword_rank(0.0) - 1.0).abs() < f64::EPSILON);
		assert!(normalize_keyword_rank(-20.0).abs() < f64::EPSILON);
		assert!(normalize_keyword_rank(-40.0).abs() < f64::EPSILON);
		assert!((normalize_keyword_rank(-10.0) - 0.5).abs() < f64::EPSILON);
		assert!((normalize_keyword_rank(5.0) - 1.0).abs() < f64::EPSILON);
	}
}
