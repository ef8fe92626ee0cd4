use std::sync::{Arc, Mutex};

use sqlx::SqlitePool;
use uuid::Uuid;

use mnemo_config::{Config, EmbeddingProviderConfig};
use mnemo_domain::record::MemoryRecord;
use mnemo_storage::{db::Db, store, vector::VectorIndex};

use crate::{EmbeddingProvider, Error, Result};

const DIMENSION_PROBE: &str = "dimension probe";

struct EmbeddingHandle {
	provider: Arc<dyn EmbeddingProvider>,
	cfg: EmbeddingProviderConfig,
}

/// Single read/write facade over the metadata store, the vector index, and
/// the embedding provider.
///
/// The index mutex only satisfies the borrow checker; the write path is
/// still single-writer and callers serialize captures per session.
pub struct MemoryRepository {
	db: Db,
	index: Option<Mutex<VectorIndex>>,
	embedding: Option<EmbeddingHandle>,
}
impl MemoryRepository {
	/// Opens the full repository: database, schema, embedding probe, and
	/// the persisted vector index, rebuilding the index from stored
	/// embeddings when the file is absent.
	pub async fn open(cfg: &Config, embedding: Arc<dyn EmbeddingProvider>) -> Result<Self> {
		let db = Db::connect(&cfg.storage).await?;

		db.ensure_schema().await?;

		let probe = embedding
			.embed(&cfg.providers.embedding, &[DIMENSION_PROBE.to_string()])
			.await?;
		let Some(probe_vector) = probe.into_iter().next().filter(|vector| !vector.is_empty())
		else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vector on the dimension probe."
					.to_string(),
			});
		};

		let dimension = cfg.providers.embedding.dimensions as usize;

		if probe_vector.len() != dimension {
			return Err(Error::Provider {
				message: format!(
					"Embedding probe returned dimension {}, configuration expects {dimension}.",
					probe_vector.len()
				),
			});
		}

		let mut index = VectorIndex::open(dimension, &cfg.storage.index_path)?;

		index.populate(store::list_all(&db.pool).await?.iter())?;

		Ok(Self {
			db,
			index: Some(Mutex::new(index)),
			embedding: Some(EmbeddingHandle {
				provider: embedding,
				cfg: cfg.providers.embedding.clone(),
			}),
		})
	}

	/// Repository without semantic search: records persist, `search`
	/// returns nothing. Not an error state.
	pub fn store_only(db: Db) -> Self {
		Self { db, index: None, embedding: None }
	}

	/// Test-oriented constructor over pre-built parts.
	pub fn from_parts(
		db: Db,
		index: Option<VectorIndex>,
		embedding: Option<(Arc<dyn EmbeddingProvider>, EmbeddingProviderConfig)>,
	) -> Self {
		Self {
			db,
			index: index.map(Mutex::new),
			embedding: embedding.map(|(provider, cfg)| EmbeddingHandle { provider, cfg }),
		}
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.db.pool
	}

	/// Persists the record, assigning its id on first write and embedding
	/// it when an embedding provider is configured.
	pub async fn add(&self, mut record: MemoryRecord) -> Result<MemoryRecord> {
		let id = match record.id {
			Some(id) => id,
			None => {
				let id = Uuid::new_v4();

				record.id = Some(id);

				id
			},
		};

		if let (Some(index), Some(handle)) = (self.index.as_ref(), self.embedding.as_ref()) {
			let payload = record.embedding_payload();
			let vectors = handle.provider.embed(&handle.cfg, &[payload]).await?;
			let Some(vector) = vectors.into_iter().next() else {
				return Err(Error::Provider {
					message: "Embedding provider returned no vectors.".to_string(),
				});
			};

			let mut index = index.lock().unwrap_or_else(|err| err.into_inner());

			index.add(id, &vector)?;

			record.embedding = Some(vector);
		}

		store::save(&self.db.pool, &record).await?;

		Ok(record)
	}

	/// Point-in-time snapshot of every stored record.
	pub async fn list_all(&self) -> Result<Vec<MemoryRecord>> {
		Ok(store::list_all(&self.db.pool).await?)
	}

	/// Raw nearest-neighbor ids with cosine similarity, best first. Empty
	/// without an index or provider.
	pub async fn search_ids(&self, query: &str, top_k: u32) -> Result<Vec<(Uuid, f32)>> {
		let (Some(index), Some(handle)) = (self.index.as_ref(), self.embedding.as_ref()) else {
			tracing::warn!("Semantic search skipped; no vector index or embedding provider.");

			return Ok(Vec::new());
		};
		let vectors = handle.provider.embed(&handle.cfg, &[query.to_string()]).await?;
		let Some(vector) = vectors.into_iter().next() else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};
		let hits = {
			let index = index.lock().unwrap_or_else(|err| err.into_inner());

			index.search(&vector, top_k as usize)?
		};

		Ok(hits.into_iter().map(|hit| (hit.record_id, hit.score)).collect())
	}

	/// Semantic search joined back to full records. Hits whose id no longer
	/// resolves to a record are dropped.
	pub async fn search(&self, query: &str, top_k: u32) -> Result<Vec<(MemoryRecord, f32)>> {
		let hits = self.search_ids(query, top_k).await?;

		if hits.is_empty() {
			return Ok(Vec::new());
		}

		Ok(join_records(self.list_all().await?, &hits))
	}
}

/// Joins `(id, score)` hits to records, preserving hit order and silently
/// dropping ids without a backing record.
pub(crate) fn join_records(
	records: Vec<MemoryRecord>,
	hits: &[(Uuid, f32)],
) -> Vec<(MemoryRecord, f32)> {
	let mut by_id: std::collections::HashMap<Uuid, MemoryRecord> =
		records.into_iter().filter_map(|record| record.id.map(|id| (id, record))).collect();
	let mut out = Vec::with_capacity(hits.len());

	for (id, score) in hits {
		match by_id.remove(id) {
			Some(record) => out.push((record, *score)),
			None => {
				tracing::debug!(record_id = %id, "Vector hit has no backing record; dropped.");
			},
		}
	}

	out
}
