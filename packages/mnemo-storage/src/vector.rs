use std::{
	cmp::Ordering,
	fs,
	path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mnemo_domain::record::MemoryRecord;

use crate::{Error, Result};

/// Flat nearest-neighbor index over L2-normalized vectors. Similarity is
/// the inner product of normalized vectors, i.e. cosine similarity.
///
/// Persistence is two-part and synchronous: the index blob and the ordered
/// `.ids` side-car are both rewritten on every `add`, so a crash never
/// leaves the id list out of sync with the vectors. Mutation is not
/// internally synchronized; callers serialize writers.
pub struct VectorIndex {
	dimension: usize,
	path: Option<PathBuf>,
	ids: Vec<Uuid>,
	vectors: Vec<Vec<f32>>,
}

#[derive(Clone, Copy, Debug)]
pub struct VectorHit {
	pub record_id: Uuid,
	pub score: f32,
}

#[derive(Deserialize, Serialize)]
struct IndexFile {
	dimension: usize,
	vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
	/// Opens the index at `path`, loading the persisted blob when present,
	/// or starts empty otherwise.
	pub fn open(dimension: usize, path: impl Into<PathBuf>) -> Result<Self> {
		let path = path.into();
		let mut index = Self { dimension, path: Some(path.clone()), ids: Vec::new(), vectors: Vec::new() };

		if path.exists() {
			index.load(&path)?;
		}

		Ok(index)
	}

	/// Unpersisted index; useful for tests and probes.
	pub fn in_memory(dimension: usize) -> Self {
		Self { dimension, path: None, ids: Vec::new(), vectors: Vec::new() }
	}

	pub fn dimension(&self) -> usize {
		self.dimension
	}

	pub fn len(&self) -> usize {
		self.ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ids.is_empty()
	}

	/// Inserts or replaces the vector for `record_id` and writes both index
	/// artifacts through before returning.
	pub fn add(&mut self, record_id: Uuid, embedding: &[f32]) -> Result<()> {
		let vector = self.normalized(embedding)?;

		match self.ids.iter().position(|id| *id == record_id) {
			Some(slot) => self.vectors[slot] = vector,
			None => {
				self.ids.push(record_id);
				self.vectors.push(vector);
			},
		}

		self.save()
	}

	/// Most similar stored vectors, best first, ties broken by id
	/// ascending. An empty index yields an empty list, never an error.
	pub fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<VectorHit>> {
		if self.ids.is_empty() || top_k == 0 {
			return Ok(Vec::new());
		}

		let query = self.normalized(embedding)?;
		let mut hits: Vec<VectorHit> = self
			.ids
			.iter()
			.zip(self.vectors.iter())
			.map(|(id, vector)| VectorHit { record_id: *id, score: dot(&query, vector) })
			.collect();

		hits.sort_by(|a, b| {
			b.score
				.partial_cmp(&a.score)
				.unwrap_or(Ordering::Equal)
				.then_with(|| a.record_id.cmp(&b.record_id))
		});
		hits.truncate(top_k);

		Ok(hits)
	}

	/// Rebuilds the index from records that already carry an embedding.
	/// No-op when the index already has entries.
	pub fn populate<'a>(
		&mut self,
		records: impl IntoIterator<Item = &'a MemoryRecord>,
	) -> Result<()> {
		if !self.ids.is_empty() {
			return Ok(());
		}

		let mut added = 0_usize;

		for record in records {
			let (Some(id), Some(embedding)) = (record.id, record.embedding.as_ref()) else {
				continue;
			};

			self.ids.push(id);
			self.vectors.push(self.normalized(embedding)?);

			added += 1;
		}

		if added == 0 {
			return Ok(());
		}

		tracing::debug!(entries = added, "Vector index rebuilt from stored embeddings.");

		self.save()
	}

	fn normalized(&self, embedding: &[f32]) -> Result<Vec<f32>> {
		if embedding.len() != self.dimension {
			return Err(Error::InvalidArgument(format!(
				"Vector has dimension {}, index expects {}.",
				embedding.len(),
				self.dimension
			)));
		}

		let norm = embedding.iter().map(|value| value * value).sum::<f32>().sqrt();

		if norm == 0.0 {
			return Ok(embedding.to_vec());
		}

		Ok(embedding.iter().map(|value| value / norm).collect())
	}

	fn save(&self) -> Result<()> {
		let Some(path) = self.path.as_ref() else {
			return Ok(());
		};

		if let Some(parent) = path.parent()
			&& !parent.as_os_str().is_empty()
		{
			fs::create_dir_all(parent)?;
		}

		let blob = serde_json::to_vec(&IndexFile {
			dimension: self.dimension,
			vectors: self.vectors.clone(),
		})?;

		fs::write(path, blob)?;

		let ids: Vec<String> = self.ids.iter().map(Uuid::to_string).collect();

		fs::write(ids_path(path), ids.join("\n"))?;

		Ok(())
	}

	fn load(&mut self, path: &Path) -> Result<()> {
		let blob = fs::read(path)?;
		let file: IndexFile = serde_json::from_slice(&blob)?;

		if file.dimension != self.dimension {
			return Err(Error::InvalidArgument(format!(
				"Index file has dimension {}, configuration expects {}.",
				file.dimension, self.dimension
			)));
		}

		let raw_ids = fs::read_to_string(ids_path(path)).unwrap_or_default();
		let mut ids = Vec::new();

		for line in raw_ids.lines().filter(|line| !line.trim().is_empty()) {
			let id = Uuid::parse_str(line.trim()).map_err(|_| {
				Error::Corrupt(format!("Id side-car contains a non-UUID line: {line:?}."))
			})?;

			ids.push(id);
		}

		if ids.len() != file.vectors.len() {
			return Err(Error::Corrupt(format!(
				"Id side-car lists {} entries, index blob holds {} vectors.",
				ids.len(),
				file.vectors.len()
			)));
		}

		self.ids = ids;
		self.vectors = file.vectors;

		Ok(())
	}
}

fn ids_path(path: &Path) -> PathBuf {
	let mut out = path.as_os_str().to_owned();

	out.push(".ids");

	PathBuf::from(out)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
