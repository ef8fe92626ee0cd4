mod error;

pub use error::{Error, Result};

use std::{
	collections::VecDeque,
	sync::{Arc, Mutex},
};

use tempfile::TempDir;

use mnemo_config::{EmbeddingProviderConfig, GenerationProviderConfig};
use mnemo_service::{BoxFuture, EmbeddingProvider, EntityLinkSource, GenerationProvider};
use mnemo_storage::db::Db;

/// SQLite database in a scoped temp directory with the schema applied.
/// The directory, and the database with it, disappear on drop.
pub struct TestStore {
	dir: TempDir,
	pub db: Db,
}
impl TestStore {
	pub async fn new() -> Result<Self> {
		let dir = TempDir::new()
			.map_err(|err| Error::Message(format!("Failed to create temp dir: {err}.")))?;
		let db = Db::connect_path(&dir.path().join("memories.db"))
			.await
			.map_err(|err| Error::Message(format!("Failed to open test database: {err}.")))?;

		db.ensure_schema()
			.await
			.map_err(|err| Error::Message(format!("Failed to apply schema: {err}.")))?;

		Ok(Self { dir, db })
	}

	/// Path for a vector index inside the same temp directory.
	pub fn index_path(&self) -> std::path::PathBuf {
		self.dir.path().join("memory.index")
	}
}

/// Deterministic embedding fake: vectors derive from byte histograms, so
/// identical text always embeds identically and overlapping text lands
/// nearby. No network, no model.
pub struct HashEmbedding {
	pub dimension: usize,
}
impl HashEmbedding {
	pub fn new(dimension: usize) -> Self {
		Self { dimension }
	}

	pub fn vector_for(&self, text: &str) -> Vec<f32> {
		let mut vector = vec![0.0_f32; self.dimension];

		for token in text.to_lowercase().split_whitespace() {
			let mut bucket = 0_usize;

			for byte in token.bytes() {
				bucket = (bucket * 31 + byte as usize) % self.dimension;
			}

			vector[bucket] += 1.0;
		}

		vector
	}
}
impl EmbeddingProvider for HashEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		let vectors = texts.iter().map(|text| self.vector_for(text)).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

/// Embedding fake that returns no vectors; exercises the probe failure.
pub struct EmptyEmbedding;
impl EmbeddingProvider for EmptyEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async { Ok(Vec::new()) })
	}
}

/// Generation fake that pops queued replies in order and fails once the
/// queue runs dry, so tests notice unexpected extra calls.
pub struct ScriptedGeneration {
	replies: Mutex<VecDeque<String>>,
	calls: Mutex<Vec<String>>,
}
impl ScriptedGeneration {
	pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Arc<Self> {
		Arc::new(Self {
			replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
			calls: Mutex::new(Vec::new()),
		})
	}

	/// Prompts seen so far, in call order.
	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn remaining(&self) -> usize {
		self.replies.lock().unwrap_or_else(|err| err.into_inner()).len()
	}
}
impl GenerationProvider for ScriptedGeneration {
	fn generate<'a>(
		&'a self,
		_cfg: &'a GenerationProviderConfig,
		prompt: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).push(prompt.to_string());

		let reply = self.replies.lock().unwrap_or_else(|err| err.into_inner()).pop_front();

		Box::pin(async move {
			reply.ok_or_else(|| color_eyre::eyre::eyre!("Scripted generation queue is empty."))
		})
	}
}

/// Generation fake that always fails; exercises fallback chains.
pub struct FailingGeneration;
impl GenerationProvider for FailingGeneration {
	fn generate<'a>(
		&'a self,
		_cfg: &'a GenerationProviderConfig,
		_prompt: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async { Err(color_eyre::eyre::eyre!("Generation service unavailable.")) })
	}
}

/// Fixed per-test entity link counts.
pub struct StaticEntityLinks {
	pub links: Vec<(uuid::Uuid, u32)>,
}
impl EntityLinkSource for StaticEntityLinks {
	fn link_count(&self, memory_id: uuid::Uuid) -> u32 {
		self.links
			.iter()
			.find(|(id, _)| *id == memory_id)
			.map(|(_, count)| *count)
			.unwrap_or(0)
	}
}

/// Provider configs pointed at nowhere; the fakes ignore them.
pub fn embedding_cfg(dimension: u32) -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: "fake".to_string(),
		api_base: "http://localhost".to_string(),
		api_key: "key".to_string(),
		path: "/v1/embeddings".to_string(),
		model: "fake-embedding".to_string(),
		dimensions: dimension,
		timeout_ms: 1_000,
		default_headers: Default::default(),
	}
}

pub fn generation_cfg() -> GenerationProviderConfig {
	GenerationProviderConfig {
		provider_id: "fake".to_string(),
		api_base: "http://localhost".to_string(),
		api_key: "key".to_string(),
		path: "/v1/chat/completions".to_string(),
		model: "fake-chat".to_string(),
		temperature: 0.2,
		max_tokens: 4_096,
		timeout_ms: 1_000,
		default_headers: Default::default(),
	}
}
