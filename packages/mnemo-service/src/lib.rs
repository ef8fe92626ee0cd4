pub mod capture;
pub mod cascade;
pub mod curator;
pub mod hybrid;
pub mod importance;
pub mod metrics;
pub mod pipeline;
pub mod repository;
pub mod retention;

mod error;

pub use capture::{CaptureResult, MemoryService};
pub use cascade::{CascadedMatch, CascadedResult, CascadedRetriever, IterationMetrics};
pub use curator::{CurationError, Curator};
pub use error::{Error, Result};
pub use hybrid::{HybridRetriever, SearchResult};
pub use importance::ImportanceScorer;
pub use metrics::{CaptureMetrics, MemoryMetrics, RetrievalMetrics};
pub use pipeline::{CapturePipeline, PipelineOutcome, PipelineResult};
pub use repository::MemoryRepository;
pub use retention::RetentionPolicy;

use std::{future::Future, pin::Pin, sync::Arc};

use uuid::Uuid;

use mnemo_config::{EmbeddingProviderConfig, GenerationProviderConfig};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a GenerationProviderConfig,
		prompt: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

/// Entity-graph linking lives outside this core; it is consumed only as an
/// externally supplied link count per record.
pub trait EntityLinkSource
where
	Self: Send + Sync,
{
	fn link_count(&self, memory_id: Uuid) -> u32;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub generation: Arc<dyn GenerationProvider>,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(mnemo_providers::embedding::embed(cfg, texts))
	}
}

impl GenerationProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a GenerationProviderConfig,
		prompt: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(mnemo_providers::generation::generate(cfg, prompt))
	}
}

impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, generation: Arc<dyn GenerationProvider>) -> Self {
		Self { embedding, generation }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);
		Self { embedding: provider.clone(), generation: provider }
	}
}
