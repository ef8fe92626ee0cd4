use std::sync::{Arc, Mutex};

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use mnemo_config::Config;
use mnemo_domain::{
	dedup::Deduplicator,
	record::{MemoryCategory, MemoryRecord, MemorySourceData},
};
use mnemo_storage::models::format_timestamp;

use crate::{
	CapturePipeline, Curator, MemoryMetrics, MemoryRepository, PipelineOutcome, Providers,
	Result, RetentionPolicy,
};

/// What one capture attempt did, for the orchestration layer.
#[derive(Debug)]
pub struct CaptureResult {
	pub should_store: bool,
	pub reason: String,
	pub stored: bool,
	pub record_id: Option<Uuid>,
	pub category: Option<MemoryCategory>,
	pub duplicate_id: Option<Uuid>,
	pub record: Option<MemoryRecord>,
}

/// Top-level write path: snapshot, pipeline, persist.
///
/// The duplicate check runs against a point-in-time snapshot, so two
/// concurrent captures can both miss each other's in-flight record;
/// callers serialize captures per logical session.
pub struct MemoryService {
	repository: Arc<MemoryRepository>,
	pipeline: CapturePipeline,
	metrics: Mutex<MemoryMetrics>,
}
impl MemoryService {
	pub fn new(repository: Arc<MemoryRepository>, pipeline: CapturePipeline) -> Self {
		Self { repository, pipeline, metrics: Mutex::new(MemoryMetrics::default()) }
	}

	/// Standard wiring: retention, curator, and deduplicator configured
	/// from `cfg`, all external calls through `providers`.
	pub fn build(cfg: &Config, repository: Arc<MemoryRepository>, providers: &Providers) -> Self {
		let retention = RetentionPolicy::new(
			providers.generation.clone(),
			cfg.providers.generation.clone(),
			cfg.capture.require_final_response,
		);
		let curator = Curator::new(providers.generation.clone(), cfg.providers.generation.clone());
		let deduplicator =
			Deduplicator::new(cfg.capture.dup_sim_threshold, cfg.capture.tag_sim_threshold);
		let pipeline = CapturePipeline::new(retention, curator, Some(deduplicator));

		Self::new(repository, pipeline)
	}

	pub fn repository(&self) -> Arc<MemoryRepository> {
		self.repository.clone()
	}

	/// Runs the capture pipeline over `source` and persists the outcome.
	/// Curation failures are contained here: logged, counted, reported as
	/// not stored. Only storage failures escape.
	pub async fn capture(&self, source: &MemorySourceData) -> Result<CaptureResult> {
		let now = OffsetDateTime::now_utc();
		let existing = self.repository.list_all().await?;
		let result = self.pipeline.run(source, &existing, now).await;
		let retention = result.retention;

		match result.outcome {
			PipelineOutcome::Skipped => {
				self.record_capture(false, false);

				Ok(CaptureResult {
					should_store: false,
					reason: retention.reason,
					stored: false,
					record_id: None,
					category: None,
					duplicate_id: None,
					record: None,
				})
			},
			PipelineOutcome::CurationFailed { error } => {
				tracing::warn!(error = %error, "Curation failed; capture skipped.");

				self.record_capture(false, false);

				Ok(CaptureResult {
					should_store: retention.should_store,
					reason: retention.reason,
					stored: false,
					record_id: None,
					category: None,
					duplicate_id: None,
					record: None,
				})
			},
			PipelineOutcome::Curated { mut record, duplicate_of } => {
				record
					.source_metadata
					.insert("retention_reason".to_string(), Value::String(retention.reason.clone()));
				record.source_metadata.insert(
					"retention_timestamp".to_string(),
					Value::String(format_timestamp(now)),
				);
				record.source_metadata.insert("resolved".to_string(), Value::Bool(true));

				let stored = self.repository.add(record).await?;

				tracing::debug!(
					record_id = ?stored.id,
					category = stored.category.as_str(),
					duplicate = duplicate_of.is_some(),
					"Memory captured."
				);

				self.record_capture(true, duplicate_of.is_some());

				Ok(CaptureResult {
					should_store: true,
					reason: retention.reason,
					stored: true,
					record_id: stored.id,
					category: Some(stored.category),
					duplicate_id: duplicate_of,
					record: Some(stored),
				})
			},
		}
	}

	/// Read-path bookkeeping for the orchestration layer; retrievers stay
	/// metric-free.
	pub fn record_retrieval(
		&self,
		operation: &str,
		match_count: usize,
		latency_ms: f64,
		success: bool,
	) {
		let mut metrics = self.metrics.lock().unwrap_or_else(|err| err.into_inner());

		metrics.record_retrieval(operation, match_count, latency_ms, success);
	}

	pub fn metrics_snapshot(&self) -> MemoryMetrics {
		self.metrics.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	fn record_capture(&self, stored: bool, duplicate_detected: bool) {
		let mut metrics = self.metrics.lock().unwrap_or_else(|err| err.into_inner());

		metrics.record_capture(stored, duplicate_detected);
	}
}
