use time::OffsetDateTime;
use uuid::Uuid;

use mnemo_domain::{
	dedup::Deduplicator,
	record::{MemoryRecord, MemorySourceData, RetentionDecision},
};

use crate::{CurationError, Curator, RetentionPolicy};

/// What a capture attempt produced after retention, curation, and the
/// optional duplicate check.
#[derive(Debug)]
pub struct PipelineResult {
	pub retention: RetentionDecision,
	pub outcome: PipelineOutcome,
}

#[derive(Debug)]
pub enum PipelineOutcome {
	/// Retention said no; nothing was curated.
	Skipped,
	Curated { record: MemoryRecord, duplicate_of: Option<Uuid> },
	CurationFailed { error: CurationError },
}

/// Write-path composition: retention gate, then curation, then the
/// duplicate check against a caller-supplied snapshot.
pub struct CapturePipeline {
	retention: RetentionPolicy,
	curator: Curator,
	deduplicator: Option<Deduplicator>,
}
impl CapturePipeline {
	pub fn new(
		retention: RetentionPolicy,
		curator: Curator,
		deduplicator: Option<Deduplicator>,
	) -> Self {
		Self { retention, curator, deduplicator }
	}

	pub async fn run(
		&self,
		source: &MemorySourceData,
		existing: &[MemoryRecord],
		now: OffsetDateTime,
	) -> PipelineResult {
		let retention = self.retention.evaluate(source).await;

		if !retention.should_store {
			return PipelineResult { retention, outcome: PipelineOutcome::Skipped };
		}

		let record = match self.curator.curate(source, now).await {
			Ok(record) => record,
			Err(error) =>
				return PipelineResult { retention, outcome: PipelineOutcome::CurationFailed { error } },
		};
		let outcome = match self.deduplicator.as_ref() {
			Some(deduplicator) if !existing.is_empty() =>
				match deduplicator.find_duplicate(&record, existing) {
					Some(duplicate) => PipelineOutcome::Curated {
						record: deduplicator.merge(duplicate, &record, now),
						duplicate_of: duplicate.id,
					},
					None => PipelineOutcome::Curated { record, duplicate_of: None },
				},
			_ => PipelineOutcome::Curated { record, duplicate_of: None },
		};

		PipelineResult { retention, outcome }
	}
}
