use std::collections::HashMap;

use serde::Serialize;

/// Write-path counters.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CaptureMetrics {
	pub attempts: u64,
	pub stored: u64,
	pub skipped: u64,
	pub duplicates: u64,
}
impl CaptureMetrics {
	pub fn success_rate(&self) -> f64 {
		if self.attempts == 0 { 0.0 } else { self.stored as f64 / self.attempts as f64 }
	}
}

/// Read-path counters, keyed per operation label.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RetrievalMetrics {
	pub requests: u64,
	pub hits: u64,
	pub misses: u64,
	pub total_latency_ms: f64,
	pub operation_counts: HashMap<String, u64>,
}
impl RetrievalMetrics {
	pub fn hit_rate(&self) -> f64 {
		if self.requests == 0 { 0.0 } else { self.hits as f64 / self.requests as f64 }
	}

	pub fn avg_latency_ms(&self) -> f64 {
		if self.requests == 0 { 0.0 } else { self.total_latency_ms / self.requests as f64 }
	}
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct MemoryMetrics {
	pub capture: CaptureMetrics,
	pub retrieval: RetrievalMetrics,
}
impl MemoryMetrics {
	pub fn record_capture(&mut self, stored: bool, duplicate_detected: bool) {
		self.capture.attempts += 1;

		if stored {
			self.capture.stored += 1;
		} else {
			self.capture.skipped += 1;
		}
		if duplicate_detected {
			self.capture.duplicates += 1;
		}
	}

	pub fn record_retrieval(
		&mut self,
		operation: &str,
		match_count: usize,
		latency_ms: f64,
		success: bool,
	) {
		let key = {
			let folded = operation.trim().to_lowercase();

			if folded.is_empty() { "unknown".to_string() } else { folded }
		};

		self.retrieval.requests += 1;
		*self.retrieval.operation_counts.entry(key).or_insert(0) += 1;

		if success && match_count > 0 {
			self.retrieval.hits += 1;
		} else {
			self.retrieval.misses += 1;
		}

		self.retrieval.total_latency_ms += latency_ms.max(0.0);
	}
}
