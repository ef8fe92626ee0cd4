use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

/// High-level grouping for stored experiences. Closed set; anything else is
/// rejected at curation time.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
	FullExperience,
	ErrorSolution,
	ToolUsage,
	UserPattern,
	WorkflowOptimisation,
}
impl MemoryCategory {
	pub const ALL: [Self; 5] = [
		Self::FullExperience,
		Self::ErrorSolution,
		Self::ToolUsage,
		Self::UserPattern,
		Self::WorkflowOptimisation,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::FullExperience => "full_experience",
			Self::ErrorSolution => "error_solution",
			Self::ToolUsage => "tool_usage",
			Self::UserPattern => "user_pattern",
			Self::WorkflowOptimisation => "workflow_optimisation",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|category| category.as_str() == raw.trim())
	}
}

/// One tool invocation observed during the execution being captured.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ToolInvocation {
	pub tool: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub outcome: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_reason: Option<String>,
}

/// Raw ingredients gathered before running the curator. Immutable input.
#[derive(Clone, Debug)]
pub struct MemorySourceData {
	pub goal: String,
	pub user_request: String,
	pub plan_checklist: String,
	pub scratchpad_digest: String,
	pub tool_invocations: Vec<ToolInvocation>,
	pub failure_log: String,
	pub final_response_draft: Option<String>,
	pub metadata: Map<String, Value>,
}
impl MemorySourceData {
	/// Flattened source text scanned by the personal-information gates.
	pub fn gate_text(&self) -> String {
		let mut parts = vec![
			self.goal.as_str(),
			self.user_request.as_str(),
			self.scratchpad_digest.as_str(),
			self.failure_log.as_str(),
		];

		if let Some(response) = self.final_response_draft.as_deref() {
			parts.push(response);
		}

		parts.retain(|part| !part.trim().is_empty());

		parts.join("\n")
	}
}

/// Outcome of the retention policy for one capture attempt. Never persisted
/// standalone; the reason is stamped into record metadata on store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetentionDecision {
	pub should_store: bool,
	pub reason: String,
}
impl RetentionDecision {
	pub fn store(reason: impl Into<String>) -> Self {
		Self { should_store: true, reason: reason.into() }
	}

	pub fn skip(reason: impl Into<String>) -> Self {
		Self { should_store: false, reason: reason.into() }
	}
}

/// Normalised experience saved to the long-term store.
///
/// The id is assigned once, at first write, and never reassigned. The
/// embedding, when set, has the configured provider dimension.
#[derive(Clone, Debug)]
pub struct MemoryRecord {
	pub id: Option<Uuid>,
	pub summary: String,
	pub goal: String,
	pub user_intent: String,
	pub outcome: String,
	pub category: MemoryCategory,
	pub tools_used: Vec<String>,
	pub tags: Vec<String>,
	pub created_at: OffsetDateTime,
	pub source_metadata: Map<String, Value>,
	pub embedding: Option<Vec<f32>>,
}
impl MemoryRecord {
	/// Text fed to the embedding provider: the non-empty join of summary,
	/// goal, and user intent.
	pub fn embedding_payload(&self) -> String {
		[self.summary.as_str(), self.goal.as_str(), self.user_intent.as_str()]
			.into_iter()
			.filter(|part| !part.is_empty())
			.collect::<Vec<_>>()
			.join("\n")
	}
}

/// Importance breakdown for one record. Every component and the total lie
/// in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ImportanceScore {
	pub total: f64,
	pub frequency: f64,
	pub recency: f64,
	pub success: f64,
	pub feedback: f64,
	pub entity: f64,
}
impl ImportanceScore {
	pub const ZERO: Self =
		Self { total: 0.0, frequency: 0.0, recency: 0.0, success: 0.0, feedback: 0.0, entity: 0.0 };
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn category_round_trips_wire_names() {
		for category in MemoryCategory::ALL {
			assert_eq!(MemoryCategory::parse(category.as_str()), Some(category));
		}

		assert_eq!(MemoryCategory::parse("unknown"), None);
		assert_eq!(MemoryCategory::parse(" error_solution "), Some(MemoryCategory::ErrorSolution));
	}

	#[test]
	fn embedding_payload_skips_empty_fields() {
		let record = MemoryRecord {
			id: None,
			summary: "Planned the week".to_string(),
			goal: String::new(),
			user_intent: "plan my week".to_string(),
			outcome: "done".to_string(),
			category: MemoryCategory::FullExperience,
			tools_used: Vec::new(),
			tags: Vec::new(),
			created_at: OffsetDateTime::UNIX_EPOCH,
			source_metadata: Map::new(),
			embedding: None,
		};

		assert_eq!(record.embedding_payload(), "Planned the week\nplan my week");
	}
}
