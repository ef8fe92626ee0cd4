use std::sync::Arc;

use serde_json::{Map, Value};
use time::OffsetDateTime;

use mnemo_config::GenerationProviderConfig;
use mnemo_domain::record::{MemoryCategory, MemoryRecord, MemorySourceData};

use crate::GenerationProvider;

/// One variant per way a curation attempt can fail; `capture` contains all
/// of them.
#[derive(Debug, thiserror::Error)]
pub enum CurationError {
	#[error("Curator call failed: {message}")]
	Generation { message: String },
	#[error("Curator response is not valid JSON: {message}")]
	MalformedJson { message: String },
	#[error("Curator response is not a JSON object.")]
	WrongShape,
	#[error("Curator response is missing a summary.")]
	MissingSummary,
	#[error("Curator response carries an unknown category: {category:?}.")]
	UnknownCategory { category: String },
}

/// Summarises raw execution data into a structured record via the
/// text-generation service.
pub struct Curator {
	generation: Arc<dyn GenerationProvider>,
	generation_cfg: GenerationProviderConfig,
}
impl Curator {
	pub fn new(
		generation: Arc<dyn GenerationProvider>,
		generation_cfg: GenerationProviderConfig,
	) -> Self {
		Self { generation, generation_cfg }
	}

	pub async fn curate(
		&self,
		source: &MemorySourceData,
		now: OffsetDateTime,
	) -> Result<MemoryRecord, CurationError> {
		let prompt = render_prompt(source);
		let reply = self
			.generation
			.generate(&self.generation_cfg, &prompt)
			.await
			.map_err(|err| CurationError::Generation { message: err.to_string() })?;
		let payload = parse_response(&reply)?;

		build_record(&payload, source, now)
	}
}

fn render_prompt(source: &MemorySourceData) -> String {
	let tool_history = serde_json::to_string_pretty(&source.tool_invocations)
		.unwrap_or_else(|_| "[]".to_string());
	let categories = MemoryCategory::ALL.map(MemoryCategory::as_str).join(" | ");

	format!(
		"You distill an assistant's completed task into one reusable memory.\n\
Return JSON only, matching exactly:\n\
{{\"summary\": \"...\", \"user_intent\": \"...\", \"outcome\": \"...\", \
\"category\": \"...\", \"tools_used\": [\"...\"], \"tags\": [\"...\"]}}\n\
category must be one of: {categories}.\n\n\
Goal:\n{goal}\n\nUser request:\n{user_request}\n\nPlan checklist:\n{plan}\n\n\
Scratchpad:\n{scratchpad}\n\nTool history:\n{tool_history}\n\n\
Failure log:\n{failure_log}\n\nFinal response:\n{final_response}\n",
		goal = or_none(&source.goal),
		user_request = or_none(&source.user_request),
		plan = or_none(&source.plan_checklist),
		scratchpad = or_none(&source.scratchpad_digest),
		failure_log = or_none(&source.failure_log),
		final_response = or_none(source.final_response_draft.as_deref().unwrap_or("")),
	)
}

fn or_none(text: &str) -> &str {
	if text.trim().is_empty() { "(none)" } else { text }
}

fn parse_response(reply: &str) -> Result<Value, CurationError> {
	let cleaned = strip_code_fences(reply);
	let value: Value = serde_json::from_str(&cleaned)
		.map_err(|err| CurationError::MalformedJson { message: err.to_string() })?;

	if !value.is_object() {
		return Err(CurationError::WrongShape);
	}

	Ok(value)
}

fn strip_code_fences(reply: &str) -> String {
	let trimmed = reply.trim();

	if !trimmed.starts_with("```") {
		return trimmed.to_string();
	}

	let mut lines: Vec<&str> = trimmed.lines().collect();

	if lines.first().map(|line| line.starts_with("```")).unwrap_or(false) {
		lines.remove(0);
	}
	if lines.last().map(|line| line.trim().starts_with("```")).unwrap_or(false) {
		lines.pop();
	}

	lines.join("\n").trim().to_string()
}

fn build_record(
	payload: &Value,
	source: &MemorySourceData,
	now: OffsetDateTime,
) -> Result<MemoryRecord, CurationError> {
	let raw_category = payload.get("category").and_then(Value::as_str).unwrap_or("");
	let category = MemoryCategory::parse(raw_category)
		.ok_or_else(|| CurationError::UnknownCategory { category: raw_category.to_string() })?;
	let summary = coerce_text(payload.get("summary"));

	if summary.is_empty() {
		return Err(CurationError::MissingSummary);
	}

	let user_intent = {
		let parsed = coerce_text(payload.get("user_intent"));

		if parsed.is_empty() { source.user_request.clone() } else { parsed }
	};
	let outcome = {
		let parsed = coerce_text(payload.get("outcome"));

		if parsed.is_empty() { "unspecified".to_string() } else { parsed }
	};
	let tools_used = coerce_list(payload.get("tools_used"));
	let tags = coerce_list(payload.get("tags"));
	let mut source_metadata = source.metadata.clone();
	let mut curator_meta = match source_metadata.get("curator") {
		Some(Value::Object(map)) => map.clone(),
		_ => Map::new(),
	};

	curator_meta.insert("category".to_string(), Value::String(category.as_str().to_string()));
	curator_meta
		.insert("tags".to_string(), Value::Array(tags.iter().cloned().map(Value::String).collect()));
	source_metadata.insert("curator".to_string(), Value::Object(curator_meta));

	Ok(MemoryRecord {
		id: None,
		summary,
		goal: source.goal.clone(),
		user_intent,
		outcome,
		category,
		tools_used,
		tags,
		created_at: now,
		source_metadata,
		embedding: None,
	})
}

fn coerce_text(value: Option<&Value>) -> String {
	value.and_then(Value::as_str).map(str::trim).unwrap_or("").to_string()
}

/// Trimmed, non-empty, order-preserving and deduplicated.
fn coerce_list(value: Option<&Value>) -> Vec<String> {
	let Some(items) = value.and_then(Value::as_array) else {
		return Vec::new();
	};

	let mut out = Vec::new();

	for item in items.iter().filter_map(Value::as_str).map(str::trim) {
		if item.is_empty() || out.iter().any(|seen| seen == item) {
			continue;
		}

		out.push(item.to_string());
	}

	out
}
