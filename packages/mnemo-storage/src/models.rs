use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use mnemo_domain::record::{MemoryCategory, MemoryRecord};

use crate::{Error, Result};

/// Row shape of the `memories` table. List-valued and map-valued fields are
/// stored as JSON text; the embedding is serialized separately from the
/// metadata map.
#[derive(Debug, sqlx::FromRow)]
pub struct MemoryRow {
	pub external_id: String,
	pub summary: String,
	pub goal: String,
	pub user_intent: String,
	pub outcome: String,
	pub category: String,
	pub tools_used: String,
	pub tags: String,
	pub created_at: String,
	pub source_metadata: String,
	pub embedding: Option<String>,
}
impl MemoryRow {
	pub fn into_record(self) -> Result<MemoryRecord> {
		let id = Uuid::parse_str(&self.external_id).map_err(|_| {
			Error::Corrupt(format!("Row carries a non-UUID external id: {:?}.", self.external_id))
		})?;
		let category = MemoryCategory::parse(&self.category).ok_or_else(|| {
			Error::Corrupt(format!("Row {id} carries an unknown category: {:?}.", self.category))
		})?;
		let tools_used: Vec<String> = serde_json::from_str(&self.tools_used)?;
		let tags: Vec<String> = serde_json::from_str(&self.tags)?;
		let source_metadata: Map<String, Value> = serde_json::from_str(&self.source_metadata)?;
		let embedding: Option<Vec<f32>> = match self.embedding.as_deref() {
			Some(raw) => serde_json::from_str(raw)?,
			None => None,
		};
		let created_at = parse_timestamp(&self.created_at)
			.ok_or_else(|| Error::Corrupt(format!("Row {id} carries a bad created_at value.")))?;

		Ok(MemoryRecord {
			id: Some(id),
			summary: self.summary,
			goal: self.goal,
			user_intent: self.user_intent,
			outcome: self.outcome,
			category,
			tools_used,
			tags,
			created_at,
			source_metadata,
			embedding,
		})
	}
}

pub fn format_timestamp(ts: OffsetDateTime) -> String {
	ts.format(&Rfc3339).unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
	OffsetDateTime::parse(raw, &Rfc3339).ok()
}
