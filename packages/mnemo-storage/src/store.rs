use sqlx::SqlitePool;
use uuid::Uuid;

use mnemo_domain::record::MemoryRecord;

use crate::{
	Error, Result,
	models::{MemoryRow, format_timestamp},
};

/// Upserts the record by external id. The id must already be assigned; the
/// repository owns id assignment.
pub async fn save(pool: &SqlitePool, record: &MemoryRecord) -> Result<()> {
	let Some(id) = record.id else {
		return Err(Error::InvalidArgument("Record has no assigned id.".to_string()));
	};
	let tools_used = serde_json::to_string(&record.tools_used)?;
	let tags = serde_json::to_string(&record.tags)?;
	let source_metadata = serde_json::to_string(&record.source_metadata)?;
	let embedding = match record.embedding.as_ref() {
		Some(vec) => Some(serde_json::to_string(vec)?),
		None => None,
	};

	sqlx::query(
		"\
INSERT INTO memories
	(external_id, summary, goal, user_intent, outcome, category, tools_used, tags, created_at, source_metadata, embedding)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
ON CONFLICT(external_id) DO UPDATE SET
	summary = excluded.summary,
	goal = excluded.goal,
	user_intent = excluded.user_intent,
	outcome = excluded.outcome,
	category = excluded.category,
	tools_used = excluded.tools_used,
	tags = excluded.tags,
	created_at = excluded.created_at,
	source_metadata = excluded.source_metadata,
	embedding = excluded.embedding",
	)
	.bind(id.to_string())
	.bind(&record.summary)
	.bind(&record.goal)
	.bind(&record.user_intent)
	.bind(&record.outcome)
	.bind(record.category.as_str())
	.bind(tools_used)
	.bind(tags)
	.bind(format_timestamp(record.created_at))
	.bind(source_metadata)
	.bind(embedding)
	.execute(pool)
	.await?;

	Ok(())
}

/// Every stored record. No ordering guarantee beyond being stable enough
/// for callers to sort explicitly.
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<MemoryRecord>> {
	let rows: Vec<MemoryRow> = sqlx::query_as(
		"\
SELECT external_id, summary, goal, user_intent, outcome, category, tools_used, tags, created_at, source_metadata, embedding
FROM memories",
	)
	.fetch_all(pool)
	.await?;

	rows.into_iter().map(MemoryRow::into_record).collect()
}

/// Full-text lookup over the FTS5 mirror. Returns `(id, raw bm25 rank)`
/// pairs ordered best-first; the raw rank is more negative for better
/// matches and is normalized by the retrieval layer, not here.
pub async fn keyword_search(
	pool: &SqlitePool,
	query: &str,
	k: u32,
) -> Result<Vec<(Uuid, f64)>> {
	let match_query = prepare_match_query(query);

	if match_query.is_empty() {
		return Ok(Vec::new());
	}

	let rows: Vec<(String, f64)> = sqlx::query_as(
		"\
SELECT m.external_id, rank
FROM memories_fts
JOIN memories m ON m.id = memories_fts.rowid
WHERE memories_fts MATCH ?1
ORDER BY rank
LIMIT ?2",
	)
	.bind(&match_query)
	.bind(i64::from(k))
	.fetch_all(pool)
	.await?;

	let mut out = Vec::with_capacity(rows.len());

	for (raw_id, rank) in rows {
		match Uuid::parse_str(&raw_id) {
			Ok(id) => out.push((id, rank)),
			Err(_) => {
				tracing::warn!(external_id = %raw_id, "Keyword hit carries a non-UUID id; dropped.");
			},
		}
	}

	Ok(out)
}

/// Sanitizes free text into an OR-joined FTS5 MATCH expression. FTS syntax
/// characters become separators so user text can never produce a syntax
/// error.
pub fn prepare_match_query(query: &str) -> String {
	let cleaned: String = query
		.chars()
		.map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
		.collect();
	let terms: Vec<String> =
		cleaned.split_whitespace().map(|term| format!("\"{term}\"")).collect();

	terms.join(" OR ")
}
