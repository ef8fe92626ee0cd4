/// Bootstrap SQL for the metadata store. The FTS5 table is an external
/// content mirror over `memories`; the triggers keep it in sync with every
/// insert, update, and delete so keyword search never sees stale rows.
pub fn render_schema() -> &'static str {
	r#"
CREATE TABLE IF NOT EXISTS memories (
	id INTEGER PRIMARY KEY AUTOINCREMENT,
	external_id TEXT NOT NULL UNIQUE,
	summary TEXT NOT NULL,
	goal TEXT NOT NULL,
	user_intent TEXT NOT NULL,
	outcome TEXT NOT NULL,
	category TEXT NOT NULL,
	tools_used TEXT NOT NULL,
	tags TEXT NOT NULL,
	created_at TEXT NOT NULL,
	source_metadata TEXT NOT NULL,
	embedding TEXT
);

CREATE INDEX IF NOT EXISTS idx_memories_category ON memories(category);

CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
	summary,
	goal,
	user_intent,
	outcome,
	tags,
	content='memories',
	content_rowid='id'
);

CREATE TRIGGER IF NOT EXISTS memories_fts_after_insert AFTER INSERT ON memories BEGIN
	INSERT INTO memories_fts(rowid, summary, goal, user_intent, outcome, tags)
	VALUES (new.id, new.summary, new.goal, new.user_intent, new.outcome, new.tags);
END;

CREATE TRIGGER IF NOT EXISTS memories_fts_after_delete AFTER DELETE ON memories BEGIN
	INSERT INTO memories_fts(memories_fts, rowid, summary, goal, user_intent, outcome, tags)
	VALUES ('delete', old.id, old.summary, old.goal, old.user_intent, old.outcome, old.tags);
END;

CREATE TRIGGER IF NOT EXISTS memories_fts_after_update AFTER UPDATE ON memories BEGIN
	INSERT INTO memories_fts(memories_fts, rowid, summary, goal, user_intent, outcome, tags)
	VALUES ('delete', old.id, old.summary, old.goal, old.user_intent, old.outcome, old.tags);
	INSERT INTO memories_fts(rowid, summary, goal, user_intent, outcome, tags)
	VALUES (new.id, new.summary, new.goal, new.user_intent, new.outcome, new.tags);
END;

CREATE TABLE IF NOT EXISTS memory_access_log (
	id INTEGER PRIMARY KEY AUTOINCREMENT,
	memory_id TEXT NOT NULL,
	accessed_at TEXT NOT NULL,
	access_type TEXT NOT NULL DEFAULT 'retrieval'
);

CREATE INDEX IF NOT EXISTS idx_access_log_memory ON memory_access_log(memory_id);
CREATE INDEX IF NOT EXISTS idx_access_log_time ON memory_access_log(accessed_at DESC);

CREATE TABLE IF NOT EXISTS memory_feedback (
	memory_id TEXT PRIMARY KEY,
	rating REAL NOT NULL,
	comment TEXT NOT NULL DEFAULT '',
	updated_at TEXT NOT NULL
);
"#
}
