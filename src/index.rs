use crate::error::MemoryError;
use crate::repository::MemoryRepository;
use crate::types::{
    ContextText, EmbedderSignature, MemoryRecord, MemorySource, MemoryStats, NewMemory, TrainerContext,
    TrainerMemory, TrustWeight,
};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use std::path::Path;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    avatar_id TEXT NOT NULL,
    content TEXT NOT NULL,
    category TEXT,
    trust_weight TEXT NOT NULL,
    source TEXT NOT NULL,
    embedding BLOB NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memories_avatar ON memories(avatar_id, is_active);

CREATE TABLE IF NOT EXISTS trainer_contexts (
    trainer_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (trainer_id, position)
);

CREATE TABLE IF NOT EXISTS embedder (
    id INTEGER PRIMARY KEY CHECK (id = 0),
    name TEXT NOT NULL,
    dimension INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS trainer_context_texts (
    trainer_id TEXT NOT NULL,
    context_index INTEGER NOT NULL,
    content TEXT NOT NULL,
    PRIMARY KEY (trainer_id, context_index)
);
"#;

const MEMORY_COLUMNS: &str =
    "id, avatar_id, content, category, trust_weight, source, embedding, is_active, created_at, updated_at";

/// Memory store backed by SQLite
pub struct MemoryStore {
    conn: Connection,
}

impl MemoryStore {
    /// Open or create the memory database
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // -------------------------------------------------------------------------
    // Embedding serialization
    // -------------------------------------------------------------------------

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(data: &[u8]) -> Vec<f32> {
        data.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_memory(row: &Row) -> Result<MemoryRecord> {
        let trust: String = row.get(4)?;
        let source: String = row.get(5)?;
        let embedding: Vec<u8> = row.get(6)?;

        Ok(MemoryRecord {
            id: row.get(0)?,
            avatar_id: row.get(1)?,
            text: row.get(2)?,
            category: row.get(3)?,
            trust_weight: trust.parse().unwrap_or(TrustWeight::Unknown),
            source: source
                .parse::<MemorySource>()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.into()))?,
            embedding: Self::deserialize_embedding(&embedding),
            is_active: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn query_memories(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<MemoryRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_memory)?;
        rows.collect()
    }

    // -------------------------------------------------------------------------
    // Memory operations
    // -------------------------------------------------------------------------

    /// Add a new memory, returns the ID
    pub fn add(&self, memory: &NewMemory) -> Result<i64> {
        let now = Utc::now();

        self.conn.execute(
            "INSERT INTO memories (avatar_id, content, category, trust_weight, source, embedding, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)",
            params![
                memory.avatar_id,
                memory.text,
                memory.category,
                memory.trust_weight.as_str(),
                memory.source.as_str(),
                Self::serialize_embedding(&memory.embedding),
                now,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        tracing::info!(id, avatar_id = %memory.avatar_id, trust = %memory.trust_weight, "memory added");

        Ok(id)
    }

    /// Get a memory by ID, archived or not
    pub fn get(&self, id: i64) -> Result<Option<MemoryRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM memories WHERE id = ?1", MEMORY_COLUMNS),
                params![id],
                Self::row_to_memory,
            )
            .optional()
    }

    /// Active memories for an avatar in insertion order
    pub fn active_for_avatar(&self, avatar_id: &str) -> Result<Vec<MemoryRecord>> {
        self.query_memories(
            &format!(
                "SELECT {} FROM memories WHERE avatar_id = ?1 AND is_active = 1 ORDER BY id ASC",
                MEMORY_COLUMNS
            ),
            params![avatar_id],
        )
    }

    /// List recently updated active memories for an avatar
    pub fn list(&self, avatar_id: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        self.query_memories(
            &format!(
                "SELECT {} FROM memories
                 WHERE avatar_id = ?1 AND is_active = 1
                 ORDER BY updated_at DESC, id DESC
                 LIMIT ?2",
                MEMORY_COLUMNS
            ),
            params![avatar_id, limit as i64],
        )
    }

    /// Replace the text of an active memory along with its embedding
    pub fn update_text(&self, id: i64, text: &str, embedding: &[f32]) -> Result<bool> {
        let count = self.conn.execute(
            "UPDATE memories SET content = ?1, embedding = ?2, updated_at = ?3 WHERE id = ?4 AND is_active = 1",
            params![text, Self::serialize_embedding(embedding), Utc::now(), id],
        )?;
        Ok(count > 0)
    }

    /// Set or clear the category of an active memory
    pub fn update_category(&self, id: i64, category: Option<&str>) -> Result<bool> {
        let count = self.conn.execute(
            "UPDATE memories SET category = ?1, updated_at = ?2 WHERE id = ?3 AND is_active = 1",
            params![category, Utc::now(), id],
        )?;
        Ok(count > 0)
    }

    /// Soft-delete a memory. Returns false if it was missing or already archived.
    pub fn archive(&self, id: i64) -> Result<bool> {
        let count = self.conn.execute(
            "UPDATE memories SET is_active = 0, updated_at = ?1 WHERE id = ?2 AND is_active = 1",
            params![Utc::now(), id],
        )?;

        if count > 0 {
            tracing::info!(id, "memory archived");
        }
        Ok(count > 0)
    }

    /// Count of active memories for an avatar
    pub fn count(&self, avatar_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE avatar_id = ?1 AND is_active = 1",
            params![avatar_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Avatars with their active memory counts
    pub fn avatars(&self) -> Result<Vec<(String, usize)>> {
        let mut stmt = self.conn.prepare(
            "SELECT avatar_id, COUNT(*) as count FROM memories
             WHERE is_active = 1
             GROUP BY avatar_id
             ORDER BY count DESC, avatar_id ASC",
        )?;

        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize)))?;
        rows.collect()
    }

    /// Breakdown of an avatar's memories by trust class and source
    pub fn stats(&self, avatar_id: &str) -> Result<MemoryStats> {
        let mut stats = MemoryStats {
            total_memories: self.count(avatar_id)?,
            ..Default::default()
        };

        stats.archived_memories = self.conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE avatar_id = ?1 AND is_active = 0",
            params![avatar_id],
            |row| row.get::<_, i64>(0),
        )? as usize;

        for (column, target) in [
            ("trust_weight", &mut stats.by_trust),
            ("source", &mut stats.by_source),
        ] {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {0}, COUNT(*) FROM memories WHERE avatar_id = ?1 AND is_active = 1 GROUP BY {0}",
                column
            ))?;
            let mut rows = stmt.query(params![avatar_id])?;
            while let Some(row) = rows.next()? {
                target.insert(row.get(0)?, row.get::<_, i64>(1)? as usize);
            }
        }

        Ok(stats)
    }

    // -------------------------------------------------------------------------
    // Embedder bookkeeping
    // -------------------------------------------------------------------------

    /// Embedder the stored vectors were produced with, if recorded
    pub fn embedder_signature(&self) -> Result<Option<EmbedderSignature>> {
        self.conn
            .query_row("SELECT name, dimension FROM embedder WHERE id = 0", [], |row| {
                Ok(EmbedderSignature {
                    name: row.get(0)?,
                    dimension: row.get::<_, i64>(1)? as usize,
                })
            })
            .optional()
    }

    /// Record the embedder on first write. An existing record is kept.
    pub fn record_embedder(&self, signature: &EmbedderSignature) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO embedder (id, name, dimension) VALUES (0, ?1, ?2)",
            params![signature.name, signature.dimension as i64],
        )?;
        Ok(())
    }

    /// Dimension of any stored embedding, for stores written before the embedder was recorded
    pub fn stored_dimension(&self) -> Result<Option<usize>> {
        self.conn
            .query_row(
                "SELECT length(embedding) / 4 FROM memories WHERE length(embedding) > 0
                 UNION ALL
                 SELECT length(embedding) / 4 FROM trainer_contexts WHERE length(embedding) > 0
                 LIMIT 1",
                [],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map(|dim| dim.map(|d| d as usize))
    }

    // -------------------------------------------------------------------------
    // Trainer knowledge base
    // -------------------------------------------------------------------------

    /// Append a context to a trainer's list and label it with its own text.
    /// Returns the context's index.
    pub fn add_trainer_context(&self, trainer_id: &str, text: &str, embedding: &[f32]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;

        let position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM trainer_contexts WHERE trainer_id = ?1",
            params![trainer_id],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO trainer_contexts (trainer_id, position, content, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![trainer_id, position, text, Self::serialize_embedding(embedding), Utc::now()],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO trainer_context_texts (trainer_id, context_index, content) VALUES (?1, ?2, ?3)",
            params![trainer_id, position, text],
        )?;
        tx.commit()?;

        tracing::info!(trainer_id, index = position, "trainer context added");
        Ok(position as usize)
    }

    /// Set the display text for a context index
    pub fn set_context_text(&self, trainer_id: &str, index: usize, text: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO trainer_context_texts (trainer_id, context_index, content) VALUES (?1, ?2, ?3)",
            params![trainer_id, index as i64, text],
        )?;
        Ok(())
    }

    /// Remove the display text for a context index
    pub fn clear_context_text(&self, trainer_id: &str, index: usize) -> Result<bool> {
        let count = self.conn.execute(
            "DELETE FROM trainer_context_texts WHERE trainer_id = ?1 AND context_index = ?2",
            params![trainer_id, index as i64],
        )?;
        Ok(count > 0)
    }

    /// Load a trainer's contexts and text projection
    pub fn get_trainer_memory(&self, trainer_id: &str) -> Result<Option<TrainerMemory>> {
        let mut stmt = self.conn.prepare(
            "SELECT content, embedding, created_at FROM trainer_contexts
             WHERE trainer_id = ?1 ORDER BY position ASC",
        )?;
        let contexts = stmt
            .query_map(params![trainer_id], |row| {
                let embedding: Vec<u8> = row.get(1)?;
                Ok(TrainerContext {
                    text: row.get(0)?,
                    embedding: Self::deserialize_embedding(&embedding),
                    created_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT context_index, content FROM trainer_context_texts
             WHERE trainer_id = ?1 ORDER BY context_index ASC",
        )?;
        let context_texts = stmt
            .query_map(params![trainer_id], |row| {
                Ok(ContextText {
                    context_index: row.get::<_, i64>(0)? as usize,
                    text: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        if contexts.is_empty() && context_texts.is_empty() {
            return Ok(None);
        }

        Ok(Some(TrainerMemory {
            trainer_id: trainer_id.to_string(),
            contexts,
            context_texts,
        }))
    }
}

impl MemoryRepository for MemoryStore {
    fn active_memories(&self, avatar_id: &str) -> std::result::Result<Vec<MemoryRecord>, MemoryError> {
        Ok(self.active_for_avatar(avatar_id)?)
    }

    fn trainer_memory(&self, trainer_id: &str) -> std::result::Result<Option<TrainerMemory>, MemoryError> {
        Ok(self.get_trainer_memory(trainer_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_memory(avatar: &str, text: &str, trust: TrustWeight, source: MemorySource) -> NewMemory {
        NewMemory {
            avatar_id: avatar.to_string(),
            text: text.to_string(),
            embedding: vec![1.0, 2.0, 3.0],
            category: None,
            trust_weight: trust,
            source,
        }
    }

    #[test]
    fn test_add_and_get() {
        let store = MemoryStore::in_memory().unwrap();

        let mut memory = new_memory("ava", "Test memory content", TrustWeight::Trainer, MemorySource::TrainerAdded);
        memory.category = Some("hobbies".to_string());
        let id = store.add(&memory).unwrap();

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.text, "Test memory content");
        assert_eq!(record.avatar_id, "ava");
        assert_eq!(record.category.as_deref(), Some("hobbies"));
        assert_eq!(record.trust_weight, TrustWeight::Trainer);
        assert_eq!(record.source, MemorySource::TrainerAdded);
        assert_eq!(record.embedding, vec![1.0, 2.0, 3.0]);
        assert!(record.is_active);
    }

    #[test]
    fn test_empty_category_is_not_absent() {
        let store = MemoryStore::in_memory().unwrap();

        let mut memory = new_memory("ava", "blank", TrustWeight::Owner, MemorySource::UserSaved);
        memory.category = Some(String::new());
        let blank = store.add(&memory).unwrap();
        let absent = store
            .add(&new_memory("ava", "none", TrustWeight::Owner, MemorySource::UserSaved))
            .unwrap();

        assert_eq!(store.get(blank).unwrap().unwrap().category, Some(String::new()));
        assert_eq!(store.get(absent).unwrap().unwrap().category, None);
    }

    #[test]
    fn test_archive_hides_from_retrieval() {
        let store = MemoryStore::in_memory().unwrap();

        let id = store
            .add(&new_memory("ava", "To archive", TrustWeight::Owner, MemorySource::UserSaved))
            .unwrap();
        store
            .add(&new_memory("ava", "To keep", TrustWeight::Owner, MemorySource::UserSaved))
            .unwrap();

        assert!(store.archive(id).unwrap());
        assert!(!store.archive(id).unwrap());

        // Archived memories are kept, just inactive
        assert!(!store.get(id).unwrap().unwrap().is_active);

        let active = store.active_memories("ava").unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].text, "To keep");
        assert_eq!(store.count("ava").unwrap(), 1);
    }

    #[test]
    fn test_active_memories_scoped_and_ordered() {
        let store = MemoryStore::in_memory().unwrap();

        for text in ["one", "two", "three"] {
            store
                .add(&new_memory("ava", text, TrustWeight::Owner, MemorySource::UserSaved))
                .unwrap();
        }
        store
            .add(&new_memory("bob", "other", TrustWeight::Owner, MemorySource::UserSaved))
            .unwrap();

        let texts: Vec<String> = store
            .active_memories("ava")
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);

        let avatars = store.avatars().unwrap();
        assert_eq!(avatars, vec![("ava".to_string(), 3), ("bob".to_string(), 1)]);
    }

    #[test]
    fn test_update_text_and_category() {
        let store = MemoryStore::in_memory().unwrap();
        let id = store
            .add(&new_memory("ava", "likes tea", TrustWeight::Owner, MemorySource::UserSaved))
            .unwrap();

        assert!(store.update_text(id, "likes green tea", &[0.5, 0.5]).unwrap());
        assert!(store.update_category(id, Some("drinks")).unwrap());

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.text, "likes green tea");
        assert_eq!(record.embedding, vec![0.5, 0.5]);
        assert_eq!(record.category.as_deref(), Some("drinks"));
        assert_eq!(record.trust_weight, TrustWeight::Owner);

        store.archive(id).unwrap();
        assert!(!store.update_category(id, None).unwrap());
    }

    #[test]
    fn test_unknown_trust_weight_reads_as_unknown() {
        let store = MemoryStore::in_memory().unwrap();
        let id = store
            .add(&new_memory("ava", "odd", TrustWeight::Owner, MemorySource::UserSaved))
            .unwrap();

        store
            .conn
            .execute("UPDATE memories SET trust_weight = 'superuser' WHERE id = ?1", params![id])
            .unwrap();

        assert_eq!(store.get(id).unwrap().unwrap().trust_weight, TrustWeight::Unknown);
    }

    #[test]
    fn test_stats() {
        let store = MemoryStore::in_memory().unwrap();
        store
            .add(&new_memory("ava", "a", TrustWeight::Owner, MemorySource::UserSaved))
            .unwrap();
        store
            .add(&new_memory("ava", "b", TrustWeight::Derived, MemorySource::ConversationExtract))
            .unwrap();
        let c = store
            .add(&new_memory("ava", "c", TrustWeight::Derived, MemorySource::ConversationExtract))
            .unwrap();
        store.archive(c).unwrap();

        let stats = store.stats("ava").unwrap();
        assert_eq!(stats.total_memories, 2);
        assert_eq!(stats.archived_memories, 1);
        assert_eq!(stats.by_trust.get("owner"), Some(&1));
        assert_eq!(stats.by_trust.get("derived"), Some(&1));
        assert_eq!(stats.by_source.get("conversation_extract"), Some(&1));
    }

    #[test]
    fn test_trainer_contexts() {
        let store = MemoryStore::in_memory().unwrap();
        assert!(store.trainer_memory("coach").unwrap().is_none());

        assert_eq!(store.add_trainer_context("coach", "first", &[1.0, 0.0]).unwrap(), 0);
        assert_eq!(store.add_trainer_context("coach", "second", &[0.0, 1.0]).unwrap(), 1);
        assert_eq!(store.add_trainer_context("other", "elsewhere", &[0.0, 1.0]).unwrap(), 0);

        store.set_context_text("coach", 1, "Second, relabelled").unwrap();
        assert!(store.clear_context_text("coach", 0).unwrap());

        let memory = store.trainer_memory("coach").unwrap().unwrap();
        assert_eq!(memory.contexts.len(), 2);
        assert_eq!(memory.contexts[1].text, "second");
        assert_eq!(memory.contexts[1].embedding, vec![0.0, 1.0]);
        assert_eq!(
            memory.context_texts,
            vec![ContextText {
                context_index: 1,
                text: "Second, relabelled".to_string(),
            }]
        );
    }

    #[test]
    fn test_embedder_signature() {
        let store = MemoryStore::in_memory().unwrap();
        assert!(store.embedder_signature().unwrap().is_none());
        assert!(store.stored_dimension().unwrap().is_none());

        store
            .add(&new_memory("ava", "legacy", TrustWeight::Owner, MemorySource::UserSaved))
            .unwrap();
        assert_eq!(store.stored_dimension().unwrap(), Some(3));

        let server = EmbedderSignature {
            name: "server".to_string(),
            dimension: 768,
        };
        store.record_embedder(&server).unwrap();
        store
            .record_embedder(&EmbedderSignature {
                name: "lite".to_string(),
                dimension: 384,
            })
            .unwrap();

        assert_eq!(store.embedder_signature().unwrap(), Some(server));
    }
}
