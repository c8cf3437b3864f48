use crate::config::{find_store_path, ConfigFile, StoreConfig, STORE_DIR, STORE_PATH_ENV};
use crate::embeddings::{get_embedder, Embedder};
use crate::error::{MemoryError, Result};
use crate::index::MemoryStore;
use crate::ranker::MemoryRanker;
use crate::trainer::TrainerContextRanker;
use crate::types::{
    ConfidenceRanking, EmbedderSignature, MemoryRecord, MemorySource, MemoryStats, NewMemory,
    RankedMemory, TrainerRanking, TrustWeight,
};
use std::fs;
use std::path::{Path, PathBuf};

const DB_FILE: &str = "memory.db";

/// Fields of a memory to change; `None` leaves a field untouched
#[derive(Debug, Default)]
pub struct MemoryUpdate<'a> {
    pub text: Option<&'a str>,
    /// `Some(None)` clears the category
    pub category: Option<Option<&'a str>>,
}

/// The main memory interface: a store, an embedder and their configuration
pub struct AvatarMemory {
    store_path: PathBuf,
    store: MemoryStore,
    embedder: Box<dyn Embedder>,
    config: StoreConfig,
}

impl AvatarMemory {
    /// Open the store found from the current directory
    pub fn open() -> Result<Self> {
        let store_path = find_store_path().ok_or_else(|| {
            MemoryError::Config(format!(
                "No {} directory found. Run 'avatar-memory init' first or set {}.",
                STORE_DIR, STORE_PATH_ENV
            ))
        })?;
        Self::open_at(store_path)
    }

    /// Open a store at a specific path
    pub fn open_at(store_path: PathBuf) -> Result<Self> {
        if !store_path.exists() {
            return Err(MemoryError::Config(format!(
                "Path does not exist: {}",
                store_path.display()
            )));
        }

        let config = ConfigFile::load(&store_path)?.resolve()?;
        let store = MemoryStore::open(&store_path.join(DB_FILE))?;
        let embedder = get_embedder(&config);

        tracing::debug!(path = %store_path.display(), embedder = embedder.name(), "opened store");

        Ok(Self {
            store_path,
            store,
            embedder,
            config,
        })
    }

    /// Create a new store directory under `path`
    pub fn init(path: &Path) -> Result<Self> {
        let store_path = path.join(STORE_DIR);
        fs::create_dir_all(&store_path)?;
        Self::open_at(store_path)
    }

    /// Assemble from parts, bypassing the filesystem
    pub fn with_parts(store: MemoryStore, embedder: Box<dyn Embedder>, config: StoreConfig) -> Self {
        Self {
            store_path: PathBuf::new(),
            store,
            embedder,
            config,
        }
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    /// Embed text for comparison against stored vectors
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.embedder.embed(text)?;
        self.check_embedder(embedding.len())?;
        Ok(embedding)
    }

    /// Embed text that is about to be stored, recording the embedder on first write
    fn embed_for_store(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.embed(text)?;
        self.store.record_embedder(&EmbedderSignature {
            name: self.embedder.name().to_string(),
            dimension: embedding.len(),
        })?;
        Ok(embedding)
    }

    /// Fail if the active embedder is not the one the store was written with
    fn check_embedder(&self, dimension: usize) -> Result<()> {
        let name = self.embedder.name();

        if let Some(recorded) = self.store.embedder_signature()? {
            if recorded.name != name || recorded.dimension != dimension {
                return Err(MemoryError::Embedding(format!(
                    "store was embedded with {} ({} dims) but the active embedder is {} ({} dims)",
                    recorded.name, recorded.dimension, name, dimension
                )));
            }
        } else if let Some(stored) = self.store.stored_dimension()? {
            if stored != dimension {
                return Err(MemoryError::Embedding(format!(
                    "stored embeddings have {} dims but the active embedder {} produces {}",
                    stored, name, dimension
                )));
            }
        }

        Ok(())
    }

    // =========================================================================
    // Avatar memories
    // =========================================================================

    /// Embed and store a new memory. Trust defaults from the source channel.
    pub fn remember(
        &self,
        avatar_id: &str,
        text: &str,
        source: MemorySource,
        trust_weight: Option<TrustWeight>,
        category: Option<&str>,
    ) -> Result<i64> {
        let embedding = self.embed_for_store(text)?;

        Ok(self.store.add(&NewMemory {
            avatar_id: avatar_id.to_string(),
            text: text.to_string(),
            embedding,
            category: category.map(str::to_string),
            trust_weight: trust_weight.unwrap_or_else(|| source.default_trust()),
            source,
        })?)
    }

    /// Change text and/or category of an active memory, re-embedding on text change
    pub fn update(&self, id: i64, update: MemoryUpdate<'_>) -> Result<()> {
        let existing = self.get(id)?.ok_or(MemoryError::NotFound(id))?;
        if !existing.is_active {
            return Err(MemoryError::NotFound(id));
        }

        if let Some(text) = update.text {
            let embedding = self.embed_for_store(text)?;
            self.store.update_text(id, text, &embedding)?;
        }

        if let Some(category) = update.category {
            self.store.update_category(id, category)?;
        }

        Ok(())
    }

    /// Soft-delete a memory
    pub fn archive(&self, id: i64) -> Result<bool> {
        Ok(self.store.archive(id)?)
    }

    pub fn get(&self, id: i64) -> Result<Option<MemoryRecord>> {
        Ok(self.store.get(id)?)
    }

    /// Recently updated active memories
    pub fn list(&self, avatar_id: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        Ok(self.store.list(avatar_id, limit)?)
    }

    /// Every active memory in insertion order
    pub fn all(&self, avatar_id: &str) -> Result<Vec<MemoryRecord>> {
        Ok(self.store.active_for_avatar(avatar_id)?)
    }

    /// Best-effort recall weighted by trust and recency
    pub fn recall(&self, avatar_id: &str, query: &str, top_k: Option<usize>) -> Result<Vec<RankedMemory>> {
        let query_embedding = self.embed(query)?;
        MemoryRanker::new(&self.store).rank_by_trust_and_recency(
            avatar_id,
            &query_embedding,
            top_k.unwrap_or(self.config.top_k),
        )
    }

    /// Confidence-gated recall on pure similarity
    pub fn ask(
        &self,
        avatar_id: &str,
        query: &str,
        top_k: Option<usize>,
        confidence_threshold: Option<f64>,
    ) -> Result<ConfidenceRanking> {
        let query_embedding = self.embed(query)?;
        MemoryRanker::new(&self.store).rank_by_confidence(
            avatar_id,
            &query_embedding,
            top_k.unwrap_or(self.config.top_k),
            confidence_threshold.unwrap_or(self.config.confidence_threshold),
        )
    }

    pub fn stats(&self, avatar_id: &str) -> Result<MemoryStats> {
        Ok(self.store.stats(avatar_id)?)
    }

    pub fn avatars(&self) -> Result<Vec<(String, usize)>> {
        Ok(self.store.avatars()?)
    }

    // =========================================================================
    // Trainer knowledge base
    // =========================================================================

    /// Embed and append a context to a trainer's knowledge base, returns its index
    pub fn teach(&self, trainer_id: &str, text: &str) -> Result<usize> {
        let embedding = self.embed_for_store(text)?;
        Ok(self.store.add_trainer_context(trainer_id, text, &embedding)?)
    }

    /// Set the display text for a trainer context
    pub fn label_context(&self, trainer_id: &str, index: usize, text: &str) -> Result<()> {
        Ok(self.store.set_context_text(trainer_id, index, text)?)
    }

    /// Remove the display text for a trainer context
    pub fn unlabel_context(&self, trainer_id: &str, index: usize) -> Result<bool> {
        Ok(self.store.clear_context_text(trainer_id, index)?)
    }

    pub fn trainer_recall(
        &self,
        trainer_id: &str,
        query: &str,
        top_k: Option<usize>,
        confidence_threshold: Option<f64>,
    ) -> Result<TrainerRanking> {
        let query_embedding = self.embed(query)?;
        TrainerContextRanker::new(&self.store).rank_contexts(
            trainer_id,
            &query_embedding,
            top_k.unwrap_or(self.config.top_k),
            confidence_threshold.unwrap_or(self.config.confidence_threshold),
        )
    }
}
