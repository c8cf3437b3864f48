use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Provenance class of a memory: who or what asserted it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustWeight {
    Owner,
    Trainer,
    Derived,
    /// Any value not recognised when reading stored or serialized data
    #[serde(other)]
    Unknown,
}

impl TrustWeight {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustWeight::Owner => "owner",
            TrustWeight::Trainer => "trainer",
            TrustWeight::Derived => "derived",
            TrustWeight::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TrustWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrustWeight {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "owner" => TrustWeight::Owner,
            "trainer" => TrustWeight::Trainer,
            "derived" => TrustWeight::Derived,
            _ => TrustWeight::Unknown,
        })
    }
}

/// Channel a memory arrived through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    UserSaved,
    TrainerAdded,
    VoiceInput,
    ConversationExtract,
}

impl MemorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemorySource::UserSaved => "user_saved",
            MemorySource::TrainerAdded => "trainer_added",
            MemorySource::VoiceInput => "voice_input",
            MemorySource::ConversationExtract => "conversation_extract",
        }
    }

    /// Trust class a memory gets by default when it arrives through this channel
    pub fn default_trust(&self) -> TrustWeight {
        match self {
            MemorySource::UserSaved | MemorySource::VoiceInput => TrustWeight::Owner,
            MemorySource::TrainerAdded => TrustWeight::Trainer,
            MemorySource::ConversationExtract => TrustWeight::Derived,
        }
    }
}

impl fmt::Display for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemorySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user_saved" => Ok(MemorySource::UserSaved),
            "trainer_added" => Ok(MemorySource::TrainerAdded),
            "voice_input" => Ok(MemorySource::VoiceInput),
            "conversation_extract" => Ok(MemorySource::ConversationExtract),
            other => Err(format!("Unknown memory source: {}", other)),
        }
    }
}

/// One durable fact an avatar knows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: i64,
    pub avatar_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    pub category: Option<String>,
    pub trust_weight: TrustWeight,
    pub source: MemorySource,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for adding a memory
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub avatar_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub category: Option<String>,
    pub trust_weight: TrustWeight,
    pub source: MemorySource,
}

/// Memory annotated with its blended relevance score
#[derive(Debug, Clone, Serialize)]
pub struct RankedMemory {
    #[serde(flatten)]
    pub memory: MemoryRecord,
    pub score: f64,
}

/// Result of confidence-gated retrieval
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfidenceRanking {
    pub relevant_memories: Vec<RankedMemory>,
    /// Candidates considered before the threshold was applied
    pub total_memories: usize,
    /// Results returned after threshold and truncation
    pub relevant_count: usize,
}

impl ConfidenceRanking {
    /// True when nothing cleared the threshold and the caller should admit it doesn't know
    pub fn is_empty(&self) -> bool {
        self.relevant_memories.is_empty()
    }
}

/// One embedded snippet in a trainer's knowledge base.
///
/// Its position in the owning list is its only handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerContext {
    pub text: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// Display text for the context at `context_index`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextText {
    pub context_index: usize,
    pub text: String,
}

/// A trainer's knowledge base: contexts plus their positional text projection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainerMemory {
    pub trainer_id: String,
    #[serde(default)]
    pub contexts: Vec<TrainerContext>,
    #[serde(default)]
    pub context_texts: Vec<ContextText>,
}

/// Trainer context annotated with its position and similarity
#[derive(Debug, Clone, Serialize)]
pub struct RankedContext {
    #[serde(flatten)]
    pub context: TrainerContext,
    pub index: usize,
    pub similarity: f64,
}

/// Prompt-ready view of a ranked trainer context
#[derive(Debug, Clone, Serialize)]
pub struct ContextTextView {
    pub embedding: Vec<f32>,
    pub text: String,
    pub similarity: f64,
    pub created_at: DateTime<Utc>,
}

/// Result of ranking a trainer's contexts
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainerRanking {
    pub relevant_memories: Vec<RankedContext>,
    pub context_texts: Vec<ContextTextView>,
    pub total_memories: usize,
    pub relevant_count: usize,
}

/// Statistics about one avatar's memories
#[derive(Debug, Clone, Default)]
pub struct MemoryStats {
    pub total_memories: usize,
    pub archived_memories: usize,
    pub by_trust: HashMap<String, usize>,
    pub by_source: HashMap<String, usize>,
}

/// Embedder a store's vectors were produced with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedderSignature {
    pub name: String,
    pub dimension: usize,
}
