//! Personality memory store for conversational avatars.
//!
//! Memories contributed by an avatar's owner and trainer are embedded and
//! ranked against incoming messages by similarity, trust and recency. A
//! trainer's standalone knowledge base is ranked separately on pure
//! similarity.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod logger;
pub mod memory;
pub mod ranker;
pub mod repository;
pub mod scoring;
pub mod similarity;
pub mod trainer;
pub mod types;

pub use error::{MemoryError, Result};
pub use memory::AvatarMemory;
pub use ranker::MemoryRanker;
pub use repository::MemoryRepository;
pub use trainer::TrainerContextRanker;
