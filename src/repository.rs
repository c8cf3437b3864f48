use crate::error::Result;
use crate::types::{MemoryRecord, TrainerMemory};

/// Read side of the persistence layer that the rankers consume
pub trait MemoryRepository {
    /// Active memories for an avatar, in insertion order
    fn active_memories(&self, avatar_id: &str) -> Result<Vec<MemoryRecord>>;

    /// The single knowledge-base record for a trainer, if any
    fn trainer_memory(&self, trainer_id: &str) -> Result<Option<TrainerMemory>>;
}
