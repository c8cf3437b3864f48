//! Ranking of a trainer's standalone knowledge base.
//!
//! Contexts are identified only by their position in the trainer's list.
//! Display text is resolved through the positional `context_texts`
//! projection; a position missing from it resolves to an empty string.

use crate::error::Result;
use crate::ranker::sort_descending;
use crate::repository::MemoryRepository;
use crate::scoring::clears_threshold;
use crate::similarity::cosine_similarity_strict;
use crate::types::{ContextText, ContextTextView, RankedContext, TrainerMemory, TrainerRanking};

/// Ranks the contexts of one trainer fetched from a repository
pub struct TrainerContextRanker<'a, R: MemoryRepository + ?Sized> {
    repo: &'a R,
}

impl<'a, R: MemoryRepository + ?Sized> TrainerContextRanker<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    pub fn rank_contexts(
        &self,
        trainer_id: &str,
        query: &[f32],
        top_k: usize,
        confidence_threshold: f64,
    ) -> Result<TrainerRanking> {
        let ranking = match self.repo.trainer_memory(trainer_id)? {
            Some(memory) => rank_contexts(&memory, query, top_k, confidence_threshold)?,
            None => TrainerRanking::default(),
        };

        tracing::debug!(
            trainer_id,
            candidates = ranking.total_memories,
            returned = ranking.relevant_count,
            threshold = confidence_threshold,
            "ranked trainer contexts"
        );

        Ok(ranking)
    }
}

/// Rank a trainer's contexts on strict cosine similarity and resolve their display text
pub fn rank_contexts(
    memory: &TrainerMemory,
    query: &[f32],
    top_k: usize,
    confidence_threshold: f64,
) -> Result<TrainerRanking> {
    if memory.contexts.is_empty() {
        return Ok(TrainerRanking::default());
    }

    let mut relevant = Vec::new();
    for (index, context) in memory.contexts.iter().enumerate() {
        let similarity = cosine_similarity_strict(query, &context.embedding)?;
        if clears_threshold(similarity, confidence_threshold) {
            relevant.push(RankedContext {
                context: context.clone(),
                index,
                similarity,
            });
        }
    }

    sort_descending(&mut relevant, |r| r.similarity);
    relevant.truncate(top_k);

    let context_texts = relevant
        .iter()
        .map(|ranked| ContextTextView {
            embedding: ranked.context.embedding.clone(),
            text: resolve_text(&memory.context_texts, ranked.index).to_string(),
            similarity: ranked.similarity,
            created_at: ranked.context.created_at,
        })
        .collect();

    Ok(TrainerRanking {
        relevant_count: relevant.len(),
        relevant_memories: relevant,
        context_texts,
        total_memories: memory.contexts.len(),
    })
}

fn resolve_text(texts: &[ContextText], index: usize) -> &str {
    texts
        .iter()
        .find(|t| t.context_index == index)
        .map(|t| t.text.as_str())
        .unwrap_or("")
}
