//! Ranking of an avatar's memories against a query embedding.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::error::Result;
use crate::repository::MemoryRepository;
use crate::scoring::{clears_threshold, score_memory};
use crate::similarity::cosine_similarity_strict;
use crate::types::{ConfidenceRanking, MemoryRecord, RankedMemory};

/// Ranks the memories of one avatar fetched from a repository
pub struct MemoryRanker<'a, R: MemoryRepository + ?Sized> {
    repo: &'a R,
    now: Option<DateTime<Utc>>,
}

impl<'a, R: MemoryRepository + ?Sized> MemoryRanker<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo, now: None }
    }

    /// Pin the clock used for recency instead of reading it per call
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Best-effort retrieval: top `top_k` memories by trust and recency blended score.
    ///
    /// No score floor is applied.
    pub fn rank_by_trust_and_recency(
        &self,
        avatar_id: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<RankedMemory>> {
        let candidates = self.repo.active_memories(avatar_id)?;
        let total = candidates.len();
        let now = self.now.unwrap_or_else(Utc::now);

        let ranked = rank_by_trust_and_recency(candidates, query, top_k, now);

        tracing::debug!(
            avatar_id,
            candidates = total,
            returned = ranked.len(),
            "ranked memories by trust and recency"
        );

        Ok(ranked)
    }

    /// Confidence-gated retrieval on pure similarity.
    ///
    /// May return fewer than `top_k` results, including none.
    pub fn rank_by_confidence(
        &self,
        avatar_id: &str,
        query: &[f32],
        top_k: usize,
        confidence_threshold: f64,
    ) -> Result<ConfidenceRanking> {
        let candidates = self.repo.active_memories(avatar_id)?;
        let ranking = rank_by_confidence(candidates, query, top_k, confidence_threshold)?;

        tracing::debug!(
            avatar_id,
            candidates = ranking.total_memories,
            returned = ranking.relevant_count,
            threshold = confidence_threshold,
            "ranked memories by confidence"
        );

        Ok(ranking)
    }
}

/// Score every candidate with the blended policy, sort descending and keep `top_k`.
///
/// The sort is stable so equal scores keep fetch order.
pub fn rank_by_trust_and_recency(
    candidates: Vec<MemoryRecord>,
    query: &[f32],
    top_k: usize,
    now: DateTime<Utc>,
) -> Vec<RankedMemory> {
    let mut results: Vec<RankedMemory> = candidates
        .into_iter()
        .map(|memory| {
            let score = score_memory(query, &memory, now);
            RankedMemory { memory, score }
        })
        .collect();

    sort_descending(&mut results, |r| r.score);
    results.truncate(top_k);
    results
}

/// Filter candidates to similarity >= threshold, sort descending and keep `top_k`
pub fn rank_by_confidence(
    candidates: Vec<MemoryRecord>,
    query: &[f32],
    top_k: usize,
    confidence_threshold: f64,
) -> Result<ConfidenceRanking> {
    let total_memories = candidates.len();
    if total_memories == 0 {
        return Ok(ConfidenceRanking::default());
    }

    let mut relevant = Vec::new();
    for memory in candidates {
        let score = cosine_similarity_strict(query, &memory.embedding)?;
        if clears_threshold(score, confidence_threshold) {
            relevant.push(RankedMemory { memory, score });
        }
    }

    sort_descending(&mut relevant, |r| r.score);
    relevant.truncate(top_k);

    Ok(ConfidenceRanking {
        relevant_count: relevant.len(),
        relevant_memories: relevant,
        total_memories,
    })
}

pub(crate) fn sort_descending<T>(items: &mut [T], key: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemoryError;
    use crate::types::{MemorySource, TrainerMemory, TrustWeight};
    use chrono::Duration;

    struct FixedRepo {
        memories: Vec<MemoryRecord>,
    }

    impl MemoryRepository for FixedRepo {
        fn active_memories(&self, avatar_id: &str) -> Result<Vec<MemoryRecord>> {
            Ok(self
                .memories
                .iter()
                .filter(|m| m.avatar_id == avatar_id && m.is_active)
                .cloned()
                .collect())
        }

        fn trainer_memory(&self, _trainer_id: &str) -> Result<Option<TrainerMemory>> {
            Ok(None)
        }
    }

    const QUERY: [f32; 2] = [1.0, 0.0];

    // Embedding whose cosine similarity with QUERY is `sim`
    fn embedding_with_similarity(sim: f32) -> Vec<f32> {
        vec![sim, (1.0 - sim * sim).sqrt()]
    }

    fn memory(id: i64, text: &str, trust: TrustWeight, sim: f32, created_at: DateTime<Utc>) -> MemoryRecord {
        MemoryRecord {
            id,
            avatar_id: "ava".to_string(),
            text: text.to_string(),
            embedding: embedding_with_similarity(sim),
            category: None,
            trust_weight: trust,
            source: MemorySource::UserSaved,
            is_active: true,
            created_at,
            updated_at: created_at,
        }
    }

    fn texts(results: &[RankedMemory]) -> Vec<&str> {
        results.iter().map(|r| r.memory.text.as_str()).collect()
    }

    #[test]
    fn test_owner_ranked_above_derived() {
        let now = Utc::now();
        let day_old = now - Duration::days(1);
        let repo = FixedRepo {
            memories: vec![
                memory(1, "likes coffee", TrustWeight::Derived, 0.8, day_old),
                memory(2, "likes tea", TrustWeight::Owner, 0.8, day_old),
            ],
        };

        let results = MemoryRanker::new(&repo)
            .at(now)
            .rank_by_trust_and_recency("ava", &QUERY, 2)
            .unwrap();

        assert_eq!(texts(&results), vec!["likes tea", "likes coffee"]);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_top_k_ignores_low_scores() {
        let now = Utc::now();
        let old = now - Duration::days(60);
        let candidates: Vec<_> = (0..5)
            .map(|i| memory(i, "faint", TrustWeight::Derived, 0.01 * i as f32, old))
            .collect();

        let results = rank_by_trust_and_recency(candidates, &QUERY, 2, now);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].memory.id, 4);
        assert_eq!(results[1].memory.id, 3);
    }

    #[test]
    fn test_zero_similarity_still_returned() {
        let now = Utc::now();
        let candidates = vec![memory(1, "unrelated", TrustWeight::Owner, 0.0, now)];

        let results = rank_by_trust_and_recency(candidates, &QUERY, 5, now);
        assert_eq!(results.len(), 1);
        assert!(results[0].score.abs() < 1e-6);
    }

    #[test]
    fn test_ties_keep_fetch_order() {
        let now = Utc::now();
        let old = now - Duration::days(40);
        let candidates = vec![
            memory(1, "first", TrustWeight::Trainer, 0.5, old),
            memory(2, "second", TrustWeight::Trainer, 0.5, old),
            memory(3, "third", TrustWeight::Trainer, 0.5, old),
        ];

        let results = rank_by_trust_and_recency(candidates, &QUERY, 3, now);
        assert_eq!(texts(&results), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_recency_lifts_newer_memory() {
        let now = Utc::now();
        let candidates = vec![
            memory(1, "old news", TrustWeight::Owner, 0.7, now - Duration::days(45)),
            memory(2, "fresh news", TrustWeight::Owner, 0.6, now),
        ];

        let results = rank_by_trust_and_recency(candidates, &QUERY, 2, now);
        assert_eq!(texts(&results), vec!["fresh news", "old news"]);
    }

    #[test]
    fn test_permissive_metric_tolerates_short_embeddings() {
        let now = Utc::now();
        let mut short = memory(1, "short", TrustWeight::Owner, 1.0, now);
        short.embedding = vec![1.0];

        let results = rank_by_trust_and_recency(vec![short], &QUERY, 5, now);
        assert!((results[0].score - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_threshold_filters_and_sorts() {
        let now = Utc::now();
        let candidates = vec![
            memory(1, "a", TrustWeight::Owner, 0.1, now),
            memory(2, "b", TrustWeight::Derived, 0.35, now),
            memory(3, "c", TrustWeight::Trainer, 0.5, now),
            memory(4, "d", TrustWeight::Derived, 0.9, now),
        ];

        let ranking = rank_by_confidence(candidates, &QUERY, 5, 0.3).unwrap();

        assert_eq!(ranking.total_memories, 4);
        assert_eq!(ranking.relevant_count, 3);
        assert_eq!(texts(&ranking.relevant_memories), vec!["d", "c", "b"]);

        let scores: Vec<f64> = ranking.relevant_memories.iter().map(|r| r.score).collect();
        assert!((scores[0] - 0.9).abs() < 1e-6);
        assert!((scores[1] - 0.5).abs() < 1e-6);
        assert!((scores[2] - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_counts_after_truncation() {
        let now = Utc::now();
        let candidates: Vec<_> = (0..6)
            .map(|i| memory(i, "match", TrustWeight::Owner, 0.5 + 0.05 * i as f32, now))
            .collect();

        let ranking = rank_by_confidence(candidates, &QUERY, 2, 0.3).unwrap();
        assert_eq!(ranking.total_memories, 6);
        assert_eq!(ranking.relevant_count, 2);
        assert_eq!(ranking.relevant_memories[0].memory.id, 5);
    }

    #[test]
    fn test_confidence_may_return_nothing() {
        let now = Utc::now();
        let candidates = vec![memory(1, "weak", TrustWeight::Owner, 0.2, now)];

        let ranking = rank_by_confidence(candidates, &QUERY, 5, 0.3).unwrap();
        assert!(ranking.is_empty());
        assert_eq!(ranking.total_memories, 1);
        assert_eq!(ranking.relevant_count, 0);
    }

    #[test]
    fn test_empty_scope() {
        let repo = FixedRepo { memories: Vec::new() };
        let ranker = MemoryRanker::new(&repo);

        let ranking = ranker.rank_by_confidence("ava", &QUERY, 5, 0.3).unwrap();
        assert!(ranking.relevant_memories.is_empty());
        assert_eq!(ranking.total_memories, 0);
        assert_eq!(ranking.relevant_count, 0);

        let ranked = ranker.rank_by_trust_and_recency("ava", &QUERY, 5).unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_inactive_and_foreign_memories_excluded() {
        let now = Utc::now();
        let mut archived = memory(1, "archived", TrustWeight::Owner, 0.9, now);
        archived.is_active = false;
        let mut other = memory(2, "other avatar", TrustWeight::Owner, 0.9, now);
        other.avatar_id = "bob".to_string();
        let kept = memory(3, "kept", TrustWeight::Owner, 0.9, now);

        let repo = FixedRepo { memories: vec![archived, other, kept] };
        let results = MemoryRanker::new(&repo)
            .at(now)
            .rank_by_trust_and_recency("ava", &QUERY, 5)
            .unwrap();

        assert_eq!(texts(&results), vec!["kept"]);
    }

    #[test]
    fn test_confidence_rejects_dimension_mismatch() {
        let now = Utc::now();
        let mut bad = memory(1, "bad", TrustWeight::Owner, 0.9, now);
        bad.embedding = vec![1.0, 0.0, 0.0];

        let result = rank_by_confidence(vec![bad], &QUERY, 5, 0.3);
        assert!(matches!(
            result,
            Err(MemoryError::DimensionMismatch { left: 2, right: 3 })
        ));
    }
}
