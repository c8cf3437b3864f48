//! Scoring policies turning a raw similarity into a ranking key.
//!
//! The trust and recency blend feeds best-effort context injection. The
//! pure-similarity threshold feeds confidence-gated answers, where weighting
//! would make the cutoff meaningless. Keep the two apart.

use chrono::{DateTime, Utc};

use crate::similarity::cosine_similarity;
use crate::types::{MemoryRecord, TrustWeight};

/// Window over which the recency boost decays to nothing
pub const RECENCY_WINDOW_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Extra weight a brand new memory receives
pub const MAX_RECENCY_BONUS: f64 = 0.5;

/// Default minimum similarity for confidence-gated retrieval
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.3;

/// Default number of results returned by every ranking operation
pub const DEFAULT_TOP_K: usize = 5;

/// Multiplier applied for a memory's provenance
pub fn trust_multiplier(weight: TrustWeight) -> f64 {
    match weight {
        TrustWeight::Owner => 1.0,
        TrustWeight::Trainer => 0.7,
        TrustWeight::Derived => 0.5,
        _ => 0.5,
    }
}

/// Boost in `[1.0, 1.5]` that decays linearly over thirty days.
///
/// A timestamp in the future counts as brand new. This departs from the raw
/// linear formula, which would exceed 1.5 for a negative age.
pub fn recency_boost(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age = (now - created_at).num_milliseconds().max(0);

    if age < RECENCY_WINDOW_MS {
        let remaining = (RECENCY_WINDOW_MS - age) as f64 / RECENCY_WINDOW_MS as f64;
        1.0 + remaining * MAX_RECENCY_BONUS
    } else {
        1.0
    }
}

/// Similarity weighted by trust and recency. An ordering key, not a probability.
pub fn blended_score(similarity: f64, trust: TrustWeight, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    similarity * trust_multiplier(trust) * recency_boost(created_at, now)
}

/// Blended score of a memory against a query, using the permissive metric
pub fn score_memory(query: &[f32], memory: &MemoryRecord, now: DateTime<Utc>) -> f64 {
    let similarity = cosine_similarity(query, &memory.embedding);
    blended_score(similarity, memory.trust_weight, memory.created_at, now)
}

/// Whether a pure similarity clears the confidence bar (inclusive)
pub fn clears_threshold(similarity: f64, threshold: f64) -> bool {
    similarity >= threshold
}
