//! Cosine similarity between embedding vectors.
//!
//! Two variants are kept side by side because callers depend on their
//! different length handling:
//!
//! - [`cosine_similarity`] truncates to the shorter vector and never fails.
//! - [`cosine_similarity_strict`] rejects vectors of different length.
//!
//! Both accumulate in `f64` and take a single square root per norm.

use crate::error::{MemoryError, Result};

/// Permissive cosine similarity.
///
/// Only the first `min(a.len(), b.len())` elements take part, norms included.
/// Returns 0.0 for empty input or a zero magnitude.
pub fn cosine_similarity(vec_a: &[f32], vec_b: &[f32]) -> f64 {
    if vec_a.len() != vec_b.len() {
        tracing::trace!(
            left = vec_a.len(),
            right = vec_b.len(),
            "truncating cosine similarity to shorter embedding"
        );
    }

    let len = vec_a.len().min(vec_b.len());
    dot_over_norms(&vec_a[..len], &vec_b[..len])
}

/// Strict cosine similarity.
///
/// Fails with [`MemoryError::DimensionMismatch`] when lengths differ.
/// Returns 0.0 for empty input or a zero magnitude.
pub fn cosine_similarity_strict(vec_a: &[f32], vec_b: &[f32]) -> Result<f64> {
    if vec_a.len() != vec_b.len() {
        return Err(MemoryError::DimensionMismatch {
            left: vec_a.len(),
            right: vec_b.len(),
        });
    }

    Ok(dot_over_norms(vec_a, vec_b))
}

// Callers guarantee equal length
fn dot_over_norms(vec_a: &[f32], vec_b: &[f32]) -> f64 {
    if vec_a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut sum_sq_a = 0.0f64;
    let mut sum_sq_b = 0.0f64;

    for (&a, &b) in vec_a.iter().zip(vec_b.iter()) {
        let (a, b) = (a as f64, b as f64);
        dot += a * b;
        sum_sq_a += a * a;
        sum_sq_b += b * b;
    }

    if sum_sq_a == 0.0 || sum_sq_b == 0.0 {
        return 0.0;
    }

    dot / (sum_sq_a.sqrt() * sum_sq_b.sqrt())
}
