//! Vector math utilities
//!
//! Pure functions over caller-supplied embedding vectors. Embeddings are
//! opaque fixed-length slices; mismatched lengths score as zero similarity
//! so bulk passes stay resilient to heterogeneous data.

/// Cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Normalize a vector to unit length. A zero vector stays zero.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// Weighted mean of vectors, normalized by total weight
///
/// Output always has length `dim`; inputs shorter than `dim` contribute only
/// their available components, longer ones are truncated. Zero total weight
/// yields a zero vector.
pub fn weighted_mean(vectors: &[&[f32]], weights: &[f32], dim: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; dim];
    let mut total = 0.0f32;

    for (v, w) in vectors.iter().zip(weights.iter()) {
        for (acc, x) in out.iter_mut().zip(v.iter()) {
            *acc += x * w;
        }
        total += w;
    }

    if total > 0.0 {
        for acc in out.iter_mut() {
            *acc /= total;
        }
    }

    out
}
