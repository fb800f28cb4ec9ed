use anyhow::{ensure, Result};

/// Cosine of the angle between two embeddings, in [-1, 1]. A zero vector has
/// no direction and scores 0 against anything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    ensure!(
        a.len() == b.len(),
        "embedding length mismatch: {} vs {}",
        a.len(),
        b.len()
    );
    ensure!(!a.is_empty(), "cannot compare empty embeddings");

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / denom).clamp(-1.0, 1.0))
}

/// Distance reported by the semantic index, in [0, 2]. 0 means same direction.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    cosine_similarity(a, b).map(|s| 1.0 - s)
}

/// Similarity the cache threshold is expressed in: `s = 1 - d`.
pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 - distance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_direction_is_zero_distance() {
        let a = [0.2, 0.4, 0.4];
        let scaled = [1.0, 2.0, 2.0];
        assert!(cosine_distance(&a, &scaled).unwrap().abs() < 1e-6);
        assert!((similarity_from_distance(cosine_distance(&a, &scaled).unwrap()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_range() {
        let x = [1.0, 0.0];
        assert!((cosine_distance(&x, &[0.0, 1.0]).unwrap() - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&x, &[-1.0, 0.0]).unwrap() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]).is_err());
        assert!(cosine_similarity(&[], &[]).is_err());
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[3.0, 4.0]).unwrap(), 0.0);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[3.0, 4.0]).unwrap(), 1.0);
    }

    #[test]
    fn test_threshold_mapping() {
        assert_eq!(similarity_from_distance(0.25), 0.75);
        assert_eq!(similarity_from_distance(0.0), 1.0);
    }
}
