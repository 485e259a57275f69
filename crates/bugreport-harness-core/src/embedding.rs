//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, plus pure helper functions for vector normalization and
//! similarity computation.
//!
//! Concrete provider implementations (OpenAI, Ollama) live in the
//! `bugreport-harness` app crate.

use async_trait::async_trait;

use crate::error::{CoreError, Result};

/// Trait for embedding providers.
///
/// The model is passed per call so that a query can be embedded with the
/// model recorded in a stored index rather than whatever is configured now.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the provider identifier (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Embed one text with the given model.
    ///
    /// # Errors
    ///
    /// - [`CoreError::RequestRejected`] when the input is refused (too long,
    ///   malformed). The index builder reacts by splitting the text.
    /// - [`CoreError::ProviderUnavailable`] for network or server failures.
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f64>>;
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns exactly `0.0` when either vector has zero or infinite magnitude
/// (this includes two empty vectors). Each vector is scaled by its largest
/// component first, so very large or very small components neither overflow
/// nor underflow the norms.
///
/// # Formula
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
///
/// # Errors
///
/// [`CoreError::DimensionMismatch`] when the lengths differ.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(CoreError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }

    let (scale_a, scale_b) = (max_abs(a), max_abs(b));
    if scale_a == 0.0 || scale_b == 0.0 || !scale_a.is_finite() || !scale_b.is_finite() {
        return Ok(0.0);
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (x / scale_a, y / scale_b);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

fn max_abs(v: &[f64]) -> f64 {
    v.iter().fold(0.0f64, |m, x| m.max(x.abs()))
}

/// Scale a vector to unit length.
///
/// Returns `None` for vectors that cannot be normalized: empty, containing
/// a non-finite component, or of zero magnitude.
pub fn l2_normalize(v: &[f64]) -> Option<Vec<f64>> {
    if v.is_empty() || v.iter().any(|x| !x.is_finite()) {
        return None;
    }
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    Some(v.iter().map(|x| x / norm).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_zero_vector_is_exactly_zero() {
        let a = vec![0.3, -0.7, 2.0];
        let zero = vec![0.0; 3];
        assert_eq!(cosine_similarity(&a, &zero).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&zero, &a).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_huge_components_do_not_overflow() {
        let sim = cosine_similarity(&[1e200, 1e200], &[0.6, 0.8]).unwrap();
        assert!((sim - 1.4 / 2f64.sqrt()).abs() < 1e-12, "got {}", sim);
    }

    #[test]
    fn test_cosine_tiny_components_do_not_underflow() {
        let v = vec![1e-200, -3e-200];
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-12, "got {}", sim);
    }

    #[test]
    fn test_cosine_infinite_component_is_zero() {
        assert_eq!(cosine_similarity(&[f64::INFINITY, 1.0], &[1.0, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_different_lengths() {
        let err = cosine_similarity(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::DimensionMismatch {
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn test_normalize_unit_length() {
        let n = l2_normalize(&[3.0, 4.0]).unwrap();
        assert!((n[0] - 0.6).abs() < 1e-12);
        assert!((n[1] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_rejects_degenerate() {
        assert!(l2_normalize(&[]).is_none());
        assert!(l2_normalize(&[0.0, 0.0]).is_none());
        assert!(l2_normalize(&[1.0, f64::NAN]).is_none());
        assert!(l2_normalize(&[f64::INFINITY]).is_none());
    }
}
