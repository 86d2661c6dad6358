//! Similarity metrics and score normalisation.
//!
//! Every score the index reports passes through [`normalize_score`], which
//! maps the metric's raw value into `[0, 1]` with `1.0` as the best match.

use serde::{Deserialize, Serialize};

/// Distance metric used by the vector index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Inner product over unit vectors, i.e. cosine similarity.
    #[default]
    InnerProduct,
    /// Euclidean distance.
    L2,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InnerProduct => "inner_product",
            Self::L2 => "l2",
        }
    }

    /// Vectors must be unit length under this metric.
    pub fn requires_unit_vectors(&self) -> bool {
        matches!(self, Self::InnerProduct)
    }

    /// Raw metric value between two vectors of equal length.
    pub fn raw(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::InnerProduct => inner_product(a, b),
            Self::L2 => l2_distance(a, b),
        }
    }

    /// Normalised `[0, 1]` score between two vectors of equal length.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        normalize_score(*self, self.raw(a, b))
    }
}

pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` to unit length in place. Returns `false` for a zero or
/// non-finite norm, leaving `v` untouched.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let norm = l2_norm(v);
    if !norm.is_finite() || norm == 0.0 {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

/// Map a raw metric value into `[0, 1]`.
///
/// - inner product: `max(0, (raw + 1) / 2)`, clamped to 1 against rounding
/// - L2 distance: `1 / (1 + d)`
///
/// NaN maps to 0.
pub fn normalize_score(metric: Metric, raw: f32) -> f32 {
    if raw.is_nan() {
        return 0.0;
    }
    match metric {
        Metric::InnerProduct => ((raw + 1.0) / 2.0).clamp(0.0, 1.0),
        Metric::L2 => 1.0 / (1.0 + raw.max(0.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_inner_product_endpoints() {
        assert_eq!(normalize_score(Metric::InnerProduct, 1.0), 1.0);
        assert_eq!(normalize_score(Metric::InnerProduct, 0.0), 0.5);
        assert_eq!(normalize_score(Metric::InnerProduct, -1.0), 0.0);
        // Rounding can push unit-vector products past 1
        assert_eq!(normalize_score(Metric::InnerProduct, 1.000_001), 1.0);
        assert_eq!(normalize_score(Metric::InnerProduct, -1.5), 0.0);
    }

    #[test]
    fn test_l2_endpoints() {
        assert_eq!(normalize_score(Metric::L2, 0.0), 1.0);
        assert_eq!(normalize_score(Metric::L2, 1.0), 0.5);
        assert!(normalize_score(Metric::L2, 1e9) > 0.0);
    }

    #[test]
    fn test_nan_is_zero() {
        assert_eq!(normalize_score(Metric::InnerProduct, f32::NAN), 0.0);
        assert_eq!(normalize_score(Metric::L2, f32::NAN), 0.0);
    }

    #[test]
    fn test_normalize_rejects_zero_vector() {
        let mut zero = vec![0.0; 4];
        assert!(!l2_normalize(&mut zero));

        let mut v = vec![3.0, 4.0];
        assert!(l2_normalize(&mut v));
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_identical_unit_vectors_score_one() {
        let mut v = vec![0.2, -0.4, 0.9];
        l2_normalize(&mut v);
        assert!((Metric::InnerProduct.score(&v, &v) - 1.0).abs() < 1e-6);
        assert_eq!(Metric::L2.score(&v, &v), 1.0);
    }

    fn unit_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(-1.0f32..1.0, dim).prop_filter_map("zero vector", |mut v| {
            if l2_normalize(&mut v) {
                Some(v)
            } else {
                None
            }
        })
    }

    proptest! {
        #[test]
        fn prop_scores_in_unit_range(raw in prop::num::f32::ANY) {
            for metric in [Metric::InnerProduct, Metric::L2] {
                let score = normalize_score(metric, raw);
                prop_assert!((0.0..=1.0).contains(&score), "{:?} {} -> {}", metric, raw, score);
            }
        }

        #[test]
        fn prop_monotonic_in_raw(a in -1.0f32..1.0, b in -1.0f32..1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(normalize_score(Metric::InnerProduct, lo) <= normalize_score(Metric::InnerProduct, hi));
            // Larger distance means lower score
            prop_assert!(normalize_score(Metric::L2, lo.abs()) >= normalize_score(Metric::L2, lo.abs() + hi.abs()));
        }

        #[test]
        fn prop_unit_vectors_score_tracks_cosine(
            q in unit_vector(8),
            a in unit_vector(8),
            b in unit_vector(8),
        ) {
            let cos_a = inner_product(&q, &a);
            let cos_b = inner_product(&q, &b);
            let score_a = Metric::InnerProduct.score(&q, &a);
            let score_b = Metric::InnerProduct.score(&q, &b);

            prop_assert!((0.0..=1.0).contains(&score_a));
            if cos_a > cos_b {
                prop_assert!(score_a >= score_b);
            }
        }
    }
}
