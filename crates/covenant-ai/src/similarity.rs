//! Vector similarity helpers.

/// Cosine similarity of two vectors; `0.0` when either has zero norm or the
/// dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// L2-normalize a vector in place.
pub fn normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Element-wise mean of `dim`-wide token vectors; zeros when there are none.
pub fn mean_pool<'a>(dim: usize, tokens: impl IntoIterator<Item = &'a [f32]>) -> Vec<f32> {
    let mut pooled = vec![0.0f32; dim];
    let mut count = 0usize;
    for token in tokens {
        for (p, v) in pooled.iter_mut().zip(token) {
            *p += v;
        }
        count += 1;
    }
    if count > 0 {
        for p in &mut pooled {
            *p /= count as f32;
        }
    }
    pooled
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn mean_pool_averages_tokens() {
        let tokens = [[1.0, 2.0], [3.0, 6.0]];
        assert_eq!(mean_pool(2, tokens.iter().map(|t| &t[..])), vec![2.0, 4.0]);
        assert_eq!(mean_pool(3, std::iter::empty()), vec![0.0; 3]);
    }

    #[test]
    fn normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }
}
