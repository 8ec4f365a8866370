//! Dense vector primitives shared by the similarity, validation and loss code.
//!
//! Vectors are stored as `f32`; reductions accumulate in `f64`.

pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| x as f64 * y as f64)
        .sum()
}

pub fn l2_norm(v: &[f32]) -> f64 {
    dot(v, v).sqrt()
}

/// Cosine similarity over the first `min(a.len(), b.len())` coordinates.
///
/// Returns 0.0 when either vector has zero norm or the result is not finite,
/// and clamps rounding overshoot into `[-1, 1]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    let (a, b) = (&a[..n], &b[..n]);
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let sim = dot(a, b) / (norm_a * norm_b);
    if sim == 0.0 {
        // collapse -0.0 so ordering by total_cmp treats all zeros alike
        0.0
    } else if sim.is_finite() {
        sim.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

pub fn is_finite(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// Scales `v` to unit L2 norm. Zero vectors are returned unchanged.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|&x| (x as f64 / norm) as f32).collect()
}

/// Element-wise mean of `vectors`. Shorter vectors contribute 0 past their end.
pub fn element_wise_mean<'a, I>(vectors: I) -> Vec<f32>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut sums: Vec<f64> = Vec::new();
    let mut count = 0usize;
    for v in vectors {
        if v.len() > sums.len() {
            sums.resize(v.len(), 0.0);
        }
        for (s, &x) in sums.iter_mut().zip(v.iter()) {
            *s += x as f64;
        }
        count += 1;
    }
    if count == 0 {
        return Vec::new();
    }
    sums.into_iter().map(|s| (s / count as f64) as f32).collect()
}
