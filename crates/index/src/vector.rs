//! Vector similarity utilities.

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the lengths differ or either vector is empty or zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank `(id, vector)` pairs against a query and keep the best `k`.
///
/// Ordered by descending score; equal scores fall back to ascending id.
pub fn top_k<'a, I>(candidates: I, query: &[f32], k: usize) -> Vec<(u64, f32)>
where
    I: IntoIterator<Item = (u64, &'a [f32])>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(u64, f32)> = candidates
        .into_iter()
        .map(|(id, v)| (id, cosine_similarity(v, query)))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(k);
    scored
}
