//! Small numeric helpers shared by the ingestion filters and the extraction engine

/// Percentile table of `values`: 101 entries, entry `p` is the value at
/// rank `floor(p / 100 * n)` of the ascending sort (clamped to the last
/// element). An empty input yields 101 zeros.
pub fn quantile_distribution(values: &[f32]) -> Vec<f32> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    (0..=100)
        .map(|p| {
            if n == 0 {
                return 0.0;
            }
            let pos = (p as f64 / 100.0 * n as f64) as usize;
            sorted[pos.min(n - 1)]
        })
        .collect()
}

/// Pearson correlation coefficient.
///
/// Returns 0 for sequences of unequal length, fewer than two points, or zero
/// variance in either sequence.
pub fn correlation(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    if n != b.len() || n < 2 {
        return 0.0;
    }

    let mean_a = a.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let mean_b = b.iter().map(|&v| v as f64).sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        let dx = x as f64 - mean_a;
        let dy = y as f64 - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (cov / denom) as f32
}
