//! Natural-breaks (Jenks) classification of EAI samples.
//!
//! Breakpoints are class lower edges in ascending order: the first edge is
//! the smallest positive sample, class `i` covers `[edge[i], edge[i + 1])`
//! and the last class is open-ended.

/// Compute up to `class_count` breakpoints for `values`.
///
/// Non-positive and non-finite values carry no risk and are dropped first.
///   - empty filtered sample       → empty breakpoints
///   - fewer samples than classes  → the sorted sample itself
///   - otherwise                   → `class_count` natural-break edges
pub fn classify(values: &[f64], class_count: usize) -> Vec<f64> {
    let mut sample: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    if sample.is_empty() || class_count == 0 {
        return Vec::new();
    }
    sample.sort_by(|a, b| a.total_cmp(b));

    if sample.len() <= class_count {
        return sample;
    }

    let starts = optimal_partition(&sample, class_count);
    starts.into_iter().map(|i| sample[i]).collect()
}

/// Partition the sorted `data` into `k` contiguous non-empty groups with
/// minimal total within-group sum of squared deviations.
///
/// Returns the start index of every group, ascending; the first is always 0.
/// Requires `1 <= k <= data.len()`.
fn optimal_partition(data: &[f64], k: usize) -> Vec<usize> {
    let n = data.len();

    // cost[j][i]: best SSD splitting data[..i] into j + 1 groups.
    // start[j][i]: start index of the last of those groups.
    let mut cost = vec![vec![f64::INFINITY; n + 1]; k];
    let mut start = vec![vec![0usize; n + 1]; k];

    // SSD of data[p..i] for every p < i, filled per prefix end i.
    let mut ssd_to = vec![0.0f64; n];

    for i in 1..=n {
        // Welford accumulation walking the group start leftwards.
        let mut mean = 0.0f64;
        let mut m2 = 0.0f64;
        for (count, p) in (0..i).rev().enumerate() {
            let x = data[p];
            let w = (count + 1) as f64;
            let delta = x - mean;
            mean += delta / w;
            m2 += delta * (x - mean);
            ssd_to[p] = m2;
        }

        cost[0][i] = ssd_to[0];

        for j in 1..k.min(i) {
            let mut best = f64::INFINITY;
            let mut best_p = j;
            // The first j groups need at least j elements.
            for p in j..i {
                let c = cost[j - 1][p] + ssd_to[p];
                if c < best {
                    best = c;
                    best_p = p;
                }
            }
            cost[j][i] = best;
            start[j][i] = best_p;
        }
    }

    let mut starts = vec![0usize; k];
    let mut end = n;
    for j in (1..k).rev() {
        let p = start[j][end];
        starts[j] = p;
        end = p;
    }
    starts
}
