//! Hierarchical agglomerative clustering of user embeddings.
//!
//! Ward linkage on Euclidean distance with a merge-stopping distance
//! threshold instead of a fixed cluster count. Clusters are ephemeral:
//! every call reclusters the full population from scratch.

use ndarray::Array1;
use std::collections::HashMap;
use tracing::debug;

/// Cluster every known user embedding.
///
/// Input order must be stable within one call; the caller provides the
/// snapshot sorted ascending by user id. Merges stop once the smallest
/// linkage distance reaches the threshold, so a pair at exactly the
/// threshold stays apart. With fewer than 2 embeddings clustering is
/// undefined and the result is empty — "no matches possible yet", not an
/// error.
pub fn cluster_embeddings(
    embeddings: &[(String, Array1<f32>)],
    distance_threshold: f32,
) -> HashMap<String, usize> {
    if embeddings.len() < 2 {
        debug!(
            count = embeddings.len(),
            "fewer than 2 embeddings, skipping clustering"
        );
        return HashMap::new();
    }

    let n = embeddings.len();

    // Pairwise squared Euclidean distances; Ward updates stay in squared
    // space, the threshold compares against the unsquared linkage distance.
    let mut dist2 = vec![vec![0.0f32; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let diff = &embeddings[i].1 - &embeddings[j].1;
            let d2 = diff.mapv(|x| x * x).sum();
            dist2[i][j] = d2;
            dist2[j][i] = d2;
        }
    }

    // Each point starts as its own cluster; merges fold j into i.
    let mut active: Vec<bool> = vec![true; n];
    let mut sizes: Vec<usize> = vec![1; n];
    let mut labels: Vec<usize> = (0..n).collect();

    loop {
        let mut best: Option<(usize, usize, f32)> = None;
        for i in 0..n {
            if !active[i] {
                continue;
            }
            for j in (i + 1)..n {
                if !active[j] {
                    continue;
                }
                if best.map_or(true, |(_, _, d)| dist2[i][j] < d) {
                    best = Some((i, j, dist2[i][j]));
                }
            }
        }

        let (i, j, d2) = match best {
            Some(b) => b,
            None => break,
        };
        if d2.sqrt() >= distance_threshold {
            break;
        }

        // Lance-Williams recurrence for Ward linkage.
        for k in 0..n {
            if !active[k] || k == i || k == j {
                continue;
            }
            let (ni, nj, nk) = (sizes[i] as f32, sizes[j] as f32, sizes[k] as f32);
            let merged = ((ni + nk) * dist2[i][k] + (nj + nk) * dist2[j][k] - nk * dist2[i][j])
                / (ni + nj + nk);
            dist2[i][k] = merged;
            dist2[k][i] = merged;
        }

        sizes[i] += sizes[j];
        active[j] = false;
        for label in labels.iter_mut() {
            if *label == j {
                *label = i;
            }
        }
    }

    // Renumber cluster ids densely in encounter order.
    let mut dense: HashMap<usize, usize> = HashMap::new();
    let mut result = HashMap::with_capacity(n);
    for (idx, (user_id, _)) in embeddings.iter().enumerate() {
        let next = dense.len();
        let cluster = *dense.entry(labels[idx]).or_insert(next);
        result.insert(user_id.clone(), cluster);
    }

    debug!(
        users = n,
        clusters = dense.len(),
        threshold = distance_threshold,
        "clustering pass complete"
    );

    result
}
