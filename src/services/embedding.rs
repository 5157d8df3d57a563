//! User embedding construction.
//!
//! A user's embedding is the arithmetic mean of their ranked items'
//! vectors, each scaled by the tier weight. Pure and total: items missing
//! from the vocabulary are skipped with a log line, and when nothing
//! contributes the result degrades to the zero vector.

use crate::models::TierList;
use crate::services::vocab::ItemVocabModel;
use ndarray::Array1;
use tracing::debug;

/// Build one user's embedding from their tier list.
pub fn embed_tier_list(
    tier_list: &TierList,
    model: Option<&ItemVocabModel>,
    vector_size: usize,
) -> Array1<f32> {
    let model = match model {
        Some(m) => m,
        None => {
            debug!("no vocabulary model available, emitting zero embedding");
            return Array1::zeros(vector_size);
        }
    };

    let mut sum = Array1::<f32>::zeros(model.vector_size());
    let mut contributing = 0usize;

    for (item, tier) in tier_list {
        match model.get(item) {
            Some(vector) => {
                sum.scaled_add(tier.weight(), &vector);
                contributing += 1;
            }
            None => {
                debug!(item = %item, "item absent from vocabulary, skipping");
            }
        }
    }

    if contributing == 0 {
        return Array1::zeros(model.vector_size());
    }

    sum / contributing as f32
}
