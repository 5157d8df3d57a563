//! Item vocabulary embeddings trained from tier co-occurrence.
//!
//! Every tier, pooled across all users' tier lists, forms one training
//! sentence: items that different users place in the same tier co-occur.
//! A small skip-gram model with negative sampling turns those sentences
//! into dense item vectors. The model is a cheap, retrainable artifact:
//! each training run replaces it wholesale, never incrementally.

use crate::config::MatchingConfig;
use crate::models::{TierList, TIER_ORDER};
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::{debug, info};

const NEGATIVE_SAMPLES: usize = 5;
const INITIAL_LEARNING_RATE: f32 = 0.025;
const MIN_LEARNING_RATE: f32 = 1e-4;
/// Exponent flattening the unigram distribution for negative sampling.
const UNIGRAM_POWER: f64 = 0.75;

/// Trained item-embedding model. Immutable once built; shared behind an
/// `Arc` and swapped atomically on retrain.
#[derive(Debug, Clone)]
pub struct ItemVocabModel {
    vector_size: usize,
    index: HashMap<String, usize>,
    vectors: Array2<f32>,
}

impl ItemVocabModel {
    pub fn vector_size(&self) -> usize {
        self.vector_size
    }

    pub fn vocab_len(&self) -> usize {
        self.index.len()
    }

    pub fn contains(&self, item: &str) -> bool {
        self.index.contains_key(item)
    }

    /// Vector for a catalog item, if it was seen at training time.
    pub fn get(&self, item: &str) -> Option<ArrayView1<'_, f32>> {
        self.index.get(item).map(|&i| self.vectors.row(i))
    }

    /// Train a model over the current population of tier lists.
    ///
    /// Returns `None` when no non-empty tier group exists — callers treat
    /// that as "no model available", not as an error.
    pub fn train(tier_lists: &[TierList], params: &MatchingConfig) -> Option<Self> {
        let sentences = build_tier_groups(tier_lists);
        if sentences.is_empty() {
            debug!("no non-empty tier groups, skipping model training");
            return None;
        }

        let model = train_skip_gram(&sentences, params);
        info!(
            vocab = model.vocab_len(),
            sentences = sentences.len(),
            dims = model.vector_size,
            "item vocabulary model trained"
        );
        Some(model)
    }
}

/// Group catalog items by tier across every tier list, in canonical tier
/// order, dropping empty groups.
pub fn build_tier_groups(tier_lists: &[TierList]) -> Vec<Vec<String>> {
    TIER_ORDER
        .iter()
        .map(|tier| {
            tier_lists
                .iter()
                .flat_map(|list| {
                    list.iter()
                        .filter(|(_, t)| *t == tier)
                        .map(|(item, _)| item.clone())
                })
                .collect::<Vec<String>>()
        })
        .filter(|group| !group.is_empty())
        .collect()
}

fn train_skip_gram(sentences: &[Vec<String>], params: &MatchingConfig) -> ItemVocabModel {
    // Vocabulary in first-seen order; no minimum-frequency cutoff, every
    // item gets a vector.
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<u64> = Vec::new();
    for sentence in sentences {
        for item in sentence {
            match index.get(item) {
                Some(&i) => counts[i] += 1,
                None => {
                    index.insert(item.clone(), counts.len());
                    counts.push(1);
                }
            }
        }
    }

    let vocab_len = counts.len();
    let dims = params.vector_size;
    let mut rng = StdRng::seed_from_u64(params.train_seed);

    // Input vectors start small-random, output vectors at zero.
    let span = 0.5 / dims as f32;
    let mut input = Array2::from_shape_fn((vocab_len, dims), |_| rng.gen_range(-span..span));
    let mut output = Array2::<f32>::zeros((vocab_len, dims));

    let negative_cdf = build_unigram_cdf(&counts);
    // A one-item vocabulary has no valid negative target: every draw would
    // collide with the positive context.
    let negative_samples = if vocab_len > 1 { NEGATIVE_SAMPLES } else { 0 };

    let indexed: Vec<Vec<usize>> = sentences
        .iter()
        .map(|s| s.iter().map(|item| index[item]).collect())
        .collect();

    let total_pairs: u64 = indexed
        .iter()
        .map(|s| s.len() as u64 * (2 * params.context_window) as u64)
        .sum::<u64>()
        .max(1)
        * params.train_epochs as u64;
    let mut seen_pairs: u64 = 0;

    for _epoch in 0..params.train_epochs {
        for sentence in &indexed {
            for (pos, &center) in sentence.iter().enumerate() {
                let lo = pos.saturating_sub(params.context_window);
                let hi = (pos + params.context_window + 1).min(sentence.len());
                for ctx_pos in lo..hi {
                    if ctx_pos == pos {
                        continue;
                    }
                    seen_pairs += 1;
                    let lr = (INITIAL_LEARNING_RATE
                        * (1.0 - seen_pairs as f32 / total_pairs as f32))
                        .max(MIN_LEARNING_RATE);

                    let context = sentence[ctx_pos];
                    let center_vec = input.row(center).to_owned();
                    let mut center_grad = Array1::<f32>::zeros(dims);

                    // One positive target plus sampled negatives.
                    for k in 0..=negative_samples {
                        let (target, label) = if k == 0 {
                            (context, 1.0)
                        } else {
                            let mut sampled = sample_unigram(&negative_cdf, &mut rng);
                            if sampled == context {
                                sampled = (sampled + 1) % vocab_len;
                            }
                            (sampled, 0.0)
                        };

                        let target_vec = output.row(target).to_owned();
                        let score = sigmoid(center_vec.dot(&target_vec));
                        let gradient = (label - score) * lr;
                        center_grad.scaled_add(gradient, &target_vec);
                        output.row_mut(target).scaled_add(gradient, &center_vec);
                    }

                    input.row_mut(center).scaled_add(1.0, &center_grad);
                }
            }
        }
    }

    ItemVocabModel {
        vector_size: dims,
        index,
        vectors: input,
    }
}

fn build_unigram_cdf(counts: &[u64]) -> Vec<f64> {
    let mut cdf = Vec::with_capacity(counts.len());
    let mut acc = 0.0;
    for &c in counts {
        acc += (c as f64).powf(UNIGRAM_POWER);
        cdf.push(acc);
    }
    cdf
}

fn sample_unigram(cdf: &[f64], rng: &mut StdRng) -> usize {
    let total = *cdf.last().expect("vocabulary is non-empty");
    let draw = rng.gen::<f64>() * total;
    cdf.partition_point(|&x| x < draw).min(cdf.len() - 1)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tier;

    fn list(entries: &[(&str, Tier)]) -> TierList {
        entries
            .iter()
            .map(|(item, tier)| (item.to_string(), *tier))
            .collect()
    }

    fn test_params() -> MatchingConfig {
        MatchingConfig {
            vector_size: 16,
            train_epochs: 10,
            ..MatchingConfig::default()
        }
    }

    #[test]
    fn empty_input_yields_no_model() {
        assert!(ItemVocabModel::train(&[], &test_params()).is_none());
        assert!(ItemVocabModel::train(&[TierList::new()], &test_params()).is_none());
    }

    #[test]
    fn tier_groups_pool_across_users_and_drop_empty_tiers() {
        let lists = vec![
            list(&[("zoro", Tier::S), ("nami", Tier::B)]),
            list(&[("luffy", Tier::S)]),
        ];
        let groups = build_tier_groups(&lists);

        // S and B are populated, the other five tiers disappear.
        assert_eq!(groups.len(), 2);
        assert!(groups[0].contains(&"zoro".to_string()));
        assert!(groups[0].contains(&"luffy".to_string()));
        assert_eq!(groups[1], vec!["nami".to_string()]);
    }

    #[test]
    fn every_seen_item_receives_a_vector() {
        let lists = vec![
            list(&[("zoro", Tier::S), ("nami", Tier::S), ("usopp", Tier::F)]),
            list(&[("luffy", Tier::S), ("brook", Tier::A)]),
        ];
        let model = ItemVocabModel::train(&lists, &test_params()).unwrap();

        for item in ["zoro", "nami", "usopp", "luffy", "brook"] {
            let vec = model.get(item).expect("item must be in vocabulary");
            assert_eq!(vec.len(), 16);
        }
        assert!(!model.contains("chopper"));
    }

    #[test]
    fn single_item_vocabulary_skips_negative_sampling() {
        // Two users ranking the same lone item give a one-word corpus with
        // real co-occurrence pairs.
        let lists = vec![list(&[("zoro", Tier::S)]), list(&[("zoro", Tier::S)])];
        let model = ItemVocabModel::train(&lists, &test_params()).unwrap();

        assert_eq!(model.vocab_len(), 1);
        let vec = model.get("zoro").unwrap();
        assert!(vec.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn training_is_reproducible_for_a_fixed_seed() {
        let lists = vec![
            list(&[("zoro", Tier::S), ("nami", Tier::S), ("usopp", Tier::B)]),
            list(&[("luffy", Tier::S), ("brook", Tier::B)]),
        ];
        let a = ItemVocabModel::train(&lists, &test_params()).unwrap();
        let b = ItemVocabModel::train(&lists, &test_params()).unwrap();

        let va = a.get("zoro").unwrap();
        let vb = b.get("zoro").unwrap();
        assert_eq!(va.to_vec(), vb.to_vec());
    }

    #[test]
    fn co_occurring_items_end_up_closer_than_strangers() {
        // zoro/nami always share a tier; usopp always sits alone elsewhere.
        let mut lists = Vec::new();
        for _ in 0..8 {
            lists.push(list(&[
                ("zoro", Tier::S),
                ("nami", Tier::S),
                ("usopp", Tier::F),
            ]));
            lists.push(list(&[
                ("zoro", Tier::A),
                ("nami", Tier::A),
                ("usopp", Tier::D),
            ]));
        }
        let params = MatchingConfig {
            vector_size: 16,
            train_epochs: 40,
            ..MatchingConfig::default()
        };
        let model = ItemVocabModel::train(&lists, &params).unwrap();

        let dist = |a: &str, b: &str| {
            let va = model.get(a).unwrap().to_owned();
            let vb = model.get(b).unwrap().to_owned();
            (&va - &vb).mapv(|x| x * x).sum().sqrt()
        };

        assert!(dist("zoro", "nami") < dist("zoro", "usopp"));
    }
}
