// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

//! Path lattice builder (spec.md §4.C): the preprocessor that, for one
//! sequence, attaches a [`PreprocessedItem`] to every position.
//!
//! Signature grounded in the design note of spec.md §9: the last-consistent
//! C draft exposes `crfvopp_preprocess_sequence(attributes, features,
//! num_labels, sequence)`; here that becomes [`Preprocessor::preprocess`]
//! taking the feature table, the attribute index, and the item sequence.

use crate::error::Result;
use crate::feature::{AttributeIndex, FeatureTable};
use crate::trie::TrieForest;
use crate::types::{Alphabet, Item, Label};

/// A distinct label suffix required at one position (spec.md §3 "Path").
#[derive(Debug, Clone, Copy, Default)]
pub struct PathSlot {
    pub prev_path_index: isize,
    pub longest_suffix_index: isize,
    pub feature_count: usize,
}

/// Everything the inference engine needs at one sequence position (spec.md
/// §3 "PreprocessedItem"). `fids` concatenates feature ids path by path;
/// the boundary between paths is implicit in `paths[i].feature_count`.
#[derive(Debug, Clone, Default)]
pub struct PreprocessedItem {
    pub paths: Vec<PathSlot>,
    pub fids: Vec<u32>,
    pub num_paths_by_label: Vec<usize>,
    pub training_path_index: usize,
}

impl PreprocessedItem {
    /// The slice of `fids` belonging to path `i`.
    pub fn fids_for_path(&self, i: usize) -> &[u32] {
        let start: usize = self.paths[..i].iter().map(|p| p.feature_count).sum();
        &self.fids[start..start + self.paths[i].feature_count]
    }
}

/// A fully preprocessed sequence: the items plus one [`PreprocessedItem`]
/// per position and the widest path count seen, used to size [`crate::context::Context`].
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    pub items: Vec<Item>,
    pub preprocessed: Vec<PreprocessedItem>,
    pub max_paths: usize,
}

impl Sequence {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub struct Preprocessor {
    alphabet: Alphabet,
    forest: TrieForest,
}

impl Preprocessor {
    pub fn new(alphabet: Alphabet) -> Result<Self> {
        let forest = TrieForest::new(alphabet.alphabet_size(), 0)?;
        Ok(Preprocessor { alphabet, forest })
    }

    /// Runs Pass 1 (fill tries) and Pass 2 (enumerate) for one sequence and
    /// returns the resulting [`Sequence`].
    pub fn preprocess(
        &mut self,
        items: Vec<Item>,
        features: &FeatureTable,
        attr_index: &AttributeIndex,
    ) -> Result<Sequence> {
        let seq_len = items.len();
        let bos_eos = self.alphabet.bos_eos();
        let alphabet_size = self.alphabet.alphabet_size();

        if seq_len == 0 {
            return Ok(Sequence { items, preprocessed: Vec::new(), max_paths: 0 });
        }

        self.forest.reset(seq_len)?;

        // --- Pass 1: seed empty / single-label paths, then fire features. ---
        // Every position, including the last, gets the full real-label
        // singleton range: an ordinary feature still needs to describe a
        // sequence's true final label (see `Feature::fires_at`). The EOS
        // singleton is seeded only at the last position, where an
        // EOS-headed feature is allowed to land.
        self.forest.ensure_path(-1, &[])?;
        self.forest.ensure_path(-1, &[bos_eos])?;
        for t in 0..seq_len {
            self.forest.ensure_path(t as isize, &[])?;
            for l in 0..self.alphabet.num_labels() {
                self.forest.ensure_path(t as isize, &[l])?;
            }
            if t == seq_len - 1 {
                self.forest.ensure_path(t as isize, &[bos_eos])?;
            }
        }
        for t in 0..seq_len {
            for attr in &items[t].attrs {
                for &fid in attr_index.features_for(attr.attr_id) {
                    let feature = features.get(fid);
                    if feature.fires_at(t, seq_len, bos_eos) {
                        let path_id = self.forest.ensure_path(t as isize, &feature.label_sequence)?;
                        self.forest.attach_fid(path_id, fid)?;
                    }
                }
            }
        }

        // --- Pass 2: enumerate left to right, carrying the id->index map. ---
        let mut preprocessed = Vec::with_capacity(seq_len);
        let mut max_paths = 0usize;
        let bos_enum = self.forest.enumerate(-1, None);
        let mut prev_map = bos_enum.id_to_index;
        for t in 0..seq_len {
            let enumerated = self.forest.enumerate(t as isize, Some(&prev_map));
            let n = enumerated.longest_suffix_index.len();
            max_paths = max_paths.max(n);

            let mut paths = Vec::with_capacity(n);
            for i in 0..n {
                paths.push(PathSlot {
                    prev_path_index: enumerated.prev_path_index[i],
                    longest_suffix_index: enumerated.longest_suffix_index[i],
                    feature_count: enumerated.feature_count[i],
                });
            }

            let suffix = true_observed_suffix(&items, t, bos_eos, alphabet_size);
            let training_path_id = self.forest.longest_prefix_match_id(t as isize, &suffix);
            let training_path_index = enumerated.id_to_index[training_path_id];

            preprocessed.push(PreprocessedItem {
                paths,
                fids: enumerated.fids,
                num_paths_by_label: enumerated.num_paths_by_label,
                training_path_index,
            });
            prev_map = enumerated.id_to_index;
        }

        Ok(Sequence { items, preprocessed, max_paths })
    }
}

/// Builds the true, most-recent-first label suffix ending at `pos`,
/// substituting the BOS sentinel once the walk runs off the start of the
/// sequence (spec.md §4.C Pass 2: "with sentinels BOS = EOS = L").
fn true_observed_suffix(items: &[Item], pos: usize, bos_eos: Label, max_order: usize) -> Vec<Label> {
    let mut out = Vec::with_capacity(max_order);
    let mut i = pos as isize;
    while out.len() < max_order {
        if i < 0 {
            out.push(bos_eos);
            break;
        }
        out.push(
            items[i as usize]
                .label
                .expect("training sequence item must carry a gold label during preprocessing"),
        );
        i -= 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttrId, Feature, ItemAttr, MAX_ORDER};

    fn item(label: Label, attrs: &[AttrId]) -> Item {
        Item {
            label: Some(label),
            attrs: attrs.iter().map(|&a| ItemAttr { attr_id: a, scale: 1.0 }).collect(),
        }
    }

    #[test]
    fn empty_sequence_preprocesses_to_nothing() {
        let alphabet = Alphabet::new(2);
        let mut pp = Preprocessor::new(alphabet).unwrap();
        let features = FeatureTable::new();
        let idx = AttributeIndex::build(0, &features);
        let seq = pp.preprocess(Vec::new(), &features, &idx).unwrap();
        assert!(seq.is_empty());
        assert_eq!(seq.max_paths, 0);
    }

    #[test]
    fn scenario_1_training_path_index_matches_observed_bigram() {
        // L = 2, A = 1, labels [0,1,0], single attribute firing at every item.
        let alphabet = Alphabet::new(2);
        let mut features = FeatureTable::new();
        features.push(Feature::new(0, vec![0]));
        features.push(Feature::new(0, vec![1]));
        features.push(Feature::new(0, vec![0, 1]));
        features.push(Feature::new(0, vec![1, 0]));
        let idx = AttributeIndex::build(1, &features);

        let items = vec![item(0, &[0]), item(1, &[0]), item(0, &[0])];
        let mut pp = Preprocessor::new(alphabet).unwrap();
        let seq = pp.preprocess(items, &features, &idx).unwrap();

        assert_eq!(seq.len(), 3);
        let last = &seq.preprocessed[2];
        let chosen = &last.paths[last.training_path_index];
        // the observed suffix at t=2 is [0,1,0] (most recent first); the
        // deepest node it matches is feature (a,[0,1])'s own path, since no
        // order-3 feature exists to go deeper and (a,[1,0]) doesn't match
        // the suffix's leading label.
        assert_eq!(chosen.feature_count, 1);
    }

    #[test]
    fn scenario_4_max_order_feature_attaches_to_bos() {
        // order = MAX_ORDER with a BOS-anchored tail: per the rule-1 special
        // case this fires at t = order-2 = MAX_ORDER-2, and its deepest
        // (single-label) suffix insertion lands in the BOS trie at
        // position -1 (prev_path_index sentinel -1 there), exercising the
        // full recursive `ensure_path` descent down to BOS.
        let alphabet = Alphabet::new(2);
        let mut features = FeatureTable::new();
        let mut label_sequence: Vec<Label> = (0..(MAX_ORDER as u32 - 1)).map(|i| i % 2).collect();
        label_sequence.push(alphabet.bos_eos());
        features.push(Feature::new(0, label_sequence.clone()));
        let idx = AttributeIndex::build(1, &features);

        let seq_len = MAX_ORDER;
        let fire_t = MAX_ORDER - 2;
        let mut items = vec![item(0, &[0]); seq_len];
        for (k, &l) in label_sequence[..MAX_ORDER - 1].iter().enumerate() {
            items[fire_t - k] = item(l, &[0]);
        }

        let mut pp = Preprocessor::new(alphabet).unwrap();
        let seq = pp.preprocess(items, &features, &idx).unwrap();

        let at_fire = &seq.preprocessed[fire_t];
        let found = at_fire
            .paths
            .iter()
            .any(|p| p.feature_count >= 1 && p.longest_suffix_index >= 0);
        assert!(found, "the order-MAX_ORDER path must exist and carry the fid");
    }

    #[test]
    fn scenario_5_shared_label_sequence_both_fids_present() {
        let alphabet = Alphabet::new(2);
        let mut features = FeatureTable::new();
        features.push(Feature::new(0, vec![0]));
        features.push(Feature::new(1, vec![0]));
        let idx = AttributeIndex::build(2, &features);

        let items = vec![item(0, &[0, 1])];
        let mut pp = Preprocessor::new(alphabet).unwrap();
        let seq = pp.preprocess(items, &features, &idx).unwrap();
        let item0 = &seq.preprocessed[0];
        let shared = item0.paths.iter().position(|p| p.feature_count == 2);
        assert!(shared.is_some(), "both features must land on the same path");
    }
}
