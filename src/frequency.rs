// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

//! Training frequency check (spec.md §4.I).
//!
//! After the whole corpus is preprocessed, re-derive each feature's
//! observation count from the paths actually chosen during preprocessing
//! and overwrite the feature table's `freq` field with it — the
//! feature-generation stage's own `freq` estimate is a superset guess, the
//! preprocessor's exclusion rules are authoritative.

use crate::feature::FeatureTable;
use crate::preprocess::Sequence;

/// Walks `training_path_index` down to the empty path for every item in
/// every sequence, crediting every fid visited along the way, then
/// overwrites `features`' `freq` fields in place.
pub fn recompute_frequencies(sequences: &[Sequence], features: &mut FeatureTable) {
    let mut observed = vec![0.0f64; features.len()];

    for seq in sequences {
        for item in &seq.preprocessed {
            let mut i = item.training_path_index;
            loop {
                for &fid in item.fids_for_path(i) {
                    observed[fid as usize] += 1.0;
                }
                let s = item.paths[i].longest_suffix_index;
                if s < 0 {
                    break;
                }
                i = s as usize;
            }
        }
    }

    for (fid, &count) in observed.iter().enumerate() {
        features.get_mut(fid as u32).freq = count;
    }
}
