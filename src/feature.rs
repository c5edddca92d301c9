// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

//! Feature table and the attribute → feature index (spec.md §3, "external"
//! per spec.md §1 but concretized here since the preprocessor needs a
//! concrete shape to iterate over).

use crate::types::{AttrId, Feature, FeatureId};

#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    features: Vec<Feature>,
}

impl FeatureTable {
    pub fn new() -> Self {
        FeatureTable::default()
    }

    pub fn push(&mut self, feature: Feature) -> FeatureId {
        let id = self.features.len() as FeatureId;
        self.features.push(feature);
        id
    }

    #[inline]
    pub fn get(&self, id: FeatureId) -> &Feature {
        &self.features[id as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, id: FeatureId) -> &mut Feature {
        &mut self.features[id as usize]
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, &Feature)> {
        self.features
            .iter()
            .enumerate()
            .map(|(i, f)| (i as FeatureId, f))
    }

    pub fn weights(&self) -> Vec<f64> {
        self.features.iter().map(|f| f.weight).collect()
    }

    pub fn set_weights(&mut self, weights: &[f64]) {
        assert_eq!(weights.len(), self.features.len());
        for (f, &w) in self.features.iter_mut().zip(weights) {
            f.weight = w;
        }
    }

    /// Removes features with exactly-zero weight, as required of the
    /// trained model file (spec.md §6). Returns the surviving features in
    /// their new, dense id order, alongside the old→new id remap (`None`
    /// for pruned ids) so callers can rewrite the attribute index.
    pub fn prune_zero_weight(self) -> (FeatureTable, Vec<Option<FeatureId>>) {
        let mut remap = Vec::with_capacity(self.features.len());
        let mut kept = FeatureTable::new();
        for f in self.features {
            if f.weight == 0.0 {
                remap.push(None);
            } else {
                remap.push(Some(kept.push(f)));
            }
        }
        (kept, remap)
    }
}

/// Maps an attribute id to the list of feature ids whose `attr_id` matches.
/// Built once after the feature table is loaded (training) or decoded
/// (tagging).
#[derive(Debug, Clone, Default)]
pub struct AttributeIndex {
    by_attr: Vec<Vec<FeatureId>>,
}

impl AttributeIndex {
    pub fn build(num_attrs: usize, features: &FeatureTable) -> Self {
        let mut by_attr = vec![Vec::new(); num_attrs];
        for (fid, feature) in features.iter() {
            by_attr[feature.attr_id as usize].push(fid);
        }
        AttributeIndex { by_attr }
    }

    #[inline]
    pub fn features_for(&self, attr_id: AttrId) -> &[FeatureId] {
        self.by_attr
            .get(attr_id as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
