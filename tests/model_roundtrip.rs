// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

//! Invariant 8: save-then-load a trained model and decode the same input —
//! the labels must come back identical.

use vocrf::dictionary::MutableDictionary;
use vocrf::io::model::{read_model, write_model};
use vocrf::prelude::*;
use vocrf::types::{Item, ItemAttr};

fn item(label: Label, attrs: &[AttrId]) -> Item {
    Item { label: Some(label), attrs: attrs.iter().map(|&a| ItemAttr { attr_id: a, scale: 1.0 }).collect() }
}

#[test]
fn decoding_survives_a_save_and_load_round_trip() {
    let alphabet = Alphabet::new(2);
    let mut features = FeatureTable::new();
    features.push(Feature::new(0, vec![1]));
    features.push(Feature::new(0, vec![0, 1]));
    let idx = AttributeIndex::build(1, &features);

    let mut pp = Preprocessor::new(alphabet).unwrap();
    let items = vec![item(0, &[0]), item(1, &[0]), item(0, &[0])];
    let seq = pp.preprocess(items, &features, &idx).unwrap();

    let mut ctx = Context::new();
    ctx.load(&seq);
    set_weights(&mut ctx, &[2.0f64.exp(), 1.0f64.exp()]);
    let before = decode(&mut ctx);

    let mut labels = MutableDictionary::new();
    labels.get("0");
    labels.get("1");
    let mut attrs = MutableDictionary::new();
    attrs.get("a");

    features.get_mut(0).weight = 2.0;
    features.get_mut(1).weight = 1.0;

    let mut buf = Vec::new();
    write_model(&mut buf, features, &labels.clone().freeze(), &attrs.clone().freeze()).unwrap();

    let loaded = read_model(&mut buf.as_slice(), std::path::Path::new("<mem>")).unwrap();
    let exp_weights: Vec<f64> = loaded.features.weights().iter().map(|w| w.exp()).collect();

    let mut pp2 = Preprocessor::new(Alphabet::new(2)).unwrap();
    let items2 = vec![item(0, &[0]), item(1, &[0]), item(0, &[0])];
    let seq2 = pp2.preprocess(items2, &loaded.features, &loaded.attr_index).unwrap();

    let mut ctx2 = Context::new();
    ctx2.load(&seq2);
    set_weights(&mut ctx2, &exp_weights);
    let after = decode(&mut ctx2);

    assert_eq!(before.labels, after.labels);
}
