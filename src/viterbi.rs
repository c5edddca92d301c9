// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

//! Viterbi decoder (spec.md §4.F): best-path search over the same dynamic
//! path lattice the scaled accumulator uses, substituting max for sum.
//!
//! Grounded in the traversal shape of [`crate::scaled::forward`] — same
//! descending sweep, same suffix-link cascade, same per-step `frexp`
//! rescale — but the cascade propagates a running maximum (with a
//! back-pointer) instead of an additive total.

use crate::context::Context;
use crate::types::Label;

fn frexp(x: f64) -> (f64, i32) {
    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }
    let bits = x.to_bits();
    let exp_bits = ((bits >> 52) & 0x7ff) as i32;
    if exp_bits == 0 {
        let (m, e) = frexp(x * 18014398509481984.0);
        return (m, e - 54);
    }
    let exponent = exp_bits - 1022;
    let new_bits = (bits & !(0x7ffu64 << 52)) | (1022u64 << 52);
    (f64::from_bits(new_bits), exponent)
}

#[inline]
fn scale2(x: f64, e: i32) -> f64 {
    x * 2f64.powi(e)
}

/// Head label of path index `i` at a position, derived from the
/// contiguous-per-label index ranges `num_paths_by_label` produces
/// (spec.md §4.B "critical ordering invariant"): band 0 (label 0) starts
/// right after the root at index 1, band 1 starts after band 0 ends, etc.
fn label_of(num_paths_by_label: &[usize], index: usize) -> Label {
    let mut cursor = 1usize;
    for (l, &count) in num_paths_by_label.iter().enumerate() {
        if index < cursor + count {
            return l as Label;
        }
        cursor += count;
    }
    unreachable!("path index {index} not covered by any label band")
}

/// The result of decoding one sequence: the recovered label sequence and
/// the Viterbi score in natural-log units (spec.md §4.F: `log(max_final) +
/// ln2 · accumulated_exponent`).
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub labels: Vec<Label>,
    pub score: f64,
}

/// Runs Viterbi over an already-`load`ed, already-weighted context
/// (`scaled::set_weights` must have been called first) and returns the
/// best label sequence.
pub fn decode(ctx: &mut Context) -> Decoded {
    let t_len = ctx.seq_len();
    if t_len == 0 {
        return Decoded { labels: Vec::new(), score: 0.0 };
    }

    // The BOS trie has exactly two paths, the empty path at index 0 and the
    // BOS symbol at index 1. A single-label path `[l]` at t=0 links its
    // predecessor to the *empty* suffix (index 0), not to the BOS symbol
    // (index 1) — so both must start the running max at 1.0, the same
    // symmetric seed `forward` uses, or every real-label path at t=0 reads
    // a predecessor score of 0 and the whole sweep degenerates to zero.
    {
        let pt = ctx.prev_temp_mut();
        pt[0] = 1.0;
        if pt.len() > 1 {
            pt[1] = 1.0;
        }
        for v in pt.iter_mut().skip(2) {
            *v = 0.0;
        }
    }

    let mut accumulated_exponent: i64 = 0;

    for t in 0..t_len {
        let n = ctx.num_paths(t);
        {
            let ct = ctx.cur_temp_mut();
            for v in ct[..n].iter_mut() {
                *v = 0.0;
            }
        }
        for i in 0..n {
            ctx.path_mut(t, i).best_path = 0;
        }

        for i in (1..n).rev() {
            let p = ctx.prev_path_index(t, i);
            let s = ctx.longest_suffix_index(t, i);
            let prev_score = if p >= 0 { ctx.prev_temp()[p as usize] } else { 0.0 };
            let val = prev_score * ctx.path(t, i).exp_weight;

            ctx.cur_temp_mut()[i] = val;
            ctx.path_mut(t, i).best_path = p.max(0) as usize;

            if s >= 0 {
                let s_idx = s as usize;
                if val > ctx.cur_temp()[s_idx] {
                    ctx.cur_temp_mut()[s_idx] = val;
                    let winner = ctx.path(t, i).best_path;
                    ctx.path_mut(t, s_idx).best_path = winner;
                }
            }
        }

        let max_val = ctx.cur_temp()[..n].iter().cloned().fold(0.0_f64, f64::max);
        let (_, delta_e) = frexp(max_val);
        if max_val != 0.0 {
            let scale = scale2(1.0, -delta_e);
            for v in ctx.cur_temp_mut()[..n].iter_mut() {
                *v *= scale;
            }
        }
        accumulated_exponent += delta_e as i64;
        ctx.swap_temps();
    }

    let n_last = ctx.num_paths(t_len - 1);
    let (mut best_i, mut best_val) = (1usize, f64::NEG_INFINITY);
    for i in 1..n_last.max(1) {
        let v = ctx.prev_temp()[i];
        if v > best_val {
            best_val = v;
            best_i = i;
        }
    }

    let mut labels = vec![0 as Label; t_len];
    let mut cur_index = best_i;
    for t in (0..t_len).rev() {
        let bands = ctx.num_paths_by_label(t);
        labels[t] = label_of(bands, cur_index);
        cur_index = ctx.path(t, cur_index).best_path;
    }

    let score = if best_val > 0.0 { best_val.ln() } else { f64::NEG_INFINITY }
        + std::f64::consts::LN_2 * accumulated_exponent as f64;

    Decoded { labels, score }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{AttributeIndex, FeatureTable};
    use crate::preprocess::Preprocessor;
    use crate::scaled::set_weights;
    use crate::types::{Alphabet, Feature, Item, ItemAttr};

    fn item(label: Label, attrs: &[crate::types::AttrId]) -> Item {
        Item {
            label: Some(label),
            attrs: attrs.iter().map(|&a| ItemAttr { attr_id: a, scale: 1.0 }).collect(),
        }
    }

    #[test]
    fn empty_sequence_decodes_to_empty_labels() {
        let alphabet = Alphabet::new(2);
        let features = FeatureTable::new();
        let idx = AttributeIndex::build(0, &features);
        let mut pp = Preprocessor::new(alphabet).unwrap();
        let seq = pp.preprocess(Vec::new(), &features, &idx).unwrap();
        let mut ctx = Context::new();
        ctx.load(&seq);
        let decoded = decode(&mut ctx);
        assert!(decoded.labels.is_empty());
        assert_eq!(decoded.score, 0.0);
    }

    #[test]
    fn strongly_preferred_label_wins_every_position() {
        // A single feature (a, [1]) with a large positive weight should push
        // Viterbi to choose label 1 at every position over label 0, which
        // has no matching feature at all.
        let alphabet = Alphabet::new(2);
        let mut features = FeatureTable::new();
        features.push(Feature::new(0, vec![1]));
        let idx = AttributeIndex::build(1, &features);
        let items = vec![item(0, &[0]), item(0, &[0]), item(0, &[0])];
        let mut pp = Preprocessor::new(alphabet).unwrap();
        let seq = pp.preprocess(items, &features, &idx).unwrap();

        let mut ctx = Context::new();
        ctx.load(&seq);
        set_weights(&mut ctx, &[5.0]);
        let decoded = decode(&mut ctx);
        assert_eq!(decoded.labels, vec![1, 1, 1]);
    }
}
