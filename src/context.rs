// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

//! Per-worker inference scratch (spec.md §3 "Context", §4.D).
//!
//! Sized for the worst case seen so far and grown, never shrunk, on demand —
//! the same policy the trie arenas use (spec.md §4.A), mirrored here as
//! plain `Vec::resize` growth rather than a typed arena since rows are
//! indexed directly by path index, not handed out as stable handles.

use crate::preprocess::Sequence;
use crate::types::Label;

/// One path's running state during a forward/backward or Viterbi sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathScore {
    /// α during the forward sweep, θ (unnormalised posterior mass) after
    /// the backward sweep; the best-path max during Viterbi.
    pub score: f64,
    pub exp_weight: f64,
    /// Winning predecessor's path index, filled in by Viterbi only.
    pub best_path: usize,
}

/// Per-sequence scratch reused across a trainer or decoder's lifetime
/// (spec.md §4.D). `load` copies the shape of each position's
/// [`crate::preprocess::PreprocessedItem`] in; the numeric sweeps
/// (forward/backward, Viterbi) then operate directly on `path_scores`.
pub struct Context {
    /// `path_scores[t][i]`.
    path_scores: Vec<Vec<PathScore>>,
    /// Per-position path count actually in use (`<= path_scores[t].len()`).
    num_paths: Vec<usize>,
    longest_suffix_index: Vec<Vec<isize>>,
    prev_path_index: Vec<Vec<isize>>,
    num_paths_by_label: Vec<Vec<usize>>,
    fids_per_path: Vec<Vec<(usize, usize)>>,
    fids: Vec<Vec<u32>>,
    training_path_index: Vec<usize>,

    cur_temp: Vec<f64>,
    prev_temp: Vec<f64>,
    exponents: Vec<i32>,

    pub norm_significand: f64,
    pub norm_exponent: i64,

    pub labels: Vec<Label>,
    seq_len: usize,
    max_paths: usize,
}

impl Context {
    pub fn new() -> Self {
        Context {
            path_scores: Vec::new(),
            num_paths: Vec::new(),
            longest_suffix_index: Vec::new(),
            prev_path_index: Vec::new(),
            num_paths_by_label: Vec::new(),
            fids_per_path: Vec::new(),
            fids: Vec::new(),
            training_path_index: Vec::new(),
            cur_temp: Vec::new(),
            prev_temp: Vec::new(),
            exponents: Vec::new(),
            norm_significand: 0.0,
            norm_exponent: 0,
            labels: Vec::new(),
            seq_len: 0,
            max_paths: 0,
        }
    }

    #[inline]
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    #[inline]
    pub fn num_paths(&self, t: usize) -> usize {
        self.num_paths[t]
    }

    #[inline]
    pub fn longest_suffix_index(&self, t: usize, i: usize) -> isize {
        self.longest_suffix_index[t][i]
    }

    #[inline]
    pub fn prev_path_index(&self, t: usize, i: usize) -> isize {
        self.prev_path_index[t][i]
    }

    #[inline]
    pub fn num_paths_by_label(&self, t: usize) -> &[usize] {
        &self.num_paths_by_label[t]
    }

    #[inline]
    pub fn fids(&self, t: usize, i: usize) -> &[u32] {
        let (start, len) = self.fids_per_path[t][i];
        &self.fids[t][start..start + len]
    }

    #[inline]
    pub fn training_path_index(&self, t: usize) -> usize {
        self.training_path_index[t]
    }

    #[inline]
    pub fn path(&self, t: usize, i: usize) -> &PathScore {
        &self.path_scores[t][i]
    }

    #[inline]
    pub fn path_mut(&mut self, t: usize, i: usize) -> &mut PathScore {
        &mut self.path_scores[t][i]
    }

    /// Grows the worst-case-sized scratch if this sequence needs more room,
    /// then copies the sequence's shape in. Scratch is never shrunk
    /// (spec.md §4.D).
    pub fn load(&mut self, sequence: &Sequence) {
        self.seq_len = sequence.len();
        self.max_paths = self.max_paths.max(sequence.max_paths);

        self.grow_rows(self.seq_len);
        self.grow_temps(self.max_paths);

        self.num_paths.truncate(self.seq_len);
        self.num_paths.resize(self.seq_len, 0);
        self.longest_suffix_index.truncate(self.seq_len);
        self.prev_path_index.truncate(self.seq_len);
        self.num_paths_by_label.truncate(self.seq_len);
        self.fids_per_path.truncate(self.seq_len);
        self.fids.truncate(self.seq_len);
        self.training_path_index.truncate(self.seq_len);
        self.labels.truncate(self.seq_len);

        for (t, item) in sequence.preprocessed.iter().enumerate() {
            let n = item.paths.len();
            self.num_paths[t] = n;

            let row = &mut self.path_scores[t];
            if row.len() < n {
                row.resize(n, PathScore::default());
            }
            for i in 0..n {
                row[i] = PathScore::default();
            }

            self.longest_suffix_index[t] = item.paths.iter().map(|p| p.longest_suffix_index).collect();
            self.prev_path_index[t] = item.paths.iter().map(|p| p.prev_path_index).collect();
            self.num_paths_by_label[t] = item.num_paths_by_label.clone();

            let mut offsets = Vec::with_capacity(n);
            let mut start = 0usize;
            for p in &item.paths {
                offsets.push((start, p.feature_count));
                start += p.feature_count;
            }
            self.fids_per_path[t] = offsets;
            self.fids[t] = item.fids.clone();

            self.training_path_index[t] = item.training_path_index;
            self.labels[t] = sequence.items[t].label.unwrap_or(0);
        }
    }

    fn grow_rows(&mut self, seq_len: usize) {
        if self.path_scores.len() < seq_len {
            self.path_scores.resize(seq_len, Vec::new());
            self.longest_suffix_index.resize(seq_len, Vec::new());
            self.prev_path_index.resize(seq_len, Vec::new());
            self.num_paths_by_label.resize(seq_len, Vec::new());
            self.fids_per_path.resize(seq_len, Vec::new());
            self.fids.resize(seq_len, Vec::new());
            self.training_path_index.resize(seq_len, 0);
            self.labels.resize(seq_len, 0);
            self.exponents.resize(seq_len, 0);
        }
    }

    fn grow_temps(&mut self, max_paths: usize) {
        if self.cur_temp.len() < max_paths {
            self.cur_temp.resize(max_paths, 0.0);
            self.prev_temp.resize(max_paths, 0.0);
        }
    }

    #[inline]
    pub fn cur_temp(&self) -> &[f64] {
        &self.cur_temp[..self.max_paths]
    }

    #[inline]
    pub fn cur_temp_mut(&mut self) -> &mut [f64] {
        &mut self.cur_temp[..self.max_paths]
    }

    #[inline]
    pub fn prev_temp(&self) -> &[f64] {
        &self.prev_temp[..self.max_paths]
    }

    #[inline]
    pub fn prev_temp_mut(&mut self) -> &mut [f64] {
        &mut self.prev_temp[..self.max_paths]
    }

    #[inline]
    pub fn swap_temps(&mut self) {
        std::mem::swap(&mut self.cur_temp, &mut self.prev_temp);
    }

    #[inline]
    pub fn set_exponent(&mut self, t: usize, e: i32) {
        self.exponents[t] = e;
    }

    #[inline]
    pub fn exponent(&self, t: usize) -> i32 {
        self.exponents[t]
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
