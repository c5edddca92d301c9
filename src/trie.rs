// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

//! Per-position suffix trie (spec.md §4.B) and the sequence of tries that
//! backs one sequence's path lattice (component C, Pass 1).
//!
//! Grounded in `examples/original_source/lib/crf/src/crfvo_preprocess.c`'s
//! `trie_t`/`trie_node_t`/`path_t`/`fid_list_t`: a node stores an optional
//! dense path id and an optional base index into `L+1` contiguous children;
//! a path stores the id of the path it reduces to one position earlier
//! (`prev_path_id`) and a singly-linked list of fired feature ids. The
//! off-by-one "`path_plus_1`, 0 means unassigned" trick in the C source is
//! re-expressed as `Option<ArenaIndex>` (spec.md §9 design note).

use crate::arena::{Arena, ArenaIndex};
use crate::error::Result;
use crate::types::Label;

#[derive(Debug, Clone, Copy, Default)]
struct TrieNode {
    path_id: Option<ArenaIndex>,
    children_base: Option<ArenaIndex>,
}

#[derive(Debug, Clone, Copy, Default)]
struct PathRecord {
    /// The path id, in the trie one position earlier, that this path
    /// reduces to once its head label is dropped. `None` when this path's
    /// own position is BOS (position `-1`): there is no trie before BOS.
    prev_path_id: Option<ArenaIndex>,
    fid_head: Option<ArenaIndex>,
}

#[derive(Debug, Clone, Copy, Default)]
struct FidListNode {
    fid: u32,
    next: Option<ArenaIndex>,
}

/// The three shared arenas backing every trie of one sequence's
/// preprocessing pass (spec.md §4.A/§4.C), plus one root-node index per
/// position. Position `-1` (BOS) is stored at array index 0; real position
/// `t` is stored at index `t + 1`.
pub struct TrieForest {
    alphabet_size: usize,
    nodes: Arena<TrieNode>,
    paths: Arena<PathRecord>,
    fids: Arena<FidListNode>,
    /// `roots[p + 1]` is the root node index of the trie at position `p`.
    roots: Vec<ArenaIndex>,
}

impl TrieForest {
    /// `seq_len` is `T`; the forest spans positions `-1..T` inclusive, i.e.
    /// `T + 1` tries.
    pub fn new(alphabet_size: usize, seq_len: usize) -> Result<Self> {
        let mut nodes = Arena::new();
        let mut roots = Vec::with_capacity(seq_len + 1);
        for _ in 0..=seq_len {
            roots.push(nodes.allocate(1)?);
        }
        Ok(TrieForest {
            alphabet_size,
            nodes,
            paths: Arena::new(),
            fids: Arena::new(),
            roots,
        })
    }

    /// Clears all three arenas and re-allocates roots for a new sequence
    /// length, reusing the previously reserved capacity (spec.md §5: arenas
    /// are cleared at the start of preprocessing each sequence).
    pub fn reset(&mut self, seq_len: usize) -> Result<()> {
        self.nodes.clear();
        self.paths.clear();
        self.fids.clear();
        self.roots.clear();
        self.roots.reserve(seq_len + 1);
        for _ in 0..=seq_len {
            self.roots.push(self.nodes.allocate(1)?);
        }
        Ok(())
    }

    #[inline]
    fn root(&self, pos: isize) -> ArenaIndex {
        self.roots[(pos + 1) as usize]
    }

    /// `insert(pos, labels)`: walks/creates nodes, assigning a fresh path id
    /// to the terminal node if it doesn't have one yet. Returns
    /// `(path_id, created)`.
    fn insert(&mut self, pos: isize, labels: &[Label]) -> Result<(ArenaIndex, bool)> {
        let mut node = self.root(pos);
        for &l in labels {
            let children_base = self.nodes.get(node).children_base;
            let children_base = match children_base {
                Some(cb) => cb,
                None => {
                    let cb = self.nodes.allocate(self.alphabet_size)?;
                    self.nodes.get_mut(node).children_base = Some(cb);
                    cb
                }
            };
            node = children_base + l as usize;
        }
        match self.nodes.get(node).path_id {
            Some(pid) => Ok((pid, false)),
            None => {
                let pid = self.paths.allocate(1)?;
                self.nodes.get_mut(node).path_id = Some(pid);
                Ok((pid, true))
            }
        }
    }

    /// Ensures that the path for `labels` exists at position `pos`,
    /// recursively ensuring (and linking) its predecessor chain down to the
    /// empty path / BOS. This is the whole of Pass 1's per-feature work: the
    /// "successive proper suffixes go into tries t-1, t-2, ..." and the
    /// "stop once a suffix insertion reports created=false" early
    /// termination both fall out of the `if created` guard below.
    pub fn ensure_path(&mut self, pos: isize, labels: &[Label]) -> Result<ArenaIndex> {
        let (path_id, created) = self.insert(pos, labels)?;
        if created {
            let prev = if pos == -1 {
                None
            } else {
                let prev_labels = if labels.is_empty() { labels } else { &labels[1..] };
                Some(self.ensure_path(pos - 1, prev_labels)?)
            };
            self.paths.get_mut(path_id).prev_path_id = prev;
        }
        Ok(path_id)
    }

    /// Attaches a feature id to the path's fid list (prepend).
    pub fn attach_fid(&mut self, path_id: ArenaIndex, fid: u32) -> Result<()> {
        let new_node = self.fids.allocate(1)?;
        let head = self.paths.get(path_id).fid_head;
        self.fids.get_mut(new_node).fid = fid;
        self.fids.get_mut(new_node).next = head;
        self.paths.get_mut(path_id).fid_head = Some(new_node);
        Ok(())
    }

    /// `longest_prefix_match`: walks `labels` in order (most-recent-first,
    /// i.e. the true observed suffix at `pos`, index 0 = the label at
    /// `pos` itself) and returns the dense *path id* of the deepest node
    /// visited that has one assigned. The root (empty path) always has one.
    pub fn longest_prefix_match_id(&self, pos: isize, labels: &[Label]) -> ArenaIndex {
        let mut node = self.root(pos);
        let mut last_valid = self.nodes.get(node).path_id.expect(
            "root node must always carry the empty path id (seeded before any feature insertion)",
        );
        for &l in labels {
            let children_base = match self.nodes.get(node).children_base {
                Some(cb) => cb,
                None => break,
            };
            node = children_base + l as usize;
            if let Some(pid) = self.nodes.get(node).path_id {
                last_valid = pid;
            }
        }
        last_valid
    }

    /// `enumerate`: materialises the final dense path list for position
    /// `pos`, given the *previous* position's raw-id → dense-index map
    /// (`None` when `pos == -1`, i.e. the BOS trie, which has no
    /// predecessor trie).
    ///
    /// Index 0 is the empty path. Paths sharing a head label occupy a
    /// contiguous range (spec.md §4.B "critical ordering invariant"),
    /// because children are visited in label order and each subtree is
    /// fully enumerated before the next one starts.
    pub fn enumerate(&self, pos: isize, prev_id_to_index: Option<&[usize]>) -> EnumeratedTrie {
        let root = self.root(pos);
        let path_count = self.count_paths_from(root);
        let mut out = EnumeratedTrie {
            longest_suffix_index: vec![-1isize; path_count],
            prev_path_index: vec![-1isize; path_count],
            feature_count: vec![0usize; path_count],
            fids: Vec::new(),
            num_paths_by_label: vec![0usize; self.alphabet_size],
            id_to_index: vec![usize::MAX; self.paths.len()],
        };

        // Root / empty path is always index 0.
        let root_path_id = self.nodes.get(root).path_id.expect("root always has the empty path");
        out.id_to_index[root_path_id] = 0;
        out.longest_suffix_index[0] = -1;
        out.prev_path_index[0] = self.resolve_prev_index(root_path_id, pos, prev_id_to_index);
        self.fill_fids(root_path_id, 0, &mut out);

        let mut next_index = 1usize;
        for l in 0..self.alphabet_size {
            let child = self
                .nodes
                .get(root)
                .children_base
                .map(|cb| cb + l);
            let before = next_index;
            if let Some(child_node) = child {
                self.enumerate_rec(child_node, 0, pos, prev_id_to_index, &mut next_index, &mut out);
            }
            out.num_paths_by_label[l] = next_index - before;
        }
        out
    }

    fn enumerate_rec(
        &self,
        node: ArenaIndex,
        parent_index: usize,
        pos: isize,
        prev_id_to_index: Option<&[usize]>,
        next_index: &mut usize,
        out: &mut EnumeratedTrie,
    ) {
        let mut valid_parent = parent_index;
        if let Some(path_id) = self.nodes.get(node).path_id {
            let idx = *next_index;
            *next_index += 1;
            out.id_to_index[path_id] = idx;
            out.longest_suffix_index[idx] = parent_index as isize;
            out.prev_path_index[idx] = self.resolve_prev_index(path_id, pos, prev_id_to_index);
            self.fill_fids(path_id, idx, out);
            valid_parent = idx;
        }
        if let Some(children_base) = self.nodes.get(node).children_base {
            for l in 0..self.alphabet_size {
                self.enumerate_rec(children_base + l, valid_parent, pos, prev_id_to_index, next_index, out);
            }
        }
    }

    fn resolve_prev_index(
        &self,
        path_id: ArenaIndex,
        pos: isize,
        prev_id_to_index: Option<&[usize]>,
    ) -> isize {
        if pos == -1 {
            return -1;
        }
        match (self.paths.get(path_id).prev_path_id, prev_id_to_index) {
            (Some(prev_id), Some(map)) => map[prev_id] as isize,
            _ => -1,
        }
    }

    fn fill_fids(&self, path_id: ArenaIndex, idx: usize, out: &mut EnumeratedTrie) {
        let mut cur = self.paths.get(path_id).fid_head;
        let mut count = 0;
        while let Some(node) = cur {
            out.fids.push(self.fids.get(node).fid);
            cur = self.fids.get(node).next;
            count += 1;
        }
        out.feature_count[idx] = count;
    }

    fn count_paths_from(&self, root: ArenaIndex) -> usize {
        let mut count = if self.nodes.get(root).path_id.is_some() { 1 } else { 0 };
        if let Some(cb) = self.nodes.get(root).children_base {
            for l in 0..self.alphabet_size {
                count += self.count_paths_rec(cb + l);
            }
        }
        count
    }

    fn count_paths_rec(&self, node: ArenaIndex) -> usize {
        let mut count = if self.nodes.get(node).path_id.is_some() { 1 } else { 0 };
        if let Some(cb) = self.nodes.get(node).children_base {
            for l in 0..self.alphabet_size {
                count += self.count_paths_rec(cb + l);
            }
        }
        count
    }
}

/// The materialised output of [`TrieForest::enumerate`] for one position.
#[derive(Debug, Clone, Default)]
pub struct EnumeratedTrie {
    pub longest_suffix_index: Vec<isize>,
    pub prev_path_index: Vec<isize>,
    pub feature_count: Vec<usize>,
    pub fids: Vec<u32>,
    pub num_paths_by_label: Vec<usize>,
    /// Raw arena path id → dense index, sized to the path arena's length at
    /// the time of enumeration. Consumed by the *next* position's
    /// `enumerate` call to resolve `prev_path_index`.
    pub id_to_index: Vec<usize>,
}
