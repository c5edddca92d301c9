// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

//! String↔id dictionaries (spec.md §4.J / SPEC_FULL.md §4.J).
//!
//! Grounded in the `crf_dictionary_t` vtable (`get`/`to_id`/`to_string`/`num`)
//! from `examples/original_source/lib/crf/src/crfvo.c`, reshaped as a plain
//! trait with two implementors instead of a hand-rolled vtable struct, the
//! way the teacher crate favours traits (`src/traits/*.rs`) over manual
//! dynamic dispatch tables.

use std::collections::HashMap;

/// A bidirectional string↔id table.
///
/// `get` allocates a fresh id for an unseen string (training); `to_id` never
/// allocates and reports `None` for an unseen string (tagging against a
/// frozen model).
pub trait Dictionary {
    fn to_id(&self, s: &str) -> Option<u32>;
    fn to_string(&self, id: u32) -> Option<&str>;
    fn num(&self) -> usize;
}

/// Growable dictionary used while reading training data: every new string
/// gets the next sequential id.
#[derive(Debug, Clone, Default)]
pub struct MutableDictionary {
    by_string: HashMap<String, u32>,
    by_id: Vec<String>,
}

impl MutableDictionary {
    pub fn new() -> Self {
        MutableDictionary::default()
    }

    /// Looks up `s`, allocating a fresh id if it hasn't been seen before.
    pub fn get(&mut self, s: &str) -> u32 {
        if let Some(&id) = self.by_string.get(s) {
            return id;
        }
        let id = self.by_id.len() as u32;
        self.by_id.push(s.to_string());
        self.by_string.insert(s.to_string(), id);
        id
    }

    pub fn freeze(self) -> FrozenDictionary {
        FrozenDictionary {
            by_string: self.by_string,
            by_id: self.by_id,
        }
    }
}

impl Dictionary for MutableDictionary {
    fn to_id(&self, s: &str) -> Option<u32> {
        self.by_string.get(s).copied()
    }

    fn to_string(&self, id: u32) -> Option<&str> {
        self.by_id.get(id as usize).map(String::as_str)
    }

    fn num(&self) -> usize {
        self.by_id.len()
    }
}

/// Read-only dictionary loaded from a trained model file: an unknown string
/// is reported, never allocated.
#[derive(Debug, Clone, Default)]
pub struct FrozenDictionary {
    by_string: HashMap<String, u32>,
    by_id: Vec<String>,
}

impl FrozenDictionary {
    pub fn from_strings(strings: Vec<String>) -> Self {
        let by_string = strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();
        FrozenDictionary {
            by_string,
            by_id: strings,
        }
    }

    pub fn strings(&self) -> &[String] {
        &self.by_id
    }
}

impl Dictionary for FrozenDictionary {
    fn to_id(&self, s: &str) -> Option<u32> {
        self.by_string.get(s).copied()
    }

    fn to_string(&self, id: u32) -> Option<&str> {
        self.by_id.get(id as usize).map(String::as_str)
    }

    fn num(&self) -> usize {
        self.by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutable_dictionary_assigns_sequential_ids() {
        let mut dict = MutableDictionary::new();
        assert_eq!(dict.get("a"), 0);
        assert_eq!(dict.get("b"), 1);
        assert_eq!(dict.get("a"), 0);
        assert_eq!(dict.num(), 2);
        assert_eq!(dict.to_string(1), Some("b"));
    }

    #[test]
    fn frozen_dictionary_never_allocates() {
        let mut mutable = MutableDictionary::new();
        mutable.get("x");
        mutable.get("y");
        let frozen = mutable.freeze();
        assert_eq!(frozen.to_id("x"), Some(0));
        assert_eq!(frozen.to_id("unseen"), None);
        assert_eq!(frozen.num(), 2);
    }
}
