// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

//! Feature-list reader (spec.md §6, optional): one feature per non-blank
//! line, first token is the attribute string, remaining tokens are the
//! label sequence (most-recent first).

use std::io::BufRead;

use crate::dictionary::MutableDictionary;
use crate::feature::FeatureTable;
use crate::io::strip_comment;
use crate::types::Feature;

/// Reads an externally supplied feature list, growing `labels` and `attrs`
/// as new strings appear. Malformed lines (fewer than two tokens, or an
/// unparseable label) are skipped with a warning.
pub fn read_feature_list<R: BufRead>(
    reader: R,
    labels: &mut MutableDictionary,
    attrs: &mut MutableDictionary,
) -> FeatureTable {
    let mut features = FeatureTable::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::warn!("invalid input at line {}: {e}", lineno + 1);
                continue;
            }
        };
        let trimmed = strip_comment(&line);
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() < 2 {
            log::warn!(
                "invalid input at line {}: feature needs an attribute and at least one label",
                lineno + 1
            );
            continue;
        }

        let attr_id = attrs.get(tokens[0]);
        let label_sequence: Vec<_> = tokens[1..].iter().map(|t| labels.get(t)).collect();
        features.push(Feature::new(attr_id, label_sequence));
    }

    features
}
