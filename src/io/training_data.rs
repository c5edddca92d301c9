// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

//! Training-data reader (spec.md §6): token-per-line, blank-line-separated
//! sequences, `#` comments, `attr` or `attr:scale` attribute tokens.
//!
//! Malformed records are skipped with a logged warning rather than aborting
//! the whole read (spec.md §7 recovery policy), mirroring the way the
//! teacher's CSV-adjacent readers (`utils::sort_pairs`) treat one bad line
//! as non-fatal.

use std::io::BufRead;

use crate::dictionary::MutableDictionary;
use crate::io::{parse_attr_token, strip_comment, BOS_EOS_TOKEN};
use crate::progress::ProgressLogger;
use crate::types::{Item, ItemAttr};

/// Reads a whole training corpus into memory, growing `labels` and `attrs`
/// as new strings are encountered.
///
/// A blank line or a literal `__BOS_EOS__` line both end the current
/// sequence; neither contributes an `Item` (the BOS/EOS boundary is modelled
/// implicitly by the preprocessor, not as a literal sequence element).
pub fn read_training_data<R: BufRead>(
    reader: R,
    labels: &mut MutableDictionary,
    attrs: &mut MutableDictionary,
) -> Vec<Vec<Item>> {
    let mut sequences = Vec::new();
    let mut current = Vec::new();
    let mut progress = ProgressLogger::new("lines");
    progress.start("reading training data");

    for (lineno, line) in reader.lines().enumerate() {
        progress.light_update();
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::warn!("invalid input at line {}: {e}", lineno + 1);
                continue;
            }
        };
        let trimmed = strip_comment(&line);
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();

        if tokens.is_empty() || tokens[0] == BOS_EOS_TOKEN {
            if !current.is_empty() {
                sequences.push(std::mem::take(&mut current));
            }
            continue;
        }

        let label = labels.get(tokens[0]);
        let mut item_attrs = Vec::with_capacity(tokens.len().saturating_sub(1));
        for tok in &tokens[1..] {
            let (name, scale) = parse_attr_token(tok);
            item_attrs.push(ItemAttr {
                attr_id: attrs.get(name),
                scale,
            });
        }

        current.push(Item {
            label: Some(label),
            attrs: item_attrs,
        });
    }
    if !current.is_empty() {
        sequences.push(current);
    }
    progress.done(Some("finished reading training data"));
    sequences
}

/// Reads unlabelled tagging input: same tokeniser, but the first token is
/// itself an attribute rather than a gold label, and `attrs` is a frozen
/// dictionary from the trained model (an unknown attribute string is simply
/// dropped, it can never fire a feature).
pub fn read_tagging_data<R: BufRead>(
    reader: R,
    attrs: &dyn crate::dictionary::Dictionary,
) -> Vec<Vec<Item>> {
    let mut sequences = Vec::new();
    let mut current = Vec::new();

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => continue,
        };
        let trimmed = strip_comment(&line);
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();

        if tokens.is_empty() || tokens[0] == BOS_EOS_TOKEN {
            if !current.is_empty() {
                sequences.push(std::mem::take(&mut current));
            }
            continue;
        }

        let item_attrs = tokens
            .iter()
            .filter_map(|tok| {
                let (name, scale) = parse_attr_token(tok);
                attrs.to_id(name).map(|attr_id| ItemAttr { attr_id, scale })
            })
            .collect();

        current.push(Item {
            label: None,
            attrs: item_attrs,
        });
    }
    if !current.is_empty() {
        sequences.push(current);
    }
    sequences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_blank_line_separated_sequences() {
        let text = "A x y:0.5\nB z\n\nA x\n# a comment\nB y\n";
        let mut labels = MutableDictionary::new();
        let mut attrs = MutableDictionary::new();
        let sequences = read_training_data(text.as_bytes(), &mut labels, &mut attrs);

        assert_eq!(sequences.len(), 2);
        assert_eq!(sequences[0].len(), 2);
        assert_eq!(sequences[1].len(), 2);
        assert_eq!(labels.num(), 2);
        assert_eq!(attrs.num(), 3);
        assert_eq!(sequences[0][0].attrs[1].scale, 0.5);
    }

    #[test]
    fn bos_eos_token_ends_sequence_without_an_item() {
        let text = "A x\n__BOS_EOS__\nB y\n";
        let mut labels = MutableDictionary::new();
        let mut attrs = MutableDictionary::new();
        let sequences = read_training_data(text.as_bytes(), &mut labels, &mut attrs);
        assert_eq!(sequences.len(), 2);
        assert_eq!(sequences[0].len(), 1);
        assert_eq!(sequences[1].len(), 1);
    }

    #[test]
    fn tagging_drops_unknown_attributes() {
        let mut attrs = MutableDictionary::new();
        attrs.get("known");
        let frozen = attrs.freeze();
        let text = "known unknown\n";
        let sequences = read_tagging_data(text.as_bytes(), &frozen);
        assert_eq!(sequences[0][0].attrs.len(), 1);
    }
}
