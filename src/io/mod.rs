// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

//! Text and binary external formats (spec.md §6, SPEC_FULL.md §4.K/§4.L).

pub mod feature_list;
pub mod model;
pub mod training_data;

/// The literal sentinel token that may stand in for a label, marking a
/// sequence boundary without a real label (spec.md §6).
pub const BOS_EOS_TOKEN: &str = "__BOS_EOS__";

/// Whole-line comments only: a line whose first non-whitespace character is
/// `#` is dropped entirely.
fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        ""
    } else {
        line
    }
}

/// One `attr` or `attr:scale` token.
fn parse_attr_token(token: &str) -> (&str, f64) {
    match token.rsplit_once(':') {
        Some((attr, scale)) if scale.parse::<f64>().is_ok() => {
            (attr, scale.parse().unwrap())
        }
        _ => (token, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_comment_drops_whole_line() {
        assert_eq!(strip_comment("# a comment"), "");
        assert_eq!(strip_comment("  # indented comment"), "");
        assert_eq!(strip_comment("not a comment"), "not a comment");
    }

    #[test]
    fn parse_attr_token_splits_on_colon() {
        assert_eq!(parse_attr_token("word"), ("word", 1.0));
        assert_eq!(parse_attr_token("word:0.5"), ("word", 0.5));
        // a colon that isn't followed by a valid float is part of the name.
        assert_eq!(parse_attr_token("a:b:c"), ("a:b:c", 1.0));
    }
}
