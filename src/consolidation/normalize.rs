//! Title normalization.
//!
//! `normalize` is the single source of truth for "are two titles the same
//! entity". It only removes superficial differences (case, bracket style,
//! incidental whitespace) and never strips words.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WHITESPACE_RUN: Regex =
        Regex::new(r"\s+").expect("Failed to compile whitespace pattern");
}

/// Map a raw title to its canonical comparison key.
///
/// - lower-cased
/// - `[`/`{` become `(`, `]`/`}` become `)`
/// - whitespace runs collapse to one space, ends trimmed
/// - exactly one space before `(` (unless it starts the key or follows another
///   `(`), no space after `(`, no space before `)`
///
/// An empty or all-whitespace title yields `""`.
pub fn normalize(title: &str) -> String {
    let unified: String = title
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '[' | '{' => '(',
            ']' | '}' => ')',
            c => c,
        })
        .collect();
    let collapsed = WHITESPACE_RUN.replace_all(unified.trim(), " ");

    let mut key = String::with_capacity(collapsed.len() + 4);
    let mut chars = collapsed.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ' ' => {
                // '(' re-inserts its own leading space below.
                let after_open = key.ends_with('(');
                let before_paren = matches!(chars.peek(), Some('(') | Some(')'));
                if !after_open && !before_paren {
                    key.push(' ');
                }
            }
            '(' => {
                if !key.is_empty() && !key.ends_with(' ') && !key.ends_with('(') {
                    key.push(' ');
                }
                key.push('(');
            }
            c => key.push(c),
        }
    }
    key
}
