//! Makefile-style dependency file parsing.
//!
//! Compilers emit dependency information as make rules
//! (`target: dep dep …`), with backslash line continuations, escaped
//! spaces in paths, and optionally phony targets for each header
//! (`-MP`). The parser recovers the dependency paths in first-occurrence
//! order.

use std::collections::HashSet;

/// Parses depfile text into a deduplicated, order-preserving list of
/// dependency paths.
///
/// Targets (tokens ending in `:`, or tokens followed by a lone `:`) are
/// skipped, so `-MP`-style phony rules contribute nothing new.
pub fn parse_depfile(text: &str) -> Vec<String> {
    let merged = text.replace("\\\r\n", " ").replace("\\\n", " ");

    let mut seen = HashSet::new();
    let mut deps = Vec::new();
    for token in split_tokens(&merged) {
        if token == ":" {
            // Separate-colon form: the previous token was the target.
            if let Some(last) = deps.pop() {
                seen.remove(&last);
            }
            continue;
        }
        if let Some(stripped) = token.strip_suffix(':') {
            // Attached-colon form, including phony `header.h:` rules.
            // A Windows drive spec (`C:`) is not a target marker.
            if stripped.len() != 1 {
                continue;
            }
        }
        if seen.insert(token.clone()) {
            deps.push(token);
        }
    }
    deps
}

/// Splits a merged rule body on whitespace, honoring `\ ` escapes for
/// spaces inside paths and `$$` for a literal dollar sign.
fn split_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&' ') => {
                chars.next();
                current.push(' ');
            }
            '$' if chars.peek() == Some(&'$') => {
                chars.next();
                current.push('$');
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
