//! Response-file (`@file`) expansion.

use crate::error::ArgsError;
use crate::list::ArgList;

/// Splits response-file text into tokens.
///
/// Tokens are separated by unquoted whitespace. Double quotes group a
/// token and allow `\"` and `\\` escapes inside; single quotes group a
/// token literally; an unquoted backslash escapes the following
/// character. This matches what the GCC/Clang family accepts in its
/// `@file` arguments. Returns `None` when a quote never closes.
pub fn tokenize(text: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut has_token = false;
    let mut chars = text.chars();

    #[derive(PartialEq)]
    enum State {
        Plain,
        Double,
        Single,
    }
    let mut state = State::Plain;

    while let Some(c) = chars.next() {
        match state {
            State::Plain => match c {
                c if c.is_whitespace() => {
                    if has_token {
                        tokens.push(std::mem::take(&mut current));
                        has_token = false;
                    }
                }
                '"' => {
                    state = State::Double;
                    has_token = true;
                }
                '\'' => {
                    state = State::Single;
                    has_token = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                        has_token = true;
                    }
                }
                c => {
                    current.push(c);
                    has_token = true;
                }
            },
            State::Double => match c {
                '"' => state = State::Plain,
                '\\' => match chars.next() {
                    Some(next @ ('"' | '\\')) => current.push(next),
                    Some(next) => {
                        current.push('\\');
                        current.push(next);
                    }
                    None => return None,
                },
                c => current.push(c),
            },
            State::Single => match c {
                '\'' => state = State::Plain,
                c => current.push(c),
            },
        }
    }

    if state != State::Plain {
        return None;
    }
    if has_token {
        tokens.push(current);
    }
    Some(tokens)
}

/// Expands every `@file` token in place, recursively.
///
/// Expansion replaces the token with the tokenized contents of the named
/// file; tokens produced by expansion are themselves expanded. A file
/// that includes itself (directly or through a chain) or cannot be read
/// is an error, making the invocation non-cacheable.
pub fn expand_response_files(args: &ArgList) -> Result<ArgList, ArgsError> {
    let mut out = ArgList::new();
    let mut active = Vec::new();
    expand_into(args, &mut out, &mut active)?;
    Ok(out)
}

fn expand_into(
    args: &ArgList,
    out: &mut ArgList,
    active: &mut Vec<String>,
) -> Result<(), ArgsError> {
    for token in args {
        match token.strip_prefix('@') {
            Some(file_name) => expand_file(file_name, out, active)?,
            None => out.push(token.clone()),
        }
    }
    Ok(())
}

fn expand_file(
    file_name: &str,
    out: &mut ArgList,
    active: &mut Vec<String>,
) -> Result<(), ArgsError> {
    let canonical = opal_util::canonicalize_path(file_name);
    if active.contains(&canonical) {
        return Err(ArgsError::ResponseCycle {
            path: file_name.to_string(),
        });
    }

    let text = std::fs::read_to_string(file_name).map_err(|e| ArgsError::Io {
        path: file_name.to_string(),
        source: e,
    })?;
    let tokens = tokenize(&text).ok_or_else(|| ArgsError::UnterminatedQuote {
        path: file_name.to_string(),
    })?;

    active.push(canonical);
    let result = expand_into(&ArgList::from(tokens), out, active);
    active.pop();
    result
}
