//! Environment variable substitution for setting values.
//!
//! Supports `$NAME` and `${NAME}` syntax. A backslash before `$` produces a
//! literal dollar sign. A `$` not followed by a name is left as-is.

use crate::prune::error::UnboundVariableError;

/// Substitute variables from the process environment.
pub fn substitute(text: &str) -> Result<String, UnboundVariableError> {
    substitute_with(text, |name| std::env::var(name).ok())
}

/// Substitute `$NAME` and `${NAME}` references using `lookup`.
///
/// Returns an error naming the first variable for which `lookup` has no value.
pub fn substitute_with<F>(text: &str, lookup: F) -> Result<String, UnboundVariableError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if text[i + 1..].starts_with('$') => {
                // Escaped dollar, drop the backslash
                result.push('$');
                chars.next();
            }
            '$' => {
                let rest = &text[i + 1..];
                let (name, consumed) = if let Some(braced) = rest.strip_prefix('{') {
                    match braced.find('}') {
                        Some(close) if is_name(&braced[..close]) => {
                            (&braced[..close], close + 2)
                        }
                        _ => ("", 0),
                    }
                } else {
                    let len = rest
                        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                        .unwrap_or(rest.len());
                    (&rest[..len], len)
                };

                if name.is_empty() || name.starts_with(|ch: char| ch.is_ascii_digit()) {
                    result.push('$');
                    continue;
                }

                let value = lookup(name).ok_or_else(|| UnboundVariableError {
                    name: name.to_string(),
                })?;
                result.push_str(&value);
                // `$` itself was consumed by `next()`; skip the reference body
                for _ in 0..rest[..consumed].chars().count() {
                    chars.next();
                }
            }
            _ => result.push(c),
        }
    }

    Ok(result)
}

fn is_name(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
