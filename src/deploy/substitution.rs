//! Literal token replacement for uploaded files.
//!
//! Works on raw bytes so content that is not valid UTF-8 survives untouched
//! outside the replaced tokens. Tokens without a value are left as they are.

use crate::deploy::exports::SubstitutionMap;

#[derive(Debug, Clone, Default)]
pub struct SubstitutionEngine {
    variables: SubstitutionMap,
}

impl SubstitutionEngine {
    pub fn new(variables: SubstitutionMap) -> Self {
        Self { variables }
    }

    pub fn render(&self, content: &[u8]) -> Vec<u8> {
        render(&self.variables, content)
    }
}

/// Replaces every occurrence of each token with its value.
///
/// Tokens are applied one after another in sorted order.
pub fn render(variables: &SubstitutionMap, content: &[u8]) -> Vec<u8> {
    let mut rendered = content.to_vec();

    for (token, value) in variables {
        if token.is_empty() {
            continue;
        }
        rendered = replace_all(&rendered, token.as_bytes(), value.as_bytes());
    }

    rendered
}

fn replace_all(content: &[u8], token: &[u8], value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    let mut rest = content;

    while let Some(pos) = find(rest, token) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(value);
        rest = &rest[pos + token.len()..];
    }

    out.extend_from_slice(rest);
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
