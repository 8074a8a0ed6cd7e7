//! Reversible substitution for the characters `$ ? & #`, which resource tags
//! do not accept.
//!
//! Inputs must not already contain one of the `_X_` replacement tokens, or
//! unescaping cannot tell them apart from escaped characters.

const SUBSTITUTIONS: [(char, &str); 4] = [('$', "_D_"), ('?', "_Q_"), ('&', "_A_"), ('#', "_H_")];

pub fn escape_tag_chars(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match SUBSTITUTIONS.iter().find(|(special, _)| *special == c) {
            Some((_, token)) => escaped.push_str(token),
            None => escaped.push(c),
        }
    }
    escaped
}

/// Single left-to-right pass, so a character that follows an escape token is
/// never read as the start of another token.
pub fn unescape_tag_chars(input: &str) -> String {
    let mut unescaped = String::with_capacity(input.len());
    let mut rest = input;
    while !rest.is_empty() {
        let token = SUBSTITUTIONS
            .iter()
            .find(|(_, token)| rest.starts_with(token));
        match token {
            Some((special, token)) => {
                unescaped.push(*special);
                rest = &rest[token.len()..];
            }
            None => {
                let mut chars = rest.chars();
                if let Some(c) = chars.next() {
                    unescaped.push(c);
                }
                rest = chars.as_str();
            }
        }
    }
    unescaped
}
