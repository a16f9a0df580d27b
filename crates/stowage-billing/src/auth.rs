// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook token extraction and comparison.

use subtle::ConstantTimeEq;

/// Pick the token a webhook supplied.
///
/// A non-empty `Authorization` header wins over the body field. A `Bearer `
/// prefix is accepted and stripped in either place.
pub fn supplied_token<'a>(header: Option<&'a str>, body: Option<&'a str>) -> Option<&'a str> {
    let token = |value: Option<&'a str>| value.map(strip_bearer).filter(|t| !t.is_empty());
    token(header).or_else(|| token(body))
}

fn strip_bearer(value: &str) -> &str {
    let value = value.trim();
    match (value.get(..6), value.get(6..)) {
        (Some(scheme), Some(rest))
            if scheme.eq_ignore_ascii_case("bearer")
                && (rest.is_empty() || rest.starts_with(char::is_whitespace)) =>
        {
            rest.trim_start()
        }
        _ => value,
    }
}

/// Compare tokens without leaking the position of the first mismatch.
pub fn token_matches(expected: &str, supplied: &str) -> bool {
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_wins_over_body() {
        assert_eq!(supplied_token(Some("Bearer h"), Some("b")), Some("h"));
        assert_eq!(supplied_token(None, Some("b")), Some("b"));
        assert_eq!(supplied_token(None, None), None);
    }

    #[test]
    fn bearer_prefix_is_optional_and_case_insensitive() {
        assert_eq!(supplied_token(Some("secret"), None), Some("secret"));
        assert_eq!(supplied_token(Some("bearer secret"), None), Some("secret"));
        assert_eq!(supplied_token(Some("BEARER  secret"), None), Some("secret"));
    }

    #[test]
    fn empty_tokens_are_absent() {
        assert_eq!(supplied_token(Some("Bearer "), None), None);
        assert_eq!(supplied_token(Some("   "), None), None);
        assert_eq!(supplied_token(Some("Bearer "), Some("   ")), None);
    }

    #[test]
    fn empty_header_falls_back_to_body() {
        assert_eq!(supplied_token(Some("Bearer "), Some("b")), Some("b"));
        assert_eq!(supplied_token(Some(""), Some("Bearer b")), Some("b"));
    }

    #[test]
    fn comparison() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cret", "s3cres"));
        assert!(!token_matches("s3cret", "s3cret-longer"));
        assert!(!token_matches("s3cret", ""));
    }
}
