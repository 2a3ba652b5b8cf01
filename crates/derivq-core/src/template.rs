//! Path template syntax.
//!
//! A template is literal text interleaved with `[namespace:property]`
//! tokens. The property may itself contain colons (`[date:custom:Y-m]`).
//! A bracket that does not open or close a token is a syntax error.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\s\[\]:]+):([^\[\]]+)\]").expect("Invalid token regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Token { namespace: String, property: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed template at byte {position}: {message}")]
pub struct TemplateSyntaxError {
    pub position: usize,
    pub message: String,
}

/// Split a template into literal and token segments.
pub fn parse_template(template: &str) -> Result<Vec<Segment>, TemplateSyntaxError> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for captures in TOKEN_REGEX.captures_iter(template) {
        let (Some(whole), Some(namespace), Some(property)) =
            (captures.get(0), captures.get(1), captures.get(2))
        else {
            continue;
        };
        push_literal(&mut segments, template, cursor, whole.start())?;
        segments.push(Segment::Token {
            namespace: namespace.as_str().to_string(),
            property: property.as_str().to_string(),
        });
        cursor = whole.end();
    }
    push_literal(&mut segments, template, cursor, template.len())?;

    Ok(segments)
}

fn push_literal(
    segments: &mut Vec<Segment>,
    template: &str,
    start: usize,
    end: usize,
) -> Result<(), TemplateSyntaxError> {
    let literal = &template[start..end];
    if let Some(offset) = literal.find(['[', ']']) {
        return Err(TemplateSyntaxError {
            position: start + offset,
            message: "unbalanced bracket or malformed token".to_string(),
        });
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal.to_string()));
    }
    Ok(())
}

/// Whether `text` still contains something shaped like a token.
pub fn contains_token(text: &str) -> bool {
    TOKEN_REGEX.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(namespace: &str, property: &str) -> Segment {
        Segment::Token {
            namespace: namespace.to_string(),
            property: property.to_string(),
        }
    }

    #[test]
    fn test_parse_default_path() {
        let segments = parse_template("[date:custom:Y]-[date:custom:m]/[node:nid].jpg").unwrap();
        assert_eq!(
            segments,
            vec![
                token("date", "custom:Y"),
                Segment::Literal("-".to_string()),
                token("date", "custom:m"),
                Segment::Literal("/".to_string()),
                token("node", "nid"),
                Segment::Literal(".jpg".to_string()),
            ]
        );
    }

    #[test]
    fn test_plain_path_is_single_literal() {
        assert_eq!(
            parse_template("derivatives/thumb.jpg").unwrap(),
            vec![Segment::Literal("derivatives/thumb.jpg".to_string())]
        );
        assert!(parse_template("").unwrap().is_empty());
    }

    #[test]
    fn test_unbalanced_brackets_rejected() {
        let err = parse_template("[node:nid.jpg").unwrap_err();
        assert_eq!(err.position, 0);
        assert!(parse_template("a]/[node:nid]").is_err());
        assert!(parse_template("[nonamespace]").is_err());
    }

    #[test]
    fn test_contains_token() {
        assert!(contains_token("x/[node:nid]"));
        assert!(!contains_token("2024-05/1.jpg"));
    }
}
