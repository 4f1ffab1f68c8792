//! Like pattern translation
//!
//! A like pattern is tokenized once using the predicate's own wildcard,
//! single-char and escape characters, then rendered as a backend regexp,
//! a backend query string, or a local regex for row-level evaluation.

use regex::Regex;

use super::ast::LikeSyntax;

/// Characters with meaning in the backend's regexp syntax
const REGEXP_RESERVED: &[char] = &[
    '.', '?', '+', '*', '|', '{', '}', '[', ']', '(', ')', '"', '\\', '#', '@', '&', '<', '>', '~',
];

/// Characters with meaning in the backend's query string syntax
const QUERY_STRING_RESERVED: &[char] = &[
    '+', '-', '=', '&', '|', '>', '<', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?',
    ':', '\\', '/',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Wildcard,
    Single,
    Char(char),
}

fn tokenize(pattern: &str, syntax: &LikeSyntax) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == syntax.escape {
            // A trailing escape stands for itself
            tokens.push(Token::Char(chars.next().unwrap_or(c)));
        } else if c == syntax.wildcard {
            tokens.push(Token::Wildcard);
        } else if c == syntax.single_char {
            tokens.push(Token::Single);
        } else {
            tokens.push(Token::Char(c));
        }
    }
    tokens
}

fn render(
    tokens: &[Token],
    wildcard: &str,
    single: &str,
    reserved: &[char],
) -> String {
    let mut out = String::with_capacity(tokens.len() * 2);
    for token in tokens {
        match token {
            Token::Wildcard => out.push_str(wildcard),
            Token::Single => out.push_str(single),
            Token::Char(c) => {
                if reserved.contains(c) {
                    out.push('\\');
                }
                out.push(*c);
            }
        }
    }
    out
}

/// Pattern for a `regexp` clause on a keyword field
pub fn to_regexp(pattern: &str, syntax: &LikeSyntax) -> String {
    render(&tokenize(pattern, syntax), ".*", ".", REGEXP_RESERVED)
}

/// Pattern for a `query_string` clause on an analyzed field
pub fn to_query_string(pattern: &str, syntax: &LikeSyntax) -> String {
    render(&tokenize(pattern, syntax), "*", "?", QUERY_STRING_RESERVED)
}

/// Anchored local regex equivalent to the pattern
pub fn to_regex(pattern: &str, syntax: &LikeSyntax) -> Result<Regex, regex::Error> {
    let mut body = String::from(if syntax.match_case { "(?s)^" } else { "(?si)^" });
    for token in tokenize(pattern, syntax) {
        match token {
            Token::Wildcard => body.push_str(".*"),
            Token::Single => body.push('.'),
            Token::Char(c) => body.push_str(&regex::escape(&c.to_string())),
        }
    }
    body.push('$');
    Regex::new(&body)
}
