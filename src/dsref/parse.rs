//! Reference string parsing.
//!
//! Grammar: `username "/" name ["@" path]`. Usernames and names start with an
//! ASCII letter and may contain lower-case letters, digits, `_` and `-`.
//! Upper-case letters are a legacy violation governed by [`BadCasePolicy`].

use std::str::FromStr;

use thiserror::Error;

use super::reference::Ref;

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced while parsing a reference string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The input was the empty string.
    #[error("empty reference")]
    Empty,

    /// A character is not allowed at this position.
    #[error("invalid reference \"{input}\": unexpected character '{character}' at position {position}")]
    UnexpectedChar {
        input: String,
        character: char,
        position: usize,
    },

    /// The overall shape of the reference is wrong.
    #[error("invalid reference \"{input}\": {reason}")]
    Malformed { input: String, reason: String },

    /// The reference uses upper-case characters, which are deprecated.
    #[error(
        "reference \"{input}\" contains upper-case characters; usernames and dataset names must be lower-case"
    )]
    BadCase { input: String },
}

/// Result type for parse operations.
pub type Result<T> = std::result::Result<T, ParseError>;

// =============================================================================
// Bad-case policy
// =============================================================================

/// How to treat references with upper-case characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BadCasePolicy {
    /// Accept the reference and log a warning.
    #[default]
    Warn,
    /// Reject the reference with [`ParseError::BadCase`].
    Error,
}

impl FromStr for BadCasePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warn" | "warning" => Ok(BadCasePolicy::Warn),
            "error" | "strict" => Ok(BadCasePolicy::Error),
            other => Err(format!(
                "unknown bad-case policy '{}': expected 'warn' or 'error'",
                other
            )),
        }
    }
}

// =============================================================================
// Parser
// =============================================================================

/// Reference parser configured with a bad-case policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parser {
    policy: BadCasePolicy,
}

impl Parser {
    /// Create a parser with the given bad-case policy.
    pub fn new(policy: BadCasePolicy) -> Self {
        Self { policy }
    }

    /// The configured bad-case policy.
    pub fn policy(&self) -> BadCasePolicy {
        self.policy
    }

    /// Parse a reference string.
    ///
    /// Under [`BadCasePolicy::Warn`] an upper-case violation is logged and the
    /// reference is returned; under [`BadCasePolicy::Error`] it is rejected.
    pub fn parse(&self, input: &str) -> Result<Ref> {
        let (parsed, bad_case) = parse_ref(input)?;
        if bad_case {
            match self.policy {
                BadCasePolicy::Warn => {
                    tracing::warn!(
                        reference = input,
                        "reference contains upper-case characters; this will be rejected in the future"
                    );
                }
                BadCasePolicy::Error => {
                    return Err(ParseError::BadCase {
                        input: input.to_string(),
                    });
                }
            }
        }
        Ok(parsed)
    }
}

/// Parse a reference string with the default (warn) bad-case policy.
pub fn parse(input: &str) -> Result<Ref> {
    Parser::default().parse(input)
}

impl FromStr for Ref {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

/// Parse into a reference plus a flag recording an upper-case violation.
fn parse_ref(input: &str) -> Result<(Ref, bool)> {
    if input.is_empty() {
        return Err(ParseError::Empty);
    }

    let (alias, path) = match input.split_once('@') {
        Some((alias, path)) => (alias, Some(path)),
        None => (input, None),
    };

    let (username, name) = alias.split_once('/').ok_or_else(|| ParseError::Malformed {
        input: input.to_string(),
        reason: "expected the form username/name".to_string(),
    })?;

    let mut bad_case = check_segment(input, username, 0, "username")?;
    bad_case |= check_segment(input, name, username.chars().count() + 1, "dataset name")?;

    let mut reference = Ref::new(username, name);

    if let Some(path) = path {
        let offset = alias.chars().count() + 1;
        check_path(input, path, offset)?;
        reference.path = path.to_string();
    }

    Ok((reference, bad_case))
}

/// Validate a username or name segment. Returns true on an upper-case violation.
fn check_segment(input: &str, segment: &str, offset: usize, what: &str) -> Result<bool> {
    if segment.is_empty() {
        return Err(ParseError::Malformed {
            input: input.to_string(),
            reason: format!("{} is required", what),
        });
    }

    let mut bad_case = false;
    for (i, c) in segment.chars().enumerate() {
        let allowed = if i == 0 {
            c.is_ascii_alphabetic()
        } else {
            c.is_ascii_alphanumeric() || c == '_' || c == '-'
        };
        if !allowed {
            return Err(ParseError::UnexpectedChar {
                input: input.to_string(),
                character: c,
                position: offset + i,
            });
        }
        if c.is_ascii_uppercase() {
            bad_case = true;
        }
    }
    Ok(bad_case)
}

/// Validate the version path following `@`.
fn check_path(input: &str, path: &str, offset: usize) -> Result<()> {
    let Some(first) = path.chars().next() else {
        return Err(ParseError::Malformed {
            input: input.to_string(),
            reason: "missing version path after '@'".to_string(),
        });
    };
    if first != '/' {
        return Err(ParseError::UnexpectedChar {
            input: input.to_string(),
            character: first,
            position: offset,
        });
    }
    for (i, c) in path.chars().enumerate() {
        if c.is_whitespace() || c == '@' {
            return Err(ParseError::UnexpectedChar {
                input: input.to_string(),
                character: c,
                position: offset + i,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alias() {
        let r = parse("peer/movies").unwrap();
        assert_eq!(r.username, "peer");
        assert_eq!(r.name, "movies");
        assert!(r.path.is_empty());
        assert!(r.init_id.is_empty());
    }

    #[test]
    fn test_parse_with_path() {
        let r = parse("peer/movies@/mem/abc123").unwrap();
        assert_eq!(r.alias(), "peer/movies");
        assert_eq!(r.path, "/mem/abc123");
    }

    #[test]
    fn test_alias_roundtrip() {
        for input in ["peer/movies", "a/b", "user_1/data-set_2", "me/cities"] {
            let r = parse(input).unwrap();
            assert_eq!(r.alias(), input);
        }
        let r = parse("peer/movies@/mem/abc").unwrap();
        assert_eq!(r.human(), "peer/movies@/mem/abc");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse(""), Err(ParseError::Empty));
    }

    #[test]
    fn test_parse_missing_slash() {
        assert!(matches!(parse("movies"), Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn test_parse_missing_name() {
        let err = parse("peer/").unwrap_err();
        assert!(matches!(err, ParseError::Malformed { .. }));
        assert!(err.to_string().contains("dataset name is required"));
    }

    #[test]
    fn test_parse_unexpected_char_position() {
        let err = parse("peer/mov!es").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedChar {
                input: "peer/mov!es".to_string(),
                character: '!',
                position: 8,
            }
        );
        assert!(err.to_string().contains("position 8"));
    }

    #[test]
    fn test_parse_extra_slash() {
        let err = parse("a/b/c").unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnexpectedChar {
                character: '/',
                position: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_leading_digit() {
        assert!(matches!(
            parse("peer/1movies"),
            Err(ParseError::UnexpectedChar { position: 5, .. })
        ));
    }

    #[test]
    fn test_parse_bad_path() {
        assert!(matches!(
            parse("peer/movies@"),
            Err(ParseError::Malformed { .. })
        ));
        assert!(matches!(
            parse("peer/movies@mem/abc"),
            Err(ParseError::UnexpectedChar {
                character: 'm',
                position: 12,
                ..
            })
        ));
    }

    #[test]
    fn test_bad_case_warn_policy() {
        let r = Parser::new(BadCasePolicy::Warn).parse("Peer/Movies").unwrap();
        assert_eq!(r.alias(), "Peer/Movies");
    }

    #[test]
    fn test_bad_case_error_policy() {
        let err = Parser::new(BadCasePolicy::Error)
            .parse("peer/Movies")
            .unwrap_err();
        assert!(matches!(err, ParseError::BadCase { .. }));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("warn".parse::<BadCasePolicy>(), Ok(BadCasePolicy::Warn));
        assert_eq!("ERROR".parse::<BadCasePolicy>(), Ok(BadCasePolicy::Error));
        assert!("maybe".parse::<BadCasePolicy>().is_err());
    }

    #[test]
    fn test_ref_from_str() {
        let r: Ref = "peer/movies".parse().unwrap();
        assert_eq!(r, Ref::new("peer", "movies"));
    }
}
