//! Heartbeat receipt matching strategies.
//!
//! A strategy is a pure, total function over `(candidate, pattern)` deciding
//! whether an inbound payload counts as a heartbeat receipt.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Deserializer};

/// How inbound payloads are matched against the configured receipt pattern.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStrategy {
    /// Candidate equals the pattern
    #[default]
    Exact,
    /// Pattern is a substring of the candidate
    Contains,
    /// Candidate starts with the pattern
    Prefix,
    /// Candidate ends with the pattern
    Suffix,
    /// Candidate matches the configured regular expression;
    /// with no expression configured, matches anything
    Wildcard,
}

impl MatchStrategy {
    /// Check a single candidate payload against the pattern.
    ///
    /// `regex` is consulted only by [`MatchStrategy::Wildcard`].
    #[must_use]
    pub fn matches(self, candidate: &str, pattern: &str, regex: Option<&Regex>) -> bool {
        match self {
            Self::Exact => candidate == pattern,
            Self::Contains => candidate.contains(pattern),
            Self::Prefix => candidate.starts_with(pattern),
            Self::Suffix => candidate.ends_with(pattern),
            Self::Wildcard => regex.is_none_or(|re| re.is_match(candidate)),
        }
    }

    /// Canonical name, as accepted by [`FromStr`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Contains => "contains",
            Self::Prefix => "prefix",
            Self::Suffix => "suffix",
            Self::Wildcard => "wildcard",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStrategy {
    type Err = std::convert::Infallible;

    /// Parse a strategy name. Accepts the canonical names plus the legacy
    /// vocabulary (`absolutely`, `contain`, `startsWith`, `endsWith`,
    /// `match`, including the historical `startsWidth`/`endsWidth`
    /// misspellings). An unrecognized name falls back to exact equality.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "contains" | "contain" => Self::Contains,
            "prefix" | "startsWith" | "startsWidth" => Self::Prefix,
            "suffix" | "endsWith" | "endsWidth" => Self::Suffix,
            "wildcard" | "regex" | "match" => Self::Wildcard,
            _ => Self::Exact,
        })
    }
}

impl<'de> Deserialize<'de> for MatchStrategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        match name.parse::<Self>() {
            Ok(strategy) => Ok(strategy),
            Err(never) => match never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_requires_equality() {
        assert!(MatchStrategy::Exact.matches("pong", "pong", None));
        assert!(!MatchStrategy::Exact.matches("pong!", "pong", None));
        assert!(!MatchStrategy::Exact.matches("PONG", "pong", None));
    }

    #[test]
    fn contains_accepts_substring() {
        assert!(MatchStrategy::Contains.matches("a pong b", "pong", None));
        assert!(!MatchStrategy::Contains.matches("pon g", "pong", None));
    }

    #[test]
    fn prefix_and_suffix() {
        assert!(MatchStrategy::Prefix.matches("pong:123", "pong", None));
        assert!(!MatchStrategy::Prefix.matches("123:pong", "pong", None));
        assert!(MatchStrategy::Suffix.matches("123:pong", "pong", None));
        assert!(!MatchStrategy::Suffix.matches("pong:123", "pong", None));
    }

    #[test]
    fn wildcard_uses_regex_when_present() {
        let re = Regex::new(r"^pong-\d+$").expect("valid regex");
        assert!(MatchStrategy::Wildcard.matches("pong-42", "ignored", Some(&re)));
        assert!(!MatchStrategy::Wildcard.matches("ping-42", "ignored", Some(&re)));
    }

    #[test]
    fn wildcard_without_regex_matches_anything() {
        assert!(MatchStrategy::Wildcard.matches("whatever", "ignored", None));
        assert!(MatchStrategy::Wildcard.matches("", "ignored", None));
    }

    #[test]
    fn parse_accepts_legacy_names() {
        assert_eq!(
            "absolutely".parse::<MatchStrategy>().expect("infallible"),
            MatchStrategy::Exact
        );
        assert_eq!(
            "contain".parse::<MatchStrategy>().expect("infallible"),
            MatchStrategy::Contains
        );
        assert_eq!(
            "startsWidth".parse::<MatchStrategy>().expect("infallible"),
            MatchStrategy::Prefix
        );
        assert_eq!(
            "endsWidth".parse::<MatchStrategy>().expect("infallible"),
            MatchStrategy::Suffix
        );
        assert_eq!(
            "match".parse::<MatchStrategy>().expect("infallible"),
            MatchStrategy::Wildcard
        );
    }

    #[test]
    fn unrecognized_name_falls_back_to_exact() {
        assert_eq!(
            "definitely-not-a-strategy"
                .parse::<MatchStrategy>()
                .expect("infallible"),
            MatchStrategy::Exact
        );
    }

    #[test]
    fn deserialize_from_json_string() {
        let strategy: MatchStrategy = serde_json::from_str(r#""suffix""#).expect("valid json");
        assert_eq!(strategy, MatchStrategy::Suffix);

        let fallback: MatchStrategy = serde_json::from_str(r#""nonsense""#).expect("valid json");
        assert_eq!(fallback, MatchStrategy::Exact);
    }
}
