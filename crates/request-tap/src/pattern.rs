//! URL patterns used to select tracked requests.
//!
//! Globs follow the usual browser-automation convention: `**` matches any run of
//! characters, `*` matches any run except `/`, everything else is literal.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::TapError;

#[derive(Clone, Debug)]
pub enum UrlPattern {
    /// Glob pattern, kept alongside its compiled form.
    Glob { raw: String, compiled: Regex },
    /// Raw regular expression, unanchored.
    Regex(Regex),
    /// Plain substring match.
    Contains(String),
}

impl UrlPattern {
    pub fn glob(raw: impl Into<String>) -> Result<Self, TapError> {
        let raw = raw.into();
        let compiled = Regex::new(&glob_to_regex(&raw))
            .map_err(|err| TapError::InvalidPattern(format!("{raw}: {err}")))?;
        Ok(Self::Glob { raw, compiled })
    }

    pub fn regex(raw: &str) -> Result<Self, TapError> {
        Regex::new(raw)
            .map(Self::Regex)
            .map_err(|err| TapError::InvalidPattern(format!("{raw}: {err}")))
    }

    pub fn contains(fragment: impl Into<String>) -> Self {
        Self::Contains(fragment.into())
    }

    /// Parses the textual form used in configuration files:
    /// `re:<regex>`, `contains:<text>`, anything else is a glob.
    pub fn parse(raw: &str) -> Result<Self, TapError> {
        if let Some(rest) = raw.strip_prefix("re:") {
            Self::regex(rest)
        } else if let Some(rest) = raw.strip_prefix("contains:") {
            Ok(Self::contains(rest))
        } else {
            Self::glob(raw)
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlPattern::Glob { compiled, .. } => compiled.is_match(url),
            UrlPattern::Regex(regex) => regex.is_match(url),
            UrlPattern::Contains(fragment) => url.contains(fragment.as_str()),
        }
    }

    /// Pattern handed to the browser's request interception (`Fetch.enable`), which only
    /// understands `*` wildcards.
    pub fn interception_glob(&self) -> String {
        match self {
            UrlPattern::Glob { raw, .. } => raw.replace("**", "*"),
            UrlPattern::Regex(_) => "*".to_string(),
            UrlPattern::Contains(fragment) => format!("*{fragment}*"),
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::Glob { raw, .. } => f.write_str(raw),
            UrlPattern::Regex(regex) => write!(f, "re:{}", regex.as_str()),
            UrlPattern::Contains(fragment) => write!(f, "contains:{fragment}"),
        }
    }
}

impl Serialize for UrlPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for UrlPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        UrlPattern::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    let mut chars = glob.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                out.push_str(".*");
            } else {
                out.push_str("[^/]*");
            }
        } else {
            out.push_str(&regex::escape(&ch.to_string()));
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_star_spans_path_segments() {
        let pattern = UrlPattern::glob("**/api/datasets*").unwrap();
        assert!(pattern.matches("https://maps.example.org/api/datasets"));
        assert!(pattern.matches("https://maps.example.org/api/datasets?lang=en"));
        assert!(!pattern.matches("https://maps.example.org/api/datasets/assets"));
    }

    #[test]
    fn single_star_stays_within_segment() {
        let pattern = UrlPattern::glob("https://tiles.example.org/*/tile.pbf").unwrap();
        assert!(pattern.matches("https://tiles.example.org/12/tile.pbf"));
        assert!(!pattern.matches("https://tiles.example.org/12/34/tile.pbf"));
    }

    #[test]
    fn dots_are_literal() {
        let pattern = UrlPattern::glob("**/a.json").unwrap();
        assert!(pattern.matches("https://x/a.json"));
        assert!(!pattern.matches("https://x/abjson"));
    }

    #[test]
    fn parse_recognises_prefixes() {
        assert!(matches!(UrlPattern::parse("re:tiles/\\d+").unwrap(), UrlPattern::Regex(_)));
        assert!(matches!(
            UrlPattern::parse("contains:/arcgis/").unwrap(),
            UrlPattern::Contains(_)
        ));
        assert!(matches!(UrlPattern::parse("**/x").unwrap(), UrlPattern::Glob { .. }));
        assert!(UrlPattern::parse("re:(").is_err());
    }

    #[test]
    fn serde_uses_textual_form() {
        let pattern: UrlPattern = serde_json::from_str("\"contains:/query\"").unwrap();
        assert!(pattern.matches("https://x/query?f=json"));
        assert_eq!(serde_json::to_string(&pattern).unwrap(), "\"contains:/query\"");
    }

    #[test]
    fn interception_glob_flattens_double_star() {
        let pattern = UrlPattern::glob("**/api/datasets*").unwrap();
        assert_eq!(pattern.interception_glob(), "*/api/datasets*");
    }
}
