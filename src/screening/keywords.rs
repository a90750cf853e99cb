//! Keyword screener: matches application text against the required-keyword list.
//!
//! Matching is case-insensitive. Inside a keyword, any run of whitespace,
//! `-` or `_` matches any run of those separators (or none), so `Mid-level`
//! also finds "mid level" and "midlevel". Alphanumeric ends are anchored
//! on word boundaries, so `Java` does not fire on "JavaScript".

use regex::Regex;

use crate::error::ScreeningError;
use crate::screening::candidate::ScreeningResult;

/// A compiled keyword.
#[derive(Debug, Clone)]
struct KeywordPattern {
    keyword: String,
    regex: Regex,
}

/// Screens text against a fixed keyword list.
#[derive(Debug, Clone)]
pub struct KeywordScreener {
    patterns: Vec<KeywordPattern>,
    required_matches: usize,
}

impl KeywordScreener {
    /// Build a screener. `minimum_matches == 0` means every keyword is required.
    pub fn new<S: AsRef<str>>(
        keywords: &[S],
        minimum_matches: usize,
    ) -> Result<Self, ScreeningError> {
        let mut seen = std::collections::HashSet::new();
        let mut patterns = Vec::new();

        for raw in keywords {
            let keyword = raw.as_ref().trim();
            if keyword.is_empty() || !seen.insert(keyword.to_lowercase()) {
                continue;
            }
            let regex = Regex::new(&keyword_pattern(keyword)).map_err(|source| {
                ScreeningError::InvalidPattern {
                    keyword: keyword.to_string(),
                    source,
                }
            })?;
            patterns.push(KeywordPattern {
                keyword: keyword.to_string(),
                regex,
            });
        }

        if patterns.is_empty() {
            return Err(ScreeningError::NoKeywords);
        }
        if minimum_matches > patterns.len() {
            return Err(ScreeningError::MinimumTooHigh {
                minimum: minimum_matches,
                available: patterns.len(),
            });
        }

        let required_matches = if minimum_matches == 0 {
            patterns.len()
        } else {
            minimum_matches
        };

        Ok(Self {
            patterns,
            required_matches,
        })
    }

    pub fn keywords(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.keyword.as_str()).collect()
    }

    pub fn required_matches(&self) -> usize {
        self.required_matches
    }

    /// Screen `text`. Deterministic for a given keyword list and text.
    pub fn screen(&self, text: &str) -> ScreeningResult {
        let (matched, missing): (Vec<_>, Vec<_>) =
            self.patterns.iter().partition(|p| p.regex.is_match(text));

        let matched: Vec<String> = matched.into_iter().map(|p| p.keyword.clone()).collect();
        let missing: Vec<String> = missing.into_iter().map(|p| p.keyword.clone()).collect();
        let match_count = matched.len();
        let total_keywords = self.patterns.len();

        ScreeningResult {
            passed: match_count >= self.required_matches,
            score: match_count as f32 / total_keywords as f32,
            matched,
            missing,
            match_count,
            total_keywords,
            required_matches: self.required_matches,
        }
    }
}

/// Regex source for a single keyword.
fn keyword_pattern(keyword: &str) -> String {
    let body = keyword
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|tok| !tok.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"[\s\-_]*");

    let starts_word = keyword.chars().next().is_some_and(char::is_alphanumeric);
    let ends_word = keyword.chars().last().is_some_and(char::is_alphanumeric);

    format!(
        "(?i){}{}{}",
        if starts_word { r"\b" } else { "" },
        body,
        if ends_word { r"\b" } else { "" },
    )
}
