//! Browser id selection.

use regex::Regex;

use crate::config::ConfigError;

#[derive(Debug)]
enum Matcher {
    Exact(String),
    Pattern(Regex),
}

impl Matcher {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            Some(pattern) if !pattern.is_empty() => Regex::new(pattern)
                .map(Matcher::Pattern)
                .map_err(|source| ConfigError::BrowserPattern {
                    pattern: raw.to_string(),
                    source,
                }),
            _ => Ok(Matcher::Exact(raw.to_string())),
        }
    }

    fn matches(&self, browser_id: &str) -> bool {
        match self {
            Matcher::Exact(id) => id == browser_id,
            Matcher::Pattern(regex) => regex.is_match(browser_id),
        }
    }
}

/// Picks browser ids by exact name or `/regex/`. No matchers selects all.
#[derive(Debug)]
pub struct BrowserFilter {
    matchers: Vec<Matcher>,
}

impl BrowserFilter {
    pub fn new(ids: &[String]) -> Result<Self, ConfigError> {
        let matchers = ids
            .iter()
            .map(|raw| Matcher::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matchers })
    }

    pub fn apply(&self, browser_ids: &[String]) -> Vec<String> {
        if self.matchers.is_empty() {
            return browser_ids.to_vec();
        }
        browser_ids
            .iter()
            .filter(|id| self.matchers.iter().any(|m| m.matches(id)))
            .cloned()
            .collect()
    }
}
