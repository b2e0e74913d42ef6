use std::str::FromStr;

use regex::Regex;

/// A single entry in a secured- or checked-path list.
///
/// Either an exact path, or a regex evaluated against the full request path. Regexes are not
/// implicitly anchored; write `^...$` if that is what you mean.
#[derive(Debug, Clone)]
pub enum PathMatcher {
    Exact(String),
    Pattern(Regex),
}

impl PathMatcher {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathMatcher::Exact(p) => p == path,
            PathMatcher::Pattern(re) => re.is_match(path),
        }
    }

    pub fn matches_any(matchers: &[PathMatcher], path: &str) -> bool {
        matchers.iter().any(|m| m.matches(path))
    }
}

/// Textual form used in configuration: a `re:` prefix marks a regex, anything else is an exact
/// path.
impl FromStr for PathMatcher {
    type Err = regex::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("re:") {
            Some(pattern) => Regex::new(pattern).map(PathMatcher::Pattern),
            None => Ok(PathMatcher::Exact(s.to_string())),
        }
    }
}
