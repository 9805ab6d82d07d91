//! Cacheable-origin predicate.
//!
//! Decides which dynamically fetched resources get persisted after a
//! successful fetch. Precached manifest resources bypass this entirely.

/// Substring and suffix matchers selecting URLs worth persisting.
#[derive(Debug, Clone)]
pub struct PersistRules {
    domains: Vec<String>,
    extensions: Vec<String>,
}

impl PersistRules {
    /// Build rules from domain fragments (matched as substrings of the
    /// full URL) and file extensions (matched as path suffixes).
    pub fn new(domains: Vec<String>, extensions: Vec<String>) -> Self {
        Self { domains, extensions }
    }

    /// Whether a successfully fetched resource at `url` should be written
    /// into the cache namespace.
    pub fn should_persist(&self, url: &str) -> bool {
        if self.domains.iter().any(|fragment| url.contains(fragment.as_str())) {
            return true;
        }

        // Extension match runs against the path only; query strings and
        // fragments would defeat a suffix check.
        let path = url.split(['?', '#']).next().unwrap_or(url);
        self.extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }
}
