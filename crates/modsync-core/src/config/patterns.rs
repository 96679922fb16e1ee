//! Exclusion glob matching using the ignore crate
//!
//! Patterns use gitignore glob syntax against root-relative paths: `*` stays
//! within one path segment and `**` spans zero or more segments. Every
//! pattern is anchored at the installation root, so `*.dll` matches only
//! top-level files. Every configured line is an exclusion; leading `!` and
//! `#` are taken literally.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::error::{Result, SyncError};
use crate::manifest::normalize_path;

/// Ordered set of exclusion globs applied to relative paths
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    patterns: Vec<String>,
    gitignore: Gitignore,
}

impl ExclusionSet {
    /// An exclusion set that matches nothing
    #[must_use]
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            gitignore: Gitignore::empty(),
        }
    }

    /// Compile exclusion patterns
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidPattern`] if a pattern is empty or not a
    /// valid glob.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GitignoreBuilder::new("");
        builder
            .case_insensitive(true)
            .map_err(|e| SyncError::InvalidPattern {
                pattern: String::new(),
                reason: e.to_string(),
            })?;

        let mut kept = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.trim_start_matches(['/', '\\']).is_empty() {
                return Err(SyncError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: "pattern cannot be empty".to_string(),
                });
            }

            // Every line is anchored at the root, so a bare name never matches
            // at depth and `!`/`#` lose their gitignore meaning.
            let line = format!("/{}", pattern.replace('\\', "/").trim_start_matches('/'));

            builder
                .add_line(None, &line)
                .map_err(|e| SyncError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })?;
            kept.push(pattern.to_string());
        }

        let gitignore = builder.build().map_err(|e| SyncError::InvalidPattern {
            pattern: kept.join(", "),
            reason: e.to_string(),
        })?;

        Ok(Self {
            patterns: kept,
            gitignore,
        })
    }

    /// Patterns in configured order
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether `path` itself matches any exclusion pattern
    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        self.matches(&normalize_path(path), false)
    }

    /// Whether any proper ancestor directory of `path` is excluded
    #[must_use]
    pub fn is_parent_excluded(&self, path: &str) -> bool {
        let path = normalize_path(path);
        path.match_indices('/')
            .any(|(idx, _)| self.matches(&path[..idx], true))
    }

    /// Whether `path` or any of its ancestors is excluded
    #[must_use]
    pub fn is_excluded_in_tree(&self, path: &str) -> bool {
        self.is_excluded(path) || self.is_parent_excluded(path)
    }

    fn matches(&self, rel: &str, is_dir: bool) -> bool {
        !rel.is_empty() && self.gitignore.matched(Path::new(rel), is_dir).is_ignore()
    }
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_modules_set() -> ExclusionSet {
        ExclusionSet::new(&["plugins/**/node_modules", "plugins/**/*.js"]).unwrap()
    }

    #[test]
    fn test_no_patterns() {
        let set = ExclusionSet::empty();
        assert!(!set.is_excluded("any/file.txt"));
        assert!(!set.is_parent_excluded("any/file.txt"));
    }

    #[test]
    fn test_is_excluded() {
        let set = node_modules_set();
        assert!(!set.is_excluded("plugins/test.dll"));
        assert!(set.is_excluded("plugins/banana/node_modules"));
        assert!(set.is_excluded("plugins/banana/test.js"));
        assert!(!set.is_excluded("plugins/banana/config.json"));
    }

    #[test]
    fn test_double_star_matches_zero_segments() {
        let set = node_modules_set();
        assert!(set.is_excluded("plugins/node_modules"));
        assert!(set.is_excluded("plugins/a/b/c/node_modules"));
    }

    #[test]
    fn test_is_parent_excluded() {
        let set = node_modules_set();
        assert!(!set.is_parent_excluded("plugins/test.dll"));
        assert!(set.is_parent_excluded("plugins/banana/node_modules/lodash"));
        assert!(set.is_parent_excluded("plugins/banana/node_modules/lodash/index.ts"));
        assert!(!set.is_excluded("plugins/banana/node_modules/lodash"));
        // the path itself is not a proper ancestor
        assert!(!set.is_parent_excluded("plugins/banana/node_modules"));
    }

    #[test]
    fn test_case_and_separator_insensitive() {
        let set = node_modules_set();
        assert!(set.is_excluded("Plugins\\Banana\\Node_Modules"));
        assert!(set.is_parent_excluded("PLUGINS/banana/NODE_MODULES/lodash"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let set = ExclusionSet::new(&["mods/*/cache"]).unwrap();
        assert!(set.is_excluded("mods/a/cache"));
        assert!(!set.is_excluded("mods/a/b/cache"));
    }

    #[test]
    fn test_literal_bang_and_hash() {
        let set = ExclusionSet::new(&["!important.txt", "#notes.md"]).unwrap();
        assert!(set.is_excluded("!important.txt"));
        assert!(set.is_excluded("#notes.md"));
        assert!(!set.is_excluded("important.txt"));
    }

    #[test]
    fn test_bare_patterns_are_anchored_at_root() {
        let set = ExclusionSet::new(&["*.dll", "node_modules"]).unwrap();
        assert!(set.is_excluded("a.dll"));
        assert!(!set.is_excluded("plugins/a.dll"));
        assert!(set.is_excluded("node_modules"));
        assert!(!set.is_excluded("plugins/x/node_modules"));
        assert!(!set.is_parent_excluded("plugins/x/node_modules/lodash/index.js"));
    }

    #[test]
    fn test_double_star_prefix_matches_any_depth() {
        let set = ExclusionSet::new(&["**/*.log", "/cache"]).unwrap();
        assert!(set.is_excluded("a.log"));
        assert!(set.is_excluded("plugins/x/a.log"));
        assert!(set.is_excluded("cache"));
        assert!(!set.is_excluded("plugins/cache"));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let result = ExclusionSet::new(&["   "]);
        assert!(matches!(result, Err(SyncError::InvalidPattern { .. })));
        let result = ExclusionSet::new(&["/"]);
        assert!(matches!(result, Err(SyncError::InvalidPattern { .. })));
    }
}
