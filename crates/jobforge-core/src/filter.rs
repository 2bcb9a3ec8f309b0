//! Glob filtering of job names.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::{Error, Result};

/// Selects jobs whose names match any of a set of shell-style globs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    set: GlobSet,
}

impl JobFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).map_err(|e| Error::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| Error::InvalidPattern {
            pattern: patterns
                .iter()
                .map(|p| p.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
            message: e.to_string(),
        })?;

        Ok(Self { set })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.set.is_match(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_matching() {
        let filter = JobFilter::new(&["foo-*", "exact"]).unwrap();
        assert!(filter.matches("foo-26"));
        assert!(filter.matches("exact"));
        assert!(!filter.matches("bar-26"));
        assert!(!filter.matches("exactly"));
    }

    #[test]
    fn test_star_crosses_folder_separator() {
        let filter = JobFilter::new(&["folder*"]).unwrap();
        assert!(filter.matches("folder/job"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = JobFilter::new(&["foo[".to_string()]).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }
}
