//! Admission filters: domain restriction plus include/exclude glob sets,
//! grounded on the pack's `globset`-based crawl scoping
//! (`linggen-linggen`'s ingestion path filters).

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use url::Url;

use crate::error::{CodeDoxError, Result};

#[derive(Clone)]
pub struct AdmissionFilter {
    domain_filter: Option<String>,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl AdmissionFilter {
    pub fn new(domain_filter: Option<String>, include_patterns: &[String], exclude_patterns: &[String]) -> Result<Self> {
        let include = build_glob_set(include_patterns)?;
        let exclude = build_glob_set(exclude_patterns)?;
        Ok(Self {
            domain_filter,
            include,
            exclude,
        })
    }

    /// `true` if the URL should be crawled: passes the domain restriction
    /// (hostname exact match or suffix match of the configured filter),
    /// matches at least one include pattern if any are configured, and
    /// matches none of the exclude patterns.
    pub fn admits(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };

        if let Some(domain) = &self.domain_filter {
            let Some(host) = parsed.host_str() else {
                return false;
            };
            if !(host == domain || host.ends_with(&format!(".{domain}"))) {
                return false;
            }
        }

        if let Some(exclude) = &self.exclude {
            if exclude.is_match(url) {
                return false;
            }
        }

        if let Some(include) = &self.include {
            if !include.is_match(url) {
                return false;
            }
        }

        true
    }
}

fn build_glob_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        // Matching is case-insensitive per the glob-pattern boundary rule.
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| CodeDoxError::Validation(format!("invalid glob pattern '{pattern}': {e}")))?;
        builder.add(glob);
    }
    Ok(Some(builder.build().map_err(|e| {
        CodeDoxError::Validation(format!("failed to build glob set: {e}"))
    })?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_filter_allows_exact_and_subdomain() {
        let filter = AdmissionFilter::new(Some("example.com".to_string()), &[], &[]).unwrap();
        assert!(filter.admits("https://example.com/docs"));
        assert!(filter.admits("https://docs.example.com/x"));
        assert!(!filter.admits("https://evil-example.com/x"));
    }

    #[test]
    fn include_pattern_restricts_scope() {
        let filter = AdmissionFilter::new(None, &["https://example.com/docs/**".to_string()], &[]).unwrap();
        assert!(filter.admits("https://example.com/docs/guide"));
        assert!(!filter.admits("https://example.com/blog/post"));
    }

    #[test]
    fn pattern_matching_is_case_insensitive() {
        let filter = AdmissionFilter::new(None, &["*DOCS*".to_string()], &[]).unwrap();
        assert!(filter.admits("https://example.com/guide/docs/x"));
        assert!(!filter.admits("https://example.com/guide/foo"));
    }

    #[test]
    fn empty_pattern_list_disables_filtering() {
        let filter = AdmissionFilter::new(None, &[], &[]).unwrap();
        assert!(filter.admits("https://example.com/anything"));
    }

    #[test]
    fn exclude_pattern_rejects_even_if_included() {
        let filter = AdmissionFilter::new(
            None,
            &["https://example.com/docs/**".to_string()],
            &["**/changelog/**".to_string()],
        )
        .unwrap();
        assert!(!filter.admits("https://example.com/docs/changelog/v1"));
    }
}
