//! Dynamic cache admission rules.

use serde::{Deserialize, Serialize};
use url::Url;

/// Predicate deciding which successful network responses enter the dynamic cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRules {
    /// Absolute URL prefixes, e.g. `https://fonts.gstatic.com/`
    pub url_prefixes: Vec<String>,
    /// Path prefixes, matched on any host
    pub path_prefixes: Vec<String>,
    /// Path segment marking image assets
    pub image_segment: String,
    /// Cross-origin font hosts
    pub font_hosts: Vec<String>,
}

impl AdmissionRules {
    /// Returns true if a response for `url` may be stored dynamically.
    pub fn admits(&self, url: &Url) -> bool {
        let path = url.path();

        self.url_prefixes.iter().any(|p| url.as_str().starts_with(p.as_str()))
            || self.path_prefixes.iter().any(|p| path.starts_with(p.as_str()))
            || (!self.image_segment.is_empty() && path.contains(self.image_segment.as_str()))
            || url
                .host_str()
                .is_some_and(|host| self.font_hosts.iter().any(|h| h == host))
    }
}

impl Default for AdmissionRules {
    fn default() -> Self {
        Self {
            url_prefixes: vec![
                "https://fonts.gstatic.com/".to_string(),
                "https://wa.me/".to_string(),
            ],
            path_prefixes: vec!["/img/sodiacIcons/".to_string()],
            image_segment: "/img/".to_string(),
            font_hosts: vec![
                "fonts.googleapis.com".to_string(),
                "fonts.gstatic.com".to_string(),
            ],
        }
    }
}
