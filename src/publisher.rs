//! Publishers with an integrated text-and-data-mining API.
//!
//! Each integration is described by data: the host names that identify its
//! URLs, the publisher name used in the metadata dump, the deterministic
//! direct URL used for closed-access publications and the API endpoint.

use serde::{Deserialize, Serialize};

/// A publisher whose full texts can be fetched through an authenticated API
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Publisher {
    /// Wiley TDM API
    Wiley,
    /// Elsevier article retrieval API
    Elsevier,
}

impl Publisher {
    /// All known integrations, in lookup order
    pub const ALL: [Publisher; 2] = [Publisher::Wiley, Publisher::Elsevier];

    /// Short name, used as `harvester_used`
    pub fn name(&self) -> &'static str {
        match self {
            Publisher::Wiley => "wiley",
            Publisher::Elsevier => "elsevier",
        }
    }

    /// Host suffixes identifying this publisher's URLs
    fn host_suffixes(&self) -> &'static [&'static str] {
        match self {
            Publisher::Wiley => &["wiley.com"],
            Publisher::Elsevier => &["elsevier.com", "sciencedirect.com"],
        }
    }

    /// Default API base; the DOI is appended URL-encoded
    pub fn api_base(&self) -> &'static str {
        match self {
            Publisher::Wiley => "https://api.wiley.com/onlinelibrary/tdm/v1/articles/",
            Publisher::Elsevier => "https://api.elsevier.com/content/article/doi/",
        }
    }

    /// Header carrying the API token
    pub fn token_header(&self) -> &'static str {
        match self {
            Publisher::Wiley => "Wiley-TDM-Client-Token",
            Publisher::Elsevier => "X-ELS-APIKey",
        }
    }

    /// Direct URL synthesized for a closed-access publication
    pub fn direct_url(&self, doi: &str) -> String {
        match self {
            Publisher::Wiley => format!("https://onlinelibrary.wiley.com/doi/pdfdirect/{}", doi),
            Publisher::Elsevier => format!("https://api.elsevier.com/content/article/doi/{}", doi),
        }
    }

    /// Match a URL's host against the known integrations.
    pub fn from_url(raw: &str) -> Option<Publisher> {
        let host = url::Url::parse(raw).ok()?.host_str()?.to_ascii_lowercase();
        Self::ALL.into_iter().find(|p| {
            p.host_suffixes()
                .iter()
                .any(|suffix| host == *suffix || host.ends_with(&format!(".{}", suffix)))
        })
    }

    /// Match a `publisher_normalized` value from the metadata dump.
    pub fn from_normalized_name(name: &str) -> Option<Publisher> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|p| name == p.name())
    }
}

impl std::fmt::Display for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
