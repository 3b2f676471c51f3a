//! Candidate URL ranking.
//!
//! Locations are classified by the first rule of [`RANKING_RULES`] they
//! match; later rules are never consulted for that location. The ranked list
//! is the concatenation of the rule groups in table order, each group keeping
//! the order in which its locations were encountered.

use crate::publisher::Publisher;
use crate::types::{CandidateLocation, Entry, Observation};

/// Source class assigned to a candidate location
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceRule {
    /// arXiv repository
    Arxiv,
    /// PubMed Central repository
    PubMedCentral,
    /// HAL repository
    Hal,
    /// Any other repository host
    Repository,
    /// Publisher with an integrated API
    PublisherApi,
    /// Everything else
    Other,
}

type Predicate = fn(&CandidateLocation, &str) -> bool;

/// One row of the ranking table; its position is its priority
pub struct RankingRule {
    /// Class assigned on match
    pub source: SourceRule,
    matches: Predicate,
}

/// Source-priority table, most trusted first
pub static RANKING_RULES: [RankingRule; 6] = [
    RankingRule {
        source: SourceRule::Arxiv,
        matches: is_arxiv,
    },
    RankingRule {
        source: SourceRule::PubMedCentral,
        matches: is_pubmed_central,
    },
    RankingRule {
        source: SourceRule::Hal,
        matches: is_hal,
    },
    RankingRule {
        source: SourceRule::Repository,
        matches: is_repository_host,
    },
    RankingRule {
        source: SourceRule::PublisherApi,
        matches: is_publisher_api,
    },
    RankingRule {
        source: SourceRule::Other,
        matches: any_location,
    },
];

fn is_arxiv(loc: &CandidateLocation, _url: &str) -> bool {
    repository_is(loc, "arxiv")
}

fn is_pubmed_central(loc: &CandidateLocation, _url: &str) -> bool {
    repository_is(loc, "pubmed central")
}

fn is_hal(loc: &CandidateLocation, _url: &str) -> bool {
    repository_is(loc, "hal")
}

fn is_repository_host(loc: &CandidateLocation, _url: &str) -> bool {
    loc.host_type
        .as_deref()
        .is_some_and(|h| h.eq_ignore_ascii_case("repository"))
}

fn is_publisher_api(_loc: &CandidateLocation, url: &str) -> bool {
    Publisher::from_url(url).is_some()
}

fn any_location(_loc: &CandidateLocation, _url: &str) -> bool {
    true
}

fn repository_is(loc: &CandidateLocation, name: &str) -> bool {
    loc.repository_normalized
        .as_deref()
        .is_some_and(|r| r.trim().eq_ignore_ascii_case(name))
}

/// Index into [`RANKING_RULES`] of the first rule matching a location
pub fn classify(location: &CandidateLocation, url: &str) -> usize {
    RANKING_RULES
        .iter()
        .position(|rule| (rule.matches)(location, url))
        .unwrap_or(RANKING_RULES.len() - 1)
}

/// Observation under the greatest snapshot key
pub fn latest_observation(entry: &Entry) -> Option<(&str, &Observation)> {
    entry
        .oa_details
        .iter()
        .next_back()
        .map(|(key, obs)| (key.as_str(), obs))
}

/// Candidate PDF URLs of an observation, most trusted first.
///
/// Locations without a PDF URL are ignored.
pub fn ranked_urls(observation: &Observation) -> Vec<String> {
    let mut groups: Vec<Vec<String>> = vec![Vec::new(); RANKING_RULES.len()];

    for location in &observation.oa_locations {
        let Some(url) = location.url_for_pdf.as_deref().map(str::trim) else {
            continue;
        };
        if url.is_empty() {
            continue;
        }
        groups[classify(location, url)].push(url.to_string());
    }

    groups.into_iter().flatten().collect()
}

/// Direct URL for a closed-access publication whose publisher has an enabled API integration
pub fn closed_access_url(entry: &Entry, enabled: &[Publisher]) -> Option<String> {
    let publisher = Publisher::from_normalized_name(entry.publisher_normalized.as_deref()?)?;
    enabled
        .contains(&publisher)
        .then(|| publisher.direct_url(&entry.doi))
}
