use crate::types::{CandidateLocation, HarvestId, HarvestRecord, Resource};


fn record(id: HarvestId, doi: &str, valid: bool) -> HarvestRecord {
    HarvestRecord {
        id,
        doi: doi.to_string(),
        domain: Some("medical".to_string()),
        chosen_locations: vec![CandidateLocation {
            url_for_pdf: Some("https://example.org/a.pdf".to_string()),
            repository_normalized: None,
            host_type: Some("publisher".to_string()),
            is_best: true,
        }],
        harvester_used: valid.then(|| "standard".to_string()),
        url_used: Some("https://example.org/a.pdf".to_string()),
        valid_fulltext_pdf: valid,
        resources: if valid {
            vec![Resource {
                kind: "pdf".to_string(),
                path: "ab/cd/ef/gh/abcdefgh".to_string(),
                sha256: "00".repeat(32),
                size_bytes: 1024,
            }]
        } else {
            vec![]
        },
        harvested_date: chrono::Utc::now(),
    }
}
