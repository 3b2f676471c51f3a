use super::test_helpers::{
    FakePublisherApi, create_test_harvester, drain, record_line, test_config, write_dump,
};
use super::*;
use crate::error::Error;
use crate::publisher::Publisher;
use crate::resolver::{Resolution, ResolvedEntry};
use crate::storage::BlobStore;
use crate::types::{Entry, ResultCode};
use std::collections::HashSet;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};


/// Resolve one entry through the harvester's own resolver and store.
async fn resolve(harvester: &mut Harvester, line: &str) -> ResolvedEntry {
    let entry: Entry = serde_json::from_str(line).unwrap();
    match harvester
        .resolver
        .resolve(&mut harvester.store, entry, false, &HashSet::new())
        .await
        .unwrap()
    {
        Resolution::Resolved(resolved) => resolved,
        Resolution::Skip(reason) => panic!("entry unexpectedly skipped: {reason:?}"),
    }
}

async fn pdf_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.5 full text".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    server
}
