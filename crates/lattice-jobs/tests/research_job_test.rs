//! Integration tests for the research job: search cap, result ordering, and
//! the AI-actor precondition.

mod support;

use std::sync::{Arc, Mutex};

use lattice_core::cancel::CancelToken;
use lattice_core::inference::{InferenceState, ProposedEntity, WebSearchResult};
use lattice_core::ontology::{Authentication, EntityProperties, VersionedUrl};
use lattice_core::{Error, TokenUsage};
use lattice_inference::MockAiBackend;
use lattice_jobs::jobs::research::{research_entities, ResearchHandler, ResearchParams};
use lattice_jobs::JobRunner;

use support::*;

fn proposal(id: i64) -> ProposedEntity {
    ProposedEntity {
        temporary_id: id,
        entity_type_id: VersionedUrl::new(PERSON_TYPE),
        properties: EntityProperties::new(),
    }
}

fn search_result(n: usize) -> WebSearchResult {
    WebSearchResult {
        url: format!("https://site{n}.example/"),
        title: format!("Result {n}"),
    }
}

fn params() -> ResearchParams {
    ResearchParams {
        authentication: Authentication::new(account(1)),
        web_owner_id: account(1),
        query: "notable mathematicians".to_string(),
        entity_type_ids: vec![VersionedUrl::new(PERSON_TYPE)],
    }
}

fn scripted_backend() -> MockAiBackend {
    MockAiBackend::new()
        .with_search_results((1..=5).map(search_result).collect())
        .with_inference_script("https://site1.example/", vec![proposal(1), proposal(2)])
        .with_inference_script("https://site2.example/", vec![proposal(3)])
        .with_inference_script("https://site3.example/", vec![proposal(4)])
}

#[tokio::test]
async fn test_research_caps_sources_and_flattens_in_order() {
    init_tracing();
    let graph = InMemoryGraph::new()
        .with_ai_assistant(account(9))
        .with_dereferenced(person_dereferenced());
    let backend = scripted_backend();
    let state = Arc::new(Mutex::new(InferenceState::new()));

    let report = research_entities(
        &graph,
        &backend,
        &backend,
        &params(),
        &state,
        &CancelToken::never(),
    )
    .await
    .unwrap();

    // Five results found, three analyzed, proposals in result order.
    let ids: Vec<i64> = report
        .proposed_entities
        .iter()
        .map(|p| p.temporary_id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(report.usage, TokenUsage::new(100, 100));

    assert_eq!(backend.call_count("search"), 1);
    assert_eq!(backend.call_count("page_text"), 3);
    assert_eq!(backend.call_count("infer_entities"), 3);

    // The job-level state mirrors the flattened outcome.
    let state = state.lock().unwrap();
    assert_eq!(state.proposed_entities.len(), 4);
    assert_eq!(state.usage, TokenUsage::new(100, 100));
}

#[tokio::test]
async fn test_research_requires_ai_assistant_account() {
    init_tracing();
    let graph = InMemoryGraph::new().with_dereferenced(person_dereferenced());
    let backend = scripted_backend();
    let state = Arc::new(Mutex::new(InferenceState::new()));

    let result = research_entities(
        &graph,
        &backend,
        &backend,
        &params(),
        &state,
        &CancelToken::never(),
    )
    .await;

    assert!(matches!(result, Err(Error::Precondition(_))));
    // The job fails before any external work happens.
    assert_eq!(backend.call_count("search"), 0);
}

#[tokio::test]
async fn test_research_job_through_runner() {
    init_tracing();
    let graph = Arc::new(
        InMemoryGraph::new()
            .with_ai_assistant(account(9))
            .with_dereferenced(person_dereferenced()),
    );
    let backend = scripted_backend();

    let runner = JobRunner::builder()
        .with_handler(ResearchHandler::new(
            graph,
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
        ))
        .build();

    let handle = runner
        .start_job("research_entities", serde_json::to_value(params()).unwrap())
        .unwrap();
    let result = handle.wait().await.unwrap();

    assert_eq!(result["proposed_entities"].as_array().unwrap().len(), 4);
    assert_eq!(result["usage"]["total_tokens"], 100);
}
