//! Fan-out/fan-in behavior of the candidate generator.

mod common;

use std::sync::{Arc, Mutex};

use promode::candidates::{CandidateOutcome, generate_candidates};
use promode::progress::{ProgressEvent, TracingObserver};

use common::{Reply, ScriptedClient, Step, candidate_request, fail, text, text_after};

#[tokio::test]
async fn returns_exactly_n_outcomes_sorted_by_index() {
    for n in [1usize, 2, 5, 9] {
        let client = Arc::new(ScriptedClient::uniform(n, 1, "unused"));
        let outcomes =
            generate_candidates(client.clone(), &candidate_request("q"), n, 3, &TracingObserver)
                .await;

        assert_eq!(outcomes.len(), n);
        let indices: Vec<usize> = outcomes.iter().map(CandidateOutcome::index).collect();
        assert_eq!(indices, (0..n).collect::<Vec<_>>());
        assert_eq!(client.candidate_calls(), n);
    }
}

#[tokio::test]
async fn sorted_even_when_later_candidates_finish_first() {
    // Candidate 2 finishes first, candidate 0 last.
    let client = Arc::new(ScriptedClient::new(
        vec![text_after("zero", 80), text_after("one", 40), text_after("two", 0)],
        text("unused"),
    ));

    let finished = Arc::new(Mutex::new(Vec::new()));
    let sink = finished.clone();
    let observer = move |event: &ProgressEvent| {
        if let ProgressEvent::CandidateFinished { index, .. } = event {
            sink.lock().unwrap().push(*index);
        }
    };

    let outcomes = generate_candidates(client, &candidate_request("q"), 3, 3, &observer).await;

    assert_eq!(*finished.lock().unwrap(), vec![2, 1, 0]);
    let texts: Vec<&str> = outcomes
        .iter()
        .map(|o| o.result().unwrap().text.as_str())
        .collect();
    assert_eq!(texts, vec!["zero", "one", "two"]);
}

#[tokio::test]
async fn failure_does_not_cancel_siblings() {
    let client = Arc::new(ScriptedClient::new(
        vec![fail(500), text_after("slow but fine", 50), fail(503)],
        text("unused"),
    ));
    let outcomes =
        generate_candidates(client.clone(), &candidate_request("q"), 3, 3, &TracingObserver).await;

    assert!(!outcomes[0].is_success());
    assert_eq!(outcomes[1].result().unwrap().text, "slow but fine");
    assert!(!outcomes[2].is_success());
    assert_eq!(outcomes[2].error(), Some("inference endpoint returned status 503"));
    assert_eq!(client.candidate_calls(), 3);
}

#[tokio::test]
async fn never_exceeds_worker_bound() {
    let client = Arc::new(ScriptedClient::uniform(5, 30, "unused"));
    let outcomes =
        generate_candidates(client.clone(), &candidate_request("q"), 5, 2, &TracingObserver).await;

    assert_eq!(outcomes.len(), 5);
    assert!(outcomes.iter().all(CandidateOutcome::is_success));
    assert!(
        client.max_in_flight() <= 2,
        "saw {} requests in flight",
        client.max_in_flight()
    );
    assert_eq!(client.max_in_flight(), 2);
}

#[tokio::test]
async fn all_requests_submitted_when_pool_is_wide() {
    let client = Arc::new(ScriptedClient::uniform(4, 30, "unused"));
    generate_candidates(client.clone(), &candidate_request("q"), 4, 16, &TracingObserver).await;
    assert_eq!(client.max_in_flight(), 4);
}

#[tokio::test]
async fn single_candidate_uses_same_contract() {
    let client = Arc::new(ScriptedClient::new(vec![text("only")], text("unused")));
    let outcomes =
        generate_candidates(client.clone(), &candidate_request("q"), 1, 16, &TracingObserver).await;

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(&outcomes[0], CandidateOutcome::Success(0, r) if r.text == "only"));
}

#[tokio::test]
async fn blank_completion_counts_as_failure() {
    let client = Arc::new(ScriptedClient::new(vec![text("   \n"), text("real")], text("unused")));
    let outcomes =
        generate_candidates(client, &candidate_request("q"), 2, 2, &TracingObserver).await;

    assert_eq!(outcomes[0], CandidateOutcome::Failure(0, "empty completion".to_string()));
    assert!(outcomes[1].is_success());
}

#[tokio::test]
async fn panicking_request_is_recorded_for_its_index() {
    let client = Arc::new(ScriptedClient::new(
        vec![
            text("a"),
            Step {
                delay: std::time::Duration::ZERO,
                reply: Reply::Panic,
            },
            text("c"),
        ],
        text("unused"),
    ));
    let outcomes =
        generate_candidates(client, &candidate_request("q"), 3, 3, &TracingObserver).await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_success());
    assert_eq!(outcomes[1].index(), 1);
    assert!(outcomes[1].error().unwrap().contains("panicked"));
    assert!(outcomes[2].is_success());
}

#[tokio::test]
async fn reports_one_event_per_candidate() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let observer = move |event: &ProgressEvent| sink.lock().unwrap().push(event.clone());

    let client = Arc::new(ScriptedClient::new(vec![text("a"), fail(500)], text("unused")));
    generate_candidates(client, &candidate_request("q"), 2, 2, &observer).await;

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    let failed = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::CandidateFinished { succeeded: false, .. }))
        .count();
    assert_eq!(failed, 1);
    assert!(events.iter().all(|e| matches!(
        e,
        ProgressEvent::CandidateFinished { total: 2, .. }
    )));
}
