mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::{Harness, Profile, config, harness, harness_with_config};
use pairup_engine::EngineConfig;
use pairup_engine::candidates::CandidateSearch;
use pairup_types::models::{GroupId, Intent};

fn requester_profile() -> Profile {
    Profile {
        intent: Intent::Mixed,
        ..Profile::default()
    }
}

fn far_profile(intent: Intent) -> Profile {
    Profile {
        intent,
        neighborhood: "Brooklyn",
        vibe: "loud",
        size: 10,
        ..Profile::default()
    }
}

fn ids(search: &CandidateSearch) -> Vec<GroupId> {
    search.candidates.iter().map(|c| c.group.id).collect()
}

async fn others(h: &Harness, n: usize) -> Vec<GroupId> {
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        out.push(h.default_group(&format!("g{}", i)).await.id);
    }
    out
}

#[tokio::test]
async fn scores_below_thirty_are_cut() {
    let h = harness();
    let me = h.group("me", requester_profile()).await;
    let same = h.group("same", requester_profile()).await;
    let edge = h.group("edge", far_profile(Intent::Any)).await;
    let low = h.group("low", far_profile(Intent::AllA)).await;

    let found = h.engine.candidates(me.id, me.creator).await.unwrap();

    assert!(!found.partial);
    assert_eq!(ids(&found), vec![same.id, edge.id]);
    let scores: Vec<u8> = found.candidates.iter().map(|c| c.score).collect();
    assert_eq!(scores, vec![90, 30]);
    assert!(found.candidates.iter().all(|c| c.group.id != low.id));
}

#[tokio::test]
async fn ranked_by_score_then_ascending_id() {
    let h = harness();
    let me = h.group("me", requester_profile()).await;
    let edge = h.group("edge", far_profile(Intent::Any)).await;
    let tie_one = h.default_group("tie one").await;
    let best = h.group("best", requester_profile()).await;
    let tie_two = h.default_group("tie two").await;

    let found = h.engine.candidates(me.id, me.creator).await.unwrap();

    let (first_tie, second_tie) = if tie_one.id < tie_two.id {
        (tie_one.id, tie_two.id)
    } else {
        (tie_two.id, tie_one.id)
    };
    assert_eq!(ids(&found), vec![best.id, first_tie, second_tie, edge.id]);
    let scores: Vec<u8> = found.candidates.iter().map(|c| c.score).collect();
    assert_eq!(scores, vec![90, 80, 80, 30]);
}

#[tokio::test]
async fn list_is_capped_at_ten_lowest_ids_among_equals() {
    let h = harness();
    assert_eq!(config().max_candidates, 10);
    let me = h.default_group("me").await;
    let mut eligible = others(&h, 12).await;
    eligible.sort();

    let found = h.engine.candidates(me.id, me.creator).await.unwrap();

    assert_eq!(found.candidates.len(), 10);
    assert_eq!(ids(&found), eligible[..10].to_vec());
}

#[tokio::test]
async fn scan_limit_bounds_each_search_and_rotates_across_searches() {
    let h = harness_with_config(EngineConfig {
        scan_limit: 3,
        ..config()
    });
    let me = h.default_group("me").await;
    let eligible: HashSet<GroupId> = others(&h, 8).await.into_iter().collect();

    let mut seen = HashSet::new();
    for _ in 0..3 {
        let found = h.engine.candidates(me.id, me.creator).await.unwrap();
        assert_eq!(found.candidates.len(), 3);
        seen.extend(ids(&found));
        h.engine.cache().invalidate(&[me.id]).await;
    }

    assert_eq!(seen, eligible);
}

#[tokio::test]
async fn slow_scan_returns_an_empty_partial_result() {
    let h = harness_with_config(EngineConfig {
        search_timeout: Duration::from_millis(1),
        ..config()
    });
    let me = h.default_group("me").await;
    let other = h.default_group("other").await;
    h.store.inject_delay("list_available_groups", Duration::from_millis(50));

    let found = h.engine.candidates(me.id, me.creator).await.unwrap();

    assert!(found.partial);
    assert!(found.candidates.is_empty());
    assert!(!h.engine.cache().contains(me.id).await);

    h.store.inject_delay("list_available_groups", Duration::ZERO);
    let found = h.engine.candidates(me.id, me.creator).await.unwrap();
    assert!(!found.partial);
    assert_eq!(ids(&found), vec![other.id]);
}
