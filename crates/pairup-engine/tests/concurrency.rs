mod common;

use futures_util::future::join_all;

use common::harness;
use pairup_engine::{Conflict, EngineError, MatchStore};
use pairup_types::models::{DecisionKind, InvitationStatus, VoteChoice};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_mutual_likes_create_exactly_one_match() {
    for _ in 0..20 {
        let h = harness();
        let a = h.default_group("A").await;
        let b = h.default_group("B").await;

        let first = {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.record_decision(a.id, a.creator, b.id, DecisionKind::Yes).await })
        };
        let second = {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.record_decision(b.id, b.creator, a.id, DecisionKind::Yes).await })
        };

        let results = join_all([first, second]).await;
        let mut match_ids = Vec::new();
        for result in results {
            let outcome = result.expect("task panicked").expect("like succeeds");
            if let Some(m) = outcome.matched {
                match_ids.push(m.id);
            }
        }

        // At least one side saw the other's like; everyone who did reports the same match.
        assert!(!match_ids.is_empty());
        match_ids.dedup();
        assert_eq!(match_ids.len(), 1);

        let live = h.store.find_match_for_group(a.id).await.unwrap().unwrap();
        assert_eq!(live.id, match_ids[0]);
        assert!(live.pairs(a.id, b.id));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_suitors_racing_for_one_group_yield_one_match() {
    let h = harness();
    let target = h.default_group("target").await;

    let mut suitors = Vec::new();
    for i in 0..10 {
        let suitor = h.default_group(&format!("suitor {}", i)).await;
        h.engine
            .record_decision(target.id, target.creator, suitor.id, DecisionKind::Yes)
            .await
            .unwrap();
        suitors.push(suitor);
    }

    let tasks = suitors.iter().map(|s| {
        let engine = h.engine.clone();
        let (id, creator, to) = (s.id, s.creator, target.id);
        tokio::spawn(async move { engine.record_decision(id, creator, to, DecisionKind::Yes).await })
    });

    let mut created = 0;
    for result in join_all(tasks).await {
        match result.expect("task panicked") {
            Ok(outcome) if outcome.matched.is_some() => created += 1,
            Ok(_) => {}
            Err(e) => assert_eq!(e.conflict(), Some(Conflict::AlreadyMatched), "unexpected error {}", e),
        }
    }
    assert_eq!(created, 1);

    let mut matched_suitors = 0;
    for s in &suitors {
        if h.fetch(s.id).await.has_active_match {
            matched_suitors += 1;
        }
    }
    assert_eq!(matched_suitors, 1);
    assert!(h.fetch(target.id).await.has_active_match);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_final_votes_finalize_once() {
    for _ in 0..10 {
        let h = harness();
        let a = h.default_group("A").await;
        let b = h.consensus_group("B").await;
        let mut voters = vec![b.creator];
        voters.extend(h.add_members(b.id, 4).await);

        let invitation = h.engine.create_invitation(a.id, a.creator, b.id).await.unwrap();

        let tasks = voters.iter().map(|voter| {
            let engine = h.engine.clone();
            let (id, voter) = (invitation.id, *voter);
            tokio::spawn(async move { engine.cast_vote(id, voter, VoteChoice::Accept).await })
        });

        let mut finalized = 0;
        for result in join_all(tasks).await {
            match result.expect("task panicked") {
                Ok(outcome) if outcome.invitation.status == InvitationStatus::Accepted => {
                    assert!(outcome.matched.is_some());
                    finalized += 1;
                }
                Ok(outcome) => assert_eq!(outcome.invitation.status, InvitationStatus::Pending),
                // Resolved consensus invitations are deleted, so a late ballot can miss it entirely.
                Err(EngineError::NotFound(_)) => {}
                Err(e) => assert!(
                    matches!(
                        e.conflict(),
                        Some(Conflict::InvitationResolved | Conflict::AlreadyMatched)
                    ),
                    "unexpected error {}",
                    e
                ),
            }
        }

        assert_eq!(finalized, 1);
        assert_eq!(h.live_matches(b.id).await, 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invitation_accept_racing_a_mutual_like_still_matches_once() {
    for _ in 0..10 {
        let h = harness();
        let a = h.default_group("A").await;
        let b = h.default_group("B").await;

        let invitation = h.engine.create_invitation(a.id, a.creator, b.id).await.unwrap();
        h.engine.record_decision(a.id, a.creator, b.id, DecisionKind::Yes).await.unwrap();

        let accept = {
            let engine = h.engine.clone();
            let (id, user) = (invitation.id, b.creator);
            tokio::spawn(async move { engine.respond_invitation(id, user, VoteChoice::Accept).await.map(|o| o.matched) })
        };
        let like = {
            let engine = h.engine.clone();
            tokio::spawn(async move {
                engine
                    .record_decision(b.id, b.creator, a.id, DecisionKind::Yes)
                    .await
                    .map(|o| o.matched)
            })
        };

        let mut seen = Vec::new();
        for result in join_all([accept, like]).await {
            match result.expect("task panicked") {
                Ok(Some(m)) => seen.push(m.id),
                Ok(None) => {}
                Err(EngineError::Conflict(_)) | Err(EngineError::NotFound(_)) => {}
                Err(e) => panic!("unexpected error {}", e),
            }
        }

        let live = h.store.find_match_for_group(a.id).await.unwrap().expect("one path matched");
        assert!(live.pairs(a.id, b.id));
        assert!(seen.iter().all(|id| *id == live.id));
    }
}
