mod common;

use common::{Profile, config, harness};
use pairup_engine::scoring;
use pairup_engine::{Conflict, Direction, EngineError, MatchStore};
use pairup_types::models::{
    DecisionKind, Intent, Invitation, InvitationStatus, MatchOrigin, UserId, VoteChoice,
};

#[tokio::test]
async fn happy_path_mutual_like_creates_one_match_and_clears_queues() {
    let h = harness();
    let x = h.default_group("X").await;
    let y = h
        .group(
            "Y",
            Profile {
                intent: Intent::Mixed,
                vibe: "chill drinks",
                ..Profile::default()
            },
        )
        .await;
    let z = h.default_group("Z").await;

    let score = scoring::score(&h.fetch(x.id).await, &h.fetch(y.id).await);
    assert!(score >= 70, "expected a strong match, got {}", score);

    let found = h.engine.candidates(x.id, x.creator).await.unwrap();
    assert!(found.candidates.iter().any(|c| c.group.id == y.id));

    // Pending invitations on both sides that must vanish once X and Y match.
    h.engine.create_invitation(z.id, z.creator, x.id).await.unwrap();
    h.engine.create_invitation(y.id, y.creator, z.id).await.unwrap();

    let first = h.engine.record_decision(x.id, x.creator, y.id, DecisionKind::Yes).await.unwrap();
    assert!(!first.mutual);
    assert!(first.matched.is_none());

    let second = h.engine.record_decision(y.id, y.creator, x.id, DecisionKind::Yes).await.unwrap();
    assert!(second.mutual);
    let m = second.matched.expect("mutual like creates a match");
    assert!(m.pairs(x.id, y.id));
    assert_eq!(m.origin, MatchOrigin::MutualLike);

    assert!(h.fetch(x.id).await.has_active_match);
    assert!(h.fetch(y.id).await.has_active_match);

    for group in [x.id, y.id, z.id] {
        for direction in [Direction::Incoming, Direction::Outgoing] {
            let pending = h.store.list_pending_invitations(group, direction).await.unwrap();
            assert!(pending.is_empty(), "{} still has {:?} invitations", group, direction);
        }
    }

    let current = h.engine.current_match(x.id, x.creator).await.unwrap();
    assert_eq!(current.map(|c| c.id), Some(m.id));
}

#[tokio::test]
async fn exclusive_intents_never_see_each_other() {
    let h = harness();
    let x = h
        .group("X", Profile { intent: Intent::AllA, ..Profile::default() })
        .await;
    let y = h
        .group("Y", Profile { intent: Intent::AllB, ..Profile::default() })
        .await;

    assert_eq!(scoring::score(&h.fetch(x.id).await, &h.fetch(y.id).await), 0);

    let for_x = h.engine.candidates(x.id, x.creator).await.unwrap();
    let for_y = h.engine.candidates(y.id, y.creator).await.unwrap();
    assert!(for_x.candidates.iter().all(|c| c.group.id != y.id));
    assert!(for_y.candidates.iter().all(|c| c.group.id != x.id));
}

#[tokio::test]
async fn rejected_closed_and_matched_groups_are_not_candidates() {
    let h = harness();
    let a = h.default_group("A").await;
    let rejected = h.default_group("rejected").await;
    let closed = h.default_group("closed").await;
    let taken = h.default_group("taken").await;
    let partner = h.default_group("partner").await;
    let fresh = h.default_group("fresh").await;

    h.engine
        .record_decision(a.id, a.creator, rejected.id, DecisionKind::No)
        .await
        .unwrap();
    h.engine.set_visibility(closed.id, closed.creator, false).await.unwrap();
    h.engine
        .record_decision(taken.id, taken.creator, partner.id, DecisionKind::Yes)
        .await
        .unwrap();
    h.engine
        .record_decision(partner.id, partner.creator, taken.id, DecisionKind::Yes)
        .await
        .unwrap();

    let first = h.engine.candidates(a.id, a.creator).await.unwrap();
    let ids: Vec<_> = first.candidates.iter().map(|c| c.group.id).collect();
    assert_eq!(ids, vec![fresh.id]);

    // Served from cache the second time; same answer.
    assert!(h.engine.cache().contains(a.id).await);
    let second = h.engine.candidates(a.id, a.creator).await.unwrap();
    let again: Vec<_> = second.candidates.iter().map(|c| c.group.id).collect();
    assert_eq!(ids, again);

    // A "no" hides the pair both ways.
    let for_rejected = h.engine.candidates(rejected.id, rejected.creator).await.unwrap();
    assert!(for_rejected.candidates.iter().all(|c| c.group.id != a.id));
}

#[tokio::test]
async fn cached_lists_drop_groups_that_closed_since() {
    let h = harness();
    let a = h.default_group("A").await;
    let b = h.default_group("B").await;
    let c = h.default_group("C").await;

    let before = h.engine.candidates(a.id, a.creator).await.unwrap();
    assert_eq!(before.candidates.len(), 2);

    // Only B's own entry is invalidated; A's cached list must still not show it.
    h.engine.set_visibility(b.id, b.creator, false).await.unwrap();
    assert!(h.engine.cache().contains(a.id).await);

    let after = h.engine.candidates(a.id, a.creator).await.unwrap();
    let ids: Vec<_> = after.candidates.iter().map(|c| c.group.id).collect();
    assert_eq!(ids, vec![c.id]);
}

#[tokio::test]
async fn unavailable_requester_gets_no_candidates() {
    let h = harness();
    let a = h.default_group("A").await;
    h.default_group("B").await;

    h.engine.set_visibility(a.id, a.creator, false).await.unwrap();
    let found = h.engine.candidates(a.id, a.creator).await.unwrap();
    assert!(found.candidates.is_empty());
    assert!(!found.partial);
}

#[tokio::test]
async fn repeated_decision_is_idempotent_and_a_changed_one_conflicts() {
    let h = harness();
    let a = h.default_group("A").await;
    let b = h.default_group("B").await;

    h.engine.record_decision(a.id, a.creator, b.id, DecisionKind::Yes).await.unwrap();
    let again = h.engine.record_decision(a.id, a.creator, b.id, DecisionKind::Yes).await.unwrap();
    assert!(!again.mutual);

    let err = h
        .engine
        .record_decision(a.id, a.creator, b.id, DecisionKind::No)
        .await
        .unwrap_err();
    assert_eq!(err.conflict(), Some(Conflict::AlreadyDecided));
}

#[tokio::test]
async fn decisions_validate_their_input() {
    let h = harness();
    let a = h.default_group("A").await;
    let b = h.default_group("B").await;

    let own = h.engine.record_decision(a.id, a.creator, a.id, DecisionKind::Yes).await;
    assert!(matches!(own, Err(EngineError::Validation(_))));

    let reserved = h
        .engine
        .record_decision(a.id, a.creator, b.id, DecisionKind::RejectedByOther)
        .await;
    assert!(matches!(reserved, Err(EngineError::Validation(_))));

    let outsider = h.engine.record_decision(a.id, UserId::new(), b.id, DecisionKind::Yes).await;
    assert!(matches!(outsider, Err(EngineError::Forbidden(_))));
}

#[tokio::test]
async fn only_the_decider_answers_single_decider_invitations() {
    let h = harness();
    let a = h.default_group("A").await;
    let b = h.default_group("B").await;
    let members = h.add_members(b.id, 2).await;

    let invitation = h.engine.create_invitation(a.id, a.creator, b.id).await.unwrap();
    assert!(invitation.tally.is_none());

    let err = h
        .engine
        .respond_invitation(invitation.id, members[0], VoteChoice::Accept)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let outcome = h
        .engine
        .respond_invitation(invitation.id, b.creator, VoteChoice::Accept)
        .await
        .unwrap();
    assert_eq!(outcome.invitation.status, InvitationStatus::Accepted);
    let m = outcome.matched.expect("accept creates a match");
    assert_eq!(m.origin, MatchOrigin::Invitation);

    // Single-decider invitations are kept as a record.
    let stored = h.store.get_invitation(invitation.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvitationStatus::Accepted);

    let late = h
        .engine
        .respond_invitation(invitation.id, b.creator, VoteChoice::Reject)
        .await
        .unwrap_err();
    assert_eq!(late.conflict(), Some(Conflict::InvitationResolved));
}

#[tokio::test]
async fn accept_without_a_match_goes_back_to_pending() {
    let h = harness();
    let a = h.default_group("A").await;
    let b = h.default_group("B").await;
    let invitation = h.engine.create_invitation(a.id, a.creator, b.id).await.unwrap();

    h.store.inject_failures("create_match_if_free", config().retry.max_attempts);
    let err = h
        .engine
        .respond_invitation(invitation.id, b.creator, VoteChoice::Accept)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));

    let stored = h.store.get_invitation(invitation.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvitationStatus::Pending);
    assert!(stored.responded_at.is_none());
    assert_eq!(h.live_matches(a.id).await, 0);
    let incoming = h
        .engine
        .list_invitations(b.id, b.creator, Direction::Incoming)
        .await
        .unwrap();
    assert_eq!(incoming.len(), 1);

    let outcome = h
        .engine
        .respond_invitation(invitation.id, b.creator, VoteChoice::Accept)
        .await
        .unwrap();
    assert_eq!(outcome.invitation.status, InvitationStatus::Accepted);
    assert!(outcome.matched.is_some());
    assert_eq!(h.live_matches(b.id).await, 1);
}

#[tokio::test]
async fn rejecting_leaves_other_invitations_alone() {
    let h = harness();
    let a = h.default_group("A").await;
    let b = h.default_group("B").await;
    let c = h.default_group("C").await;

    let ab = h.engine.create_invitation(a.id, a.creator, b.id).await.unwrap();
    let cb = h.engine.create_invitation(c.id, c.creator, b.id).await.unwrap();

    let outcome = h
        .engine
        .respond_invitation(ab.id, b.creator, VoteChoice::Reject)
        .await
        .unwrap();
    assert_eq!(outcome.invitation.status, InvitationStatus::Rejected);
    assert!(outcome.matched.is_none());

    let incoming = h.engine.list_invitations(b.id, b.creator, Direction::Incoming).await.unwrap();
    assert_eq!(incoming.iter().map(|i| i.id).collect::<Vec<_>>(), vec![cb.id]);
}

#[tokio::test]
async fn duplicate_invitations_are_refused_in_both_directions() {
    let h = harness();
    let a = h.default_group("A").await;
    let b = h.default_group("B").await;

    h.engine.create_invitation(a.id, a.creator, b.id).await.unwrap();

    let same = h.engine.create_invitation(a.id, a.creator, b.id).await.unwrap_err();
    assert_eq!(same.conflict(), Some(Conflict::InvitationExists));
    let reverse = h.engine.create_invitation(b.id, b.creator, a.id).await.unwrap_err();
    assert_eq!(reverse.conflict(), Some(Conflict::InvitationExists));

    let own = h.engine.create_invitation(a.id, a.creator, a.id).await;
    assert!(matches!(own, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn invited_groups_leave_the_senders_candidates() {
    let h = harness();
    let a = h.default_group("A").await;
    let b = h.default_group("B").await;

    let before = h.engine.candidates(a.id, a.creator).await.unwrap();
    assert_eq!(before.candidates.len(), 1);

    h.engine.create_invitation(a.id, a.creator, b.id).await.unwrap();
    assert!(!h.engine.cache().contains(a.id).await);

    let after = h.engine.candidates(a.id, a.creator).await.unwrap();
    assert!(after.candidates.is_empty());
}

#[tokio::test]
async fn stale_accept_is_refused_once_a_group_is_matched() {
    let h = harness();
    let a = h.default_group("A").await;
    let b = h.default_group("B").await;
    let c = h.default_group("C").await;

    h.engine.record_decision(b.id, b.creator, c.id, DecisionKind::Yes).await.unwrap();
    h.engine.record_decision(c.id, c.creator, b.id, DecisionKind::Yes).await.unwrap();

    // Written behind the engine's back, as if it slipped in just before the match.
    let stale = Invitation::new(a.id, b.id, h.fetch(b.id).await.governance);
    h.store.create_invitation(&stale).await.unwrap();

    let err = h
        .engine
        .respond_invitation(stale.id, b.creator, VoteChoice::Accept)
        .await
        .unwrap_err();
    assert_eq!(err.conflict(), Some(Conflict::AlreadyMatched));
    assert!(err.conflict().is_some_and(|c| c.refresh()));
    assert_eq!(h.live_matches(a.id).await, 0);
}

#[tokio::test]
async fn matched_groups_cannot_invite_or_be_invited() {
    let h = harness();
    let a = h.default_group("A").await;
    let b = h.default_group("B").await;
    let c = h.default_group("C").await;

    h.engine.record_decision(a.id, a.creator, b.id, DecisionKind::Yes).await.unwrap();
    h.engine.record_decision(b.id, b.creator, a.id, DecisionKind::Yes).await.unwrap();

    let to_matched = h.engine.create_invitation(c.id, c.creator, a.id).await.unwrap_err();
    assert_eq!(to_matched.conflict(), Some(Conflict::AlreadyMatched));
    let from_matched = h.engine.create_invitation(a.id, a.creator, c.id).await.unwrap_err();
    assert_eq!(from_matched.conflict(), Some(Conflict::AlreadyMatched));
}
