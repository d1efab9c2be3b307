use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, Transaction, params, params_from_iter};

use pairup_engine::store::{Direction, Resolution};
use pairup_types::models::{
    ChatMessage, Decision, Group, GroupId, Invitation, InvitationId, Like, Match, MatchId, Member, UserId,
    VenueSuggestion, Vote, VoteTally,
};

use crate::Database;
use crate::models::{
    DecisionRow, GROUP_COLUMNS, GroupRow, INVITATION_COLUMNS, InvitationRow, MATCH_COLUMNS, MEMBER_COLUMNS,
    MatchRow, MemberRow, MessageRow, VoteRow, ts,
};

/// How a guarded write ended. Anything but `Done` means nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Done,
    /// A row with the same identity already exists.
    Exists,
    /// A precondition on existing state failed.
    Conflict,
    /// A referenced row does not exist.
    Missing,
}

impl Database {
    // -- Groups --

    pub fn create_group(&self, group: &Group, creator: &Member) -> Result<WriteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if group_exists(&tx, group.id)? {
                return Ok(WriteOutcome::Exists);
            }
            tx.execute(
                "INSERT INTO groups (id, name, size, neighborhood, vibe, intent, governance, decider_id,
                                     open_to_match, has_active_match, created_at, retired_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    group.id.to_string(),
                    group.name,
                    group.size,
                    group.neighborhood,
                    group.vibe,
                    group.intent.as_str(),
                    group.governance.as_str(),
                    group.decider_id.to_string(),
                    group.open_to_match,
                    group.has_active_match,
                    ts(&group.created_at),
                    group.retired_at.as_ref().map(ts),
                ],
            )?;
            insert_member(&tx, creator)?;
            tx.commit()?;
            Ok(WriteOutcome::Done)
        })
    }

    pub fn get_group(&self, id: GroupId) -> Result<Option<Group>> {
        self.with_conn(|conn| query_group(conn, id))
    }

    pub fn get_groups(&self, ids: &[GroupId]) -> Result<Vec<Group>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM groups g WHERE g.id IN ({})",
                GROUP_COLUMNS,
                placeholders(1, ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(ids.iter().map(|id| id.to_string())), GroupRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(GroupRow::into_model).collect()
        })
    }

    /// Exclusions are subqueries; the statement binds three parameters
    /// regardless of how much history the requester has.
    pub fn list_available_groups(&self, requester: GroupId, start_after: GroupId, limit: usize) -> Result<Vec<Group>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM groups g
                 WHERE g.open_to_match = 1 AND g.has_active_match = 0 AND g.retired_at IS NULL
                   AND g.id != ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM decisions d WHERE d.group_id = ?1 AND d.target_id = g.id
                   )
                   AND NOT EXISTS (
                       SELECT 1 FROM invitations i
                       WHERE i.from_group = ?1 AND i.to_group = g.id AND i.status = 'pending'
                   )
                 ORDER BY g.id <= ?2, g.id
                 LIMIT ?3",
                GROUP_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![requester.to_string(), start_after.to_string(), limit as i64],
                    GroupRow::from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(GroupRow::into_model).collect()
        })
    }

    /// Returns false if the group does not exist.
    pub fn set_open_to_match(&self, id: GroupId, open: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE groups SET open_to_match = ?2 WHERE id = ?1",
                params![id.to_string(), open],
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_decider(&self, id: GroupId, decider: UserId) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE groups SET decider_id = ?2 WHERE id = ?1",
                params![id.to_string(), decider.to_string()],
            )?;
            Ok(n > 0)
        })
    }

    pub fn retire_group(&self, id: GroupId, at: DateTime<Utc>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE groups SET retired_at = ?2, open_to_match = 0 WHERE id = ?1",
                params![id.to_string(), ts(&at)],
            )?;
            Ok(n > 0)
        })
    }

    // -- Members --

    pub fn member_count(&self, group: GroupId) -> Result<u32> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM members WHERE group_id = ?1",
                [group.to_string()],
                |r| r.get(0),
            )?;
            Ok(n)
        })
    }

    /// Oldest member first.
    pub fn members(&self, group: GroupId) -> Result<Vec<Member>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM members WHERE group_id = ?1 ORDER BY joined_at, rowid",
                MEMBER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([group.to_string()], MemberRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(MemberRow::into_model).collect()
        })
    }

    pub fn member(&self, group: GroupId, user: UserId) -> Result<Option<Member>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM members WHERE group_id = ?1 AND user_id = ?2", MEMBER_COLUMNS);
            let row = conn
                .query_row(&sql, [group.to_string(), user.to_string()], MemberRow::from_row)
                .optional()?;
            row.map(MemberRow::into_model).transpose()
        })
    }

    pub fn add_member(&self, member: &Member) -> Result<WriteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !group_exists(&tx, member.group_id)? {
                return Ok(WriteOutcome::Missing);
            }
            let already: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM members WHERE group_id = ?1 AND user_id = ?2",
                    [member.group_id.to_string(), member.user_id.to_string()],
                    |r| r.get(0),
                )
                .optional()?;
            if already.is_some() {
                return Ok(WriteOutcome::Exists);
            }
            insert_member(&tx, member)?;
            tx.commit()?;
            Ok(WriteOutcome::Done)
        })
    }

    /// Remaining member count, or `None` if the user was not a member.
    pub fn remove_member(&self, group: GroupId, user: UserId) -> Result<Option<u32>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let n = tx.execute(
                "DELETE FROM members WHERE group_id = ?1 AND user_id = ?2",
                [group.to_string(), user.to_string()],
            )?;
            if n == 0 {
                return Ok(None);
            }
            let remaining: u32 = tx.query_row(
                "SELECT COUNT(*) FROM members WHERE group_id = ?1",
                [group.to_string()],
                |r| r.get(0),
            )?;
            tx.commit()?;
            Ok(Some(remaining))
        })
    }

    // -- Decisions --

    /// Insert unless a decision for the ordered pair exists; returns the stored one.
    pub fn put_decision(&self, decision: &Decision) -> Result<Decision> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO decisions (group_id, target_id, kind, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    decision.group_id.to_string(),
                    decision.target_id.to_string(),
                    decision.kind.as_str(),
                    ts(&decision.created_at),
                ],
            )?;
            let row = tx.query_row(
                "SELECT group_id, target_id, kind, created_at FROM decisions WHERE group_id = ?1 AND target_id = ?2",
                [decision.group_id.to_string(), decision.target_id.to_string()],
                |r| {
                    Ok(DecisionRow {
                        group_id: r.get(0)?,
                        target_id: r.get(1)?,
                        kind: r.get(2)?,
                        created_at: r.get(3)?,
                    })
                },
            )?;
            tx.commit()?;
            row.into_model()
        })
    }

    pub fn decided_targets(&self, group: GroupId) -> Result<Vec<GroupId>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT target_id FROM decisions WHERE group_id = ?1")?;
            let ids = stmt
                .query_map([group.to_string()], |r| r.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            ids.into_iter()
                .map(|id| id.parse::<GroupId>().map_err(Into::into))
                .collect()
        })
    }

    pub fn clear_decisions_between(&self, a: GroupId, b: GroupId) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "DELETE FROM decisions
                 WHERE (group_id = ?1 AND target_id = ?2) OR (group_id = ?2 AND target_id = ?1)",
                [a.to_string(), b.to_string()],
            )?)
        })
    }

    // -- Likes --

    pub fn put_like(&self, like: &Like) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO likes (from_group, to_group, created_at) VALUES (?1, ?2, ?3)",
                params![like.from_group.to_string(), like.to_group.to_string(), ts(&like.created_at)],
            )?;
            Ok(())
        })
    }

    pub fn has_like(&self, from: GroupId, to: GroupId) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM likes WHERE from_group = ?1 AND to_group = ?2",
                    [from.to_string(), to.to_string()],
                    |r| r.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn clear_likes_between(&self, a: GroupId, b: GroupId) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "DELETE FROM likes
                 WHERE (from_group = ?1 AND to_group = ?2) OR (from_group = ?2 AND to_group = ?1)",
                [a.to_string(), b.to_string()],
            )?)
        })
    }

    // -- Invitations --

    /// `Exists` when a pending invitation links the pair in either direction.
    pub fn create_invitation(&self, invitation: &Invitation) -> Result<WriteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let pending: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM invitations
                     WHERE status = 'pending'
                       AND ((from_group = ?1 AND to_group = ?2) OR (from_group = ?2 AND to_group = ?1))
                     LIMIT 1",
                    [invitation.from_group.to_string(), invitation.to_group.to_string()],
                    |r| r.get(0),
                )
                .optional()?;
            if pending.is_some() {
                return Ok(WriteOutcome::Exists);
            }

            let tally = invitation.tally;
            tx.execute(
                "INSERT INTO invitations (id, from_group, to_group, status, created_at, responded_at,
                                          total_votes, accept_votes, reject_votes, vote_complete)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    invitation.id.to_string(),
                    invitation.from_group.to_string(),
                    invitation.to_group.to_string(),
                    invitation.status.as_str(),
                    ts(&invitation.created_at),
                    invitation.responded_at.as_ref().map(ts),
                    tally.map(|t| t.total_votes),
                    tally.map(|t| t.accept_votes),
                    tally.map(|t| t.reject_votes),
                    tally.map(|t| t.vote_complete),
                ],
            )?;
            tx.commit()?;
            Ok(WriteOutcome::Done)
        })
    }

    pub fn get_invitation(&self, id: InvitationId) -> Result<Option<Invitation>> {
        self.with_conn(|conn| query_invitation(conn, id))
    }

    pub fn list_pending_invitations(&self, group: GroupId, direction: Direction) -> Result<Vec<Invitation>> {
        let column = match direction {
            Direction::Incoming => "to_group",
            Direction::Outgoing => "from_group",
        };

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM invitations WHERE {} = ?1 AND status = 'pending' ORDER BY created_at",
                INVITATION_COLUMNS, column
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([group.to_string()], InvitationRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(InvitationRow::into_model).collect()
        })
    }

    /// `Conflict` once the invitation left `pending`, `Missing` if it is gone.
    pub fn update_tally(&self, id: InvitationId, tally: VoteTally) -> Result<WriteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let n = tx.execute(
                "UPDATE invitations
                 SET total_votes = ?2, accept_votes = ?3, reject_votes = ?4, vote_complete = ?5
                 WHERE id = ?1 AND status = 'pending'",
                params![
                    id.to_string(),
                    tally.total_votes,
                    tally.accept_votes,
                    tally.reject_votes,
                    tally.vote_complete,
                ],
            )?;
            let outcome = if n > 0 {
                WriteOutcome::Done
            } else if invitation_status(&tx, id)?.is_some() {
                WriteOutcome::Conflict
            } else {
                WriteOutcome::Missing
            };
            tx.commit()?;
            Ok(outcome)
        })
    }

    /// Compare-and-set out of `pending`. True only for the winning caller.
    pub fn resolve_invitation(&self, id: InvitationId, resolution: &Resolution) -> Result<bool> {
        let tally = resolution.tally;
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE invitations
                 SET status = ?2, responded_at = ?3,
                     total_votes = COALESCE(?4, total_votes),
                     accept_votes = COALESCE(?5, accept_votes),
                     reject_votes = COALESCE(?6, reject_votes),
                     vote_complete = COALESCE(?7, vote_complete)
                 WHERE id = ?1 AND status = 'pending'",
                params![
                    id.to_string(),
                    resolution.status.as_str(),
                    ts(&resolution.responded_at),
                    tally.map(|t| t.total_votes),
                    tally.map(|t| t.accept_votes),
                    tally.map(|t| t.reject_votes),
                    tally.map(|t| t.vote_complete),
                ],
            )?;
            Ok(n == 1)
        })
    }

    pub fn reopen_invitation(&self, id: InvitationId) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE invitations SET status = 'pending', responded_at = NULL
                 WHERE id = ?1 AND status = 'accepted'",
                [id.to_string()],
            )?;
            Ok(n == 1)
        })
    }

    /// Votes go with it through the foreign key cascade.
    pub fn delete_invitation(&self, id: InvitationId) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM invitations WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }

    pub fn purge_pending_invitations(&self, group: GroupId) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "DELETE FROM invitations WHERE status = 'pending' AND (from_group = ?1 OR to_group = ?1)",
                [group.to_string()],
            )?)
        })
    }

    pub fn purge_pending_between(&self, a: GroupId, b: GroupId) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "DELETE FROM invitations
                 WHERE status = 'pending'
                   AND ((from_group = ?1 AND to_group = ?2) OR (from_group = ?2 AND to_group = ?1))",
                [a.to_string(), b.to_string()],
            )?)
        })
    }

    // -- Votes --

    pub fn insert_vote(&self, vote: &Vote) -> Result<WriteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            match invitation_status(&tx, vote.invitation_id)?.as_deref() {
                None => return Ok(WriteOutcome::Missing),
                Some("pending") => {}
                Some(_) => return Ok(WriteOutcome::Conflict),
            }

            let n = tx.execute(
                "INSERT OR IGNORE INTO votes (invitation_id, voter_id, voter_name, choice, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    vote.invitation_id.to_string(),
                    vote.voter_id.to_string(),
                    vote.voter_name,
                    vote.choice.as_str(),
                    ts(&vote.created_at),
                ],
            )?;
            if n == 0 {
                return Ok(WriteOutcome::Exists);
            }
            tx.commit()?;
            Ok(WriteOutcome::Done)
        })
    }

    pub fn list_votes(&self, invitation: InvitationId) -> Result<Vec<Vote>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT invitation_id, voter_id, voter_name, choice, created_at
                 FROM votes WHERE invitation_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([invitation.to_string()], |r| {
                    Ok(VoteRow {
                        invitation_id: r.get(0)?,
                        voter_id: r.get(1)?,
                        voter_name: r.get(2)?,
                        choice: r.get(3)?,
                        created_at: r.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(VoteRow::into_model).collect()
        })
    }

    pub fn delete_votes(&self, invitation: InvitationId) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM votes WHERE invitation_id = ?1", [invitation.to_string()])?)
        })
    }

    // -- Matches --

    /// Inserts the match and flags both groups, unless either group is
    /// already in a live match (`Conflict`) or missing (`Missing`).
    pub fn create_match_if_free(&self, m: &Match) -> Result<WriteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let (a, b) = (m.group_a.to_string(), m.group_b.to_string());

            let busy: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM matches
                     WHERE group_a IN (?1, ?2) OR group_b IN (?1, ?2)
                     LIMIT 1",
                    [&a, &b],
                    |r| r.get(0),
                )
                .optional()?;
            if busy.is_some() {
                return Ok(WriteOutcome::Conflict);
            }
            if !group_exists(&tx, m.group_a)? || !group_exists(&tx, m.group_b)? {
                return Ok(WriteOutcome::Missing);
            }

            tx.execute(
                "INSERT INTO matches (id, group_a, group_b, origin, created_at, venue_suggestion, venue_reasoning)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    m.id.to_string(),
                    a,
                    b,
                    m.origin.as_str(),
                    ts(&m.created_at),
                    m.venue.as_ref().map(|v| v.suggestion.as_str()),
                    m.venue.as_ref().map(|v| v.reasoning.as_str()),
                ],
            )?;
            tx.execute(
                "UPDATE groups SET has_active_match = 1 WHERE id IN (?1, ?2)",
                [&a, &b],
            )?;
            tx.commit()?;
            Ok(WriteOutcome::Done)
        })
    }

    pub fn get_match(&self, id: MatchId) -> Result<Option<Match>> {
        self.with_conn(|conn| query_match(conn, "id = ?1", &id.to_string()))
    }

    pub fn find_match_for_group(&self, group: GroupId) -> Result<Option<Match>> {
        self.with_conn(|conn| query_match(conn, "group_a = ?1 OR group_b = ?1", &group.to_string()))
    }

    pub fn set_venue(&self, id: MatchId, venue: &VenueSuggestion) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE matches SET venue_suggestion = ?2, venue_reasoning = ?3 WHERE id = ?1",
                params![id.to_string(), venue.suggestion, venue.reasoning],
            )?;
            Ok(n > 0)
        })
    }

    pub fn mark_venue_attempt(&self, id: MatchId, at: DateTime<Utc>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE matches SET venue_attempted_at = ?2 WHERE id = ?1",
                params![id.to_string(), ts(&at)],
            )?;
            Ok(n > 0)
        })
    }

    pub fn matches_missing_venue(&self, limit: usize) -> Result<Vec<Match>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM matches WHERE venue_suggestion IS NULL
                 ORDER BY venue_attempted_at IS NOT NULL, venue_attempted_at, created_at
                 LIMIT {}",
                MATCH_COLUMNS, limit
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], MatchRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(MatchRow::into_model).collect()
        })
    }

    /// Deletes the match and clears both flags in one transaction. `None`
    /// when it was already gone.
    pub fn release_match(&self, id: MatchId) -> Result<Option<Match>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(m) = query_match(&tx, "id = ?1", &id.to_string())? else {
                return Ok(None);
            };
            tx.execute("DELETE FROM matches WHERE id = ?1", [id.to_string()])?;
            tx.execute(
                "UPDATE groups SET has_active_match = 0 WHERE id IN (?1, ?2)",
                [m.group_a.to_string(), m.group_b.to_string()],
            )?;
            tx.commit()?;
            Ok(Some(m))
        })
    }

    // -- Match chat --

    pub fn insert_message(&self, message: &ChatMessage) -> Result<WriteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if query_match(&tx, "id = ?1", &message.match_id.to_string())?.is_none() {
                return Ok(WriteOutcome::Missing);
            }
            tx.execute(
                "INSERT INTO match_messages (id, match_id, author_id, author_name, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message.id.to_string(),
                    message.match_id.to_string(),
                    message.author_id.to_string(),
                    message.author_name,
                    message.body,
                    ts(&message.created_at),
                ],
            )?;
            tx.commit()?;
            Ok(WriteOutcome::Done)
        })
    }

    /// Newest first.
    pub fn list_messages(&self, match_id: MatchId, limit: usize) -> Result<Vec<ChatMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, match_id, author_id, author_name, body, created_at
                 FROM match_messages
                 WHERE match_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![match_id.to_string(), limit as i64], |r| {
                    Ok(MessageRow {
                        id: r.get(0)?,
                        match_id: r.get(1)?,
                        author_id: r.get(2)?,
                        author_name: r.get(3)?,
                        body: r.get(4)?,
                        created_at: r.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(MessageRow::into_model).collect()
        })
    }

    pub fn delete_messages(&self, match_id: MatchId) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM match_messages WHERE match_id = ?1", [match_id.to_string()])?)
        })
    }
}

/// `?start, ?start+1, ...` for `count` parameters.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn group_exists(tx: &Transaction<'_>, id: GroupId) -> Result<bool> {
    let found: Option<i64> = tx
        .query_row("SELECT 1 FROM groups WHERE id = ?1", [id.to_string()], |r| r.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn insert_member(tx: &Transaction<'_>, member: &Member) -> Result<()> {
    tx.execute(
        "INSERT INTO members (group_id, user_id, display_name, role, joined_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            member.group_id.to_string(),
            member.user_id.to_string(),
            member.display_name,
            member.role.as_str(),
            ts(&member.joined_at),
        ],
    )?;
    Ok(())
}

fn invitation_status(tx: &Transaction<'_>, id: InvitationId) -> Result<Option<String>> {
    let status = tx
        .query_row("SELECT status FROM invitations WHERE id = ?1", [id.to_string()], |r| r.get(0))
        .optional()?;
    Ok(status)
}

fn query_group(conn: &Connection, id: GroupId) -> Result<Option<Group>> {
    let sql = format!("SELECT {} FROM groups g WHERE g.id = ?1", GROUP_COLUMNS);
    let row = conn.query_row(&sql, [id.to_string()], GroupRow::from_row).optional()?;
    row.map(GroupRow::into_model).transpose()
}

fn query_invitation(conn: &Connection, id: InvitationId) -> Result<Option<Invitation>> {
    let sql = format!("SELECT {} FROM invitations WHERE id = ?1", INVITATION_COLUMNS);
    let row = conn.query_row(&sql, [id.to_string()], InvitationRow::from_row).optional()?;
    row.map(InvitationRow::into_model).transpose()
}

/// Single match selected by `filter`, which binds one parameter as `?1`.
fn query_match(conn: &Connection, filter: &str, param: &str) -> Result<Option<Match>> {
    let sql = format!("SELECT {} FROM matches WHERE {} LIMIT 1", MATCH_COLUMNS, filter);
    let row = conn.query_row(&sql, [param], MatchRow::from_row).optional()?;
    row.map(MatchRow::into_model).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_from_start() {
        assert_eq!(placeholders(1, 3), "?1, ?2, ?3");
        assert_eq!(placeholders(2, 1), "?2");
        assert_eq!(placeholders(1, 0), "");
    }
}
