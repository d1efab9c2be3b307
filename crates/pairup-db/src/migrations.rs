use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const LATEST_VERSION: i64 = 2;

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version = current_version(conn)?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE groups (
                id               TEXT PRIMARY KEY,
                name             TEXT NOT NULL,
                size             INTEGER NOT NULL,
                neighborhood     TEXT NOT NULL DEFAULT '',
                vibe             TEXT NOT NULL DEFAULT '',
                intent           TEXT NOT NULL,
                governance       TEXT NOT NULL,
                decider_id       TEXT NOT NULL,
                open_to_match    INTEGER NOT NULL DEFAULT 1,
                has_active_match INTEGER NOT NULL DEFAULT 0,
                created_at       TEXT NOT NULL,
                retired_at       TEXT
            );

            CREATE INDEX idx_groups_available
                ON groups(open_to_match, has_active_match, retired_at);

            CREATE TABLE members (
                group_id     TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                user_id      TEXT NOT NULL,
                display_name TEXT NOT NULL,
                role         TEXT NOT NULL,
                joined_at    TEXT NOT NULL,
                PRIMARY KEY (group_id, user_id)
            );

            CREATE TABLE decisions (
                group_id   TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                target_id  TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                kind       TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (group_id, target_id)
            );

            CREATE TABLE likes (
                from_group TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                to_group   TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                PRIMARY KEY (from_group, to_group)
            );

            CREATE TABLE invitations (
                id            TEXT PRIMARY KEY,
                from_group    TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                to_group      TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                status        TEXT NOT NULL DEFAULT 'pending',
                created_at    TEXT NOT NULL,
                responded_at  TEXT,
                total_votes   INTEGER,
                accept_votes  INTEGER,
                reject_votes  INTEGER,
                vote_complete INTEGER
            );

            CREATE INDEX idx_invitations_to ON invitations(to_group, status);
            CREATE INDEX idx_invitations_from ON invitations(from_group, status);

            CREATE TABLE votes (
                invitation_id TEXT NOT NULL REFERENCES invitations(id) ON DELETE CASCADE,
                voter_id      TEXT NOT NULL,
                voter_name    TEXT NOT NULL,
                choice        TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                PRIMARY KEY (invitation_id, voter_id)
            );

            CREATE TABLE matches (
                id               TEXT PRIMARY KEY,
                group_a          TEXT NOT NULL REFERENCES groups(id),
                group_b          TEXT NOT NULL REFERENCES groups(id),
                origin           TEXT NOT NULL,
                created_at       TEXT NOT NULL,
                venue_suggestion TEXT,
                venue_reasoning  TEXT
            );

            CREATE UNIQUE INDEX idx_matches_group_a ON matches(group_a);
            CREATE UNIQUE INDEX idx_matches_group_b ON matches(group_b);

            CREATE TABLE match_messages (
                id          TEXT PRIMARY KEY,
                match_id    TEXT NOT NULL REFERENCES matches(id) ON DELETE CASCADE,
                author_id   TEXT NOT NULL,
                author_name TEXT NOT NULL,
                body        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_match_messages ON match_messages(match_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    if version < 2 {
        info!("Running migration v2 (venue attempt tracking)");
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            ALTER TABLE matches ADD COLUMN venue_attempted_at TEXT;

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete (schema v{})", LATEST_VERSION);
    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;
    Ok(version)
}
