use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id               TEXT PRIMARY KEY,
                name             TEXT NOT NULL,
                email            TEXT NOT NULL UNIQUE,
                password         TEXT NOT NULL,
                role             TEXT NOT NULL CHECK (role IN ('STUDENT', 'MENTOR')),
                school           TEXT,
                grade            TEXT,
                mentor_id        TEXT REFERENCES users(id),
                academic_points  INTEGER NOT NULL DEFAULT 0,
                athletic_points  INTEGER NOT NULL DEFAULT 0,
                created_at       TEXT NOT NULL
            );

            CREATE INDEX idx_users_role_name ON users(role, name);

            -- One thread per unordered pair: ids are stored sorted.
            CREATE TABLE threads (
                id                    TEXT PRIMARY KEY,
                participant_low       TEXT NOT NULL REFERENCES users(id),
                participant_high      TEXT NOT NULL REFERENCES users(id),
                last_message_content  TEXT,
                last_message_at       TEXT,
                created_at            TEXT NOT NULL,
                updated_at            TEXT NOT NULL,
                CHECK (participant_low < participant_high),
                UNIQUE (participant_low, participant_high)
            );

            CREATE INDEX idx_threads_high ON threads(participant_high);

            CREATE TABLE messages (
                id          TEXT PRIMARY KEY,
                thread_id   TEXT NOT NULL REFERENCES threads(id),
                sender_id   TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL CHECK (length(trim(content)) > 0),
                read        INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_messages_thread ON messages(thread_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
