use anyhow::{Result, bail};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use crate::Database;
use crate::models::ThreadRow;
use crate::repo::ThreadRepository;
use crate::sql;

const THREAD_COLUMNS: &str = "id, participant_low, participant_high, last_message_content, \
                              last_message_at, created_at, updated_at";

impl ThreadRepository for Database {
    fn find_thread(&self, user_a: Uuid, user_b: Uuid) -> Result<Option<ThreadRow>> {
        let (low, high) = ordered_pair(user_a, user_b)?;
        self.with_conn(|conn| {
            let query = format!(
                "SELECT {THREAD_COLUMNS} FROM threads WHERE participant_low = ?1 AND participant_high = ?2"
            );
            Ok(conn
                .query_row(&query, [low.to_string(), high.to_string()], map_thread)
                .optional()?)
        })
    }

    fn create_thread(&self, user_a: Uuid, user_b: Uuid) -> Result<Option<ThreadRow>> {
        let (low, high) = ordered_pair(user_a, user_b)?;
        let now = sql::now();
        let row = ThreadRow {
            id: Uuid::new_v4(),
            participant_low: low,
            participant_high: high,
            last_message_content: None,
            last_message_at: None,
            created_at: now,
            updated_at: now,
        };

        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO threads (id, participant_low, participant_high, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(participant_low, participant_high) DO NOTHING",
                [
                    row.id.to_string(),
                    low.to_string(),
                    high.to_string(),
                    sql::fmt_ts(now),
                ],
            )?;
            Ok((inserted == 1).then_some(row))
        })
    }

    fn get_thread(&self, thread_id: Uuid) -> Result<Option<ThreadRow>> {
        self.with_conn(|conn| {
            let query = format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = ?1");
            Ok(conn.query_row(&query, [thread_id.to_string()], map_thread).optional()?)
        })
    }

    fn get_thread_for_participant(&self, thread_id: Uuid, user_id: Uuid) -> Result<Option<ThreadRow>> {
        self.with_conn(|conn| {
            let query = format!(
                "SELECT {THREAD_COLUMNS} FROM threads
                 WHERE id = ?1 AND (participant_low = ?2 OR participant_high = ?2)"
            );
            Ok(conn
                .query_row(&query, [thread_id.to_string(), user_id.to_string()], map_thread)
                .optional()?)
        })
    }

    fn threads_for_user(&self, user_id: Uuid) -> Result<Vec<ThreadRow>> {
        self.with_conn(|conn| {
            let query = format!(
                "SELECT {THREAD_COLUMNS} FROM threads
                 WHERE participant_low = ?1 OR participant_high = ?1
                 ORDER BY updated_at DESC, id"
            );
            let mut stmt = conn.prepare(&query)?;
            let rows = stmt
                .query_map([user_id.to_string()], map_thread)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Sorts a pair into the (low, high) form the uniqueness constraint is keyed on.
fn ordered_pair(a: Uuid, b: Uuid) -> Result<(Uuid, Uuid)> {
    if a == b {
        bail!("a thread needs two distinct participants, got {} twice", a);
    }
    Ok(if a < b { (a, b) } else { (b, a) })
}

fn map_thread(row: &Row<'_>) -> rusqlite::Result<ThreadRow> {
    Ok(ThreadRow {
        id: sql::uuid(row, 0)?,
        participant_low: sql::uuid(row, 1)?,
        participant_high: sql::uuid(row, 2)?,
        last_message_content: row.get(3)?,
        last_message_at: sql::opt_ts(row, 4)?,
        created_at: sql::ts(row, 5)?,
        updated_at: sql::ts(row, 6)?,
    })
}
