use std::collections::HashMap;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};
use uuid::Uuid;

use crate::Database;
use crate::models::MessageRow;
use crate::repo::MessageRepository;
use crate::sql;

const MESSAGE_COLUMNS: &str = "id, thread_id, sender_id, content, read, created_at";

impl MessageRepository for Database {
    fn append_message(&self, thread_id: Uuid, sender_id: Uuid, content: &str) -> Result<Option<MessageRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let snapshot = tx
                .query_row(
                    "SELECT last_message_at FROM threads
                     WHERE id = ?1 AND (participant_low = ?2 OR participant_high = ?2)",
                    [thread_id.to_string(), sender_id.to_string()],
                    |row| sql::opt_ts(row, 0),
                )
                .optional()?;
            let Some(last_message_at) = snapshot else {
                return Ok(None);
            };

            // Keep created_at non-decreasing within a thread even if the clock steps back.
            let now = sql::now();
            let created_at = last_message_at.map_or(now, |last| last.max(now));

            let row = MessageRow {
                id: Uuid::new_v4(),
                thread_id,
                sender_id,
                content: content.to_string(),
                read: false,
                created_at,
            };

            tx.execute(
                "INSERT INTO messages (id, thread_id, sender_id, content, read, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                [
                    row.id.to_string(),
                    thread_id.to_string(),
                    sender_id.to_string(),
                    row.content.clone(),
                    sql::fmt_ts(created_at),
                ],
            )?;
            tx.execute(
                "UPDATE threads
                 SET last_message_content = ?2, last_message_at = ?3, updated_at = ?3
                 WHERE id = ?1",
                [thread_id.to_string(), row.content.clone(), sql::fmt_ts(created_at)],
            )?;
            tx.commit()?;

            Ok(Some(row))
        })
    }

    fn messages_for_thread(&self, thread_id: Uuid) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| select_messages(conn, thread_id))
    }

    fn read_transcript(&self, thread_id: Uuid, reader_id: Uuid) -> Result<Option<(Vec<MessageRow>, usize)>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let is_participant = tx
                .query_row(
                    "SELECT 1 FROM threads
                     WHERE id = ?1 AND (participant_low = ?2 OR participant_high = ?2)",
                    [thread_id.to_string(), reader_id.to_string()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !is_participant {
                return Ok(None);
            }

            let messages = select_messages(&tx, thread_id)?;
            let marked = mark_incoming_read(&tx, thread_id, reader_id)?;
            tx.commit()?;

            Ok(Some((messages, marked)))
        })
    }

    fn count_unread(&self, thread_id: Uuid, for_user: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE thread_id = ?1 AND sender_id != ?2 AND read = 0",
                [thread_id.to_string(), for_user.to_string()],
                |row| row.get(0),
            )?)
        })
    }

    fn count_unread_batch(&self, thread_ids: &[Uuid], for_user: Uuid) -> Result<HashMap<Uuid, i64>> {
        if thread_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let query = format!(
                "SELECT thread_id, COUNT(*) FROM messages
                 WHERE sender_id != ?1 AND read = 0 AND thread_id IN ({})
                 GROUP BY thread_id",
                sql::placeholders(2, thread_ids.len())
            );
            let params = std::iter::once(for_user.to_string())
                .chain(thread_ids.iter().map(Uuid::to_string));

            let mut stmt = conn.prepare(&query)?;
            let counts = stmt
                .query_map(params_from_iter(params), |row| Ok((sql::uuid(row, 0)?, row.get::<_, i64>(1)?)))?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;
            Ok(counts)
        })
    }

    fn most_recent(&self, thread_id: Uuid) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let query = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE thread_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT 1"
            );
            Ok(conn.query_row(&query, [thread_id.to_string()], map_message).optional()?)
        })
    }

    fn mark_read(&self, thread_id: Uuid, reader_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| mark_incoming_read(conn, thread_id, reader_id))
    }
}

fn select_messages(conn: &Connection, thread_id: Uuid) -> Result<Vec<MessageRow>> {
    let query = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE thread_id = ?1 ORDER BY created_at, rowid"
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt
        .query_map([thread_id.to_string()], map_message)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn mark_incoming_read(conn: &Connection, thread_id: Uuid, reader_id: Uuid) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE messages SET read = 1 WHERE thread_id = ?1 AND sender_id != ?2 AND read = 0",
        [thread_id.to_string(), reader_id.to_string()],
    )?)
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: sql::uuid(row, 0)?,
        thread_id: sql::uuid(row, 1)?,
        sender_id: sql::uuid(row, 2)?,
        content: row.get(3)?,
        read: row.get(4)?,
        created_at: sql::ts(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ThreadRow;
    use crate::repo::ThreadRepository;
    use crate::testing::seed_user;
    use mentorlink_types::models::Role;

    fn pair(db: &Database) -> (Uuid, Uuid, ThreadRow) {
        let alice = seed_user(db, "Alice", Role::Student);
        let bob = seed_user(db, "Bob", Role::Mentor);
        let thread = db.create_thread(alice.id, bob.id).unwrap().unwrap();
        (alice.id, bob.id, thread)
    }

    #[test]
    fn append_refreshes_thread_snapshot() {
        let db = Database::open_in_memory().unwrap();
        let (alice, bob, thread) = pair(&db);

        db.append_message(thread.id, alice, "hi").unwrap().unwrap();
        let reply = db.append_message(thread.id, bob, "hello").unwrap().unwrap();

        let stored = db.get_thread(thread.id).unwrap().unwrap();
        assert_eq!(stored.last_message_content.as_deref(), Some("hello"));
        assert_eq!(stored.last_message_at, Some(reply.created_at));
        assert_eq!(stored.updated_at, reply.created_at);

        let latest = db.most_recent(thread.id).unwrap().unwrap();
        assert_eq!(latest.id, reply.id);
    }

    #[test]
    fn non_participant_cannot_append() {
        let db = Database::open_in_memory().unwrap();
        let (_, _, thread) = pair(&db);
        let eve = seed_user(&db, "Eve", Role::Student);

        assert!(db.append_message(thread.id, eve.id, "let me in").unwrap().is_none());
        assert!(db.append_message(Uuid::new_v4(), eve.id, "nowhere").unwrap().is_none());
        assert!(db.messages_for_thread(thread.id).unwrap().is_empty());
        assert!(db.most_recent(thread.id).unwrap().is_none());
    }

    #[test]
    fn blank_content_violates_schema() {
        let db = Database::open_in_memory().unwrap();
        let (alice, _, thread) = pair(&db);

        assert!(db.append_message(thread.id, alice, "   ").is_err());
        assert!(db.messages_for_thread(thread.id).unwrap().is_empty());
        assert!(db.get_thread(thread.id).unwrap().unwrap().last_message_content.is_none());
    }

    #[test]
    fn transcript_preserves_append_order() {
        let db = Database::open_in_memory().unwrap();
        let (alice, bob, thread) = pair(&db);

        for i in 0..20 {
            let sender = if i % 2 == 0 { alice } else { bob };
            db.append_message(thread.id, sender, &format!("message {i}")).unwrap().unwrap();
        }

        let transcript = db.messages_for_thread(thread.id).unwrap();
        let contents: Vec<_> = transcript.iter().map(|m| m.content.clone()).collect();
        let expected: Vec<_> = (0..20).map(|i| format!("message {i}")).collect();
        assert_eq!(contents, expected);
        assert!(transcript.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[test]
    fn unread_counts_only_incoming_messages() {
        let db = Database::open_in_memory().unwrap();
        let (alice, bob, thread) = pair(&db);

        db.append_message(thread.id, alice, "one").unwrap();
        db.append_message(thread.id, alice, "two").unwrap();
        db.append_message(thread.id, bob, "three").unwrap();

        assert_eq!(db.count_unread(thread.id, bob).unwrap(), 2);
        assert_eq!(db.count_unread(thread.id, alice).unwrap(), 1);

        assert_eq!(db.mark_read(thread.id, bob).unwrap(), 2);
        assert_eq!(db.mark_read(thread.id, bob).unwrap(), 0);
        assert_eq!(db.count_unread(thread.id, bob).unwrap(), 0);
        assert_eq!(db.count_unread(thread.id, alice).unwrap(), 1);
    }

    #[test]
    fn batched_unread_matches_single_counts() {
        let db = Database::open_in_memory().unwrap();
        let (alice, bob, with_bob) = pair(&db);
        let carol = seed_user(&db, "Carol", Role::Mentor);
        let with_carol = db.create_thread(alice, carol.id).unwrap().unwrap();

        db.append_message(with_bob.id, bob, "a").unwrap();
        db.append_message(with_bob.id, bob, "b").unwrap();
        db.append_message(with_carol.id, alice, "c").unwrap();

        let counts = db.count_unread_batch(&[with_bob.id, with_carol.id], alice).unwrap();
        assert_eq!(counts.get(&with_bob.id), Some(&2));
        assert_eq!(counts.get(&with_carol.id), None);
        assert_eq!(db.count_unread(with_carol.id, alice).unwrap(), 0);
        assert!(db.count_unread_batch(&[], alice).unwrap().is_empty());
    }

    #[test]
    fn reading_a_transcript_marks_only_what_it_returned() {
        let db = Database::open_in_memory().unwrap();
        let (alice, bob, thread) = pair(&db);
        let eve = seed_user(&db, "Eve", Role::Student);

        db.append_message(thread.id, alice, "one").unwrap();
        db.append_message(thread.id, bob, "two").unwrap();
        db.append_message(thread.id, alice, "three").unwrap();

        let (seen, marked) = db.read_transcript(thread.id, bob).unwrap().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(marked, 2);
        assert_eq!(db.count_unread(thread.id, bob).unwrap(), 0);
        assert_eq!(db.count_unread(thread.id, alice).unwrap(), 1);

        // A message sent after the read stays unread until the next one.
        db.append_message(thread.id, alice, "four").unwrap();
        assert_eq!(db.count_unread(thread.id, bob).unwrap(), 1);

        let (seen, marked) = db.read_transcript(thread.id, bob).unwrap().unwrap();
        assert_eq!(seen.last().unwrap().content, "four");
        assert_eq!(marked, 1);

        assert!(db.read_transcript(thread.id, eve.id).unwrap().is_none());
        assert!(db.read_transcript(Uuid::new_v4(), bob).unwrap().is_none());
        assert_eq!(db.count_unread(thread.id, alice).unwrap(), 1);
    }
}
