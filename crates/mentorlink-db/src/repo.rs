//! Typed storage contracts, one per entity. [`crate::Database`] implements
//! all three; callers depend on the traits.

use std::collections::HashMap;

use anyhow::Result;
use uuid::Uuid;

use mentorlink_types::api::LeaderboardFilter;

use crate::models::{MessageRow, NewUser, PointsAward, ThreadRow, UserRow};

pub trait UserRepository {
    /// Returns `None` if the email is already registered.
    fn create_user(&self, user: &NewUser) -> Result<Option<UserRow>>;

    fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>>;

    fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>>;

    /// Batch lookup; ids that do not exist are skipped.
    fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<UserRow>>;

    /// Everyone except `id`, sorted by name.
    fn users_except(&self, id: Uuid) -> Result<Vec<UserRow>>;

    /// Students sorted by name, optionally only those without a mentor.
    fn students(&self, unmentored_only: bool) -> Result<Vec<UserRow>>;

    /// Returns `None` if `student_id` is not a student.
    fn assign_mentor(&self, student_id: Uuid, mentor_id: Uuid) -> Result<Option<UserRow>>;

    /// Adds to a student's point balances. Returns `None` if `student_id` is
    /// not a student.
    fn award_points(&self, student_id: Uuid, academic: i64, athletic: i64) -> Result<Option<PointsAward>>;

    /// Students ordered by the filtered score, highest first.
    fn leaderboard(&self, filter: LeaderboardFilter) -> Result<Vec<UserRow>>;
}

pub trait ThreadRepository {
    /// Order-independent lookup of the thread between two users.
    fn find_thread(&self, user_a: Uuid, user_b: Uuid) -> Result<Option<ThreadRow>>;

    /// Creates the thread for a pair. Returns `None` when the pair already has
    /// one, which callers treat as "someone else created it first".
    fn create_thread(&self, user_a: Uuid, user_b: Uuid) -> Result<Option<ThreadRow>>;

    fn get_thread(&self, thread_id: Uuid) -> Result<Option<ThreadRow>>;

    /// The thread, only if `user_id` participates in it.
    fn get_thread_for_participant(&self, thread_id: Uuid, user_id: Uuid) -> Result<Option<ThreadRow>>;

    /// Threads `user_id` participates in, most recently active first.
    fn threads_for_user(&self, user_id: Uuid) -> Result<Vec<ThreadRow>>;
}

pub trait MessageRepository {
    /// Appends a message and refreshes the thread's last-message snapshot in
    /// the same transaction. Returns `None` if the thread does not exist or
    /// the sender is not one of its participants.
    fn append_message(&self, thread_id: Uuid, sender_id: Uuid, content: &str) -> Result<Option<MessageRow>>;

    /// Full history in creation order.
    fn messages_for_thread(&self, thread_id: Uuid) -> Result<Vec<MessageRow>>;

    /// Unread messages in the thread that `for_user` did not send.
    fn count_unread(&self, thread_id: Uuid, for_user: Uuid) -> Result<i64>;

    /// [`MessageRepository::count_unread`] for many threads in one query.
    /// Threads with nothing unread are absent from the map.
    fn count_unread_batch(&self, thread_ids: &[Uuid], for_user: Uuid) -> Result<HashMap<Uuid, i64>>;

    fn most_recent(&self, thread_id: Uuid) -> Result<Option<MessageRow>>;

    /// A participant viewing the thread: returns the full history and marks
    /// exactly the returned incoming messages read, in one transaction.
    /// Returns `None` if the thread does not exist or `reader_id` is not a
    /// participant. The count is how many flags changed.
    fn read_transcript(&self, thread_id: Uuid, reader_id: Uuid) -> Result<Option<(Vec<MessageRow>, usize)>>;

    /// Marks every message `reader_id` received in the thread as read.
    /// Returns how many flags changed.
    fn mark_read(&self, thread_id: Uuid, reader_id: Uuid) -> Result<usize>;
}
