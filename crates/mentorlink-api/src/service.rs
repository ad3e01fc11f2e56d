//! Direct messaging between two users.
//!
//! Every operation takes the caller's [`Session`] explicitly. Threads the
//! caller does not participate in are reported as not found, so callers
//! cannot learn whether they exist.

use std::collections::HashMap;

use anyhow::anyhow;
use tracing::{debug, info};
use uuid::Uuid;

use mentorlink_db::models::{MessageRow, ThreadRow, UserRow};
use mentorlink_db::{MessageRepository, ThreadRepository, UserRepository};
use mentorlink_types::api::{
    LastMessage, MessageResponse, StartThreadResponse, ThreadSummary, TranscriptEntry, UserSummary,
};
use mentorlink_types::models::Session;

use crate::error::ApiError;
use crate::store::Store;

pub const MAX_MESSAGE_CHARS: usize = 5000;

#[derive(Clone)]
pub struct MessagingService {
    store: Store,
}

impl MessagingService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// The caller's threads, most recently active first, each with its
    /// participants, last-message snapshot and the caller's unread count.
    pub async fn list_threads(&self, caller: &Session) -> Result<Vec<ThreadSummary>, ApiError> {
        let user_id = caller.user_id;

        let (threads, users, unread) = self
            .store
            .call(move |db| {
                let threads = db.threads_for_user(user_id)?;

                let mut participant_ids: Vec<Uuid> =
                    threads.iter().flat_map(ThreadRow::participants).collect();
                participant_ids.sort_unstable();
                participant_ids.dedup();
                let users = db.users_by_ids(&participant_ids)?;

                let thread_ids: Vec<Uuid> = threads.iter().map(|t| t.id).collect();
                let unread = db.count_unread_batch(&thread_ids, user_id)?;

                Ok((threads, users, unread))
            })
            .await?;

        let users: HashMap<Uuid, UserSummary> =
            users.into_iter().map(|u| (u.id, user_summary(u))).collect();

        Ok(threads
            .into_iter()
            .map(|thread| ThreadSummary {
                id: thread.id,
                participants: thread
                    .participants()
                    .iter()
                    .filter_map(|id| users.get(id).cloned())
                    .collect(),
                unread_count: unread.get(&thread.id).copied().unwrap_or(0),
                last_message: match (thread.last_message_content, thread.last_message_at) {
                    (Some(content), Some(timestamp)) => Some(LastMessage { content, timestamp }),
                    _ => None,
                },
            })
            .collect())
    }

    /// Full history of a thread in creation order. Viewing it marks the
    /// caller's incoming messages in that history as read; anything sent
    /// afterwards stays unread.
    pub async fn get_transcript(
        &self,
        caller: &Session,
        thread_id: Uuid,
    ) -> Result<Vec<TranscriptEntry>, ApiError> {
        let user_id = caller.user_id;

        let (messages, marked) = self
            .store
            .call(move |db| db.read_transcript(thread_id, user_id))
            .await?
            .ok_or(ApiError::NotFound("Thread"))?;

        if marked > 0 {
            debug!("Marked {} messages read in thread {} for {}", marked, thread_id, user_id);
        }

        Ok(messages
            .into_iter()
            .map(|m| TranscriptEntry {
                id: m.id,
                sender_id: m.sender_id,
                content: m.content,
                created_at: m.created_at,
            })
            .collect())
    }

    /// Appends a message to an existing thread the caller participates in.
    pub async fn send_message(
        &self,
        caller: &Session,
        thread_id: Uuid,
        content: &str,
    ) -> Result<MessageResponse, ApiError> {
        let user_id = caller.user_id;

        // Membership first, so outsiders learn nothing from validation errors.
        let is_participant = self
            .store
            .call(move |db| Ok(db.get_thread_for_participant(thread_id, user_id)?.is_some()))
            .await?;
        if !is_participant {
            return Err(ApiError::NotFound("Thread"));
        }

        let content = validate_content(content)?;
        let message = self
            .store
            .call(move |db| db.append_message(thread_id, user_id, &content))
            .await?
            .ok_or(ApiError::NotFound("Thread"))?;

        Ok(message_response(message))
    }

    /// Sends `content` to `recipient_id`, creating their thread with the
    /// caller on first contact. Concurrent first contacts converge on one
    /// thread.
    pub async fn start_or_continue_thread(
        &self,
        caller: &Session,
        recipient_id: Uuid,
        content: &str,
    ) -> Result<StartThreadResponse, ApiError> {
        let user_id = caller.user_id;
        if recipient_id == user_id {
            return Err(ApiError::validation("Cannot start a thread with yourself"));
        }
        let content = validate_content(content)?;

        let thread_id = self
            .store
            .call(move |db| {
                if db.get_user_by_id(recipient_id)?.is_none() {
                    return Ok(None);
                }
                let thread = find_or_create_thread(db, user_id, recipient_id)?;
                db.append_message(thread.id, user_id, &content)?
                    .ok_or_else(|| anyhow!("append to thread {} rejected its own participant", thread.id))?;
                Ok(Some(thread.id))
            })
            .await?
            .ok_or(ApiError::NotFound("Recipient"))?;

        Ok(StartThreadResponse { thread_id })
    }
}

/// Find-or-create that tolerates a concurrent creator: when the insert loses
/// the race on the pair's uniqueness constraint, the winner's thread is
/// looked up instead.
pub fn find_or_create_thread<R>(repo: &R, user_a: Uuid, user_b: Uuid) -> anyhow::Result<ThreadRow>
where
    R: ThreadRepository + ?Sized,
{
    if let Some(thread) = repo.find_thread(user_a, user_b)? {
        return Ok(thread);
    }

    match repo.create_thread(user_a, user_b)? {
        Some(thread) => {
            info!("Created thread {} for {} and {}", thread.id, user_a, user_b);
            Ok(thread)
        }
        None => {
            debug!("Lost thread creation race for {} and {}", user_a, user_b);
            repo.find_thread(user_a, user_b)?
                .ok_or_else(|| anyhow!("thread for {} and {} missing after conflict", user_a, user_b))
        }
    }
}

/// Trimmed message text, rejected if blank or too long.
pub fn validate_content(content: &str) -> Result<String, ApiError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Message content cannot be empty"));
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::Validation(format!(
            "Message content exceeds {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn user_summary(user: UserRow) -> UserSummary {
    UserSummary {
        id: user.id,
        name: user.name,
        role: user.role,
    }
}

fn message_response(message: MessageRow) -> MessageResponse {
    MessageResponse {
        id: message.id,
        thread_id: message.thread_id,
        sender_id: message.sender_id,
        content: message.content,
        read: message.read,
        created_at: message.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_trimmed_and_bounded() {
        assert_eq!(validate_content("  hi there \n").unwrap(), "hi there");
        assert!(matches!(validate_content(" \t\n"), Err(ApiError::Validation(_))));
        assert!(matches!(validate_content(""), Err(ApiError::Validation(_))));

        let long = "x".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(validate_content(&long), Err(ApiError::Validation(_))));
        assert!(validate_content(&"x".repeat(MAX_MESSAGE_CHARS)).is_ok());
    }
}
