//! Database row types, decoded into typed ids and timestamps.
//! Distinct from mentorlink-types API models to keep the DB layer independent.
use chrono::{DateTime, Utc};
use uuid::Uuid;

use mentorlink_types::models::Role;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub school: Option<String>,
    pub grade: Option<String>,
    pub mentor_id: Option<Uuid>,
    pub academic_points: i64,
    pub athletic_points: i64,
    pub created_at: DateTime<Utc>,
}

/// Ceiling for each of a student's point balances.
pub const MAX_POINT_BALANCE: i64 = 1_000_000_000;

impl UserRow {
    pub fn total_points(&self) -> i64 {
        self.academic_points.saturating_add(self.athletic_points)
    }
}

/// Result of awarding points to an existing student.
#[derive(Debug, Clone)]
pub enum PointsAward {
    Awarded(UserRow),
    /// The award would push a balance past [`MAX_POINT_BALANCE`] or below zero.
    /// Nothing was written.
    OutOfRange,
}

/// Insert payload for a new account. `email` is stored lowercased.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub school: Option<String>,
    pub grade: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ThreadRow {
    pub id: Uuid,
    pub participant_low: Uuid,
    pub participant_high: Uuid,
    pub last_message_content: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ThreadRow {
    pub fn participants(&self) -> [Uuid; 2] {
        [self.participant_low, self.participant_high]
    }

    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participant_low == user_id || self.participant_high == user_id
    }
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
