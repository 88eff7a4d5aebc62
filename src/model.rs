use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};

pub const MAX_MESSAGE_CHARS: usize = 240;
pub const MAX_NAME_CHARS: usize = 20;
pub const MAX_EMAIL_CHARS: usize = 35;
pub const MAX_PASSWORD_CHARS: usize = 20;

/// Refuses `value` when it has more than `max` characters.
pub(crate) fn within_limit(field: &str, value: &str, max: usize) -> ChatResult<()> {
    if value.chars().count() > max {
        return Err(ChatError::invalid(format!("{field} is longer than {max} characters")));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub photo_url: Option<String>,
}

/// One owner's copy of a counterpart's profile plus the last message
/// exchanged between them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub photo_url: Option<String>,
    pub last_message: String,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_sender: Option<String>,
    pub last_message_read: bool,
}

impl Contact {
    /// Fresh contact record for `user`, with no conversation yet.
    pub fn of(user: &User) -> Self {
        Self {
            uid: user.uid.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            photo_url: user.photo_url.clone(),
            last_message: String::new(),
            last_message_at: None,
            last_message_sender: None,
            last_message_read: false,
        }
    }
}

/// Denormalized "last message" fields written onto both contact records
/// when a message is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMessage {
    pub text: String,
    pub sender_id: String,
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub(crate) String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    pub read: bool,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
}

impl NewMessage {
    pub fn new(sender_id: &str, receiver_id: &str, text: &str) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender_id: sender_id.to_owned(),
            receiver_id: receiver_id.to_owned(),
            text: text.to_owned(),
        }
    }
}
