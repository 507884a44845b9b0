use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use super::ids::{ConversationId, DatasetId, ProjectId};
use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// The role that conventionally follows this one.
    pub fn next(self) -> Role {
        match self {
            Role::User => Role::Assistant,
            Role::Assistant => Role::User,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    #[serde(default)]
    pub id: ConversationId,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            id: ConversationId::new(),
            messages,
        }
    }

    /// A fresh conversation holding one empty user turn.
    pub fn blank() -> Self {
        Self::new(vec![Message::user("")])
    }

    /// Appends an empty message whose role alternates with the last one.
    pub fn push_next_turn(&mut self) -> &mut Message {
        let role = self.messages.last().map(|m| m.role.next()).unwrap_or(Role::User);
        self.messages.push(Message::new(role, ""));
        let last = self.messages.len() - 1;
        &mut self.messages[last]
    }

    /// Checks the conversation invariant: at least one message and no blank
    /// content. `position` is only used to build the error text.
    pub fn validate_at(&self, position: usize) -> Result<()> {
        if self.messages.is_empty() {
            return Err(CoreError::validation(format!(
                "conversation {} has no messages",
                position + 1
            )));
        }
        if let Some(idx) = self.messages.iter().position(Message::is_blank) {
            return Err(CoreError::validation(format!(
                "conversation {} message {} is empty",
                position + 1,
                idx + 1
            )));
        }
        Ok(())
    }

    pub fn roles_alternate(&self) -> bool {
        self.messages.windows(2).all(|w| w[0].role != w[1].role)
    }
}

/// Validates a whole ordered collection of conversations.
pub fn validate_conversations(conversations: &[Conversation]) -> Result<()> {
    if conversations.is_empty() {
        return Err(CoreError::validation("at least one conversation is required"));
    }
    conversations
        .iter()
        .enumerate()
        .try_for_each(|(idx, c)| c.validate_at(idx))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Dataset {
    pub id: DatasetId,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub project_id: ProjectId,
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "data")]
    pub conversations: Vec<Conversation>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, project_id: ProjectId) -> Self {
        Self {
            id: DatasetId::new(),
            name: name.into(),
            project_id,
            created_at: Utc::now(),
            conversations: Vec::new(),
        }
    }

    /// Generation jobs are complete once the backend holds any conversation.
    pub fn is_generated(&self) -> bool {
        !self.conversations.is_empty()
    }

    pub fn message_count(&self) -> usize {
        self.conversations.iter().map(|c| c.messages.len()).sum()
    }
}
