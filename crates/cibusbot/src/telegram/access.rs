//! Static allow-list of Telegram users

use std::collections::BTreeSet;

use teloxide::types::{Message, User, UserId};

/// Users allowed to talk to the bot
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    ids: BTreeSet<u64>,
}

impl AllowList {
    pub fn new(ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.ids.contains(&id.0)
    }

    /// Whether the sender of `msg` is allowed. Messages without a sender
    /// (channel posts) never are.
    pub fn allows(&self, msg: &Message) -> bool {
        msg.from.as_ref().is_some_and(|user| self.allows_user(user))
    }

    pub fn allows_user(&self, user: &User) -> bool {
        self.contains(user.id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// `"@username (ID: 123)"` style sender description for logs.
pub fn describe_sender(msg: &Message) -> String {
    match msg.from.as_ref() {
        Some(user) => match user.username.as_deref() {
            Some(username) => format!("@{} (ID: {})", username, user.id),
            None => format!("{} (ID: {})", user.first_name, user.id),
        },
        None => format!("unknown sender in chat {}", msg.chat.id),
    }
}
