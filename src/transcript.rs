//! transcript.rs — In-memory conversation store.
//!
//! One `Chat` per conversation, keyed by a generated id. Each chat keeps at
//! most [`MAX_TURNS_PER_CHAT`] turns (oldest dropped first) and is purged
//! entirely once idle for [`IDLE_CHAT_MAX_AGE_DAYS`]. Context snapshots are
//! clones; arbitration never holds the store lock across an await.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use metrics::gauge;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::candidate::{Candidate, QualityMetrics, Source};

/// Oldest turns are dropped beyond this per-chat cap.
pub const MAX_TURNS_PER_CHAT: usize = 100;

/// Chats idle longer than this are deleted by the maintenance sweep.
pub const IDLE_CHAT_MAX_AGE_DAYS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Bot => "bot",
        }
    }
}

/// One message in a chat. Bot turns carry the arbitration verdict alongside
/// the text; user turns leave those fields unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    #[serde(rename = "ts")]
    pub ts_unix: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<QualityMetrics>,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            ts_unix: now_unix(),
            source: None,
            confidence: None,
            metrics: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Bot turn recording the winning candidate.
    pub fn bot_reply(c: &Candidate) -> Self {
        let mut t = Self::new(Role::Bot, c.text.clone());
        t.source = Some(c.source);
        t.confidence = Some(c.confidence);
        t.metrics = Some(c.metrics);
        t
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub turns: Vec<Turn>,
    pub last_active_unix: u64,
}

#[derive(Debug, Default)]
pub struct TranscriptStore {
    inner: Mutex<HashMap<String, Chat>>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty chat for `user_id` and returns its id.
    pub fn create_chat(&self, user_id: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let chat = Chat {
            id: id.clone(),
            user_id: user_id.to_string(),
            title: "New Chat".to_string(),
            turns: Vec::new(),
            last_active_unix: now_unix(),
        };
        let mut chats = self.inner.lock().expect("transcript mutex poisoned");
        chats.insert(id.clone(), chat);
        gauge!("chat_active_chats").set(chats.len() as f64);
        id
    }

    pub fn chat_count(&self) -> usize {
        self.inner.lock().expect("transcript mutex poisoned").len()
    }

    /// Read-only snapshot of a chat's turns, or `None` for an unknown id.
    pub fn context_snapshot(&self, chat_id: &str) -> Option<Vec<Turn>> {
        let chats = self.inner.lock().expect("transcript mutex poisoned");
        chats.get(chat_id).map(|c| c.turns.clone())
    }

    /// Appends the user turn and the bot turn to a chat, trimming to the
    /// per-chat cap. Returns `false` for an unknown chat id.
    pub fn append_exchange(&self, chat_id: &str, user: Turn, bot: Turn) -> bool {
        let mut chats = self.inner.lock().expect("transcript mutex poisoned");
        let Some(chat) = chats.get_mut(chat_id) else {
            return false;
        };
        chat.turns.push(user);
        chat.turns.push(bot);
        if chat.turns.len() > MAX_TURNS_PER_CHAT {
            let excess = chat.turns.len() - MAX_TURNS_PER_CHAT;
            chat.turns.drain(0..excess);
        }
        chat.last_active_unix = now_unix();
        true
    }

    /// All chats for a user, most recently active first.
    pub fn history_for_user(&self, user_id: &str) -> Vec<Chat> {
        let chats = self.inner.lock().expect("transcript mutex poisoned");
        let mut out: Vec<Chat> = chats
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|c| std::cmp::Reverse(c.last_active_unix));
        out
    }

    /// Deletes chats idle for longer than `max_idle`. Returns how many were
    /// removed.
    pub fn purge_idle(&self, max_idle: Duration) -> usize {
        self.purge_idle_at(now_unix(), max_idle.as_secs())
    }

    fn purge_idle_at(&self, now: u64, max_idle_secs: u64) -> usize {
        let mut chats = self.inner.lock().expect("transcript mutex poisoned");
        let before = chats.len();
        chats.retain(|_, c| now.saturating_sub(c.last_active_unix) <= max_idle_secs);
        gauge!("chat_active_chats").set(chats.len() as f64);
        before - chats.len()
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Candidate;

    #[test]
    fn exchange_appends_user_then_bot() {
        let store = TranscriptStore::new();
        let chat_id = store.create_chat("u1");
        let ok = store.append_exchange(
            &chat_id,
            Turn::user("hello"),
            Turn::bot_reply(&Candidate::fallback()),
        );
        assert!(ok);

        let turns = store.context_snapshot(&chat_id).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].text, "hello");
        assert_eq!(turns[1].role, Role::Bot);
        assert_eq!(turns[1].source, Some(Source::Fallback));
        assert!(turns[1].confidence.is_some());
    }

    #[test]
    fn append_to_unknown_chat_is_rejected() {
        let store = TranscriptStore::new();
        assert!(!store.append_exchange(
            "nope",
            Turn::user("hello"),
            Turn::bot_reply(&Candidate::fallback())
        ));
        assert!(store.context_snapshot("nope").is_none());
    }

    #[test]
    fn chat_trims_to_turn_cap() {
        let store = TranscriptStore::new();
        let chat_id = store.create_chat("u1");
        for i in 0..60 {
            store.append_exchange(
                &chat_id,
                Turn::user(format!("m{i}")),
                Turn::bot_reply(&Candidate::fallback()),
            );
        }
        let turns = store.context_snapshot(&chat_id).unwrap();
        assert_eq!(turns.len(), MAX_TURNS_PER_CHAT);
        // 120 turns written, so the first 20 are gone; m10's user turn leads.
        assert_eq!(turns[0].text, "m10");
    }

    #[test]
    fn history_lists_only_that_users_chats() {
        let store = TranscriptStore::new();
        let a = store.create_chat("alice");
        let _b = store.create_chat("bob");
        store.append_exchange(
            &a,
            Turn::user("hi"),
            Turn::bot_reply(&Candidate::fallback()),
        );

        assert_eq!(store.chat_count(), 2);
        let chats = store.history_for_user("alice");
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].id, a);
        assert_eq!(chats[0].turns.len(), 2);
        assert!(store.history_for_user("nobody").is_empty());
    }

    #[test]
    fn purge_removes_only_idle_chats() {
        let store = TranscriptStore::new();
        let id = store.create_chat("u1");
        let now = now_unix();

        assert_eq!(store.purge_idle_at(now + 86_400, 30 * 86_400), 0);
        assert!(store.context_snapshot(&id).is_some());

        assert_eq!(store.purge_idle_at(now + 31 * 86_400, 30 * 86_400), 1);
        assert!(store.context_snapshot(&id).is_none());
    }
}
