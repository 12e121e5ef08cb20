//! Chat assistant orchestration.
//!
//! [`ChatOrchestrator`] keeps the conversation in memory for the lifetime of
//! the chat surface, resends the full prior history on every turn, and never
//! lets an assistant failure escape the surface: failures are downgraded to a
//! synthesized assistant message so the conversation stays usable. When a
//! reply looks like it mutated the task list, the orchestrator emits one
//! invalidation signal, without ever referencing the task feature directly.

mod classifier;

pub use classifier::mentions_task_mutation;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tasksync_core::events::InvalidationChannel;
use tasksync_core::{ChatMessage, Role};
use tasksync_session::SessionManager;
use tasksync_transport::{ApiClient, ApiError};
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub const LOGIN_REQUIRED_REPLY: &str =
    "Please log in first to continue the chat and manage your tasks.";
const RATE_LIMIT_REPLY: &str = "You're sending messages too quickly. Please slow down.";
const SESSION_EXPIRED_REPLY: &str = "Session expired. Please log in again.";
const CONNECTIVITY_REPLY: &str = "Connection issue. Please check your internet and try again.";
const GENERIC_FAILURE_REPLY: &str =
    "Sorry, I'm having trouble thinking right now. Please try again.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<i64>,
    history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
struct HistoryEntry {
    role: Role,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    conversation_id: i64,
    response: String,
    timestamp: DateTime<Utc>,
}

pub struct ChatOrchestrator {
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
    channel: Arc<InvalidationChannel>,
    messages: RwLock<Vec<ChatMessage>>,
    conversation_id: RwLock<Option<i64>>,
    loading: AtomicBool,
}

impl ChatOrchestrator {
    pub fn new(
        api: Arc<ApiClient>,
        session: Arc<SessionManager>,
        channel: Arc<InvalidationChannel>,
    ) -> Self {
        Self {
            api,
            session,
            channel,
            messages: RwLock::new(Vec::new()),
            conversation_id: RwLock::new(None),
            loading: AtomicBool::new(false),
        }
    }

    /// Snapshot of the conversation so far.
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.messages.read().await.clone()
    }

    /// True while a request is outstanding; duplicate submissions are dropped
    /// for that window.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Send one user turn to the remote assistant.
    ///
    /// Whitespace-only input is rejected without appending anything. Without
    /// an authenticated session the user message is answered locally with a
    /// canned login prompt and no network call is made.
    pub async fn send_message(&self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            debug!("ignoring empty chat input");
            return;
        }

        if !self.session.is_authenticated().await {
            let mut messages = self.messages.write().await;
            messages.push(ChatMessage::user(trimmed));
            messages.push(ChatMessage::assistant(LOGIN_REQUIRED_REPLY));
            return;
        }

        if self.loading.swap(true, Ordering::SeqCst) {
            debug!("chat request already in flight, dropping submission");
            return;
        }

        // Context is the conversation as it stood before this turn.
        let history: Vec<HistoryEntry> = self
            .messages
            .read()
            .await
            .iter()
            .map(|message| HistoryEntry {
                role: message.role,
                content: message.content.clone(),
            })
            .collect();
        self.messages.write().await.push(ChatMessage::user(trimmed));

        let conversation_id = *self.conversation_id.read().await;
        let request = ChatRequest {
            message: trimmed,
            conversation_id,
            history,
        };

        match self.api.post_json::<_, ChatReply>("/chat", &request).await {
            Ok(reply) => {
                *self.conversation_id.write().await = Some(reply.conversation_id);
                self.messages
                    .write()
                    .await
                    .push(ChatMessage::assistant_at(&reply.response, reply.timestamp));
                if mentions_task_mutation(&reply.response) {
                    debug!("assistant reply looks task-mutating, emitting invalidation");
                    self.channel.emit();
                }
            }
            Err(err) => {
                warn!(%err, "assistant request failed");
                self.messages
                    .write()
                    .await
                    .push(ChatMessage::assistant(failure_reply(&err)));
            }
        }

        self.loading.store(false, Ordering::SeqCst);
    }
}

/// Pick the synthesized assistant reply for a failed assistant call.
fn failure_reply(err: &ApiError) -> &'static str {
    let text = err.to_string().to_lowercase();
    if text.contains("too many requests") {
        RATE_LIMIT_REPLY
    } else if text.contains("unauthorized") {
        SESSION_EXPIRED_REPLY
    } else if text.contains("network error") {
        CONNECTIVITY_REPLY
    } else {
        GENERIC_FAILURE_REPLY
    }
}
