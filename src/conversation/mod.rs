//! Conversation controller: per-chat state machine over the lookup pipeline.
//!
//! ```text
//!            message                 lookup done
//!   Idle ───────────► AwaitingResult ───────────► Delivered ──"next"──┐
//!    ▲                   │  any message:              │  ▲            │
//!    │                   │  "still searching"         │  └────────────┘
//!    └── idle timeout ───┴────────────────────────────┘
//! ```
//!
//! Each dispatched lookup carries a process-unique generation. If the
//! session was discarded or moved on by the time the lookup finishes, the
//! reply is dropped. The lookup itself is never aborted, so its cache
//! write still lands.

pub mod command;
pub mod reply;
pub mod session;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::time::Instant;

use crate::cache::CacheEntry;
use crate::lookup::MovieLookup;
use crate::telemetry;
use crate::types::{ChatId, OutboundMessage, QueryKey, normalize};
use crate::Result;

pub use command::Command;
pub use session::{ConversationSession, SessionConfig, SessionState};

/// What a message turned into once the session was updated.
enum Step {
    Reply(OutboundMessage),
    Lookup {
        key: QueryKey,
        generation: u64,
        cursor: usize,
        refresh: bool,
    },
}

/// Routes chat messages to lookups and formats the replies.
pub struct ConversationController {
    lookup: MovieLookup,
    sessions: DashMap<ChatId, ConversationSession>,
    config: SessionConfig,
    generation: AtomicU64,
}

impl ConversationController {
    pub fn new(lookup: MovieLookup, config: SessionConfig) -> Self {
        Self {
            lookup,
            sessions: DashMap::new(),
            config,
            generation: AtomicU64::new(0),
        }
    }

    pub fn lookup(&self) -> &MovieLookup {
        &self.lookup
    }

    /// Current state of a chat's session, if one exists.
    pub fn session(&self, chat_id: ChatId) -> Option<ConversationSession> {
        self.sessions.get(&chat_id).map(|s| s.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Handle one inbound message.
    ///
    /// Returns `None` when the reply was discarded because the session moved
    /// on while the lookup was running.
    pub async fn handle_message(&self, chat_id: ChatId, text: &str) -> Option<OutboundMessage> {
        let step = self.begin(chat_id, text);
        self.finish(chat_id, step).await
    }

    /// Apply `text` to the chat's session now and return the rest of the
    /// work as an owned future.
    ///
    /// The session transition happens before this returns, so messages
    /// submitted one after another are handled in that order even when the
    /// returned futures are spawned and polled in any order.
    pub fn submit(
        self: &Arc<Self>,
        chat_id: ChatId,
        text: &str,
    ) -> impl Future<Output = Option<OutboundMessage>> + Send + 'static {
        let step = self.begin(chat_id, text);
        let controller = Arc::clone(self);
        async move { controller.finish(chat_id, step).await }
    }

    /// Discard sessions idle for longer than the configured timeout.
    ///
    /// Returns how many were removed.
    pub fn sweep_idle_sessions(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| !session.is_expired(now, self.config.idle_timeout));
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            tracing::debug!(removed, "swept idle sessions");
        }
        removed
    }

    fn help(&self, chat_id: ChatId) -> OutboundMessage {
        let now = Instant::now();
        let mut session = self.touch(chat_id, now);
        if session.is_awaiting() {
            return reply::still_searching(chat_id);
        }
        session.last_activity = now;
        reply::help(chat_id)
    }

    /// Get the live session for `chat_id`, replacing an expired one.
    fn touch(
        &self,
        chat_id: ChatId,
        now: Instant,
    ) -> dashmap::mapref::one::RefMut<'_, ChatId, ConversationSession> {
        let mut session = self
            .sessions
            .entry(chat_id)
            .or_insert_with(|| ConversationSession::new(now));
        if session.is_expired(now, self.config.idle_timeout) {
            *session = ConversationSession::new(now);
        }
        session
    }

    /// Move the session to `AwaitingResult` for `key`, returning the new
    /// generation, or the reply to send instead.
    fn dispatch(
        &self,
        chat_id: ChatId,
        key: &QueryKey,
    ) -> std::result::Result<u64, OutboundMessage> {
        let now = Instant::now();
        let mut session = self.touch(chat_id, now);
        if session.is_awaiting() {
            return Err(reply::still_searching(chat_id));
        }
        session.last_activity = now;
        if key.is_empty() {
            return Err(reply::help(chat_id));
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        session.state = SessionState::AwaitingResult {
            key: key.clone(),
            generation,
        };
        session.last_query = Some(key.clone());
        session.generation = generation;
        Ok(generation)
    }

    fn begin(&self, chat_id: ChatId, text: &str) -> Step {
        match command::parse(text) {
            Command::Help => Step::Reply(self.help(chat_id)),
            Command::Next => self.page(chat_id),
            Command::Search(query) => self.search(chat_id, normalize(&query), false),
            Command::Refresh(query) => self.search(chat_id, normalize(&query), true),
        }
    }

    async fn finish(&self, chat_id: ChatId, step: Step) -> Option<OutboundMessage> {
        let (key, generation, cursor, refresh) = match step {
            Step::Reply(reply) => return Some(reply),
            Step::Lookup {
                key,
                generation,
                cursor,
                refresh,
            } => (key, generation, cursor, refresh),
        };

        // on "next" this is a cache hit unless the entry was evicted
        let outcome = if refresh {
            self.lookup.refetch(&key).await
        } else {
            self.lookup.lookup(&key).await
        };
        self.deliver(chat_id, generation, &key, outcome, cursor)
    }

    fn search(&self, chat_id: ChatId, key: QueryKey, refresh: bool) -> Step {
        match self.dispatch(chat_id, &key) {
            Ok(generation) => Step::Lookup {
                key,
                generation,
                cursor: 0,
                refresh,
            },
            Err(reply) => Step::Reply(reply),
        }
    }

    fn page(&self, chat_id: ChatId) -> Step {
        let now = Instant::now();
        let mut session = self.touch(chat_id, now);
        session.last_activity = now;
        let (key, cursor) = match &session.state {
            SessionState::AwaitingResult { .. } => {
                return Step::Reply(reply::still_searching(chat_id));
            }
            SessionState::Idle => return Step::Reply(reply::nothing_to_page(chat_id)),
            SessionState::Delivered { key, cursor } => (key.clone(), cursor + 1),
        };
        // records are never kept in the session, so paging goes back to the cache
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        session.state = SessionState::AwaitingResult {
            key: key.clone(),
            generation,
        };
        session.generation = generation;
        Step::Lookup {
            key,
            generation,
            cursor,
            refresh: false,
        }
    }

    /// Turn a finished lookup into a reply, if the session still wants it.
    fn deliver(
        &self,
        chat_id: ChatId,
        generation: u64,
        key: &QueryKey,
        outcome: Result<CacheEntry>,
        cursor: usize,
    ) -> Option<OutboundMessage> {
        let now = Instant::now();
        let Some(mut session) = self
            .sessions
            .get_mut(&chat_id)
            .filter(|s| s.accepts(generation) && !s.is_expired(now, self.config.idle_timeout))
        else {
            metrics::counter!(telemetry::DISCARDED_REPLIES_TOTAL).increment(1);
            tracing::debug!(chat_id = %chat_id, key = %key, generation, "discarding stale reply");
            return None;
        };

        let (state, reply) = match outcome {
            Ok(entry) if entry.records.is_empty() => {
                (SessionState::Idle, reply::no_results(chat_id, key))
            }
            Ok(entry) => {
                let last = entry.records.len() - 1;
                let reply = if cursor > last {
                    reply::no_more_results(chat_id)
                } else {
                    reply::record(chat_id, &entry.records, cursor)
                };
                let state = SessionState::Delivered {
                    key: key.clone(),
                    cursor: cursor.min(last),
                };
                (state, reply)
            }
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, key = %key, error = %e, "lookup failed");
                (SessionState::Idle, reply::try_again_later(chat_id))
            }
        };

        session.state = state;
        session.last_activity = now;
        Some(reply)
    }
}
