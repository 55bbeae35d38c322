//! Per-chat session state.

use std::time::Duration;

use tokio::time::Instant;

use crate::types::QueryKey;

/// Session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Inactivity after which a session is discarded. Default: 15 minutes.
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(15 * 60),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

/// Where a chat is in the search/deliver cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No pending lookup.
    Idle,
    /// A lookup was dispatched; its result is only delivered while the
    /// session still carries the same `generation`.
    AwaitingResult { key: QueryKey, generation: u64 },
    /// The record at `cursor` was the last one sent.
    Delivered { key: QueryKey, cursor: usize },
}

/// State kept per chat. Holds the query key only; records are always
/// re-resolved through the cache.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub state: SessionState,
    pub last_query: Option<QueryKey>,
    pub last_activity: Instant,
    /// Generation of the most recently dispatched lookup (0 if none).
    pub generation: u64,
}

impl ConversationSession {
    pub fn new(now: Instant) -> Self {
        Self {
            state: SessionState::Idle,
            last_query: None,
            last_activity: now,
            generation: 0,
        }
    }

    pub fn is_expired(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) >= idle_timeout
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, SessionState::AwaitingResult { .. })
    }

    /// Whether a lookup dispatched with `generation` may still deliver.
    pub fn accepts(&self, generation: u64) -> bool {
        matches!(
            self.state,
            SessionState::AwaitingResult { generation: g, .. } if g == generation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::normalize;

    #[tokio::test(start_paused = true)]
    async fn expires_after_idle_timeout() {
        let session = ConversationSession::new(Instant::now());
        let timeout = Duration::from_secs(60);
        assert!(!session.is_expired(Instant::now(), timeout));
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(session.is_expired(Instant::now(), timeout));
    }

    #[test]
    fn accepts_only_matching_generation() {
        let mut session = ConversationSession::new(Instant::now());
        assert!(!session.accepts(1));
        session.state = SessionState::AwaitingResult {
            key: normalize("heat"),
            generation: 7,
        };
        assert!(session.accepts(7));
        assert!(!session.accepts(6));
    }
}
