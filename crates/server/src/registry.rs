//! Session registry and matchmaking.
//!
//! The registry owns its own lock, separate from every session lock. Lock
//! order is always registry → session; session code never reaches back into
//! the registry while holding its own lock, so callers remove finished
//! sessions after the session lock is released.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::clock;
use crate::seat::{Player, Seat};
use crate::session::{GameSession, SessionId, SessionSummary};

#[derive(Default)]
struct RegistryInner {
    /// WAITING sessions, oldest first.
    waiting: Vec<Arc<GameSession>>,
    active: BTreeMap<SessionId, Arc<GameSession>>,
}

pub struct Registry {
    inner: Mutex<RegistryInner>,
    next_id: AtomicU64,
    clock_tick: Duration,
}

impl Registry {
    pub fn new(clock_tick: Duration) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            next_id: AtomicU64::new(1),
            clock_tick,
        }
    }

    /// Pair `player` with the oldest waiting session of the same time
    /// control, or open a new waiting session with them as seat A.
    pub async fn enqueue(self: &Arc<Self>, player: Player) -> (Arc<GameSession>, Seat) {
        let mut inner = self.inner.lock().await;
        let mut player = player;

        let mut idx = 0;
        while idx < inner.waiting.len() {
            if inner.waiting[idx].time_control() != player.time_control {
                idx += 1;
                continue;
            }

            let session = inner.waiting.remove(idx);
            match session.activate(player).await {
                Ok(()) => {
                    inner.active.insert(session.id(), session.clone());
                    drop(inner);

                    if session.is_timed() {
                        clock::spawn(self.clone(), session.clone(), self.clock_tick);
                    }
                    return (session, Seat::B);
                }
                Err(returned) => player = returned,
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            session_id = id,
            nickname = %player.nickname,
            time_control = player.time_control,
            "Waiting for opponent"
        );
        let session = Arc::new(GameSession::new(id, player));
        inner.waiting.push(session.clone());
        (session, Seat::A)
    }

    /// A seat's connection ended. Waiting sessions leave the pool silently;
    /// active ones are finalized as abandoned.
    pub async fn leave(&self, session: &Arc<GameSession>, seat: Seat) {
        {
            let mut inner = self.inner.lock().await;
            if let Some(pos) = inner.waiting.iter().position(|s| s.id() == session.id()) {
                inner.waiting.remove(pos);
                tracing::info!(session_id = session.id(), "Left the waiting pool");
                return;
            }
        }

        if session.abandon(seat).await {
            tracing::info!(session_id = session.id(), ?seat, "Seat abandoned the game");
        }
        self.remove(session.id()).await;
    }

    /// Drop a session from the active registry. Idempotent.
    pub async fn remove(&self, id: SessionId) {
        let mut inner = self.inner.lock().await;
        if inner.active.remove(&id).is_some() {
            tracing::debug!(session_id = id, "Session removed from registry");
        }
    }

    pub async fn get(&self, id: SessionId) -> Option<Arc<GameSession>> {
        let inner = self.inner.lock().await;
        inner
            .active
            .get(&id)
            .or_else(|| inner.waiting.iter().find(|s| s.id() == id))
            .cloned()
    }

    pub async fn waiting_count(&self) -> usize {
        self.inner.lock().await.waiting.len()
    }

    pub async fn active_count(&self) -> usize {
        self.inner.lock().await.active.len()
    }

    /// Summaries of every waiting and active session, by id.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let sessions: Vec<Arc<GameSession>> = {
            let inner = self.inner.lock().await;
            inner
                .waiting
                .iter()
                .chain(inner.active.values())
                .cloned()
                .collect()
        };

        let mut summaries = Vec::with_capacity(sessions.len());
        for session in sessions {
            summaries.push(session.summary().await);
        }
        summaries.sort_by_key(|s| s.id);
        summaries
    }
}
