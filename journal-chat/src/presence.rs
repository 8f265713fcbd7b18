//! Presence: the set of currently reachable actors.
//!
//! Presence is best effort and "last known good". A refresh that fails
//! keeps the previous snapshot instead of flipping everyone offline.
//!
//! [`PresencePoller`] refreshes on a fixed interval and immediately when
//! poked (on every new connection). Results go back to the owner of the
//! [`PresenceTracker`] over a channel, so the tracker has a single writer.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use journal_chat_proto::actor::ActorId;
use tokio::sync::{Notify, mpsc};

use crate::transport::{ConnectorHandle, TransportError};

/// Outcome of one presence request.
pub type PresenceRefresh = Result<Vec<ActorId>, TransportError>;

/// Where presence snapshots come from.
pub trait PresenceSource: Send + Sync + 'static {
    /// Fetches the ids of currently reachable actors.
    fn online_users(&self) -> impl Future<Output = PresenceRefresh> + Send;
}

impl PresenceSource for ConnectorHandle {
    async fn online_users(&self) -> PresenceRefresh {
        Self::online_users(self).await
    }
}

/// Last known good presence snapshot.
#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    online: HashSet<ActorId>,
    refreshed_at: Option<DateTime<Utc>>,
    consecutive_failures: u32,
}

impl PresenceTracker {
    /// Creates a tracker with nobody online.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the outcome of a refresh.
    ///
    /// Success replaces the snapshot; failure leaves it untouched. Returns
    /// whether the set of online actors changed.
    pub fn apply_refresh(&mut self, refresh: PresenceRefresh) -> bool {
        match refresh {
            Ok(ids) => {
                let next: HashSet<ActorId> = ids.into_iter().collect();
                let changed = next != self.online;
                self.online = next;
                self.refreshed_at = Some(Utc::now());
                self.consecutive_failures = 0;
                changed
            }
            Err(e) => {
                self.consecutive_failures += 1;
                tracing::debug!(
                    err = %e,
                    failures = self.consecutive_failures,
                    "presence refresh failed, keeping last snapshot"
                );
                false
            }
        }
    }

    /// Whether `actor` was reachable at the last successful refresh.
    #[must_use]
    pub fn is_online(&self, actor: ActorId) -> bool {
        self.online.contains(&actor)
    }

    /// The current snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &HashSet<ActorId> {
        &self.online
    }

    /// When the snapshot was last replaced.
    #[must_use]
    pub const fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Failed refreshes since the last success.
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

/// Background task polling a [`PresenceSource`].
pub struct PresencePoller {
    trigger: Arc<Notify>,
    task: tokio::task::JoinHandle<()>,
}

impl PresencePoller {
    /// Starts polling `source` every `interval`. The task stops when
    /// `results` is closed or the poller is dropped.
    pub fn spawn<S: PresenceSource>(
        source: S,
        interval: Duration,
        results: mpsc::Sender<PresenceRefresh>,
    ) -> Self {
        let trigger = Arc::new(Notify::new());
        let poked = Arc::clone(&trigger);
        let task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = tick.tick() => {}
                    () = poked.notified() => tick.reset(),
                }
                let refresh = source.online_users().await;
                if results.send(refresh).await.is_err() {
                    break;
                }
            }
            tracing::debug!("presence poller stopped");
        });
        Self { trigger, task }
    }

    /// Requests an immediate refresh.
    pub fn poke(&self) {
        self.trigger.notify_one();
    }
}

impl Drop for PresencePoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}
