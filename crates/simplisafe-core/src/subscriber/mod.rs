// ── Event subscriber ──
//
// Keeps a live event feed open for the account: the push websocket, or
// polling of the events endpoint. Raw events are decoded, deduplicated and
// sent over an mpsc channel to a dispatch task that updates the store,
// broadcasts, and calls listeners in arrival order.
//
// Lifecycle: Disconnected -> Connecting -> Subscribed -> Disconnected ...,
// ending in Stopped once the account is closed. Reconnects back off per the
// session's retry policy and never give up. Every reconnect runs a resync:
// full refresh, then backfill of events since each system's cursor.

mod dedup;
mod listener;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use simplisafe_api::backoff::calculate_backoff;
use simplisafe_api::models::RawEvent;
use simplisafe_api::{PushConnection, PushMessage, RetryPolicy};

use crate::config::EventSource;
use crate::convert::event_from_raw;
use crate::error::CoreError;
use crate::model::{Notification, SystemId};
use crate::refresher::Refresher;
use crate::store::DataStore;

pub(crate) use dedup::RecentEventIds;
pub use listener::{EventListener, ListenerError, ListenerId};
pub(crate) use listener::ListenerRegistry;

const DISPATCH_CHANNEL_SIZE: usize = 256;
/// Events requested per system when establishing a cursor.
const BASELINE_EVENTS: u32 = 1;

// ── ConnectionState ──────────────────────────────────────────────

/// State of the live event feed, observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
    /// The account was closed; no further events will arrive.
    Stopped,
}

// ── Configuration ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct SubscriberConfig {
    pub source: EventSource,
    pub poll_interval: Duration,
    pub dedup_capacity: usize,
    pub reconnect: RetryPolicy,
}

// ── Spawning ─────────────────────────────────────────────────────

/// Start the subscription loop and its dispatch task.
pub(crate) fn spawn(
    config: SubscriberConfig,
    refresher: Refresher,
    user_id: u64,
    state: Arc<watch::Sender<ConnectionState>>,
    broadcast_tx: broadcast::Sender<Notification>,
    listeners: Arc<ListenerRegistry>,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let (tx, rx) = mpsc::channel(DISPATCH_CHANNEL_SIZE);

    let dispatcher = tokio::spawn(dispatch_task(
        rx,
        Arc::clone(refresher.store()),
        broadcast_tx,
        listeners,
    ));

    let subscriber = Subscriber {
        dedup: RecentEventIds::new(config.dedup_capacity),
        cursors: HashMap::new(),
        attempt: 0,
        config,
        refresher,
        user_id,
        state,
        tx,
        cancel,
    };
    let runner = tokio::spawn(subscriber.run());

    vec![runner, dispatcher]
}

/// Apply, broadcast, then call listeners, strictly in arrival order.
async fn dispatch_task(
    mut rx: mpsc::Receiver<Notification>,
    store: Arc<DataStore>,
    broadcast_tx: broadcast::Sender<Notification>,
    listeners: Arc<ListenerRegistry>,
) {
    while let Some(notification) = rx.recv().await {
        if let Notification::Event(ref event) = notification {
            if !store.apply_event(event) {
                debug!(system_id = %event.system_id, "event for uncached system");
            }
        }
        // No receivers is fine.
        let _ = broadcast_tx.send(notification.clone());
        listeners.dispatch(&notification);
    }
    debug!("dispatch task finished");
}

// ── Subscription loop ────────────────────────────────────────────

/// How one feed session ended.
enum SessionEnd {
    Cancelled,
    Dropped(CoreError),
}

/// An open feed.
enum Feed {
    Push(PushConnection),
    Poll,
}

impl Feed {
    async fn close(self) {
        if let Self::Push(conn) = self {
            conn.close().await;
        }
    }
}

struct Subscriber {
    config: SubscriberConfig,
    refresher: Refresher,
    user_id: u64,
    state: Arc<watch::Sender<ConnectionState>>,
    tx: mpsc::Sender<Notification>,
    cancel: CancellationToken,
    dedup: RecentEventIds,
    /// Latest event timestamp seen per system (vendor epoch seconds).
    cursors: HashMap<SystemId, i64>,
    /// Consecutive sessions that ended before their setup completed.
    attempt: u32,
}

impl Subscriber {
    async fn run(mut self) {
        let mut reconnecting = false;

        loop {
            self.set_state(ConnectionState::Connecting);

            let opened = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                opened = self.open() => opened,
            };

            match opened {
                Ok(feed) => match self.session(feed, reconnecting).await {
                    SessionEnd::Cancelled => break,
                    SessionEnd::Dropped(e) => {
                        warn!(error = %e, attempt = self.attempt, "event feed dropped");
                        reconnecting = true;
                    }
                },
                Err(e) => warn!(error = %e, attempt = self.attempt, "event feed connect failed"),
            }

            self.set_state(ConnectionState::Disconnected);
            let delay = calculate_backoff(self.attempt, &self.config.reconnect);
            self.attempt = self.attempt.saturating_add(1);
            debug!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                attempt = self.attempt,
                "reconnecting event feed"
            );

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Stopped);
        debug!("subscription loop finished");
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            // Stopped is terminal.
            if *current == state || *current == ConnectionState::Stopped {
                return false;
            }
            *current = state;
            true
        });
    }

    async fn open(&self) -> Result<Feed, CoreError> {
        match self.config.source {
            EventSource::Push => {
                let client = self.refresher.client();
                let token = client.tokens().valid_access_token().await?;
                let conn =
                    PushConnection::connect(&client.endpoints().push_url, &token, self.user_id)
                        .await?;
                Ok(Feed::Push(conn))
            }
            EventSource::Poll | EventSource::Disabled => Ok(Feed::Poll),
        }
    }

    /// Establish cursors (or resync), then pump the feed until it ends.
    ///
    /// The feed only counts as subscribed, and the reconnect backoff only
    /// resets, once setup has completed.
    async fn session(&mut self, feed: Feed, reconnecting: bool) -> SessionEnd {
        let cancel = self.cancel.clone();
        let setup = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = self.setup(reconnecting) => Some(result),
        };
        let end = match setup {
            Some(Ok(())) => None,
            Some(Err(e)) => Some(SessionEnd::Dropped(e)),
            None => Some(SessionEnd::Cancelled),
        };
        if let Some(end) = end {
            feed.close().await;
            return end;
        }

        self.attempt = 0;
        self.set_state(ConnectionState::Subscribed);
        info!(source = %self.config.source, reconnecting, "event feed subscribed");

        match feed {
            Feed::Push(conn) => self.pump_push(conn).await,
            Feed::Poll => self.pump_poll().await,
        }
    }

    async fn setup(&mut self, reconnecting: bool) -> Result<(), CoreError> {
        if reconnecting {
            self.resync().await
        } else {
            self.establish_cursors().await
        }
    }

    // ── Cursors and resync ───────────────────────────────────────────

    /// Mark the current head of each uncursored system's history as seen.
    ///
    /// A system whose events cannot be read keeps no cursor and is tried
    /// again next time. Fails only on auth errors, or when no system has a
    /// cursor afterwards.
    async fn establish_cursors(&mut self) -> Result<(), CoreError> {
        let systems: Vec<SystemId> = self
            .refresher
            .store()
            .systems_snapshot()
            .iter()
            .map(|s| s.id)
            .filter(|id| !self.cursors.contains_key(id))
            .collect();

        let mut failure = None;
        for system_id in systems {
            let head = match self
                .refresher
                .client()
                .events(system_id.get(), None, Some(BASELINE_EVENTS))
                .await
            {
                Ok(head) => head,
                Err(e) => {
                    let e = CoreError::from(e);
                    if e.is_auth_error() {
                        return Err(e);
                    }
                    warn!(%system_id, error = %e, "event history unavailable, skipping system");
                    failure = Some(e);
                    continue;
                }
            };

            let mut cursor = Utc::now().timestamp();
            for raw in &head {
                self.dedup.insert(raw.event_id);
                cursor = raw.event_timestamp;
            }
            self.cursors.insert(system_id, cursor);
            debug!(%system_id, cursor, "event cursor established");
        }

        match failure {
            Some(e) if self.cursors.is_empty() => Err(e),
            _ => Ok(()),
        }
    }

    /// Re-read the account and deliver whatever was missed while offline.
    async fn resync(&mut self) -> Result<(), CoreError> {
        self.refresher.full_refresh().await?;
        self.establish_cursors().await?;

        let backfilled = self.fetch_all().await?;

        info!(backfilled, "event feed resynced");
        self.deliver(Notification::Resynced {
            at: Utc::now(),
            backfilled,
        })
        .await;
        Ok(())
    }

    // ── Feeds ────────────────────────────────────────────────────────

    async fn pump_push(&mut self, mut conn: PushConnection) -> SessionEnd {
        let cancel = self.cancel.clone();
        let end = loop {
            let message = tokio::select! {
                biased;
                () = cancel.cancelled() => break SessionEnd::Cancelled,
                message = conn.next_message() => message,
            };
            match message {
                Some(Ok(PushMessage::Event { data })) => {
                    self.accept(data).await;
                }
                Some(Ok(other)) => debug!(?other, "push control message"),
                Some(Err(simplisafe_api::Error::InvalidResponse { message, .. })) => {
                    warn!(%message, "dropping undecodable push message");
                }
                Some(Err(e)) => break SessionEnd::Dropped(e.into()),
                None => {
                    break SessionEnd::Dropped(CoreError::WebSocket {
                        message: "push channel closed".into(),
                    });
                }
            }
        };
        conn.close().await;
        end
    }

    async fn pump_poll(&mut self) -> SessionEnd {
        let cancel = self.cancel.clone();
        loop {
            let cycle = tokio::select! {
                biased;
                () = cancel.cancelled() => return SessionEnd::Cancelled,
                cycle = self.poll_once() => cycle,
            };
            if let Err(e) = cycle {
                return SessionEnd::Dropped(e);
            }
        }
    }

    async fn poll_once(&mut self) -> Result<(), CoreError> {
        tokio::time::sleep(self.config.poll_interval).await;
        self.establish_cursors().await?;
        self.fetch_all().await?;
        Ok(())
    }

    /// Fetch since every cursor. A failing system is skipped; the call
    /// fails on auth errors or when every system failed.
    async fn fetch_all(&mut self) -> Result<usize, CoreError> {
        let systems: Vec<(SystemId, i64)> = self.cursors.iter().map(|(id, ts)| (*id, *ts)).collect();

        let mut delivered = 0;
        let mut reachable = systems.is_empty();
        let mut failure = None;
        for (system_id, cursor) in systems {
            match self.fetch_since(system_id, cursor).await {
                Ok(n) => {
                    delivered += n;
                    reachable = true;
                }
                Err(e) if e.is_auth_error() => return Err(e),
                Err(e) => {
                    warn!(%system_id, error = %e, "event fetch failed, skipping system");
                    failure = Some(e);
                }
            }
        }

        match failure {
            Some(e) if !reachable => Err(e),
            _ => Ok(delivered),
        }
    }

    /// Fetch and deliver events at or after `cursor`. Returns how many were new.
    async fn fetch_since(&mut self, system_id: SystemId, cursor: i64) -> Result<usize, CoreError> {
        let mut events = self
            .refresher
            .client()
            .events(system_id.get(), Some(cursor), None)
            .await?;
        events.sort_by_key(|e| e.event_id);

        let mut delivered = 0;
        for raw in events {
            if self.accept(raw).await {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    // ── Delivery ─────────────────────────────────────────────────────

    /// Deduplicate, advance the cursor, and hand the event to dispatch.
    async fn accept(&mut self, raw: RawEvent) -> bool {
        let system_id = SystemId(raw.sid);
        let cursor = self.cursors.entry(system_id).or_insert(raw.event_timestamp);
        *cursor = (*cursor).max(raw.event_timestamp);

        if !self.dedup.insert(raw.event_id) {
            debug!(event_id = raw.event_id, "duplicate event dropped");
            return false;
        }

        let event = event_from_raw(raw);
        debug!(event_id = event.event_id, event_type = ?event.event_type, %system_id, "event received");
        self.deliver(Notification::Event(Arc::new(event))).await;
        true
    }

    async fn deliver(&self, notification: Notification) {
        if self.tx.send(notification).await.is_err() {
            debug!("dispatch task gone, notification dropped");
        }
    }
}
