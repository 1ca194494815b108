// ── Account facade ──
//
// One authenticated SimpliSafe session. Owns the resource client, the
// reactive cache, the event subscriber and the optional periodic refresh,
// and exposes queries and actions over them.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use secrecy::SecretString;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use simplisafe_api::models::{CommandAck, LockAction, SettableAlarmState};
use simplisafe_api::{AuthorizationCode, Credentials, SimpliSafeClient};

use crate::config::{EventSource, SessionConfig};
use crate::convert::event_from_raw;
use crate::error::CoreError;
use crate::model::{AlarmState, Device, DeviceId, Event, Notification, System, SystemId};
use crate::pins::{with_pin, without_pin};
use crate::refresher::Refresher;
use crate::store::DataStore;
use crate::stream::EntityStream;
use crate::subscriber::{
    self, ConnectionState, EventListener, ListenerError, ListenerId, ListenerRegistry,
    SubscriberConfig,
};

const EVENT_CHANNEL_SIZE: usize = 256;

// ── Account ──────────────────────────────────────────────────────

/// An authenticated session for one SimpliSafe user.
///
/// Cheaply cloneable via `Arc<AccountInner>`. Construct with
/// [`login_with_code`](Self::login_with_code),
/// [`login_with_password`](Self::login_with_password) or
/// [`restore`](Self::restore); each performs the initial full refresh and
/// starts the background tasks before returning.
#[derive(Clone)]
pub struct Account {
    inner: Arc<AccountInner>,
}

struct AccountInner {
    config: SessionConfig,
    client: SimpliSafeClient,
    user_id: u64,
    store: Arc<DataStore>,
    refresher: Refresher,
    connection_state: Arc<watch::Sender<ConnectionState>>,
    event_tx: broadcast::Sender<Notification>,
    listeners: Arc<ListenerRegistry>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for AccountInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Account {
    // ── Construction ─────────────────────────────────────────────

    /// Exchange an authorization code from the vendor's login page.
    pub async fn login_with_code(
        config: SessionConfig,
        code: AuthorizationCode,
    ) -> Result<Self, CoreError> {
        let client = SimpliSafeClient::new(config.client_config())?;
        client.tokens().authenticate(code).await?;
        Self::start(config, client).await
    }

    /// Log in with a username and password.
    ///
    /// Accounts with multi-factor auth enabled fail with
    /// [`CoreError::PendingAuthorization`] until the user approves the
    /// login; call again afterwards.
    pub async fn login_with_password(
        config: SessionConfig,
        username: &str,
        password: &SecretString,
    ) -> Result<Self, CoreError> {
        let client = SimpliSafeClient::new(config.client_config())?;
        client
            .tokens()
            .login_with_password(username, password, &config.device_id)
            .await?;
        Self::start(config, client).await
    }

    /// Resume a session from previously persisted credentials.
    ///
    /// Expired access tokens are refreshed on first use.
    pub async fn restore(config: SessionConfig, credentials: Credentials) -> Result<Self, CoreError> {
        let client = SimpliSafeClient::new(config.client_config())?;
        client.tokens().restore(credentials);
        Self::start(config, client).await
    }

    async fn start(config: SessionConfig, client: SimpliSafeClient) -> Result<Self, CoreError> {
        let user_id = client.auth_check().await?;
        let store = Arc::new(DataStore::new());
        let refresher = Refresher::new(client.clone(), Arc::clone(&store), user_id);

        refresher.full_refresh().await?;

        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let inner = AccountInner {
            config,
            client,
            user_id,
            store,
            refresher,
            connection_state: Arc::new(connection_state),
            event_tx,
            listeners: Arc::new(ListenerRegistry::default()),
            cancel: CancellationToken::new(),
            task_handles: Mutex::new(Vec::new()),
        };

        let account = Self {
            inner: Arc::new(inner),
        };
        account.spawn_tasks().await;

        info!(
            user_id,
            systems = account.inner.store.system_count(),
            devices = account.inner.store.device_count(),
            "account session started"
        );
        Ok(account)
    }

    async fn spawn_tasks(&self) {
        let inner = &self.inner;
        let mut handles = inner.task_handles.lock().await;

        if inner.config.event_source != EventSource::Disabled {
            let config = SubscriberConfig {
                source: inner.config.event_source,
                poll_interval: inner.config.poll_interval,
                dedup_capacity: inner.config.dedup_capacity,
                reconnect: inner.config.retry.clone(),
            };
            handles.extend(subscriber::spawn(
                config,
                inner.refresher.clone(),
                inner.user_id,
                Arc::clone(&inner.connection_state),
                inner.event_tx.clone(),
                Arc::clone(&inner.listeners),
                inner.cancel.clone(),
            ));
        }

        if let Some(interval) = inner.config.refresh_interval.filter(|d| !d.is_zero()) {
            handles.push(tokio::spawn(refresh_task(
                inner.refresher.clone(),
                interval,
                inner.cancel.clone(),
            )));
        }
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn user_id(&self) -> u64 {
        self.inner.user_id
    }

    /// Access the underlying DataStore.
    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    /// The resource client, for calls the facade does not wrap.
    pub fn client(&self) -> &SimpliSafeClient {
        &self.inner.client
    }

    /// Current credentials, for persistence.
    pub fn credentials(&self) -> Result<Credentials, CoreError> {
        Ok(self.inner.client.tokens().current()?)
    }

    /// Fires whenever the token manager obtains new credentials.
    pub fn credentials_changed(&self) -> watch::Receiver<Option<Credentials>> {
        self.inner.client.tokens().credentials_changed()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// Live notifications, for async consumers.
    pub fn events(&self) -> broadcast::Receiver<Notification> {
        self.inner.event_tx.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    fn ensure_open(&self) -> Result<(), CoreError> {
        if self.is_closed() {
            return Err(CoreError::Disconnected);
        }
        Ok(())
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Re-read every system and device.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        self.ensure_open()?;
        self.inner.refresher.full_refresh().await
    }

    /// Re-read one system, asking its base station for fresh sensor values.
    pub async fn refresh_system(&self, system_id: SystemId) -> Result<Arc<System>, CoreError> {
        self.ensure_open()?;
        self.inner.refresher.refresh_system(system_id).await
    }

    // ── Queries ──────────────────────────────────────────────────

    pub fn get_systems(&self) -> Arc<Vec<Arc<System>>> {
        self.inner.store.systems_snapshot()
    }

    pub fn get_system(&self, system_id: SystemId) -> Result<Arc<System>, CoreError> {
        self.inner
            .store
            .system(system_id)
            .ok_or_else(|| CoreError::not_found("system", system_id))
    }

    /// Devices belonging to one system.
    pub fn get_devices(&self, system_id: SystemId) -> Result<Vec<Arc<Device>>, CoreError> {
        self.get_system(system_id)?;
        Ok(self.inner.store.devices_for(system_id))
    }

    pub fn get_device(&self, device_id: &DeviceId) -> Result<Arc<Device>, CoreError> {
        self.inner
            .store
            .device(device_id)
            .ok_or_else(|| CoreError::not_found("device", device_id))
    }

    pub fn subscribe_systems(&self) -> EntityStream<System> {
        self.inner.store.subscribe_systems()
    }

    pub fn subscribe_devices(&self) -> EntityStream<Device> {
        self.inner.store.subscribe_devices()
    }

    /// Event history for a system, newest first.
    pub async fn get_events(
        &self,
        system_id: SystemId,
        from: Option<DateTime<Utc>>,
        num_events: Option<u32>,
    ) -> Result<Vec<Event>, CoreError> {
        self.ensure_open()?;
        let raw = self
            .inner
            .client
            .events(system_id.get(), from.map(|ts| ts.timestamp()), num_events)
            .await?;
        Ok(raw.into_iter().map(event_from_raw).collect())
    }

    // ── Actions ──────────────────────────────────────────────────

    /// Arm or disarm a system.
    ///
    /// Returns once the vendor accepts the request. The cached system
    /// records the request as `pending_state`; `alarm_state` follows when
    /// a refresh or event confirms it.
    pub async fn set_alarm_state(
        &self,
        system_id: SystemId,
        state: AlarmState,
    ) -> Result<CommandAck, CoreError> {
        self.ensure_open()?;
        let settable = match state {
            AlarmState::Off => SettableAlarmState::Off,
            AlarmState::Home => SettableAlarmState::Home,
            AlarmState::Away => SettableAlarmState::Away,
            other => {
                return Err(CoreError::Unsupported {
                    operation: format!("setting alarm state {other}"),
                });
            }
        };

        let system = self.get_system(system_id)?;
        let ack = self
            .inner
            .client
            .set_alarm_state(system_id.get(), system.version.as_u8(), settable)
            .await?;

        self.inner.store.mark_pending(system_id, state);
        debug!(%system_id, %state, "alarm state pending");
        Ok(ack)
    }

    pub async fn lock(&self, device_id: &DeviceId) -> Result<CommandAck, CoreError> {
        self.set_lock(device_id, LockAction::Lock).await
    }

    pub async fn unlock(&self, device_id: &DeviceId) -> Result<CommandAck, CoreError> {
        self.set_lock(device_id, LockAction::Unlock).await
    }

    async fn set_lock(&self, device_id: &DeviceId, action: LockAction) -> Result<CommandAck, CoreError> {
        self.ensure_open()?;
        let device = self.get_device(device_id)?;
        if !device.is_lock() {
            return Err(CoreError::Unsupported {
                operation: format!("{} on {} device {device_id}", action.as_str(), device.device_type),
            });
        }

        Ok(self
            .inner
            .client
            .set_lock_state(device.system_id.get(), device.id.as_str(), action)
            .await?)
    }

    // ── Cameras ──────────────────────────────────────────────────

    /// Authenticated live-stream URL for a camera.
    pub fn camera_stream_url(&self, camera_uuid: &str, width: u32) -> Result<Url, CoreError> {
        Ok(self.inner.client.camera_stream_url(camera_uuid, width)?)
    }

    /// Current still image from a camera.
    pub async fn camera_snapshot(&self, camera_uuid: &str, width: u32) -> Result<Bytes, CoreError> {
        self.ensure_open()?;
        Ok(self.inner.client.camera_snapshot(camera_uuid, width).await?)
    }

    // ── PINs ─────────────────────────────────────────────────────

    /// The system's PIN table, label to PIN.
    pub async fn get_pins(&self, system_id: SystemId) -> Result<IndexMap<String, String>, CoreError> {
        self.ensure_open()?;
        let system = self.get_system(system_id)?;
        Ok(self
            .inner
            .client
            .pins(system_id.get(), system.version.as_u8())
            .await?)
    }

    /// Add or replace the PIN stored under `label`.
    pub async fn set_pin(&self, system_id: SystemId, label: &str, pin: &str) -> Result<(), CoreError> {
        let pins = with_pin(self.get_pins(system_id).await?, label, pin)?;
        self.put_pins(system_id, &pins).await?;
        info!(%system_id, label, "PIN set");
        Ok(())
    }

    /// Remove a user PIN by label or value.
    pub async fn remove_pin(&self, system_id: SystemId, pin_or_label: &str) -> Result<(), CoreError> {
        let pins = without_pin(self.get_pins(system_id).await?, pin_or_label)?;
        self.put_pins(system_id, &pins).await?;
        info!(%system_id, "PIN removed");
        Ok(())
    }

    async fn put_pins(&self, system_id: SystemId, pins: &IndexMap<String, String>) -> Result<(), CoreError> {
        let system = self.get_system(system_id)?;
        self.inner
            .client
            .set_pins(system_id.get(), system.version.as_u8(), pins)
            .await?;
        Ok(())
    }

    // ── Listeners ────────────────────────────────────────────────

    /// Register a callback for every notification.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Notification) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.subscribe_listener(Arc::new(listener))
    }

    pub fn subscribe_listener(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        self.inner.listeners.register(listener)
    }

    /// Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.listeners.unregister(id)
    }

    // ── Shutdown ─────────────────────────────────────────────────

    /// Stop the event subscriber and background refresh and wait for them.
    ///
    /// Later calls that reach the network fail with
    /// [`CoreError::Disconnected`].
    pub async fn close(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }

        self.inner
            .connection_state
            .send_replace(ConnectionState::Stopped);
        info!(user_id = self.inner.user_id, "account session closed");
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodically re-read the whole account.
async fn refresh_task(refresher: Refresher, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = refresher.full_refresh().await {
                    warn!(error = %e, "periodic refresh failed");
                }
            }
        }
    }
}
