// ── Account refresh ──
//
// Pulls subscriptions and sensors through the resource client, converts
// them to domain types, and applies them to the DataStore. Used by the
// facade (explicit and periodic refresh) and by the subscriber's resync.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, warn};

use simplisafe_api::SimpliSafeClient;

use crate::convert::{device_from_sensor, system_from_subscription};
use crate::error::CoreError;
use crate::model::{Device, System, SystemId};
use crate::store::DataStore;

#[derive(Clone)]
pub(crate) struct Refresher {
    client: SimpliSafeClient,
    store: Arc<DataStore>,
    user_id: u64,
}

impl Refresher {
    pub(crate) fn new(client: SimpliSafeClient, store: Arc<DataStore>, user_id: u64) -> Self {
        Self {
            client,
            store,
            user_id,
        }
    }

    pub(crate) fn client(&self) -> &SimpliSafeClient {
        &self.client
    }

    pub(crate) fn store(&self) -> &Arc<DataStore> {
        &self.store
    }

    /// Re-read every system and its devices.
    ///
    /// Sensor fetches run concurrently. A system whose sensors fail keeps
    /// its previously cached devices; auth failures abort the refresh.
    pub(crate) async fn full_refresh(&self) -> Result<(), CoreError> {
        let systems = self.fetch_systems().await?;

        let results = join_all(systems.iter().map(|s| self.fetch_devices(s, true))).await;

        let mut devices = Vec::new();
        for (system, result) in systems.iter().zip(results) {
            match result {
                Ok(mut fetched) => devices.append(&mut fetched),
                Err(e) if e.is_auth_error() => return Err(e),
                Err(e) => {
                    warn!(system_id = %system.id, error = %e, "sensor refresh failed, keeping cached devices");
                    devices.extend(
                        self.store
                            .devices_for(system.id)
                            .iter()
                            .map(|d| Device::clone(d)),
                    );
                }
            }
        }

        self.store.apply_full_snapshot(systems, devices, Utc::now());
        Ok(())
    }

    /// Re-read one system and force its sensors to report.
    pub(crate) async fn refresh_system(&self, id: SystemId) -> Result<Arc<System>, CoreError> {
        let system = self
            .fetch_systems()
            .await?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| CoreError::not_found("system", id))?;

        let devices = self.fetch_devices(&system, false).await?;
        self.store.apply_system_snapshot(system, devices);
        debug!(system_id = %id, "system refreshed");

        self.store
            .system(id)
            .ok_or_else(|| CoreError::Internal(format!("system {id} vanished after refresh")))
    }

    async fn fetch_systems(&self) -> Result<Vec<System>, CoreError> {
        let now = Utc::now();
        let subscriptions = self.client.subscriptions(self.user_id).await?;

        let mut systems = Vec::with_capacity(subscriptions.len());
        for sub in subscriptions {
            let sid = sub.sid;
            match system_from_subscription(sub, now) {
                Ok(system) => systems.push(system),
                Err(e) => warn!(system_id = sid, error = %e, "skipping unusable subscription"),
            }
        }
        Ok(systems)
    }

    async fn fetch_devices(&self, system: &System, cached: bool) -> Result<Vec<Device>, CoreError> {
        let now = Utc::now();
        let sensors = self
            .client
            .sensors(system.id.get(), system.version.as_u8(), cached)
            .await?;
        Ok(sensors
            .into_iter()
            .map(|payload| device_from_sensor(system.id, payload, now))
            .collect())
    }
}
