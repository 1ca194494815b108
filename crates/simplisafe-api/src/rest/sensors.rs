// Sensor endpoints (V2 settings payload, V3 sensor list)

use tracing::{debug, warn};

use crate::error::Error;
use crate::executor::ApiRequest;
use crate::rest::SimpliSafeClient;
use crate::rest::models::{RawSensorV2, SensorListV3, SensorPayload, SettingsV2};

impl SimpliSafeClient {
    /// Fetch every sensor (including locks) attached to a system.
    ///
    /// With `cached = true` the vendor answers from its last known base
    /// station snapshot; `false` forces a round trip to the base station.
    pub async fn sensors(
        &self,
        system_id: u64,
        version: u8,
        cached: bool,
    ) -> Result<Vec<SensorPayload>, Error> {
        let sensors = if version == 2 {
            self.sensors_v2(system_id, cached).await?
        } else {
            let list: SensorListV3 = self
                .fetch(
                    ApiRequest::get(format!("ss3/subscriptions/{system_id}/sensors"))
                        .query("forceUpdate", !cached),
                )
                .await?;
            list.sensors.into_iter().map(SensorPayload::V3).collect()
        };

        debug!(system_id, count = sensors.len(), "fetched sensors");
        Ok(sensors)
    }

    async fn sensors_v2(&self, system_id: u64, cached: bool) -> Result<Vec<SensorPayload>, Error> {
        let settings: SettingsV2 = self
            .fetch(
                ApiRequest::get(format!("subscriptions/{system_id}/settings"))
                    .query("settingsType", "all")
                    .query("cached", cached),
            )
            .await?;

        let mut sensors = Vec::with_capacity(settings.settings.sensors.len());
        for slot in settings.settings.sensors {
            if slot.as_object().is_none_or(serde_json::Map::is_empty) {
                continue;
            }
            match serde_json::from_value::<RawSensorV2>(slot.clone()) {
                Ok(sensor) => sensors.push(SensorPayload::V2(sensor)),
                Err(e) => {
                    warn!(system_id, error = %e, "malformed V2 sensor slot");
                    return Err(Error::InvalidResponse {
                        message: e.to_string(),
                        body: slot.to_string(),
                    });
                }
            }
        }
        Ok(sensors)
    }
}
