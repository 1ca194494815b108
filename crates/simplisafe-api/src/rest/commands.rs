// State-changing endpoints: alarm state and door locks

use serde_json::json;
use tracing::info;

use crate::error::Error;
use crate::executor::ApiRequest;
use crate::rest::SimpliSafeClient;
use crate::rest::models::{CommandAck, LockAction, SettableAlarmState};

impl SimpliSafeClient {
    /// Request an alarm state change.
    ///
    /// - V3: `POST ss3/subscriptions/{sid}/state/{state}`
    /// - V2: `POST subscriptions/{sid}/state?state={state}`
    pub async fn set_alarm_state(
        &self,
        system_id: u64,
        version: u8,
        state: SettableAlarmState,
    ) -> Result<CommandAck, Error> {
        let request = if version == 2 {
            ApiRequest::post(format!("subscriptions/{system_id}/state")).query("state", state)
        } else {
            ApiRequest::post(format!("ss3/subscriptions/{system_id}/state/{state}"))
        };

        let ack = self.command(request).await?;
        info!(system_id, %state, "alarm state change acknowledged");
        Ok(ack)
    }

    /// Lock or unlock a door lock.
    ///
    /// `POST doorlock/{sid}/{serial}/state` with `{"state": "lock"|"unlock"}`
    pub async fn set_lock_state(
        &self,
        system_id: u64,
        serial: &str,
        action: LockAction,
    ) -> Result<CommandAck, Error> {
        let request = ApiRequest::post(format!("doorlock/{system_id}/{serial}/state"))
            .json(json!({ "state": action.as_str() }));

        let ack = self.command(request).await?;
        info!(system_id, serial, action = action.as_str(), "lock command acknowledged");
        Ok(ack)
    }
}
