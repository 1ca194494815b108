// Event history endpoint (also the polling fallback for the push channel)

use tracing::debug;

use crate::error::Error;
use crate::executor::ApiRequest;
use crate::rest::SimpliSafeClient;
use crate::rest::models::{EventList, RawEvent};

impl SimpliSafeClient {
    /// Fetch recent events for a system, newest first as the vendor
    /// returns them.
    ///
    /// `GET subscriptions/{sid}/events?fromTimestamp=..&numEvents=..`
    pub async fn events(
        &self,
        system_id: u64,
        from_timestamp: Option<i64>,
        num_events: Option<u32>,
    ) -> Result<Vec<RawEvent>, Error> {
        let mut request = ApiRequest::get(format!("subscriptions/{system_id}/events"));
        if let Some(ts) = from_timestamp {
            request = request.query("fromTimestamp", ts);
        }
        if let Some(n) = num_events {
            request = request.query("numEvents", n);
        }

        let list: EventList = self.fetch(request).await?;
        debug!(system_id, count = list.events.len(), "fetched events");
        Ok(list.events)
    }
}
