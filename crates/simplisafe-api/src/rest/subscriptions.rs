// Account and subscription endpoints

use tracing::{debug, error};

use crate::error::Error;
use crate::executor::ApiRequest;
use crate::rest::SimpliSafeClient;
use crate::rest::models::{AuthCheck, RawSubscription, SubscriptionList};

impl SimpliSafeClient {
    /// Resolve the vendor user id for the held credentials.
    ///
    /// `GET api/authCheck`
    pub async fn auth_check(&self) -> Result<u64, Error> {
        let check: AuthCheck = self.fetch(ApiRequest::get("api/authCheck")).await?;
        debug!(user_id = check.user_id, "auth check succeeded");
        Ok(check.user_id)
    }

    /// List the user's active subscriptions (one per system).
    ///
    /// Subscriptions whose location carries no `system.version` have no
    /// usable base station and are skipped.
    ///
    /// `GET users/{uid}/subscriptions?activeOnly=true`
    pub async fn subscriptions(&self, user_id: u64) -> Result<Vec<RawSubscription>, Error> {
        let list: SubscriptionList = self
            .fetch(ApiRequest::get(format!("users/{user_id}/subscriptions")).query("activeOnly", "true"))
            .await?;

        let subscriptions: Vec<RawSubscription> = list
            .subscriptions
            .into_iter()
            .filter(|sub| {
                if sub.location.system.version.is_none() {
                    error!(system_id = sub.sid, "skipping location with missing system data");
                    return false;
                }
                true
            })
            .collect();

        debug!(count = subscriptions.len(), "fetched subscriptions");
        Ok(subscriptions)
    }
}
