// Camera media endpoints

use bytes::Bytes;
use url::Url;

use crate::error::Error;
use crate::executor::ApiRequest;
use crate::rest::SimpliSafeClient;

impl SimpliSafeClient {
    /// URL of a camera's live FLV stream. Fetching it requires the
    /// session's bearer token.
    pub fn camera_stream_url(&self, camera_uuid: &str, width: u32) -> Result<Url, Error> {
        let mut url = self.endpoints().media_url(&format!("{camera_uuid}/flv"))?;
        url.query_pairs_mut()
            .append_pair("x", &width.to_string())
            .append_pair("audioEncoding", "AAC");
        Ok(url)
    }

    /// Fetch a single JPEG frame from a camera.
    ///
    /// `GET {media}/{uuid}/mjpg?x={width}&fr=1`
    pub async fn camera_snapshot(&self, camera_uuid: &str, width: u32) -> Result<Bytes, Error> {
        let response = self
            .raw(
                ApiRequest::get(format!("{camera_uuid}/mjpg"))
                    .query("x", width)
                    .query("fr", 1)
                    .on_media(),
            )
            .await?;
        Ok(response.body)
    }
}
