//! Push channel to the vendor's event socket.
//!
//! A [`PushConnection`] is one websocket session: connect, wait for the
//! service hello, send the `identify` message carrying the bearer token and
//! the `uid:{user_id}` join target, wait for `registered`, then read
//! decoded [`PushMessage`]s until the socket drops. Reconnection is the
//! caller's job (see the event subscriber in `simplisafe-core`).
//!
//! # Example
//!
//! ```rust,ignore
//! let mut conn = PushConnection::connect(&endpoints.push_url, &token, user_id).await?;
//! while let Some(msg) = conn.next_message().await {
//!     match msg {
//!         Ok(PushMessage::Event { data }) => println!("{}", data.event_cid),
//!         Ok(_) => {}
//!         Err(e) => eprintln!("dropped frame: {e}"),
//!     }
//! }
//! ```

use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

use crate::error::Error;
use crate::rest::models::RawEvent;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

// ── Messages ─────────────────────────────────────────────────────────

/// A decoded frame from the push channel.
///
/// The set is closed: frames with any other `type` decode to
/// [`Error::InvalidResponse`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum PushMessage {
    #[serde(rename = "com.simplisafe.service.hello")]
    Hello,
    #[serde(rename = "com.simplisafe.service.registered")]
    Registered,
    #[serde(rename = "com.simplisafe.event.standard")]
    Event { data: RawEvent },
}

/// Decode one text frame.
pub fn decode_message(text: &str) -> Result<PushMessage, Error> {
    serde_json::from_str(text).map_err(|e| Error::InvalidResponse {
        message: format!("unrecognised push message: {e}"),
        body: text.to_owned(),
    })
}

fn identify_message(access_token: &SecretString, user_id: u64) -> String {
    let now = Utc::now();
    json!({
        "datacontenttype": "application/json",
        "type": "com.simplisafe.connection.identify",
        "time": now.to_rfc3339(),
        "id": format!("ts:{}", now.timestamp_millis()),
        "specversion": "1.0",
        "source": "simplisafe-rs",
        "data": {
            "auth": {
                "schema": "bearer",
                "token": access_token.expose_secret(),
            },
            "join": [format!("uid:{user_id}")],
        },
    })
    .to_string()
}

// ── Connection ───────────────────────────────────────────────────────

/// One registered push-channel session.
pub struct PushConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl PushConnection {
    /// Connect, identify, and wait until the service confirms registration.
    pub async fn connect(url: &str, access_token: &SecretString, user_id: u64) -> Result<Self, Error> {
        info!(url, "connecting to push channel");

        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| Error::WebSocket(format!("connect failed: {e}")))?;

        let mut conn = Self { stream };
        tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.handshake(access_token, user_id))
            .await
            .map_err(|_| Error::WebSocket("handshake timed out".into()))??;

        info!(user_id, "push channel registered");
        Ok(conn)
    }

    async fn handshake(&mut self, access_token: &SecretString, user_id: u64) -> Result<(), Error> {
        self.expect_message(|m| matches!(m, PushMessage::Hello), "hello").await?;

        self.stream
            .send(Message::text(identify_message(access_token, user_id)))
            .await
            .map_err(|e| Error::WebSocket(format!("identify failed: {e}")))?;

        self.expect_message(|m| matches!(m, PushMessage::Registered), "registered").await
    }

    /// Read until a frame satisfies `wanted`. Unrecognised frames are skipped.
    async fn expect_message(&mut self, wanted: impl Fn(&PushMessage) -> bool, name: &str) -> Result<(), Error> {
        loop {
            match self.next_message().await {
                Some(Ok(msg)) if wanted(&msg) => return Ok(()),
                Some(Ok(other)) => debug!(?other, expected = name, "ignoring frame during handshake"),
                Some(Err(Error::InvalidResponse { message, .. })) => {
                    debug!(%message, expected = name, "ignoring frame during handshake");
                }
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(Error::WebSocket(format!("closed before {name}")));
                }
            }
        }
    }

    /// Next decoded message.
    ///
    /// Returns `None` once the socket is closed. `Some(Err(InvalidResponse))`
    /// is a single undecodable frame and the session is still usable; any
    /// other error means the session is dead.
    pub async fn next_message(&mut self) -> Option<Result<PushMessage, Error>> {
        loop {
            let frame = self.stream.next().await?;
            match frame {
                Ok(Message::Text(text)) => return Some(decode_message(&text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(
                        std::str::from_utf8(&bytes)
                            .map_err(|e| Error::InvalidResponse {
                                message: e.to_string(),
                                body: String::new(),
                            })
                            .and_then(decode_message),
                    );
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    trace!("push channel keepalive");
                }
                Ok(Message::Close(frame)) => {
                    if let Some(ref cf) = frame {
                        info!(code = %cf.code, reason = %cf.reason, "push channel closed by server");
                    } else {
                        info!("push channel closed by server");
                    }
                    return None;
                }
                Ok(Message::Frame(_)) => {}
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return None;
                }
                Err(e) => return Some(Err(Error::WebSocket(e.to_string()))),
            }
        }
    }

    /// Close the session politely.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "push channel close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_standard_event() {
        let text = serde_json::json!({
            "type": "com.simplisafe.event.standard",
            "id": "abc",
            "data": {
                "eventId": 7,
                "eventTimestamp": 1_700_000_000,
                "eventCid": 1400,
                "sid": 12345,
                "info": "Disarmed by Master PIN"
            }
        })
        .to_string();

        let msg = decode_message(&text).unwrap();
        let PushMessage::Event { data } = msg else {
            panic!("expected an event, got {msg:?}");
        };
        assert_eq!(data.event_id, 7);
        assert_eq!(data.event_cid, 1400);
    }

    #[test]
    fn unit_messages_ignore_extra_fields() {
        let msg = decode_message(
            r#"{"type":"com.simplisafe.service.hello","time":"now","specversion":"1.0"}"#,
        )
        .unwrap();
        assert_eq!(msg, PushMessage::Hello);
    }

    #[test]
    fn unknown_type_is_invalid_response() {
        let err = decode_message(r#"{"type":"com.simplisafe.service.bogus"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse { .. }));
    }

    #[test]
    fn identify_carries_token_and_join_target() {
        let token = SecretString::from("tok".to_string());
        let value: serde_json::Value = serde_json::from_str(&identify_message(&token, 99)).unwrap();
        assert_eq!(value["type"], "com.simplisafe.connection.identify");
        assert_eq!(value["data"]["auth"]["token"], "tok");
        assert_eq!(value["data"]["join"][0], "uid:99");
    }
}
