// Push channel handshake and framing against a local websocket server.
#![allow(clippy::unwrap_used)]

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use simplisafe_api::{Error, PushConnection, PushMessage};

fn frame(kind: &str) -> Message {
    Message::text(json!({ "type": kind, "specversion": "1.0" }).to_string())
}

#[tokio::test]
async fn handshake_then_events_until_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();

        ws.send(frame("com.simplisafe.service.hello")).await.unwrap();

        let identify = ws.next().await.unwrap().unwrap();
        let identify: serde_json::Value = serde_json::from_str(identify.to_text().unwrap()).unwrap();
        assert_eq!(identify["type"], "com.simplisafe.connection.identify");
        assert_eq!(identify["data"]["auth"]["token"], "push-token");
        assert_eq!(identify["data"]["join"][0], "uid:7");

        ws.send(frame("com.simplisafe.service.registered")).await.unwrap();
        ws.send(Message::text(
            json!({
                "type": "com.simplisafe.event.standard",
                "data": {
                    "eventId": 501,
                    "eventTimestamp": 1_700_000_000,
                    "eventCid": 3401,
                    "sid": 12,
                    "info": "System Armed (Away)"
                }
            })
            .to_string(),
        ))
        .await
        .unwrap();
        ws.send(frame("com.simplisafe.service.bogus")).await.unwrap();
        ws.close(None).await.unwrap();
    });

    let token = SecretString::from("push-token".to_string());
    let mut conn = PushConnection::connect(&format!("ws://{addr}"), &token, 7)
        .await
        .unwrap();

    let Some(Ok(PushMessage::Event { data })) = conn.next_message().await else {
        panic!("expected an event frame");
    };
    assert_eq!(data.event_id, 501);
    assert_eq!(data.sid, 12);

    assert!(matches!(
        conn.next_message().await,
        Some(Err(Error::InvalidResponse { .. }))
    ));
    assert!(conn.next_message().await.is_none());

    server.await.unwrap();
}

#[tokio::test]
async fn close_before_registration_fails_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        ws.send(frame("com.simplisafe.service.hello")).await.unwrap();
        ws.close(None).await.unwrap();
    });

    let token = SecretString::from("t".to_string());
    let result = PushConnection::connect(&format!("ws://{addr}"), &token, 1).await;
    assert!(matches!(result, Err(Error::WebSocket(_))));
}
