//! Supabase realtime subscription for call record status changes.
//!
//! Speaks the Phoenix channel protocol over a websocket: one channel per
//! call record, filtered to UPDATEs of that row, with a heartbeat on the
//! `phoenix` topic to keep the socket open.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::config::DialerConfig;
use crate::models::CallRecordStatus;
use crate::phone::{RealtimeFeed, StatusStream};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct SupabaseRealtime {
    url: String,
    anon_key: String,
    access_token: String,
}

impl SupabaseRealtime {
    pub fn new(config: &DialerConfig) -> Self {
        Self {
            url: config.realtime_url.clone(),
            anon_key: config.anon_key.clone(),
            access_token: config.access_token.clone(),
        }
    }
}

fn channel_topic(call_record_id: &str) -> String {
    format!("realtime:call-status-{}", call_record_id)
}

fn join_message(topic: &str, call_record_id: &str, access_token: &str) -> Value {
    json!({
        "topic": topic,
        "event": "phx_join",
        "payload": {
            "config": {
                "postgres_changes": [{
                    "event": "UPDATE",
                    "schema": "public",
                    "table": "call_records",
                    "filter": format!("id=eq.{}", call_record_id),
                }]
            },
            "access_token": access_token,
        },
        "ref": "1",
    })
}

fn heartbeat_message(msg_ref: u64) -> Value {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
}

fn leave_message(topic: &str, msg_ref: u64) -> Value {
    json!({
        "topic": topic,
        "event": "phx_leave",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
}

/// Pull the new row status out of a `postgres_changes` frame.
fn parse_status_change(text: &str) -> Option<CallRecordStatus> {
    let frame: Value = serde_json::from_str(text).ok()?;

    match frame.get("event").and_then(Value::as_str) {
        Some("postgres_changes") => frame
            .pointer("/payload/data/record/status")
            .and_then(Value::as_str)
            .map(CallRecordStatus::from),
        Some("phx_reply") => {
            if frame.pointer("/payload/status").and_then(Value::as_str) == Some("error") {
                warn!("Realtime channel rejected: {}", frame["payload"]["response"]);
            }
            None
        }
        _ => None,
    }
}

#[async_trait]
impl RealtimeFeed for SupabaseRealtime {
    async fn subscribe(&self, call_record_id: &str) -> Result<StatusStream, ApiError> {
        let url = format!("{}?apikey={}&vsn=1.0.0", self.url, self.anon_key);
        let (mut ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ApiError::Realtime(format!("Failed to connect: {}", e)))?;

        let topic = channel_topic(call_record_id);
        let join = join_message(&topic, call_record_id, &self.access_token);
        ws_stream
            .send(Message::Text(join.to_string().into()))
            .await
            .map_err(|e| ApiError::Realtime(format!("Failed to join channel: {}", e)))?;

        info!("Subscribed to realtime updates for call record {}", call_record_id);

        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            heartbeat.tick().await;
            let mut next_ref: u64 = 2;

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        let leave = leave_message(&topic, next_ref);
                        let _ = ws_stream.send(Message::Text(leave.to_string().into())).await;
                        let _ = ws_stream.close(None).await;
                        break;
                    }
                    _ = heartbeat.tick() => {
                        let beat = heartbeat_message(next_ref);
                        next_ref += 1;
                        if let Err(e) = ws_stream.send(Message::Text(beat.to_string().into())).await {
                            warn!("Realtime heartbeat failed: {}", e);
                            break;
                        }
                    }
                    message = ws_stream.next() => {
                        match message {
                            Some(Ok(Message::Text(text))) => {
                                if let Some(status) = parse_status_change(text.as_str()) {
                                    debug!("Realtime status on {}: {}", topic, status);
                                    if tx.send(status).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                info!("Realtime socket closed for {}", topic);
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("Realtime socket error: {}", e);
                                break;
                            }
                        }
                    }
                }
            }

            debug!("Realtime channel {} ended", topic);
        });

        Ok(StatusStream::new(rx, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_message_filters_on_record_id() {
        let join = join_message(&channel_topic("abc-123"), "abc-123", "jwt");
        assert_eq!(join["topic"], "realtime:call-status-abc-123");
        assert_eq!(join["event"], "phx_join");
        let change = &join["payload"]["config"]["postgres_changes"][0];
        assert_eq!(change["table"], "call_records");
        assert_eq!(change["event"], "UPDATE");
        assert_eq!(change["filter"], "id=eq.abc-123");
    }

    #[test]
    fn test_parse_postgres_change() {
        let frame = r#"{
            "topic": "realtime:call-status-abc-123",
            "event": "postgres_changes",
            "payload": {"data": {"type": "UPDATE", "record": {"id": "abc-123", "status": "completed"}}},
            "ref": null
        }"#;
        assert_eq!(parse_status_change(frame), Some(CallRecordStatus::Completed));
    }

    #[test]
    fn test_ignores_other_frames() {
        assert_eq!(
            parse_status_change(r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"ok"},"ref":"2"}"#),
            None
        );
        assert_eq!(parse_status_change("not json"), None);
    }
}
