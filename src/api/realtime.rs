//! Realtime change notifications over the Phoenix channel websocket

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, interval};
use tokio_tungstenite::tungstenite::Message;

/// Interval between channel heartbeats
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Kind of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Row inserted
    Insert,
    /// Row updated
    Update,
    /// Row deleted
    Delete,
}

impl ChangeKind {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// A change pushed by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Table the change happened in
    pub table: String,
    /// What happened
    pub kind: ChangeKind,
}

/// A live subscription. Dropping it tears the connection down.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<ChangeEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a receiver and the task feeding it
    pub fn new(events: mpsc::Receiver<ChangeEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self { events, task }
    }

    /// Wait for the next change. `None` once the connection is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Close the connection
    pub fn unsubscribe(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Websocket URL for a project URL
pub fn websocket_url(base_url: &str, anon_key: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!(
        "{ws_base}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
        urlencoding::encode(anon_key)
    )
}

/// Channel topic for a table in the public schema
pub fn topic(table: &str) -> String {
    format!("realtime:public:{table}")
}

/// `phx_join` message subscribing to all changes on `table`
pub fn join_message(table: &str, access_token: Option<&str>, msg_ref: u64) -> String {
    let mut payload = json!({
        "config": {
            "broadcast": { "self": false },
            "presence": { "key": "" },
            "postgres_changes": [
                { "event": "*", "schema": "public", "table": table }
            ]
        }
    });
    if let Some(token) = access_token {
        payload["access_token"] = Value::String(token.to_string());
    }
    json!({
        "topic": topic(table),
        "event": "phx_join",
        "payload": payload,
        "ref": msg_ref.to_string(),
    })
    .to_string()
}

/// Heartbeat message keeping the socket alive
pub fn heartbeat_message(msg_ref: u64) -> String {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
    .to_string()
}

/// Parse a server frame into a change on `table`, ignoring everything else
pub fn parse_message(text: &str, table: &str) -> Option<ChangeEvent> {
    let value: Value = serde_json::from_str(text).ok()?;
    let event = value.get("event")?.as_str()?;
    let payload = value.get("payload")?;

    let (kind, changed_table) = if event == "postgres_changes" {
        let data = payload.get("data")?;
        (
            ChangeKind::parse(data.get("type")?.as_str()?)?,
            data.get("table")?.as_str()?,
        )
    } else {
        // Older servers put the change type in the event name
        (ChangeKind::parse(event)?, payload.get("table")?.as_str()?)
    };

    (changed_table == table).then(|| ChangeEvent {
        table: changed_table.to_string(),
        kind,
    })
}

/// Whether a server frame closes or fails the channel for `table`.
///
/// The server sends these when the join is rejected, for example after the
/// access token it joined with expires.
pub fn is_channel_closed(text: &str, table: &str) -> bool {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return false;
    };
    let closing = matches!(
        value.get("event").and_then(Value::as_str),
        Some("phx_close" | "phx_error")
    );
    closing && value.get("topic").and_then(Value::as_str) == Some(topic(table).as_str())
}

/// Open a websocket and subscribe to changes on `table`
pub async fn connect(url: &str, table: &str, access_token: Option<&str>) -> Result<Subscription> {
    let (stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .context("Failed to connect to realtime")?;
    let (mut write, mut read) = stream.split();

    let mut msg_ref: u64 = 1;
    write
        .send(Message::Text(join_message(table, access_token, msg_ref).into()))
        .await
        .context("Failed to join realtime channel")?;

    let (tx, rx) = mpsc::channel(32);
    let table = table.to_string();

    let task = tokio::spawn(async move {
        let mut heartbeat = interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    msg_ref += 1;
                    if let Err(e) = write.send(Message::Text(heartbeat_message(msg_ref).into())).await {
                        tracing::warn!("Realtime heartbeat failed: {}", e);
                        break;
                    }
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if is_channel_closed(text.as_str(), &table) {
                            tracing::warn!("Realtime channel {} closed by server", topic(&table));
                            break;
                        }
                        if let Some(change) = parse_message(text.as_str(), &table) {
                            tracing::debug!("Realtime change on {}: {:?}", change.table, change.kind);
                            if tx.send(change).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("Realtime connection closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("Realtime connection error: {}", e);
                        break;
                    }
                }
            }
        }
    });

    Ok(Subscription::new(rx, Some(task)))
}
