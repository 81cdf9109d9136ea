//! PostgREST-style HTTP backend with a Phoenix websocket push channel.
//!
//! Reads and writes go to `<base>/rest/v1/<table>`. Change notifications come
//! from `<base>/realtime/v1/websocket`, joined per table on the topic
//! `realtime:public:<table>`.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{ChangeEvent, ChangeFeed, ChangeKind, Row, TableBackend, TableQuery};
use crate::error::BackendError;

/// Interval between Phoenix heartbeats on the push channel.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Timeout for the reachability probe.
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP backend speaking PostgREST query conventions.
#[derive(Debug, Clone)]
pub struct RestBackend {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl RestBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checks whether the backend answers HTTP at all.
    ///
    /// Any response, even an error status, counts as reachable.
    pub async fn ping(&self) -> bool {
        let request = self
            .authorized(self.client.get(self.build_http_url("/rest/v1/")))
            .timeout(PING_TIMEOUT);
        match request.send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Backend ping failed: {}", e);
                false
            }
        }
    }

    pub fn table_url(&self, table: &str) -> String {
        self.build_http_url(&format!("/rest/v1/{}", urlencoding::encode(table)))
    }

    /// Full URL for a read, e.g. `/rest/v1/staff?select=*&status=eq.active&order=name.asc`.
    pub fn query_url(&self, query: &TableQuery) -> String {
        let mut url = format!(
            "{}?select={}",
            self.table_url(&query.table),
            urlencoding::encode(&query.select_clause())
        );

        if let Some(filter) = &query.filter {
            url.push_str(&format!(
                "&{}={}.{}",
                urlencoding::encode(&filter.column),
                filter.op.as_str(),
                urlencoding::encode(&filter.value_text())
            ));
        }

        if let Some(order) = &query.order {
            url.push_str(&format!(
                "&order={}.{}",
                urlencoding::encode(&order.column),
                if order.ascending { "asc" } else { "desc" }
            ));
        }

        url
    }

    fn row_url(&self, table: &str, id: &str) -> String {
        format!("{}?id=eq.{}", self.table_url(table), urlencoding::encode(id))
    }

    /// Websocket URL of the realtime endpoint.
    pub fn realtime_url(&self) -> String {
        format!(
            "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            self.build_ws_url(),
            urlencoding::encode(&self.api_key)
        )
    }

    fn build_http_url(&self, path: &str) -> String {
        // Convert ws(s) to http(s) if needed
        let base_url = if self.base_url.starts_with("ws://") {
            self.base_url.replacen("ws://", "http://", 1)
        } else if self.base_url.starts_with("wss://") {
            self.base_url.replacen("wss://", "https://", 1)
        } else if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://")
        {
            format!("http://{}", self.base_url)
        } else {
            self.base_url.clone()
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }

    fn build_ws_url(&self) -> String {
        // Convert http(s) to ws(s) if needed
        let base_url = if self.base_url.starts_with("http://") {
            self.base_url.replacen("http://", "ws://", 1)
        } else if self.base_url.starts_with("https://") {
            self.base_url.replacen("https://", "wss://", 1)
        } else if !self.base_url.starts_with("ws://") && !self.base_url.starts_with("wss://") {
            format!("ws://{}", self.base_url)
        } else {
            self.base_url.clone()
        };

        base_url.trim_end_matches('/').to_string()
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl TableBackend for RestBackend {
    async fn fetch_all(&self, query: &TableQuery) -> Result<Vec<Row>, BackendError> {
        let response = self.send(self.client.get(self.query_url(query))).await?;
        response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn insert_one(&self, table: &str, row: Row) -> Result<Vec<Row>, BackendError> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&row);
        let response = self.send(request).await?;
        response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn update_one(&self, table: &str, id: &str, patch: Row) -> Result<(), BackendError> {
        let request = self.client.patch(self.row_url(table, id)).json(&patch);
        self.send(request).await?;
        Ok(())
    }

    async fn delete_one(&self, table: &str, id: &str) -> Result<(), BackendError> {
        self.send(self.client.delete(self.row_url(table, id))).await?;
        Ok(())
    }

    async fn subscribe(&self, table: &str) -> Result<ChangeFeed, BackendError> {
        let (ws_stream, _) = connect_async(self.realtime_url())
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        let (mut sender, mut receiver) = ws_stream.split();

        let topic = format!("realtime:public:{}", table);
        let join = json!({
            "topic": topic,
            "event": "phx_join",
            "payload": {
                "config": {
                    "postgres_changes": [{"event": "*", "schema": "public", "table": table}]
                }
            },
            "ref": "1",
        });
        sender
            .send(Message::Text(join.to_string().into()))
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let table = table.to_string();
        let pump = tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            let mut next_ref: u64 = 2;

            loop {
                tokio::select! {
                    message = receiver.next() => {
                        let text = match message {
                            Some(Ok(Message::Text(text))) => text,
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => continue,
                            Some(Err(e)) => {
                                tracing::warn!("Realtime channel for '{}' failed: {}", table, e);
                                break;
                            }
                        };
                        if let Some(kind) = parse_realtime_message(text.as_str()) {
                            let event = ChangeEvent { table: table.clone(), kind };
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                    }
                    _ = heartbeat.tick() => {
                        let beat = json!({
                            "topic": "phoenix",
                            "event": "heartbeat",
                            "payload": {},
                            "ref": next_ref.to_string(),
                        });
                        next_ref += 1;
                        if sender.send(Message::Text(beat.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                }
            }

            let _ = sender.send(Message::Close(None)).await;
            tracing::debug!("Realtime channel for '{}' closed", table);
        });

        Ok(ChangeFeed::with_pump(rx, pump))
    }
}

/// Extracts the change kind from a realtime frame, if it is a change frame.
///
/// Accepts both `postgres_changes` frames (kind under `payload.data.type`)
/// and legacy frames whose event name is the kind itself.
pub fn parse_realtime_message(text: &str) -> Option<ChangeKind> {
    let frame: Value = serde_json::from_str(text).ok()?;
    let event = frame.get("event")?.as_str()?;

    if event == "postgres_changes" {
        let kind = frame.pointer("/payload/data/type")?.as_str()?;
        return ChangeKind::parse(kind);
    }
    ChangeKind::parse(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Filter, FilterOp, Order};

    #[test]
    fn test_table_url_from_bare_host() {
        let backend = RestBackend::new("localhost:54321", "key");
        assert_eq!(
            backend.table_url("staff"),
            "http://localhost:54321/rest/v1/staff"
        );
    }

    #[test]
    fn test_query_url_select_all() {
        let backend = RestBackend::new("https://api.example.com/", "key");
        let query = TableQuery::new("scenarios");
        assert_eq!(
            backend.query_url(&query),
            "https://api.example.com/rest/v1/scenarios?select=%2A"
        );
    }

    #[test]
    fn test_query_url_with_filter_and_order() {
        let backend = RestBackend::new("https://api.example.com", "key");
        let query = TableQuery {
            table: "schedule_events".to_string(),
            columns: Some(vec!["id".to_string(), "date".to_string()]),
            filter: Some(Filter::new("date", FilterOp::Gte, "2026-10-01")),
            order: Some(Order::desc("date")),
        };
        assert_eq!(
            backend.query_url(&query),
            "https://api.example.com/rest/v1/schedule_events?select=id%2Cdate&date=gte.2026-10-01&order=date.desc"
        );
    }

    #[test]
    fn test_query_url_encodes_filter_value() {
        let backend = RestBackend::new("http://localhost:3000", "key");
        let mut query = TableQuery::new("staff");
        query.filter = Some(Filter::eq("name", "Aki Mori"));
        assert!(backend.query_url(&query).ends_with("&name=eq.Aki%20Mori"));
    }

    #[test]
    fn test_row_url() {
        let backend = RestBackend::new("http://localhost:3000", "key");
        assert_eq!(
            backend.row_url("stores", "abc"),
            "http://localhost:3000/rest/v1/stores?id=eq.abc"
        );
    }

    #[test]
    fn test_realtime_url_from_https() {
        let backend = RestBackend::new("https://api.example.com", "secret");
        assert_eq!(
            backend.realtime_url(),
            "wss://api.example.com/realtime/v1/websocket?apikey=secret&vsn=1.0.0"
        );
    }

    #[test]
    fn test_realtime_url_from_http() {
        let backend = RestBackend::new("http://localhost:54321/", "k");
        assert_eq!(
            backend.realtime_url(),
            "ws://localhost:54321/realtime/v1/websocket?apikey=k&vsn=1.0.0"
        );
    }

    #[test]
    fn test_parse_postgres_changes_frame() {
        let frame = r#"{"topic":"realtime:public:staff","event":"postgres_changes","payload":{"data":{"type":"UPDATE","table":"staff"}},"ref":null}"#;
        assert_eq!(parse_realtime_message(frame), Some(ChangeKind::Update));
    }

    #[test]
    fn test_parse_legacy_frame() {
        let frame = r#"{"topic":"realtime:public:staff","event":"DELETE","payload":{}}"#;
        assert_eq!(parse_realtime_message(frame), Some(ChangeKind::Delete));
    }

    #[test]
    fn test_parse_ignores_control_frames() {
        let reply = r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"ok"},"ref":"2"}"#;
        assert_eq!(parse_realtime_message(reply), None);
        assert_eq!(parse_realtime_message("not json"), None);
    }
}
