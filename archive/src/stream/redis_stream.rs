//! Redis stream backend: XADD / XREAD BLOCK / XTRIM on the configured stream
//! key, consumer cursor persisted under the configured last-id key.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;

use super::{Cursor, InputStream, StreamEntry, StreamError};

pub struct RedisInputStream {
    conn: ConnectionManager,
    stream_key: String,
    last_id_key: String,
}

fn kv_err(e: redis::RedisError) -> StreamError {
    StreamError::Unavailable(e.to_string())
}

impl RedisInputStream {
    pub fn new(
        conn: ConnectionManager,
        stream_key: impl Into<String>,
        last_id_key: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            stream_key: stream_key.into(),
            last_id_key: last_id_key.into(),
        }
    }
}

#[async_trait]
impl InputStream for RedisInputStream {
    async fn append(&self, entry: StreamEntry) -> Result<String, StreamError> {
        let mut conn = self.conn.clone();
        let timestamp = entry.timestamp.to_string();
        let id: String = conn
            .xadd(
                &self.stream_key,
                "*",
                &[
                    ("message", entry.message.as_str()),
                    ("session_id", entry.session_id.as_str()),
                    ("timestamp", timestamp.as_str()),
                ],
            )
            .await
            .map_err(kv_err)?;
        Ok(id)
    }

    async fn read_batch(
        &self,
        cursor: &Cursor,
        count: usize,
        block: Duration,
    ) -> Result<Vec<(String, StreamEntry)>, StreamError> {
        let from = match cursor {
            Cursor::Beginning => "0".to_string(),
            Cursor::Latest => "$".to_string(),
            Cursor::At(id) => id.clone(),
        };
        let opts = StreamReadOptions::default()
            .count(count)
            .block(block.as_millis() as usize);

        let mut conn = self.conn.clone();
        let reply: StreamReadReply = conn
            .xread_options(&[self.stream_key.as_str()], &[from.as_str()], &opts)
            .await
            .map_err(kv_err)?;

        let mut out = Vec::new();
        for key in reply.keys {
            for id in key.ids {
                let field = |name: &str| -> String {
                    id.map
                        .get(name)
                        .and_then(|v| redis::from_redis_value::<String>(v).ok())
                        .unwrap_or_default()
                };
                out.push((
                    id.id.clone(),
                    StreamEntry {
                        message: field("message"),
                        session_id: {
                            let s = field("session_id");
                            if s.is_empty() { "default".to_string() } else { s }
                        },
                        timestamp: field("timestamp").parse().unwrap_or(0.0),
                    },
                ));
            }
        }
        Ok(out)
    }

    async fn trim(&self, maxlen: usize) -> Result<(), StreamError> {
        let mut conn = self.conn.clone();
        conn.xtrim::<_, i64>(&self.stream_key, StreamMaxlen::Approx(maxlen))
            .await
            .map_err(kv_err)?;
        Ok(())
    }

    async fn read_cursor(&self) -> Result<Option<String>, StreamError> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(&self.last_id_key)
            .await
            .map_err(kv_err)
    }

    async fn write_cursor(&self, id: &str) -> Result<(), StreamError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(&self.last_id_key, id)
            .await
            .map_err(kv_err)
    }

    async fn latest_id(&self) -> Result<Option<String>, StreamError> {
        let mut conn = self.conn.clone();
        // Newest entry only; XREVRANGE <key> + - COUNT 1.
        let reply: Vec<(String, Vec<(String, String)>)> = redis::cmd("XREVRANGE")
            .arg(&self.stream_key)
            .arg("+")
            .arg("-")
            .arg("COUNT")
            .arg(1)
            .query_async(&mut conn)
            .await
            .map_err(kv_err)?;
        Ok(reply.into_iter().next().map(|(id, _)| id))
    }
}
