//! Redis-backed memory store: hashes under `memory:*` plus an FT vector
//! index (HNSW, COSINE) over the `embedding` field.
//!
//! Embeddings are stored as raw little-endian f32 bytes and searched with
//! `FT.SEARCH ... =>[KNN ...]` (DIALECT 2). Field decoding tolerates both
//! byte and string representations, since other producers (the librarian)
//! write the same hash shape through different clients.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Value;

use super::codec::{decode_embedding, encode_embedding};
use super::{
    check_entry, Embedder, MemoryEntry, MemoryHit, MemoryStore, StoreError, MEMORY_INDEX,
    MEMORY_PREFIX,
};

pub struct RedisMemoryStore {
    conn: ConnectionManager,
    embedder: Arc<dyn Embedder>,
    seq: AtomicU64,
}

fn kv_err(e: redis::RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Bulk or simple string payload of a reply value, as bytes.
fn value_bytes(v: &Value) -> Option<Vec<u8>> {
    match v {
        Value::BulkString(b) => Some(b.clone()),
        Value::SimpleString(s) => Some(s.as_bytes().to_vec()),
        _ => None,
    }
}

fn value_string(v: &Value) -> Option<String> {
    match v {
        Value::BulkString(b) => Some(String::from_utf8_lossy(b).into_owned()),
        Value::SimpleString(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::Double(d) => Some(d.to_string()),
        _ => None,
    }
}

/// Decodes a field map (from HGETALL or FT.SEARCH) into an entry. Numeric
/// fields may arrive as strings; the embedding may be raw bytes or a utf-8
/// string of bytes.
fn entry_from_fields(fields: &HashMap<String, Vec<u8>>) -> Result<MemoryEntry, StoreError> {
    let text = |name: &str| -> String {
        fields
            .get(name)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    };
    let num = |name: &str| -> f64 { text(name).parse().unwrap_or(0.0) };

    let message = text("message");
    if message.is_empty() {
        return Err(StoreError::Serialization("hash has no message field".into()));
    }
    let embedding = match fields.get("embedding") {
        Some(bytes) => decode_embedding(bytes)?,
        None => Vec::new(),
    };
    let metadata = serde_json::from_str(&text("metadata")).unwrap_or(serde_json::Value::Null);
    let session_id = {
        let s = text("session_id");
        if s.is_empty() { "default".to_string() } else { s }
    };

    Ok(MemoryEntry {
        message,
        embedding,
        perplexity: num("perplexity"),
        surprise_score: num("surprise_score"),
        timestamp: num("timestamp"),
        session_id,
        metadata,
    })
}

impl RedisMemoryStore {
    pub fn new(conn: ConnectionManager, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            conn,
            embedder,
            seq: AtomicU64::new(0),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let n: i64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(kv_err)?;
        Ok(n > 0)
    }

    /// `memory:<ms>` from the entry timestamp; `-<seq>` suffix when the key
    /// already exists (same-ms write or clock regression on replay).
    async fn next_id(&self, timestamp: f64) -> Result<String, StoreError> {
        let ms = (timestamp * 1000.0) as u64;
        let base = format!("{MEMORY_PREFIX}{ms}");
        if !self.exists(&base).await? {
            return Ok(base);
        }
        loop {
            let id = format!("{base}-{}", self.seq.fetch_add(1, Ordering::Relaxed));
            if !self.exists(&id).await? {
                return Ok(id);
            }
        }
    }

    /// All keys under the memory prefix via cursor SCAN.
    async fn scan_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(format!("{MEMORY_PREFIX}*"))
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await
                .map_err(kv_err)?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        // The worker cursor lives under the same prefix; it is not a memory.
        keys.retain(|k| !k.ends_with(":last_id") && k != "memory:last_id");
        Ok(keys)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, Vec<u8>> = redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(kv_err)?;
        if fields.is_empty() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(fields)
    }
}

#[async_trait]
impl MemoryStore for RedisMemoryStore {
    async fn ensure_index(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let dim = self.embedder.dimension();
        let result: Result<(), redis::RedisError> = redis::cmd("FT.CREATE")
            .arg(MEMORY_INDEX)
            .arg("ON")
            .arg("HASH")
            .arg("PREFIX")
            .arg(1)
            .arg(MEMORY_PREFIX)
            .arg("SCHEMA")
            .arg("message")
            .arg("TEXT")
            .arg("embedding")
            .arg("VECTOR")
            .arg("HNSW")
            .arg(6)
            .arg("TYPE")
            .arg("FLOAT32")
            .arg("DIM")
            .arg(dim)
            .arg("DISTANCE_METRIC")
            .arg("COSINE")
            .arg("perplexity")
            .arg("NUMERIC")
            .arg("SORTABLE")
            .arg("surprise_score")
            .arg("NUMERIC")
            .arg("SORTABLE")
            .arg("timestamp")
            .arg("NUMERIC")
            .arg("SORTABLE")
            .arg("session_id")
            .arg("TAG")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().to_lowercase().contains("index already exists") => Ok(()),
            Err(e) => Err(kv_err(e)),
        }
    }

    async fn store(&self, entry: MemoryEntry) -> Result<String, StoreError> {
        check_entry(&entry, self.embedder.dimension())?;
        let id = self.next_id(entry.timestamp).await?;
        let metadata = serde_json::to_string(&entry.metadata)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut conn = self.conn.clone();
        let _: () = redis::cmd("HSET")
            .arg(&id)
            .arg("message")
            .arg(&entry.message)
            .arg("embedding")
            .arg(encode_embedding(&entry.embedding))
            .arg("perplexity")
            .arg(entry.perplexity)
            .arg("surprise_score")
            .arg(entry.surprise_score)
            .arg("timestamp")
            .arg(entry.timestamp)
            .arg("session_id")
            .arg(&entry.session_id)
            .arg("metadata")
            .arg(metadata)
            .query_async(&mut conn)
            .await
            .map_err(kv_err)?;
        Ok(id)
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
        session: Option<&str>,
    ) -> Result<Vec<MemoryHit>, StoreError> {
        let qv = self.embedder.embed_one(query).await?;
        let filter = match session {
            Some(s) => format!("(@session_id:{{{s}}})"),
            None => "*".to_string(),
        };
        let knn = format!("{filter}=>[KNN {top_k} @embedding $vec AS vector_score]");

        let mut conn = self.conn.clone();
        let reply: Value = redis::cmd("FT.SEARCH")
            .arg(MEMORY_INDEX)
            .arg(knn)
            .arg("PARAMS")
            .arg(2)
            .arg("vec")
            .arg(encode_embedding(&qv))
            .arg("SORTBY")
            .arg("vector_score")
            .arg("DIALECT")
            .arg(2)
            .query_async(&mut conn)
            .await
            .map_err(kv_err)?;

        // Reply shape: [total, key1, [f1, v1, ...], key2, [..], ...]
        let Value::Array(items) = reply else {
            return Err(StoreError::Serialization(
                "unexpected FT.SEARCH reply shape".into(),
            ));
        };
        let mut hits = Vec::new();
        let mut it = items.into_iter().skip(1);
        while let (Some(key), Some(fields)) = (it.next(), it.next()) {
            let Some(id) = value_string(&key) else {
                continue;
            };
            let Value::Array(pairs) = fields else {
                continue;
            };
            let mut map: HashMap<String, Vec<u8>> = HashMap::new();
            let mut pit = pairs.into_iter();
            while let (Some(name), Some(val)) = (pit.next(), pit.next()) {
                if let (Some(n), Some(v)) = (value_string(&name), value_bytes(&val)) {
                    map.insert(n, v);
                }
            }
            let distance: f64 = map
                .get("vector_score")
                .map(|b| String::from_utf8_lossy(b).parse().unwrap_or(1.0))
                .unwrap_or(1.0);
            let entry = entry_from_fields(&map)?;
            hits.push(MemoryHit {
                id,
                entry,
                similarity: 1.0 - distance,
            });
        }
        Ok(hits)
    }

    async fn get(&self, id: &str) -> Result<MemoryEntry, StoreError> {
        let fields = self.hgetall(id).await?;
        entry_from_fields(&fields)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(id)
            .query_async(&mut conn)
            .await
            .map_err(kv_err)?;
        if removed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<(String, MemoryEntry)>, StoreError> {
        let keys = self.scan_keys().await?;
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            match self.hgetall(&key).await {
                Ok(fields) => entries.push((key, entry_from_fields(&fields)?)),
                Err(StoreError::NotFound(_)) => continue, // deleted between scan and read
                Err(e) => return Err(e),
            }
        }
        entries.sort_by(|a, b| b.1.timestamp.total_cmp(&a.1.timestamp));
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.scan_keys().await?.len())
    }

    async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        let pong: Result<String, redis::RedisError> =
            redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &[u8])]) -> HashMap<String, Vec<u8>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_vec()))
            .collect()
    }

    #[test]
    fn entry_decodes_string_numerics_and_byte_embedding() {
        let emb = encode_embedding(&[0.5, -0.5]);
        let map = fields(&[
            ("message", b"hello"),
            ("embedding", &emb),
            ("perplexity", b"12.5"),
            ("surprise_score", b"0.81"),
            ("timestamp", b"1700000000.25"),
            ("session_id", b"s9"),
            ("metadata", br#"{"k":1}"#),
        ]);
        let e = entry_from_fields(&map).unwrap();
        assert_eq!(e.message, "hello");
        assert_eq!(e.embedding, vec![0.5, -0.5]);
        assert_eq!(e.perplexity, 12.5);
        assert_eq!(e.surprise_score, 0.81);
        assert_eq!(e.timestamp, 1700000000.25);
        assert_eq!(e.session_id, "s9");
        assert_eq!(e.metadata["k"], 1);
    }

    #[test]
    fn missing_optional_fields_default() {
        let map = fields(&[("message", b"just text")]);
        let e = entry_from_fields(&map).unwrap();
        assert_eq!(e.session_id, "default");
        assert!(e.embedding.is_empty());
        assert!(e.metadata.is_null());
    }

    #[test]
    fn missing_message_is_a_serialization_error() {
        let map = fields(&[("timestamp", b"1.0")]);
        assert!(matches!(
            entry_from_fields(&map),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn value_helpers_accept_bulk_simple_and_numeric() {
        assert_eq!(
            value_string(&Value::BulkString(b"x".to_vec())).as_deref(),
            Some("x")
        );
        assert_eq!(
            value_string(&Value::SimpleString("y".into())).as_deref(),
            Some("y")
        );
        assert_eq!(value_string(&Value::Int(7)).as_deref(), Some("7"));
        assert!(value_bytes(&Value::Nil).is_none());
    }
}
