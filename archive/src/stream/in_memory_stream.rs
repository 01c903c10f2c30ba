//! In-memory input stream: VecDeque behind a mutex, monotone `<ms>-<seq>` ids
//! matching the Redis stream id shape.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Cursor, InputStream, StreamEntry, StreamError};

#[derive(Default)]
pub struct InMemoryInputStream {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: VecDeque<(String, StreamEntry)>,
    seq: u64,
    cursor: Option<String>,
}

impl InMemoryInputStream {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect(&self, cursor: &Cursor, count: usize) -> Vec<(String, StreamEntry)> {
        let inner = self.inner.lock().unwrap();
        let after = match cursor {
            Cursor::Beginning => None,
            Cursor::Latest => inner.entries.back().map(|(id, _)| id_parts(id)),
            Cursor::At(id) => Some(id_parts(id)),
        };
        inner
            .entries
            .iter()
            .filter(|(id, _)| after.map_or(true, |a| id_parts(id) > a))
            .take(count)
            .cloned()
            .collect()
    }
}

/// Ids compare in stream order: numeric ms part, then sequence.
fn id_parts(id: &str) -> (u64, u64) {
    let mut split = id.splitn(2, '-');
    let ms = split.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let seq = split.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    (ms, seq)
}

#[async_trait]
impl InputStream for InMemoryInputStream {
    async fn append(&self, entry: StreamEntry) -> Result<String, StreamError> {
        let mut inner = self.inner.lock().unwrap();
        let ms = (entry.timestamp * 1000.0) as u64;
        inner.seq += 1;
        let id = format!("{ms}-{}", inner.seq);
        inner.entries.push_back((id.clone(), entry));
        Ok(id)
    }

    async fn read_batch(
        &self,
        cursor: &Cursor,
        count: usize,
        block: Duration,
    ) -> Result<Vec<(String, StreamEntry)>, StreamError> {
        let out = self.collect(cursor, count);
        if !out.is_empty() || block.is_zero() {
            return Ok(out);
        }
        // Nothing pending: honour the block like XREAD BLOCK would.
        tokio::time::sleep(block).await;
        Ok(self.collect(cursor, count))
    }

    async fn trim(&self, maxlen: usize) -> Result<(), StreamError> {
        let mut inner = self.inner.lock().unwrap();
        while inner.entries.len() > maxlen {
            inner.entries.pop_front();
        }
        Ok(())
    }

    async fn read_cursor(&self) -> Result<Option<String>, StreamError> {
        Ok(self.inner.lock().unwrap().cursor.clone())
    }

    async fn write_cursor(&self, id: &str) -> Result<(), StreamError> {
        self.inner.lock().unwrap().cursor = Some(id.to_string());
        Ok(())
    }

    async fn latest_id(&self) -> Result<Option<String>, StreamError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .entries
            .back()
            .map(|(id, _)| id.clone()))
    }
}
