use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use wozif_core::error::{Result, WozifError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS embeddings (
        hash TEXT PRIMARY KEY,
        model TEXT NOT NULL,
        embedding BLOB NOT NULL,
        created_at TEXT NOT NULL
    );";

/// SQLite-backed cache of chunk embeddings keyed by content hash, so that
/// rebuilding the index only embeds chunks that changed.
pub struct EmbeddingCache {
    conn: Mutex<Option<Connection>>,
}

impl EmbeddingCache {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                WozifError::Database(format!("Failed to create db directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| WozifError::Database(e.to_string()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| WozifError::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| WozifError::Database(e.to_string()))?;

        debug!(path = %path.display(), "Embedding cache opened");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| WozifError::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| WozifError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let guard = self
            .conn
            .lock()
            .map_err(|e| WozifError::Database(e.to_string()))?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| WozifError::Database("embedding cache is closed".into()))?;
        f(conn).map_err(|e| WozifError::Database(e.to_string()))
    }

    pub fn get(&self, hash: &str) -> Result<Option<Vec<f32>>> {
        let blob: Option<Vec<u8>> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT embedding FROM embeddings WHERE hash = ?1",
                params![hash],
                |row| row.get(0),
            )
            .optional()
        })?;
        Ok(blob.map(|b| decode(&b)))
    }

    pub fn put(&self, hash: &str, model: &str, embedding: &[f32]) -> Result<()> {
        let blob = encode(embedding);
        let now = chrono::Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO embeddings (hash, model, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![hash, model, blob, now],
            )
        })?;
        Ok(())
    }

    /// Number of cached embeddings.
    pub fn len(&self) -> Result<usize> {
        let n: i64 =
            self.with_conn(|conn| conn.query_row("SELECT COUNT(*) FROM embeddings", [], |r| r.get(0)))?;
        Ok(n as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Close the connection. Later calls fail with a database error.
    pub fn close(&self) -> Result<()> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| WozifError::Database(e.to_string()))?;
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, e)| WozifError::Database(e.to_string()))?;
            debug!("Embedding cache closed");
        }
        Ok(())
    }
}

fn encode(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get() {
        let cache = EmbeddingCache::in_memory().unwrap();
        assert!(cache.is_empty().unwrap());
        cache.put("h1", "m", &[0.5, -1.25, 3.0]).unwrap();
        assert_eq!(cache.get("h1").unwrap(), Some(vec![0.5, -1.25, 3.0]));
        assert_eq!(cache.get("missing").unwrap(), None);
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_put_replaces() {
        let cache = EmbeddingCache::in_memory().unwrap();
        cache.put("h1", "m", &[1.0]).unwrap();
        cache.put("h1", "m", &[2.0]).unwrap();
        assert_eq!(cache.get("h1").unwrap(), Some(vec![2.0]));
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("emb.db");
        {
            let cache = EmbeddingCache::open(&path).unwrap();
            cache.put("h", "m", &[1.0, 2.0]).unwrap();
            cache.close().unwrap();
        }
        let cache = EmbeddingCache::open(&path).unwrap();
        assert_eq!(cache.get("h").unwrap(), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn test_closed_cache_errors() {
        let cache = EmbeddingCache::in_memory().unwrap();
        cache.close().unwrap();
        cache.close().unwrap();
        assert!(matches!(cache.get("h"), Err(WozifError::Database(_))));
    }
}
