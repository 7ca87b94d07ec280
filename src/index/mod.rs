//! External vector index adapter
//!
//! Models the optional approximate-nearest-neighbor accelerator as a
//! capability behind a trait with two implementations: an unavailable stub
//! and an HTTP client. Every call is best-effort from the engine's
//! perspective: failed stores and deletes are logged and ignored, a failed
//! search triggers the exact brute-force fallback.

#[cfg(feature = "remote-index")]
mod remote;

#[cfg(feature = "remote-index")]
pub use remote::HttpVectorIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PraxisError, Result};

/// Payload stored alongside a vector in the external index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Text content associated with the vector
    pub content: String,
    /// The vector itself
    pub embedding: Vec<f32>,
    /// Arbitrary metadata as JSON
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A single match returned by the external index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMatch {
    /// Id the record was stored under
    pub id: String,
    /// Similarity to the query vector
    pub similarity: f32,
}

/// Adapter for an external approximate-nearest-neighbor service
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Prepare the index for use (connect, create namespace, ...)
    async fn initialize(&self) -> Result<()>;

    /// Store or overwrite a record under `id`
    async fn store(&self, id: &str, record: IndexRecord) -> Result<()>;

    /// Approximate top-k search
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexMatch>>;

    /// Delete the record stored under `id`
    async fn delete(&self, id: &str) -> Result<()>;

    /// Release any held resources
    async fn close(&self) -> Result<()>;

    /// Whether the index can currently serve requests
    fn is_available(&self) -> bool;
}

/// Stub used when no external index is configured
///
/// Search always errors so callers exercise the exact brute-force path;
/// writes succeed silently so mirroring stays a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullVectorIndex;

#[async_trait]
impl VectorIndex for NullVectorIndex {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn store(&self, _id: &str, _record: IndexRecord) -> Result<()> {
        Ok(())
    }

    async fn search(&self, _query: &[f32], _k: usize) -> Result<Vec<IndexMatch>> {
        Err(PraxisError::Index(
            "no external vector index configured".to_string(),
        ))
    }

    async fn delete(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_index_is_unavailable() {
        let index = NullVectorIndex;
        assert!(!index.is_available());
        assert!(tokio_test::block_on(index.search(&[1.0, 0.0], 3)).is_err());
        assert!(tokio_test::block_on(index.store(
            "m-1",
            IndexRecord {
                content: "strategy".to_string(),
                embedding: vec![1.0, 0.0],
                metadata: HashMap::new(),
            }
        ))
        .is_ok());
        assert!(tokio_test::block_on(index.delete("m-1")).is_ok());
    }
}
