//! Document store abstraction.
//!
//! A [`DocumentClient`] hands out containers, and a container implementing [`DocumentStore`]
//! offers the three point operations the repository needs: create, read by
//! (id, partition key) and full-document replace.

/// Amazon DynamoDB backend.
pub mod dynamodb;

/// In-process backend with the same semantics as the remote ones.
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use std::{error, future::Future};
use tokio::time;
use tokio_util::sync::CancellationToken;

/// Failure reported by a document store.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// No document exists at the requested (partition key, id).
    #[error("document not found")]
    NotFound,
    /// A document with the same (partition key, id) already exists.
    #[error("document already exists")]
    AlreadyExists,
    /// The stored document no longer matches the expected etag.
    #[error("precondition failed: etag mismatch")]
    PreconditionFailed,
    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,
    /// The caller's deadline elapsed before the request completed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,
    /// The document cannot be stored or decoded.
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    /// Transport, authentication, throttling or any unclassified remote failure.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn error::Error + Send + Sync>),
}

/// A document as returned by the store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoredDocument {
    /// The document body, without system metadata.
    pub body: Value,
    /// The version tag assigned by the store on the last write, if any.
    pub etag: Option<String>,
}

/// Guard applied to [`DocumentStore::replace_item`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum ReplaceGuard {
    /// Replace the document as long as it exists.
    #[default]
    Unconditional,
    /// Replace the document only if its etag still equals the given one.
    ///
    /// `IfMatch(None)` expects a document that was never tagged.
    IfMatch(Option<String>),
}

/// Attribute names forming the primary key of a container.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct KeySchema {
    /// Top-level attribute holding the partition key.
    pub partition_key: String,
    /// Top-level attribute holding the document id.
    pub id: String,
}

impl Default for KeySchema {
    fn default() -> Self {
        Self {
            partition_key: "categoryName".to_string(),
            id: "id".to_string(),
        }
    }
}

impl KeySchema {
    /// Extract `(partition key, id)` from a document body.
    pub fn extract<'a>(&self, body: &'a Value) -> Result<(&'a str, &'a str), StoreError> {
        let partition_key = body
            .get(&self.partition_key)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StoreError::InvalidDocument(format!(
                    "missing string attribute `{}`",
                    self.partition_key
                ))
            })?;
        let id = body.get(&self.id).and_then(Value::as_str).ok_or_else(|| {
            StoreError::InvalidDocument(format!("missing string attribute `{}`", self.id))
        })?;
        Ok((partition_key, id))
    }
}

/// Cancellation and deadline shared by every store call of one repository operation.
///
/// ```rust
/// use product_store::store::RequestContext;
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let ctx = RequestContext::new(token.clone());
/// token.cancel();
/// assert!(ctx.check().is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    /// Token the caller cancels to abandon the operation.
    pub cancellation: CancellationToken,
    /// Absolute point in time after which the operation is abandoned.
    pub deadline: Option<time::Instant>,
}

impl RequestContext {
    /// Context driven by the given cancellation token, without deadline.
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            deadline: None,
        }
    }

    /// Set the deadline `timeout` from now.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_timeout(mut self, timeout: time::Duration) -> Self {
        self.deadline = Some(time::Instant::now() + timeout);
        self
    }

    /// Fail fast when the context already fired.
    pub fn check(&self) -> Result<(), StoreError> {
        if self.cancellation.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= time::Instant::now() => {
                Err(StoreError::DeadlineExceeded)
            }
            _ => Ok(()),
        }
    }

    /// Drive `future` until it completes, the token is cancelled or the deadline elapses.
    pub async fn run<F, T>(&self, future: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(deadline) => time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(StoreError::Cancelled),
            _ = deadline => Err(StoreError::DeadlineExceeded),
            output = future => output,
        }
    }
}

/// A container of JSON documents partitioned by a key attribute.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a new document. Fails with [`StoreError::AlreadyExists`] on duplicates.
    async fn create_item(
        &self,
        document: Value,
        ctx: &RequestContext,
    ) -> Result<StoredDocument, StoreError>;

    /// Point read by id and exact partition key. Fails with [`StoreError::NotFound`].
    async fn read_item(
        &self,
        id: &str,
        partition_key: &str,
        ctx: &RequestContext,
    ) -> Result<StoredDocument, StoreError>;

    /// Replace an existing document. The partition key is taken from the body.
    async fn replace_item(
        &self,
        id: &str,
        document: Value,
        guard: ReplaceGuard,
        ctx: &RequestContext,
    ) -> Result<StoredDocument, StoreError>;
}

/// Entry point of a store backend.
pub trait DocumentClient {
    /// Container handle type.
    type Container: DocumentStore;

    /// Get a handle on `container_name` inside `database_name`.
    fn get_container(&self, database_name: &str, container_name: &str) -> Self::Container;
}
