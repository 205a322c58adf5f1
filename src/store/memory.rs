use crate::store::{
    DocumentClient, DocumentStore, KeySchema, ReplaceGuard, RequestContext, StoreError,
    StoredDocument,
};

use async_trait::async_trait;
use serde_json::Value;
use std::{
    collections,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use uuid::Uuid;

type Documents = collections::HashMap<(String, String), StoredDocument>;

/// In-memory document client.
///
/// Containers obtained for the same (database, container) pair share their documents, so
/// clones of a client and containers handed out earlier all observe the same state.
///
/// ```rust
/// use product_store::store::{DocumentClient, memory::MemoryClient};
///
/// let client = MemoryClient::default();
/// let container = client.get_container("shop", "SampleData");
/// assert!(container.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemoryClient {
    containers: Arc<Mutex<collections::HashMap<(String, String), MemoryContainer>>>,
    key_schema: KeySchema,
}

impl MemoryClient {
    /// Client whose containers use the given key attributes.
    pub fn with_key_schema(key_schema: KeySchema) -> Self {
        Self {
            key_schema,
            ..Default::default()
        }
    }
}

impl DocumentClient for MemoryClient {
    type Container = MemoryContainer;

    fn get_container(&self, database_name: &str, container_name: &str) -> MemoryContainer {
        let mut containers = self
            .containers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        containers
            .entry((database_name.to_string(), container_name.to_string()))
            .or_insert_with(|| MemoryContainer::new(self.key_schema.clone()))
            .clone()
    }
}

/// In-memory container keyed by (partition key, id).
#[derive(Clone, Debug, Default)]
pub struct MemoryContainer {
    documents: Arc<Mutex<Documents>>,
    key_schema: KeySchema,
}

impl MemoryContainer {
    /// Empty container using the given key attributes.
    pub fn new(key_schema: KeySchema) -> Self {
        Self {
            documents: Arc::default(),
            key_schema,
        }
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the container holds no document.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Current state of a document, bypassing request contexts.
    pub fn snapshot(&self, id: &str, partition_key: &str) -> Option<StoredDocument> {
        self.lock()
            .get(&(partition_key.to_string(), id.to_string()))
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Documents> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn tag(body: Value) -> StoredDocument {
        StoredDocument {
            body,
            etag: Some(Uuid::new_v4().to_string()),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryContainer {
    async fn create_item(
        &self,
        document: Value,
        ctx: &RequestContext,
    ) -> Result<StoredDocument, StoreError> {
        ctx.check()?;
        let (partition_key, id) = self.key_schema.extract(&document)?;
        let key = (partition_key.to_string(), id.to_string());
        let mut documents = self.lock();
        match documents.entry(key) {
            collections::hash_map::Entry::Occupied(_) => Err(StoreError::AlreadyExists),
            collections::hash_map::Entry::Vacant(entry) => {
                Ok(entry.insert(Self::tag(document)).clone())
            }
        }
    }

    async fn read_item(
        &self,
        id: &str,
        partition_key: &str,
        ctx: &RequestContext,
    ) -> Result<StoredDocument, StoreError> {
        ctx.check()?;
        self.snapshot(id, partition_key).ok_or(StoreError::NotFound)
    }

    async fn replace_item(
        &self,
        id: &str,
        document: Value,
        guard: ReplaceGuard,
        ctx: &RequestContext,
    ) -> Result<StoredDocument, StoreError> {
        ctx.check()?;
        let (partition_key, body_id) = self.key_schema.extract(&document)?;
        if body_id != id {
            return Err(StoreError::InvalidDocument(format!(
                "body id `{body_id}` does not match `{id}`"
            )));
        }
        let key = (partition_key.to_string(), id.to_string());
        let mut documents = self.lock();
        let stored = documents.get_mut(&key).ok_or(StoreError::NotFound)?;
        if let ReplaceGuard::IfMatch(expected) = guard {
            if stored.etag != expected {
                return Err(StoreError::PreconditionFailed);
            }
        }
        *stored = Self::tag(document);
        Ok(stored.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use serde_json::json;

    fn document(price: f64) -> Value {
        json!({"id": "a", "categoryName": "b", "price": price})
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let container = MemoryContainer::default();
        let ctx = RequestContext::default();
        let created = container.create_item(document(1.0), &ctx).await.unwrap();
        let read = container.read_item("a", "b", &ctx).await.unwrap();
        assert_eq!(read, created);
        assert_eq!(read.body, document(1.0));
        assert!(read.etag.is_some());
    }

    #[tokio::test]
    async fn test_create_duplicate() {
        let container = MemoryContainer::default();
        let ctx = RequestContext::default();
        container.create_item(document(1.0), &ctx).await.unwrap();
        let actual = container.create_item(document(2.0), &ctx).await;
        assert!(matches!(actual, Err(StoreError::AlreadyExists)));
        assert_eq!(container.snapshot("a", "b").unwrap().body, document(1.0));
    }

    #[rstest]
    #[case::wrong_id("z", "b")]
    #[case::wrong_partition_key("a", "z")]
    #[case::partition_key_prefix("a", "")]
    #[tokio::test]
    async fn test_read_not_found(#[case] id: &str, #[case] partition_key: &str) {
        let container = MemoryContainer::default();
        let ctx = RequestContext::default();
        container.create_item(document(1.0), &ctx).await.unwrap();
        let actual = container.read_item(id, partition_key, &ctx).await;
        assert!(matches!(actual, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_replace_if_match() {
        let container = MemoryContainer::default();
        let ctx = RequestContext::default();
        let created = container.create_item(document(1.0), &ctx).await.unwrap();
        let replaced = container
            .replace_item("a", document(2.0), ReplaceGuard::IfMatch(created.etag.clone()), &ctx)
            .await
            .unwrap();
        assert_ne!(replaced.etag, created.etag);
        let stale = container
            .replace_item("a", document(3.0), ReplaceGuard::IfMatch(created.etag), &ctx)
            .await;
        assert!(matches!(stale, Err(StoreError::PreconditionFailed)));
        assert_eq!(container.snapshot("a", "b").unwrap(), replaced);
    }

    #[tokio::test]
    async fn test_replace_missing() {
        let container = MemoryContainer::default();
        let ctx = RequestContext::default();
        let actual = container
            .replace_item("a", document(1.0), ReplaceGuard::Unconditional, &ctx)
            .await;
        assert!(matches!(actual, Err(StoreError::NotFound)));
        assert!(container.is_empty());
    }

    #[tokio::test]
    async fn test_replace_id_mismatch() {
        let container = MemoryContainer::default();
        let ctx = RequestContext::default();
        container.create_item(document(1.0), &ctx).await.unwrap();
        let actual = container
            .replace_item("z", document(2.0), ReplaceGuard::Unconditional, &ctx)
            .await;
        assert!(matches!(actual, Err(StoreError::InvalidDocument(_))));
    }

    #[tokio::test]
    async fn test_cancelled_context_does_not_write() {
        let container = MemoryContainer::default();
        let ctx = RequestContext::default();
        ctx.cancellation.cancel();
        let actual = container.create_item(document(1.0), &ctx).await;
        assert!(matches!(actual, Err(StoreError::Cancelled)));
        assert!(container.is_empty());
    }

    #[tokio::test]
    async fn test_client_shares_containers() {
        let client = MemoryClient::default();
        let ctx = RequestContext::default();
        client
            .get_container("db", "c")
            .create_item(document(1.0), &ctx)
            .await
            .unwrap();
        assert_eq!(client.get_container("db", "c").len(), 1);
        assert!(client.get_container("db", "other").is_empty());
        assert!(client.get_container("other", "c").is_empty());
    }
}
