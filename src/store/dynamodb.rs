//! Amazon DynamoDB backend.
//!
//! A container is a table whose primary key is (partition key attribute, id attribute).
//! The etag lives in its own attribute next to the document fields and is stripped from the
//! body handed back to callers.

/// Condition expression building for conditional writes.
pub mod condition;

/// Get item operation for point reads.
pub mod get_item;

/// Key types for identifying items.
pub mod key;

/// Put item operation for creating and replacing items.
pub mod put_item;

use crate::store::{
    DocumentClient, DocumentStore, KeySchema, ReplaceGuard, RequestContext, StoreError,
    StoredDocument,
};

use async_trait::async_trait;
use aws_sdk_dynamodb::{Client, error, operation, types};
use serde_dynamo::from_item;
use serde_json::Value;
use std::{collections, fmt};
use uuid::Uuid;

/// Default name of the attribute holding the etag.
pub const ETAG_ATTRIBUTE: &str = "etag";

/// DynamoDB document client.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client;
/// use product_store::store::{DocumentClient, dynamodb::DynamoDbClient};
///
/// # fn example(client: Client) {
/// let container = DynamoDbClient::new(client).get_container("shop", "SampleData");
/// assert_eq!(container.table_name(), "shop.SampleData");
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DynamoDbClient {
    /// The underlying SDK client.
    pub client: Client,
    /// Whether point reads are strongly consistent.
    pub consistent_read: bool,
    /// Attribute holding the etag.
    pub etag_attribute: String,
    /// Key attributes of every table.
    pub key_schema: KeySchema,
}

impl DynamoDbClient {
    /// Client with strongly consistent reads and the default key schema.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            consistent_read: true,
            etag_attribute: ETAG_ATTRIBUTE.to_string(),
            key_schema: KeySchema::default(),
        }
    }
}

impl DocumentClient for DynamoDbClient {
    type Container = DynamoDbContainer;

    fn get_container(&self, database_name: &str, container_name: &str) -> DynamoDbContainer {
        let table_name = if database_name.is_empty() {
            container_name.to_string()
        } else {
            format!("{database_name}.{container_name}")
        };
        DynamoDbContainer {
            client: self.client.clone(),
            consistent_read: self.consistent_read,
            etag_attribute: self.etag_attribute.clone(),
            key_schema: self.key_schema.clone(),
            table_name,
        }
    }
}

/// A DynamoDB table used as a document container.
#[derive(Clone, Debug)]
pub struct DynamoDbContainer {
    client: Client,
    consistent_read: bool,
    etag_attribute: String,
    key_schema: KeySchema,
    table_name: String,
}

impl DynamoDbContainer {
    /// Name of the backing table.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn tag(&self, mut document: Value) -> Result<(Value, String), StoreError> {
        let etag = Uuid::new_v4().to_string();
        let object = document.as_object_mut().ok_or_else(|| {
            StoreError::InvalidDocument("document must be a JSON object".to_string())
        })?;
        object.insert(self.etag_attribute.clone(), Value::String(etag.clone()));
        Ok((document, etag))
    }

    fn untag(&self, mut document: Value) -> StoredDocument {
        let etag = document
            .as_object_mut()
            .and_then(|object| object.remove(&self.etag_attribute))
            .and_then(|etag| etag.as_str().map(str::to_string));
        StoredDocument {
            body: document,
            etag,
        }
    }

    fn decode(
        &self,
        item: collections::HashMap<String, types::AttributeValue>,
    ) -> Result<StoredDocument, StoreError> {
        let document: Value =
            from_item(item).map_err(|err| StoreError::InvalidDocument(err.to_string()))?;
        Ok(self.untag(document))
    }

    fn id_condition(&self, condition: condition::Condition<Value>) -> condition::KeyCondition<Value> {
        condition::KeyCondition {
            name: self.key_schema.id.clone(),
            condition,
        }
    }

    fn replace_conditions(&self, guard: ReplaceGuard) -> condition::Conditions<Value> {
        let mut conditions = vec![self.id_condition(condition::Condition::NotNull)];
        if let ReplaceGuard::IfMatch(expected) = guard {
            let etag_condition = match expected {
                Some(etag) => condition::Condition::Equals(Value::String(etag)),
                None => condition::Condition::Null,
            };
            conditions.push(condition::KeyCondition {
                name: self.etag_attribute.clone(),
                condition: etag_condition,
            });
        }
        condition::Conditions {
            operator: condition::LogicalOperator::And,
            conditions,
        }
    }
}

fn transport<E>(err: E) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StoreError::Transport(Box::new(err))
}

/// Classify a failed put: the conditional check is the only expected failure.
fn classify_put_error<R>(
    err: error::SdkError<operation::put_item::PutItemError, R>,
    on_missing: StoreError,
) -> StoreError
where
    R: fmt::Debug + Send + Sync + 'static,
{
    match err.as_service_error() {
        Some(operation::put_item::PutItemError::ConditionalCheckFailedException(exception)) => {
            // the old item only comes back when the document exists
            if exception.item().is_some() {
                StoreError::PreconditionFailed
            } else {
                on_missing
            }
        }
        _ => transport(err),
    }
}

#[async_trait]
impl DocumentStore for DynamoDbContainer {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "product_store.dynamodb.create_item", skip_all, fields(table = %self.table_name))
    )]
    async fn create_item(
        &self,
        document: Value,
        ctx: &RequestContext,
    ) -> Result<StoredDocument, StoreError> {
        self.key_schema.extract(&document)?;
        let (item, etag) = self.tag(document)?;
        let put_item = put_item::PutItem {
            item: item.clone(),
            condition: Some(condition::Conditions {
                operator: condition::LogicalOperator::And,
                conditions: vec![self.id_condition(condition::Condition::Null)],
            }),
            return_values_on_condition_check_failure: None,
            table_name: self.table_name.clone(),
        };
        ctx.run(async {
            put_item
                .send(&self.client)
                .await
                .map_err(|err| classify_put_error(err, StoreError::AlreadyExists))
        })
        .await?;
        let mut stored = self.untag(item);
        stored.etag = Some(etag);
        Ok(stored)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "product_store.dynamodb.read_item", skip(self, ctx), fields(table = %self.table_name))
    )]
    async fn read_item(
        &self,
        id: &str,
        partition_key: &str,
        ctx: &RequestContext,
    ) -> Result<StoredDocument, StoreError> {
        let get_item = get_item::GetItem {
            keys: key::Keys {
                partition_key: key::Key {
                    name: self.key_schema.partition_key.clone(),
                    value: partition_key,
                },
                id: key::Key {
                    name: self.key_schema.id.clone(),
                    value: id,
                },
            },
            consistent_read: Some(self.consistent_read),
            table_name: self.table_name.clone(),
        };
        let output = ctx
            .run(async { get_item.send(&self.client).await.map_err(transport) })
            .await?;
        let item = output.item.ok_or(StoreError::NotFound)?;
        self.decode(item)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "product_store.dynamodb.replace_item", skip(self, document, ctx), fields(table = %self.table_name))
    )]
    async fn replace_item(
        &self,
        id: &str,
        document: Value,
        guard: ReplaceGuard,
        ctx: &RequestContext,
    ) -> Result<StoredDocument, StoreError> {
        let (_, body_id) = self.key_schema.extract(&document)?;
        if body_id != id {
            return Err(StoreError::InvalidDocument(format!(
                "body id `{body_id}` does not match `{id}`"
            )));
        }
        let (item, etag) = self.tag(document)?;
        let put_item = put_item::PutItem {
            item: item.clone(),
            condition: Some(self.replace_conditions(guard)),
            return_values_on_condition_check_failure: Some(
                types::ReturnValuesOnConditionCheckFailure::AllOld,
            ),
            table_name: self.table_name.clone(),
        };
        ctx.run(async {
            put_item
                .send(&self.client)
                .await
                .map_err(|err| classify_put_error(err, StoreError::NotFound))
        })
        .await?;
        let mut stored = self.untag(item);
        stored.etag = Some(etag);
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use aws_sdk_dynamodb::config;
    use rstest::rstest;
    use serde_json::json;

    fn client() -> DynamoDbClient {
        let config = config::Config::builder()
            .behavior_version(config::BehaviorVersion::latest())
            .region(config::Region::new("eu-west-1"))
            .build();
        DynamoDbClient::new(Client::from_conf(config))
    }

    #[rstest]
    #[case::with_database("shop", "SampleData", "shop.SampleData")]
    #[case::without_database("", "SampleData", "SampleData")]
    fn test_table_name(#[case] database: &str, #[case] container: &str, #[case] expected: &str) {
        let container = client().get_container(database, container);
        assert_eq!(container.table_name(), expected);
    }

    #[test]
    fn test_tag_and_untag() {
        let container = client().get_container("shop", "SampleData");
        let (tagged, etag) = container.tag(json!({"id": "a"})).unwrap();
        assert_eq!(tagged, json!({"id": "a", "etag": etag}));
        let stored = container.untag(tagged);
        assert_eq!(stored.body, json!({"id": "a"}));
        assert_eq!(stored.etag, Some(etag));
    }

    #[test]
    fn test_tag_rejects_non_object() {
        let container = client().get_container("shop", "SampleData");
        let actual = container.tag(json!(["a"]));
        assert!(matches!(actual, Err(StoreError::InvalidDocument(_))));
    }

    #[test]
    fn test_decode_item() {
        let container = client().get_container("shop", "SampleData");
        let item = collections::HashMap::from([
            ("id".to_string(), types::AttributeValue::S("a".to_string())),
            ("etag".to_string(), types::AttributeValue::S("v1".to_string())),
            ("inventory".to_string(), types::AttributeValue::N("279".to_string())),
        ]);
        let actual = container.decode(item).unwrap();
        assert_eq!(actual.body, json!({"id": "a", "inventory": 279}));
        assert_eq!(actual.etag, Some("v1".to_string()));
    }

    #[rstest]
    #[case::unconditional(
        ReplaceGuard::Unconditional,
        vec![
            condition::KeyCondition {
                name: "id".to_string(),
                condition: condition::Condition::NotNull,
            },
        ]
    )]
    #[case::if_match_etag(
        ReplaceGuard::IfMatch(
            Some(
                "v1".to_string()
            )
        ),
        vec![
            condition::KeyCondition {
                name: "id".to_string(),
                condition: condition::Condition::NotNull,
            },
            condition::KeyCondition {
                name: "etag".to_string(),
                condition: condition::Condition::Equals(
                    Value::String(
                        "v1".to_string()
                    )
                ),
            },
        ]
    )]
    #[case::if_match_untagged(
        ReplaceGuard::IfMatch(None),
        vec![
            condition::KeyCondition {
                name: "id".to_string(),
                condition: condition::Condition::NotNull,
            },
            condition::KeyCondition {
                name: "etag".to_string(),
                condition: condition::Condition::Null,
            },
        ]
    )]
    fn test_replace_conditions(
        #[case] guard: ReplaceGuard,
        #[case] expected: Vec<condition::KeyCondition<Value>>,
    ) {
        let container = client().get_container("shop", "SampleData");
        let actual = container.replace_conditions(guard);
        assert_eq!(actual.operator, condition::LogicalOperator::And);
        assert_eq!(actual.conditions, expected);
    }

    fn service_error(
        err: operation::put_item::PutItemError,
    ) -> error::SdkError<operation::put_item::PutItemError, ()> {
        error::SdkError::service_error(err, ())
    }

    fn condition_failed(
        item: Option<collections::HashMap<String, types::AttributeValue>>,
    ) -> error::SdkError<operation::put_item::PutItemError, ()> {
        service_error(
            operation::put_item::PutItemError::ConditionalCheckFailedException(
                types::error::ConditionalCheckFailedException::builder()
                    .message("The conditional request failed")
                    .set_item(item)
                    .build(),
            ),
        )
    }

    #[rstest]
    #[case::stale_etag(
        condition_failed(
            Some(
                collections::HashMap::from(
                    [
                        ("id".to_string(), types::AttributeValue::S("a".to_string())),
                    ]
                )
            )
        ),
        StoreError::NotFound,
        "precondition failed: etag mismatch"
    )]
    #[case::missing_on_replace(
        condition_failed(None),
        StoreError::NotFound,
        "document not found"
    )]
    #[case::duplicate_on_create(
        condition_failed(None),
        StoreError::AlreadyExists,
        "document already exists"
    )]
    #[case::throttled(
        service_error(
            operation::put_item::PutItemError::ThrottlingException(
                types::error::ThrottlingException::builder()
                    .message("slow down")
                    .build()
            )
        ),
        StoreError::NotFound,
        "transport error"
    )]
    #[case::construction_failure(
        error::SdkError::construction_failure(
            std::io::Error::other("bad request")
        ),
        StoreError::AlreadyExists,
        "transport error"
    )]
    fn test_classify_put_error(
        #[case] err: error::SdkError<operation::put_item::PutItemError, ()>,
        #[case] on_missing: StoreError,
        #[case] expected: &str,
    ) {
        let actual = classify_put_error(err, on_missing);
        assert!(
            actual.to_string().starts_with(expected),
            "unexpected error: {actual}"
        );
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_request() {
        let container = client().get_container("shop", "SampleData");
        let ctx = RequestContext::default();
        ctx.cancellation.cancel();
        let actual = container.read_item("a", "b", &ctx).await;
        assert!(matches!(actual, Err(StoreError::Cancelled)));
    }
}
