use crate::store::dynamodb::key;

use aws_sdk_dynamodb::{Client, error, operation, types};
use serde::Serialize;
use serde_dynamo::{Error, Result};
use std::collections;

/// get item operation
#[derive(Clone, Debug, Default, PartialEq)]
struct GetItemInput {
    consistent_read: Option<bool>,
    keys: collections::HashMap<String, types::AttributeValue>,
    table_name: String,
}

/// Get item operation.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client;
/// use product_store::store::dynamodb::{get_item, key};
///
/// # async fn example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
/// let get_item = get_item::GetItem {
///     keys: key::Keys {
///         partition_key: key::Key {
///             name: "categoryName".to_string(),
///             value: "Computers, Laptops".to_string(),
///         },
///         id: key::Key {
///             name: "id".to_string(),
///             value: "77be013f-4036-4311-9b5a-dab0c3d022be".to_string(),
///         },
///     },
///     consistent_read: Some(true),
///     table_name: "SampleData".to_string(),
/// };
/// get_item.send(client).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetItem<T> {
    /// The primary key of the item to retrieve.
    pub keys: key::Keys<T>,
    /// `true` for a strongly consistent read.
    pub consistent_read: Option<bool>,
    /// The name of the table to read from.
    pub table_name: String,
}

impl<T: Serialize> TryFrom<GetItem<T>> for GetItemInput {
    type Error = Error;

    fn try_from(get_item: GetItem<T>) -> Result<Self> {
        let keys = get_item.keys.try_into()?;
        let operation = Self {
            consistent_read: get_item.consistent_read,
            keys,
            table_name: get_item.table_name,
        };
        Ok(operation)
    }
}

impl<T: Serialize> GetItem<T> {
    /// Execute the get item operation.
    pub async fn send(
        self,
        client: &Client,
    ) -> Result<
        operation::get_item::GetItemOutput,
        error::SdkError<operation::get_item::GetItemError>,
    > {
        let get_item: GetItemInput = self.try_into().map_err(error::BuildError::other)?;
        client
            .get_item()
            .set_key(Some(get_item.keys))
            .set_consistent_read(get_item.consistent_read)
            .table_name(get_item.table_name)
            .send()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use serde_json::Value;

    #[rstest]
    #[case::eventually_consistent(
        GetItem {
            keys: key::Keys {
                partition_key: key::Key {
                    name: "a".to_string(),
                    value: Value::String(
                        "b".to_string()
                    ),
                },
                id: key::Key {
                    name: "c".to_string(),
                    value: Value::String(
                        "d".to_string()
                    ),
                },
            },
            table_name: "e".to_string(),
            ..Default::default()
        },
        GetItemInput {
            keys: collections::HashMap::from(
                [
                    (
                        "a".to_string(),
                        types::AttributeValue::S(
                            "b".to_string()
                        )
                    ),
                    (
                        "c".to_string(),
                        types::AttributeValue::S(
                            "d".to_string()
                        )
                    ),
                ]
            ),
            table_name: "e".to_string(),
            ..Default::default()
        }
    )]
    #[case::strongly_consistent(
        GetItem {
            keys: key::Keys {
                partition_key: key::Key {
                    name: "a".to_string(),
                    value: Value::String(
                        "b".to_string()
                    ),
                },
                id: key::Key {
                    name: "c".to_string(),
                    value: Value::String(
                        "d".to_string()
                    ),
                },
            },
            consistent_read: Some(true),
            table_name: "e".to_string(),
        },
        GetItemInput {
            consistent_read: Some(true),
            keys: collections::HashMap::from(
                [
                    (
                        "a".to_string(),
                        types::AttributeValue::S(
                            "b".to_string()
                        )
                    ),
                    (
                        "c".to_string(),
                        types::AttributeValue::S(
                            "d".to_string()
                        )
                    ),
                ]
            ),
            table_name: "e".to_string(),
        }
    )]
    fn test_get_item(#[case] args: GetItem<Value>, #[case] expected: GetItemInput) {
        let actual: GetItemInput = args.try_into().unwrap();
        assert_eq!(actual, expected);
    }
}
