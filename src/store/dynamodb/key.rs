use aws_sdk_dynamodb::types;
use serde::Serialize;
use serde_dynamo::{Error, Result, to_attribute_value};
use std::collections;

/// Key component.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Key<T> {
    /// The attribute name of the key.
    pub name: String,
    /// The value of the key.
    pub value: T,
}

/// Composite primary key of a container: partition key plus document id.
///
/// ```rust
/// use product_store::store::dynamodb::key;
///
/// let keys = key::Keys {
///     partition_key: key::Key {
///         name: "categoryName".to_string(),
///         value: "Devices, Smartphones".to_string(),
///     },
///     id: key::Key {
///         name: "id".to_string(),
///         value: "8a82f850-a33b-4734-80ce-740ba16c39f1".to_string(),
///     },
/// };
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Keys<T> {
    /// The partition key.
    pub partition_key: Key<T>,
    /// The document id, used as sort key.
    pub id: Key<T>,
}

impl<T: Serialize> TryFrom<Keys<T>> for collections::HashMap<String, types::AttributeValue> {
    type Error = Error;

    fn try_from(keys: Keys<T>) -> Result<Self> {
        let partition_key_value = to_attribute_value(keys.partition_key.value)?;
        let id_value = to_attribute_value(keys.id.value)?;
        Ok(Self::from([
            (keys.partition_key.name, partition_key_value),
            (keys.id.name, id_value),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use serde_json::Value;

    #[rstest]
    #[case::strings(
        Keys {
            partition_key: Key {
                name: "a".to_string(),
                value: Value::String(
                    "b".to_string()
                ),
            },
            id: Key {
                name: "c".to_string(),
                value: Value::String(
                    "d".to_string()
                ),
            },
        },
        collections::HashMap::from(
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
        )
    )]
    #[case::partition_key_with_separator(
        Keys {
            partition_key: Key {
                name: "categoryName".to_string(),
                value: Value::String(
                    "Devices, Smartphones".to_string()
                ),
            },
            id: Key {
                name: "id".to_string(),
                value: Value::String(
                    "8a82f850".to_string()
                ),
            },
        },
        collections::HashMap::from(
            [
                (
                    "categoryName".to_string(),
                    types::AttributeValue::S(
                        "Devices, Smartphones".to_string()
                    )
                ),
                (
                    "id".to_string(),
                    types::AttributeValue::S(
                        "8a82f850".to_string()
                    )
                ),
            ]
        )
    )]
    fn test_keys_to_hash_map(
        #[case] keys: Keys<Value>,
        #[case] expected: collections::HashMap<String, types::AttributeValue>,
    ) {
        let actual: collections::HashMap<String, types::AttributeValue> = keys.try_into().unwrap();
        assert_eq!(actual, expected);
    }
}
