use aws_sdk_dynamodb::types;
use serde::Serialize;
use serde_dynamo::{Error, Result, to_attribute_value};
use std::{collections, ops};

/// Resolved expression with its placeholder maps.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ExpressionInput {
    pub(crate) expression: String,
    pub(crate) expression_attribute_names: collections::HashMap<String, String>,
    pub(crate) expression_attribute_values: collections::HashMap<String, types::AttributeValue>,
}

/// Logical operator for combining conditions.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum LogicalOperator {
    /// Logical AND - all conditions must be true.
    #[default]
    And,
    /// Logical OR - at least one condition must be true.
    Or,
}

impl ops::Deref for LogicalOperator {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
        }
    }
}

/// Condition on a single top-level attribute.
///
/// ```rust
/// use product_store::store::dynamodb::condition;
///
/// let eq = condition::Condition::Equals("v1".to_string());
/// let exists: condition::Condition<String> = condition::Condition::NotNull;
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Condition<T> {
    /// Checks if an attribute value equals a specified value.
    Equals(T),
    /// Checks if an attribute exists.
    NotNull,
    /// Checks if an attribute does not exist.
    Null,
}

impl<T: Serialize> Condition<T> {
    fn get_expression(
        self,
        key: &str,
        key_placeholder: &str,
        index: &mut usize,
    ) -> Result<(String, collections::HashMap<String, types::AttributeValue>)> {
        let mut expression_attribute_values = collections::HashMap::new();
        let expression = match self {
            Self::Equals(value) => {
                let value = to_attribute_value(value)?;
                let value_placeholder = format!(":{key}_eq{index}");
                *index += 1;
                let expression = format!("{key_placeholder} = {value_placeholder}");
                expression_attribute_values.insert(value_placeholder, value);
                expression
            }
            Self::NotNull => format!("attribute_exists({key_placeholder})"),
            Self::Null => format!("attribute_not_exists({key_placeholder})"),
        };
        Ok((expression, expression_attribute_values))
    }
}

/// Condition applied to an attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyCondition<T> {
    /// The condition to apply to the attribute.
    pub condition: Condition<T>,
    /// The name of the attribute to apply the condition to.
    pub name: String,
}

/// Flat list of conditions combined with one logical operator.
///
/// ```rust
/// use product_store::store::dynamodb::condition;
///
/// let conditions = condition::Conditions {
///     operator: condition::LogicalOperator::And,
///     conditions: vec![
///         condition::KeyCondition {
///             name: "id".to_string(),
///             condition: condition::Condition::NotNull,
///         },
///         condition::KeyCondition {
///             name: "etag".to_string(),
///             condition: condition::Condition::Equals("v1".to_string()),
///         },
///     ],
/// };
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conditions<T> {
    /// Operator joining the conditions.
    pub operator: LogicalOperator,
    /// The conditions, rendered in order.
    pub conditions: Vec<KeyCondition<T>>,
}

impl<T: Serialize> TryFrom<Conditions<T>> for ExpressionInput {
    type Error = Error;

    fn try_from(conditions: Conditions<T>) -> Result<Self> {
        let mut expressions = Vec::with_capacity(conditions.conditions.len());
        let mut expression_attribute_names =
            collections::HashMap::with_capacity(conditions.conditions.len());
        let mut expression_attribute_values = collections::HashMap::new();
        let mut index = 0;
        for key_condition in conditions.conditions {
            let placeholder = format!("#{}", key_condition.name);
            let (expression, values) =
                key_condition
                    .condition
                    .get_expression(&key_condition.name, &placeholder, &mut index)?;
            expressions.push(expression);
            expression_attribute_names.insert(placeholder, key_condition.name);
            expression_attribute_values.extend(values);
        }
        let operation = Self {
            expression: expressions.join(&*conditions.operator),
            expression_attribute_names,
            expression_attribute_values,
        };
        Ok(operation)
    }
}
