use crate::store::dynamodb::condition;

use aws_sdk_dynamodb::{Client, error, operation, types};
use serde::Serialize;
use serde_dynamo::{Error, Result, to_item};
use std::collections;

/// put item operation
#[derive(Debug, Default, PartialEq)]
struct PutItemInput {
    condition_expression: Option<String>,
    expression_attribute_names: Option<collections::HashMap<String, String>>,
    expression_attribute_values: Option<collections::HashMap<String, types::AttributeValue>>,
    item: collections::HashMap<String, types::AttributeValue>,
    return_values_on_condition_check_failure: Option<types::ReturnValuesOnConditionCheckFailure>,
    table_name: String,
}

/// Put item operation.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::{Client, types};
/// use product_store::store::dynamodb::{condition, put_item};
/// use serde_json::{Value, json};
///
/// # async fn example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
/// let put_item = put_item::PutItem {
///     item: json!({"categoryName": "Computers, Laptops", "id": "1", "etag": "v2"}),
///     condition: Some(condition::Conditions {
///         operator: condition::LogicalOperator::And,
///         conditions: vec![
///             condition::KeyCondition {
///                 name: "id".to_string(),
///                 condition: condition::Condition::NotNull,
///             },
///             condition::KeyCondition {
///                 name: "etag".to_string(),
///                 condition: condition::Condition::Equals(Value::String("v1".to_string())),
///             },
///         ],
///     }),
///     return_values_on_condition_check_failure: Some(
///         types::ReturnValuesOnConditionCheckFailure::AllOld,
///     ),
///     table_name: "SampleData".to_string(),
/// };
/// put_item.send(client).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, PartialEq)]
pub struct PutItem<T> {
    /// The item to put into the table.
    pub item: T,
    /// Condition that must hold on the stored item for the put to succeed.
    pub condition: Option<condition::Conditions<T>>,
    /// Which item attributes to return if the condition check fails.
    pub return_values_on_condition_check_failure:
        Option<types::ReturnValuesOnConditionCheckFailure>,
    /// The name of the table to write to.
    pub table_name: String,
}

impl<T: Serialize> TryFrom<PutItem<T>> for PutItemInput {
    type Error = Error;

    fn try_from(put_item: PutItem<T>) -> Result<Self> {
        let item = to_item(put_item.item)?;
        let (condition_expression, expression_attribute_names, expression_attribute_values) =
            match put_item.condition {
                Some(condition) => {
                    let condition_operation: condition::ExpressionInput = condition.try_into()?;
                    let values = Some(condition_operation.expression_attribute_values)
                        .filter(|values| !values.is_empty());
                    (
                        Some(condition_operation.expression),
                        Some(condition_operation.expression_attribute_names),
                        values,
                    )
                }
                None => (None, None, None),
            };
        let operation = Self {
            condition_expression,
            expression_attribute_names,
            expression_attribute_values,
            item,
            return_values_on_condition_check_failure: put_item
                .return_values_on_condition_check_failure,
            table_name: put_item.table_name,
        };
        Ok(operation)
    }
}

impl<T: Serialize> PutItem<T> {
    /// Execute the put item operation.
    pub async fn send(
        self,
        client: &Client,
    ) -> Result<
        operation::put_item::PutItemOutput,
        error::SdkError<operation::put_item::PutItemError>,
    > {
        let put_item: PutItemInput = self.try_into().map_err(error::BuildError::other)?;
        client
            .put_item()
            .set_item(Some(put_item.item))
            .set_condition_expression(put_item.condition_expression)
            .set_expression_attribute_names(put_item.expression_attribute_names)
            .set_expression_attribute_values(put_item.expression_attribute_values)
            .set_return_values_on_condition_check_failure(
                put_item.return_values_on_condition_check_failure,
            )
            .table_name(put_item.table_name)
            .send()
            .await
    }
}
