use serde_json::Value as JsonValue;

use super::definition::{QueryDefinition, SelectConfig, WhereItem, WhereOperator};
use super::grammar;
use super::query_builder::QueryBuilderError;

/// Static, shape-only validation of a stored definition. Deserialization
/// rejects unknown clause discriminators and missing sub-fields; the passes
/// below check operator arity and placeholder well-formedness. Runtime
/// parameter values are never consulted here.
pub fn validate_definition(raw: &JsonValue) -> Result<QueryDefinition, QueryBuilderError> {
    let definition: QueryDefinition = serde_json::from_value(raw.to_owned())
        .map_err(|err| QueryBuilderError::InvalidConfig(err.to_string()))?;

    if definition.from.schema.is_empty() || definition.from.table.is_empty() {
        return Err(QueryBuilderError::InvalidConfig(
            "from must name both a schema and a table".to_owned(),
        ));
    }
    if definition.select.is_empty() {
        return Err(QueryBuilderError::InvalidConfig(
            "select must name at least one item".to_owned(),
        ));
    }

    for item in &definition.select {
        if let SelectConfig::CaseAgg { when, .. } = item {
            validate_predicate_item(when)?;
        }
    }
    if let Some(filter) = &definition.r#where {
        for item in &filter.items {
            validate_predicate_item(item)?;
        }
    }
    for entry in &definition.group_by {
        if grammar::is_placeholder_like(entry) && grammar::placeholder_name(entry).is_none() {
            return Err(QueryBuilderError::MalformedPlaceholder(entry.to_owned()));
        }
    }

    Ok(definition)
}

fn validate_predicate_item(item: &WhereItem) -> Result<(), QueryBuilderError> {
    match item.op {
        WhereOperator::IsNull | WhereOperator::IsNotNull => {
            if item.value.is_some() {
                return Err(QueryBuilderError::InvalidConfig(format!(
                    "operator {} takes no value",
                    item.op
                )));
            }
            Ok(())
        }
        WhereOperator::In | WhereOperator::Between => {
            let value = required_value(item)?;
            match value {
                JsonValue::Array(members) => {
                    if members.is_empty() {
                        return Err(QueryBuilderError::InvalidConfig(format!(
                            "operator {} requires a non-empty array value",
                            item.op
                        )));
                    }
                    if item.op == WhereOperator::Between && members.len() != 2 {
                        return Err(QueryBuilderError::InvalidConfig(format!(
                            "operator between requires exactly two endpoints, got {}",
                            members.len()
                        )));
                    }
                    for member in members {
                        validate_scalar_value(member)?;
                    }
                    Ok(())
                }
                // a lone placeholder may stand for the whole array
                JsonValue::String(s) if grammar::is_placeholder_like(s) => {
                    validate_scalar_value(value)
                }
                _ => Err(QueryBuilderError::InvalidConfig(format!(
                    "operator {} requires an array value",
                    item.op
                ))),
            }
        }
        WhereOperator::Eq
        | WhereOperator::NotEq
        | WhereOperator::Gt
        | WhereOperator::Lt
        | WhereOperator::GtEq
        | WhereOperator::LtEq
        | WhereOperator::Like
        | WhereOperator::Ilike => {
            let value = required_value(item)?;
            if value.is_array() {
                return Err(QueryBuilderError::InvalidConfig(format!(
                    "operator {} requires a scalar value",
                    item.op
                )));
            }
            validate_scalar_value(value)
        }
    }
}

fn required_value(item: &WhereItem) -> Result<&JsonValue, QueryBuilderError> {
    item.value.as_ref().ok_or_else(|| {
        QueryBuilderError::InvalidConfig(format!("operator {} requires a value", item.op))
    })
}

fn validate_scalar_value(value: &JsonValue) -> Result<(), QueryBuilderError> {
    match value {
        JsonValue::String(s) => {
            if grammar::is_placeholder_like(s) && grammar::placeholder_name(s).is_none() {
                return Err(QueryBuilderError::MalformedPlaceholder(s.to_owned()));
            }
            Ok(())
        }
        JsonValue::Number(_) | JsonValue::Bool(_) | JsonValue::Null => Ok(()),
        JsonValue::Array(_) | JsonValue::Object(_) => Err(QueryBuilderError::InvalidConfig(
            "nested array and object values are not supported".to_owned(),
        )),
    }
}
