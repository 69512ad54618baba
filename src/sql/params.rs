use chrono::NaiveDate;
use indexmap::{IndexMap, IndexSet};
use serde_json::Value as JsonValue;

use super::definition::{ParamType, QueryDefinition, SelectConfig, WhereItem};
use super::grammar;
use super::query_builder::QueryBuilderError;

/// Caller parameters after contract checking and coercion, in supplied order.
pub type BoundParams = IndexMap<String, BoundValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    String(String),
    Number(serde_json::Number),
    Boolean(bool),
    Date(NaiveDate),
    Null,
    Array(Vec<BoundValue>),
}

/// The required parameter set: every distinct placeholder name referenced in
/// select, where or groupBy, in first-reference order. The definition's own
/// `params` example map plays no part in this.
pub fn required_parameters(definition: &QueryDefinition) -> IndexSet<String> {
    let mut required = IndexSet::new();
    for item in &definition.select {
        if let SelectConfig::CaseAgg { when, .. } = item {
            collect_item(when, &mut required);
        }
    }
    if let Some(filter) = &definition.r#where {
        for item in &filter.items {
            collect_item(item, &mut required);
        }
    }
    for entry in &definition.group_by {
        if let Some(name) = grammar::placeholder_name(entry) {
            required.insert(name.to_owned());
        }
    }
    required
}

fn collect_item(item: &WhereItem, required: &mut IndexSet<String>) {
    if let Some(value) = &item.value {
        collect_value(value, required);
    }
}

fn collect_value(value: &JsonValue, required: &mut IndexSet<String>) {
    match value {
        JsonValue::String(s) => {
            if let Some(name) = grammar::placeholder_name(s) {
                required.insert(name.to_owned());
            }
        }
        JsonValue::Array(members) => {
            for member in members {
                collect_value(member, required);
            }
        }
        _ => {}
    }
}

/// Enforce the exact-match parameter contract and coerce the supplied values.
///
/// A parse failure of the supplied JSON is its own error, distinct from a
/// contract violation. Missing and excess names are computed together and
/// reported in one violation.
pub fn check_params(
    definition: &QueryDefinition,
    supplied_json: &str,
) -> Result<BoundParams, QueryBuilderError> {
    let supplied: IndexMap<String, JsonValue> = serde_json::from_str(supplied_json)
        .map_err(|err| QueryBuilderError::InvalidJson(err.to_string()))?;

    let required = required_parameters(definition);

    let missing: Vec<String> = required
        .iter()
        .filter(|name| !supplied.contains_key(*name))
        .cloned()
        .collect();
    let excess: Vec<String> = supplied
        .keys()
        .filter(|name| !required.contains(*name))
        .cloned()
        .collect();
    if !missing.is_empty() || !excess.is_empty() {
        return Err(QueryBuilderError::ParameterContractViolation { missing, excess });
    }

    let mut bound = BoundParams::new();
    for (name, value) in supplied {
        let declared = definition.param_types.get(&name);
        let coerced = coerce_value(value, declared);
        bound.insert(name, coerced);
    }
    Ok(bound)
}

fn coerce_value(value: JsonValue, declared: Option<&ParamType>) -> BoundValue {
    match value {
        JsonValue::Null => BoundValue::Null,
        JsonValue::Bool(b) => BoundValue::Boolean(b),
        JsonValue::Number(n) => BoundValue::Number(n),
        JsonValue::String(s) => coerce_string(s, declared),
        JsonValue::Array(members) => BoundValue::Array(
            members
                .into_iter()
                .map(|member| coerce_value(member, declared))
                .collect(),
        ),
        // no object-typed parameters; keep the raw JSON text
        JsonValue::Object(_) => BoundValue::String(value.to_string()),
    }
}

/// Declared type first; inference heuristics second; as-is last. A declared
/// type that does not fit the supplied text falls back to the raw string,
/// which the emitter still formats as a safely quoted literal.
fn coerce_string(s: String, declared: Option<&ParamType>) -> BoundValue {
    match declared {
        Some(ParamType::String) => BoundValue::String(s),
        Some(ParamType::Date) => match parse_date(&s) {
            Some(date) => BoundValue::Date(date),
            None => BoundValue::String(s),
        },
        Some(ParamType::Number) => match parse_number(&s) {
            Some(number) => BoundValue::Number(number),
            None => BoundValue::String(s),
        },
        Some(ParamType::Boolean) => match s.as_str() {
            "true" => BoundValue::Boolean(true),
            "false" => BoundValue::Boolean(false),
            _ => BoundValue::String(s),
        },
        None => {
            if let Some(date) = parse_date(&s) {
                BoundValue::Date(date)
            } else if s == "true" {
                BoundValue::Boolean(true)
            } else if s == "false" {
                BoundValue::Boolean(false)
            } else if let Some(number) = parse_number(&s) {
                BoundValue::Number(number)
            } else {
                BoundValue::String(s)
            }
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_number(s: &str) -> Option<serde_json::Number> {
    if let Ok(integer) = s.parse::<i64>() {
        return Some(integer.into());
    }
    s.parse::<f64>().ok().and_then(serde_json::Number::from_f64)
}
