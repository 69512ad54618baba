use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use strum::{Display, EnumString};

/// A stored query definition, as persisted in the config store's
/// `definition` column. Deserialization is the first validation gate:
/// unknown clause discriminators and missing sub-fields are rejected here.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueryDefinition {
    pub from: SourceRelation,
    pub select: Vec<SelectConfig>,
    pub r#where: Option<WhereConfig>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<OrderByConfig>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Example values only. The required parameter set is derived from the
    /// placeholders referenced by the clauses, never from this map.
    #[serde(default)]
    pub params: IndexMap<String, serde_json::Value>,
    #[serde(default)]
    pub param_types: IndexMap<String, ParamType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceRelation {
    pub schema: String,
    pub table: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SelectConfig {
    Column {
        field: String,
        #[serde(rename = "as")]
        alias: Option<String>,
    },
    Agg {
        func: AggregateFunction,
        /// `"*"` is accepted for `count` only
        field: String,
        #[serde(default)]
        distinct: bool,
        #[serde(rename = "as")]
        alias: Option<String>,
    },
    CaseAgg {
        func: AggregateFunction,
        when: WhereItem,
        then: FieldRef,
        #[serde(default)]
        r#else: Option<FieldRef>,
        #[serde(rename = "as")]
        alias: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldRef {
    pub field: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhereConfig {
    pub op: LogicOperator,
    pub items: Vec<WhereItem>,
}

/// One flat predicate. `value` holds a literal, a `:param` placeholder, or
/// (for `in`/`between`) an array mixing both; null checks carry no value.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhereItem {
    pub field: String,
    pub op: WhereOperator,
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Hash, Eq, PartialEq, Clone, Copy, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogicOperator {
    And,
    Or,
}

#[derive(Debug, Serialize, Deserialize, Hash, Eq, PartialEq, Clone, Copy, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WhereOperator {
    #[serde(rename = "=")]
    #[strum(serialize = "=")]
    Eq,
    #[serde(rename = "!=")]
    #[strum(serialize = "!=")]
    NotEq,
    #[serde(rename = ">")]
    #[strum(serialize = ">")]
    Gt,
    #[serde(rename = "<")]
    #[strum(serialize = "<")]
    Lt,
    #[serde(rename = ">=")]
    #[strum(serialize = ">=")]
    GtEq,
    #[serde(rename = "<=")]
    #[strum(serialize = "<=")]
    LtEq,
    In,
    Between,
    Like,
    Ilike,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Serialize, Deserialize, Hash, Eq, PartialEq, Clone, Copy, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AggregateFunction {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderByConfig {
    pub field: String,
    pub dir: OrderDirection,
}

#[derive(Debug, Serialize, Deserialize, Hash, Eq, PartialEq, Clone, Copy, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Declared parameter types guide literal formatting and coercion.
#[derive(Debug, Serialize, Deserialize, Hash, Eq, PartialEq, Clone, Copy, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Date,
    Boolean,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_the_three_select_shapes() {
        let definition: QueryDefinition = serde_json::from_value(json!({
            "from": {"schema": "mart", "table": "balance"},
            "select": [
                {"type": "column", "field": "class"},
                {"type": "agg", "func": "count", "field": "*", "as": "n"},
                {"type": "case_agg", "func": "sum",
                 "when": {"field": "period_date", "op": "=", "value": ":p1"},
                 "then": {"field": "value"}, "else": null, "as": "value"},
            ],
            "groupBy": ["class"],
        }))
        .unwrap();

        assert_eq!(definition.select.len(), 3);
        assert!(matches!(definition.select[2], SelectConfig::CaseAgg { .. }));
        assert_eq!(definition.group_by, vec!["class"]);
    }

    #[test]
    fn rejects_unknown_select_discriminator() {
        let result = serde_json::from_value::<QueryDefinition>(json!({
            "from": {"schema": "mart", "table": "balance"},
            "select": [{"type": "window", "field": "class"}],
        }));
        assert!(result.is_err());
    }

    #[test]
    fn operator_spellings_round_trip() {
        for (json_op, op) in [
            ("=", WhereOperator::Eq),
            ("!=", WhereOperator::NotEq),
            (">=", WhereOperator::GtEq),
            ("in", WhereOperator::In),
            ("between", WhereOperator::Between),
            ("ilike", WhereOperator::Ilike),
            ("is_null", WhereOperator::IsNull),
            ("is_not_null", WhereOperator::IsNotNull),
        ] {
            let parsed: WhereOperator =
                serde_json::from_value(serde_json::Value::String(json_op.to_owned())).unwrap();
            assert_eq!(parsed, op);
        }
    }
}
