use serde_json::Value as JsonValue;

use super::ast::{
    BinaryOperator, Expr, Function, FunctionArgExpr, Ident, ObjectName, OrderByExpr, Query,
    SelectItem, Statement, TableFactor, Value,
};
use super::definition::{
    AggregateFunction, LogicOperator, OrderDirection, QueryDefinition, SelectConfig,
    SourceRelation, WhereConfig, WhereItem, WhereOperator,
};
use super::grammar;
use super::params::{BoundParams, BoundValue};

mod error;
pub use error::QueryBuilderError;

fn sql_function(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function(Function {
        name: ObjectName(vec![Ident::unquoted(name)]),
        args: args.into_iter().map(FunctionArgExpr::Expr).collect(),
        distinct: false,
    })
}

fn aggregate_function_name(function: &AggregateFunction) -> &'static str {
    use AggregateFunction as AF;
    match function {
        AF::Sum => "SUM",
        AF::Avg => "AVG",
        AF::Min => "MIN",
        AF::Max => "MAX",
        AF::Count => "COUNT",
    }
}

fn and_reducer(left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op: BinaryOperator::And,
        right: Box::new(right),
    }
}
fn or_reducer(left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op: BinaryOperator::Or,
        right: Box::new(right),
    }
}

/// The only place an identifier may enter the output. Names failing the
/// identifier grammar never reach quoting.
fn quoted_ident(name: &str) -> Result<Ident, QueryBuilderError> {
    if grammar::is_identifier(name) {
        Ok(Ident::quoted(name))
    } else {
        Err(QueryBuilderError::MalformedIdentifier(name.to_owned()))
    }
}

/// The only place a bound value becomes SQL text. Strings and dates go
/// through the quoting literal, numbers and booleans through their SQL
/// spellings; arrays have no scalar rendering.
fn literal_expr(value: &BoundValue) -> Result<Expr, QueryBuilderError> {
    Ok(match value {
        BoundValue::String(s) => Expr::Value(Value::SingleQuotedString(s.to_owned())),
        BoundValue::Number(n) => Expr::Value(Value::Number(n.to_string())),
        BoundValue::Boolean(b) => Expr::Value(Value::Boolean(*b)),
        BoundValue::Date(date) => {
            Expr::Value(Value::SingleQuotedString(date.format("%Y-%m-%d").to_string()))
        }
        BoundValue::Null => Expr::Value(Value::Null),
        BoundValue::Array(_) => {
            return Err(QueryBuilderError::InvalidConfig(
                "array parameter used in a scalar position".to_owned(),
            ))
        }
    })
}

fn aliased(expr: Expr, alias: &Option<String>) -> Result<SelectItem, QueryBuilderError> {
    Ok(match alias {
        Some(alias) => SelectItem::ExprWithAlias {
            expr,
            alias: quoted_ident(alias)?,
        },
        None => SelectItem::UnnamedExpr(expr),
    })
}

pub struct QueryBuilder<'build> {
    definition: &'build QueryDefinition,
    params: &'build BoundParams,
}

impl<'build> QueryBuilder<'build> {
    fn new(definition: &'build QueryDefinition, params: &'build BoundParams) -> Self {
        Self { definition, params }
    }

    /// Emit one statement for the definition under the given bound
    /// parameters. Pure over its inputs: same inputs, same SQL bytes.
    pub fn build_sql_statement(
        definition: &'build QueryDefinition,
        params: &'build BoundParams,
        wrap_json: bool,
    ) -> Result<Statement, QueryBuilderError> {
        let builder = Self::new(definition, params);

        let query = builder.mart_query()?;
        let query = if wrap_json {
            wrap_rows_query(query)
        } else {
            query
        };

        Ok(Statement(query))
    }

    fn mart_query(&self) -> Result<Query, QueryBuilderError> {
        let projection = self
            .definition
            .select
            .iter()
            .map(|item| self.select_item(item))
            .collect::<Result<Vec<_>, _>>()?;

        let from = vec![TableFactor::Table {
            name: source_relation_name(&self.definition.from)?,
            alias: None,
        }];

        let predicate = match &self.definition.r#where {
            Some(filter) => self.filter_expression(filter)?,
            None => None,
        };

        let group_by = self
            .definition
            .group_by
            .iter()
            .map(|entry| self.group_by_expression(entry))
            .collect::<Result<Vec<_>, _>>()?;

        let order_by = self
            .definition
            .order_by
            .iter()
            .map(|order| {
                Ok(OrderByExpr {
                    expr: Expr::Identifier(quoted_ident(&order.field)?),
                    asc: matches!(order.dir, OrderDirection::Asc),
                })
            })
            .collect::<Result<Vec<_>, QueryBuilderError>>()?;

        Ok(Query::new(projection)
            .from(from)
            .predicate(predicate)
            .group_by(group_by)
            .order_by(order_by)
            .limit(self.definition.limit)
            .offset(self.definition.offset))
    }

    fn select_item(&self, item: &SelectConfig) -> Result<SelectItem, QueryBuilderError> {
        match item {
            SelectConfig::Column { field, alias } => {
                let expr = Expr::Identifier(quoted_ident(field)?);
                aliased(expr, alias)
            }
            SelectConfig::Agg {
                func,
                field,
                distinct,
                alias,
            } => {
                let arg = if field == "*" {
                    if !matches!(func, AggregateFunction::Count) {
                        return Err(QueryBuilderError::WildcardAggregateArgument(
                            func.to_string(),
                        ));
                    }
                    FunctionArgExpr::Wildcard
                } else {
                    FunctionArgExpr::Expr(Expr::Identifier(quoted_ident(field)?))
                };
                let expr = Expr::Function(Function {
                    name: ObjectName(vec![Ident::unquoted(aggregate_function_name(func))]),
                    args: vec![arg],
                    distinct: *distinct,
                });
                aliased(expr, alias)
            }
            SelectConfig::CaseAgg {
                func,
                when,
                then,
                r#else,
                alias,
            } => {
                // the predicate is evaluated per input row, before
                // aggregation: CASE inside the aggregate, never the reverse
                let condition = self.predicate_expression(when)?;
                let then_result = Expr::Identifier(quoted_ident(&then.field)?);
                let else_result = match r#else {
                    Some(field_ref) => Expr::Identifier(quoted_ident(&field_ref.field)?),
                    None => Expr::Value(Value::Null),
                };
                let case = Expr::Case {
                    condition: Box::new(condition),
                    then_result: Box::new(then_result),
                    else_result: Box::new(else_result),
                };
                let expr = Expr::Function(Function {
                    name: ObjectName(vec![Ident::unquoted(aggregate_function_name(func))]),
                    args: vec![FunctionArgExpr::Expr(case)],
                    distinct: false,
                });
                aliased(expr, alias)
            }
        }
    }

    fn filter_expression(&self, filter: &WhereConfig) -> Result<Option<Expr>, QueryBuilderError> {
        let exprs = filter
            .items
            .iter()
            .map(|item| self.predicate_expression(item))
            .collect::<Result<Vec<_>, _>>()?;

        let reducer = match filter.op {
            LogicOperator::And => and_reducer,
            LogicOperator::Or => or_reducer,
        };

        Ok(exprs.into_iter().reduce(reducer))
    }

    fn predicate_expression(&self, item: &WhereItem) -> Result<Expr, QueryBuilderError> {
        let column = Expr::Identifier(quoted_ident(&item.field)?);

        match item.op {
            WhereOperator::IsNull => Ok(Expr::IsNull(Box::new(column))),
            WhereOperator::IsNotNull => Ok(Expr::IsNotNull(Box::new(column))),
            WhereOperator::In => {
                let list = self.list_expressions(item)?;
                Ok(Expr::InList {
                    expr: Box::new(column),
                    list,
                })
            }
            WhereOperator::Between => {
                let mut list = self.list_expressions(item)?;
                let endpoints = list.len();
                match (list.pop(), list.pop(), list.pop()) {
                    (Some(high), Some(low), None) => Ok(Expr::Between {
                        expr: Box::new(column),
                        low: Box::new(low),
                        high: Box::new(high),
                    }),
                    _ => Err(QueryBuilderError::InvalidConfig(format!(
                        "operator between requires exactly two endpoints, got {}",
                        endpoints
                    ))),
                }
            }
            WhereOperator::Like => Ok(Expr::Like {
                expr: Box::new(column),
                pattern: Box::new(self.value_expression(self.required_value(item)?)?),
            }),
            WhereOperator::Ilike => Ok(Expr::ILike {
                expr: Box::new(column),
                pattern: Box::new(self.value_expression(self.required_value(item)?)?),
            }),
            WhereOperator::Eq
            | WhereOperator::NotEq
            | WhereOperator::Gt
            | WhereOperator::Lt
            | WhereOperator::GtEq
            | WhereOperator::LtEq => {
                let right = self.value_expression(self.required_value(item)?)?;
                let op = match item.op {
                    WhereOperator::Eq => BinaryOperator::Eq,
                    WhereOperator::NotEq => BinaryOperator::NotEq,
                    WhereOperator::Gt => BinaryOperator::Gt,
                    WhereOperator::Lt => BinaryOperator::Lt,
                    WhereOperator::GtEq => BinaryOperator::GtEq,
                    WhereOperator::LtEq => BinaryOperator::LtEq,
                    _ => unreachable!("guarded by the outer match"),
                };
                Ok(Expr::BinaryOp {
                    left: Box::new(column),
                    op,
                    right: Box::new(right),
                })
            }
        }
    }

    fn required_value<'item>(
        &self,
        item: &'item WhereItem,
    ) -> Result<&'item JsonValue, QueryBuilderError> {
        item.value.as_ref().ok_or_else(|| {
            QueryBuilderError::InvalidConfig(format!("operator {} requires a value", item.op))
        })
    }

    /// The members of an `in` list or `between` pair. A lone placeholder may
    /// stand for the whole array; its bound value is spliced element-wise.
    fn list_expressions(&self, item: &WhereItem) -> Result<Vec<Expr>, QueryBuilderError> {
        let value = self.required_value(item)?;
        match value {
            JsonValue::Array(members) => members
                .iter()
                .map(|member| self.value_expression(member))
                .collect(),
            JsonValue::String(s) if grammar::is_placeholder_like(s) => {
                match self.bound_param(s)? {
                    BoundValue::Array(members) => members.iter().map(literal_expr).collect(),
                    scalar => Ok(vec![literal_expr(scalar)?]),
                }
            }
            _ => Err(QueryBuilderError::InvalidConfig(format!(
                "operator {} requires an array value",
                item.op
            ))),
        }
    }

    /// A scalar value position: a `:param` placeholder resolves to its bound
    /// literal, anything else is a config literal emitted verbatim (quoted
    /// per type).
    fn value_expression(&self, value: &JsonValue) -> Result<Expr, QueryBuilderError> {
        match value {
            JsonValue::String(s) if grammar::is_placeholder_like(s) => {
                literal_expr(self.bound_param(s)?)
            }
            JsonValue::String(s) => Ok(Expr::Value(Value::SingleQuotedString(s.to_owned()))),
            JsonValue::Number(n) => Ok(Expr::Value(Value::Number(n.to_string()))),
            JsonValue::Bool(b) => Ok(Expr::Value(Value::Boolean(*b))),
            JsonValue::Null => Ok(Expr::Value(Value::Null)),
            JsonValue::Array(_) | JsonValue::Object(_) => Err(QueryBuilderError::InvalidConfig(
                "nested array and object values are not supported".to_owned(),
            )),
        }
    }

    fn bound_param(&self, token: &str) -> Result<&BoundValue, QueryBuilderError> {
        let name = grammar::placeholder_name(token)
            .ok_or_else(|| QueryBuilderError::MalformedPlaceholder(token.to_owned()))?;
        self.params
            .get(name)
            .ok_or_else(|| QueryBuilderError::UnboundParameter(name.to_owned()))
    }

    /// A groupBy entry is a column name, or a placeholder whose bound value
    /// must itself pass the identifier grammar (dynamic grouping key).
    fn group_by_expression(&self, entry: &str) -> Result<Expr, QueryBuilderError> {
        if grammar::is_placeholder_like(entry) {
            match self.bound_param(entry)? {
                BoundValue::String(name) => Ok(Expr::Identifier(quoted_ident(name)?)),
                _ => Err(QueryBuilderError::MalformedIdentifier(entry.to_owned())),
            }
        } else {
            Ok(Expr::Identifier(quoted_ident(entry)?))
        }
    }
}

fn source_relation_name(from: &SourceRelation) -> Result<ObjectName, QueryBuilderError> {
    Ok(ObjectName(vec![
        quoted_ident(&from.schema)?,
        quoted_ident(&from.table)?,
    ]))
}

/// Wrap the statement so execution yields exactly one row whose single
/// column holds all result rows as a JSON array (empty array included).
fn wrap_rows_query(inner: Query) -> Query {
    let row_objects = sql_function(
        "row_to_json",
        vec![Expr::Identifier(Ident::quoted("_rows"))],
    );
    let aggregated = sql_function("json_agg", vec![row_objects]);
    let projection = vec![SelectItem::ExprWithAlias {
        expr: sql_function(
            "coalesce",
            vec![
                aggregated,
                Expr::Value(Value::SingleQuotedString("[]".to_owned())),
            ],
        ),
        alias: Ident::quoted("rows"),
    }];

    Query::new(projection).from(vec![TableFactor::Derived {
        subquery: inner.boxed(),
        alias: Some(Ident::quoted("_rows")),
    }])
}

#[cfg(test)]
mod tests {
    use super::super::params::check_params;
    use super::*;
    use serde_json::json;

    fn definition(value: JsonValue) -> QueryDefinition {
        serde_json::from_value(value).unwrap()
    }

    fn balance_by_class() -> QueryDefinition {
        definition(json!({
            "from": {"schema": "mart", "table": "balance"},
            "select": [
                {"type": "column", "field": "class"},
                {"type": "case_agg", "func": "sum",
                 "when": {"field": "period_date", "op": "=", "value": ":p1"},
                 "then": {"field": "value"}, "else": null, "as": "value"},
            ],
            "where": {"op": "and", "items": [
                {"field": "period_date", "op": "in", "value": [":p1", ":p2"]},
            ]},
            "groupBy": ["class"],
        }))
    }

    fn build(definition: &QueryDefinition, params_json: &str, wrap_json: bool) -> String {
        let bound = check_params(definition, params_json).unwrap();
        QueryBuilder::build_sql_statement(definition, &bound, wrap_json)
            .unwrap()
            .to_string()
    }

    #[test]
    fn emits_the_pivot_scenario() {
        let definition = balance_by_class();
        let sql = build(
            &definition,
            r#"{"p1": "2025-08-01", "p2": "2025-07-01"}"#,
            false,
        );
        assert_eq!(
            sql,
            "SELECT \"class\", \
             SUM(CASE WHEN \"period_date\" = '2025-08-01' THEN \"value\" ELSE NULL END) AS \"value\" \
             FROM \"mart\".\"balance\" \
             WHERE \"period_date\" IN ('2025-08-01', '2025-07-01') \
             GROUP BY \"class\""
        );
    }

    #[test]
    fn emission_is_deterministic() {
        let definition = balance_by_class();
        let params = r#"{"p1": "2025-08-01", "p2": "2025-07-01"}"#;
        assert_eq!(build(&definition, params, false), build(&definition, params, false));
        assert_eq!(build(&definition, params, true), build(&definition, params, true));
    }

    #[test]
    fn wrap_mode_adds_the_json_aggregation_shell() {
        let definition = balance_by_class();
        let sql = build(
            &definition,
            r#"{"p1": "2025-08-01", "p2": "2025-07-01"}"#,
            true,
        );
        assert!(sql.starts_with(
            "SELECT coalesce(json_agg(row_to_json(\"_rows\")), '[]') AS \"rows\" FROM (SELECT "
        ));
        assert!(sql.ends_with(") AS \"_rows\""));
    }

    #[test]
    fn case_agg_else_field_reference() {
        let definition = definition(json!({
            "from": {"schema": "mart", "table": "balance"},
            "select": [
                {"type": "case_agg", "func": "max",
                 "when": {"field": "is_adjusted", "op": "=", "value": true},
                 "then": {"field": "adjusted_value"},
                 "else": {"field": "value"}, "as": "effective_value"},
            ],
        }));
        let sql = build(&definition, "{}", false);
        assert!(sql.contains(
            "MAX(CASE WHEN \"is_adjusted\" = TRUE THEN \"adjusted_value\" ELSE \"value\" END) \
             AS \"effective_value\""
        ));
    }

    #[test]
    fn literal_where_values_are_emitted_verbatim() {
        let definition = definition(json!({
            "from": {"schema": "mart", "table": "balance"},
            "select": [{"type": "column", "field": "value"}],
            "where": {"op": "and", "items": [
                {"field": "class", "op": "=", "value": "balance_sheet"},
                {"field": "version", "op": "=", "value": 3},
            ]},
        }));
        let sql = build(&definition, "{}", false);
        assert!(sql.contains("WHERE \"class\" = 'balance_sheet' AND \"version\" = 3"));
    }

    #[test]
    fn or_lists_use_the_single_declared_operator() {
        let definition = definition(json!({
            "from": {"schema": "mart", "table": "balance"},
            "select": [{"type": "column", "field": "value"}],
            "where": {"op": "or", "items": [
                {"field": "class", "op": "=", "value": "assets"},
                {"field": "class", "op": "=", "value": "liabilities"},
                {"field": "deleted_at", "op": "is_not_null"},
            ]},
        }));
        let sql = build(&definition, "{}", false);
        assert!(sql.contains(
            "WHERE \"class\" = 'assets' OR \"class\" = 'liabilities' OR \"deleted_at\" IS NOT NULL"
        ));
    }

    #[test]
    fn between_like_and_order_limit_clauses() {
        let definition = definition(json!({
            "from": {"schema": "mart", "table": "journal"},
            "select": [
                {"type": "column", "field": "account"},
                {"type": "agg", "func": "sum", "field": "amount", "as": "total"},
                {"type": "agg", "func": "count", "field": "*", "as": "n"},
            ],
            "where": {"op": "and", "items": [
                {"field": "posted_at", "op": "between", "value": [":start", ":end"]},
                {"field": "account", "op": "ilike", "value": "11%"},
            ]},
            "groupBy": ["account"],
            "orderBy": [{"field": "total", "dir": "desc"}],
            "limit": 20,
            "offset": 40,
        }));
        let sql = build(
            &definition,
            r#"{"start": "2025-01-01", "end": "2025-06-30"}"#,
            false,
        );
        assert!(sql.contains("SUM(\"amount\") AS \"total\""));
        assert!(sql.contains("COUNT(*) AS \"n\""));
        assert!(sql.contains("\"posted_at\" BETWEEN '2025-01-01' AND '2025-06-30'"));
        // wildcard characters pass through the literal untouched
        assert!(sql.contains("\"account\" ILIKE '11%'"));
        assert!(sql.ends_with("ORDER BY \"total\" DESC LIMIT 20 OFFSET 40"));
    }

    #[test]
    fn whole_array_placeholder_splices_into_in() {
        let definition = definition(json!({
            "from": {"schema": "mart", "table": "balance"},
            "select": [{"type": "column", "field": "value"}],
            "where": {"op": "and", "items": [
                {"field": "period_date", "op": "in", "value": ":periods"},
            ]},
        }));
        let sql = build(
            &definition,
            r#"{"periods": ["2025-08-01", "2025-07-01"]}"#,
            false,
        );
        assert!(sql.contains("\"period_date\" IN ('2025-08-01', '2025-07-01')"));
    }

    #[test]
    fn group_by_placeholder_binds_an_identifier() {
        let definition = definition(json!({
            "from": {"schema": "mart", "table": "balance"},
            "select": [{"type": "agg", "func": "sum", "field": "value", "as": "total"}],
            "groupBy": [":dim"],
        }));
        let bound = check_params(&definition, r#"{"dim": "region"}"#).unwrap();
        let sql = QueryBuilder::build_sql_statement(&definition, &bound, false)
            .unwrap()
            .to_string();
        assert!(sql.ends_with("GROUP BY \"region\""));

        let bound = check_params(&definition, r#"{"dim": "region; DROP TABLE x"}"#).unwrap();
        let err = QueryBuilder::build_sql_statement(&definition, &bound, false).unwrap_err();
        assert!(matches!(err, QueryBuilderError::MalformedIdentifier(_)));
    }

    #[test]
    fn metacharacter_values_cannot_break_clause_structure() {
        let definition = definition(json!({
            "from": {"schema": "mart", "table": "balance"},
            "select": [{"type": "column", "field": "value"}],
            "where": {"op": "and", "items": [
                {"field": "class", "op": "=", "value": ":c"},
            ]},
        }));
        let sql = build(&definition, r#"{"c": "x'; DROP TABLE balance; --"}"#, false);
        assert!(sql.contains("\"class\" = 'x''; DROP TABLE balance; --'"));
    }

    #[test]
    fn metacharacter_identifiers_are_rejected() {
        let definition = definition(json!({
            "from": {"schema": "mart", "table": "balance"},
            "select": [{"type": "column", "field": "value\"; DROP TABLE x; --"}],
        }));
        let err = QueryBuilder::build_sql_statement(&definition, &BoundParams::new(), false)
            .unwrap_err();
        assert!(matches!(err, QueryBuilderError::MalformedIdentifier(_)));
        assert!(err.to_string().starts_with("invalid config"));
    }

    #[test]
    fn wildcard_is_count_only() {
        let definition = definition(json!({
            "from": {"schema": "mart", "table": "balance"},
            "select": [{"type": "agg", "func": "sum", "field": "*"}],
        }));
        let err = QueryBuilder::build_sql_statement(&definition, &BoundParams::new(), false)
            .unwrap_err();
        assert!(matches!(err, QueryBuilderError::WildcardAggregateArgument(_)));
    }

    #[test]
    fn distinct_aggregates() {
        let definition = definition(json!({
            "from": {"schema": "mart", "table": "balance"},
            "select": [{"type": "agg", "func": "count", "field": "account", "distinct": true, "as": "accounts"}],
        }));
        let sql = build(&definition, "{}", false);
        assert!(sql.contains("COUNT(DISTINCT \"account\") AS \"accounts\""));
    }
}
