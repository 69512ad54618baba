use async_trait::async_trait;
use serde_json::json;

use mart_query::sql::{
    build_query_from_id, BuildError, DefinitionStore, QueryBuilderError, StoreError,
    StoredDefinition,
};

struct MemoryStore {
    entries: Vec<(String, StoredDefinition)>,
}

impl MemoryStore {
    fn new(entries: Vec<(&str, serde_json::Value, bool)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(query_id, definition, wrap_json)| {
                    (
                        query_id.to_owned(),
                        StoredDefinition {
                            definition,
                            wrap_json,
                        },
                    )
                })
                .collect(),
        }
    }
}

#[async_trait]
impl DefinitionStore for MemoryStore {
    async fn load(&self, query_id: &str) -> Result<Option<StoredDefinition>, StoreError> {
        Ok(self
            .entries
            .iter()
            .find(|(id, _)| id == query_id)
            .map(|(_, stored)| stored.clone()))
    }
}

fn balance_by_class() -> serde_json::Value {
    json!({
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
    })
}

fn store() -> MemoryStore {
    MemoryStore::new(vec![
        ("balance_by_class", balance_by_class(), false),
        ("balance_by_class_wrapped", balance_by_class(), true),
        (
            "broken",
            json!({
                "from": {"schema": "mart", "table": "balance"},
                "select": [{"type": "moving_average", "field": "value"}],
            }),
            false,
        ),
    ])
}

fn builder_error(err: BuildError) -> QueryBuilderError {
    match err {
        BuildError::Builder(err) => err,
        BuildError::Store(err) => panic!("expected a builder error, got store error: {err}"),
    }
}

#[tokio::test]
async fn builds_the_pivot_scenario() {
    let store = store();
    let result = build_query_from_id(
        &store,
        "balance_by_class",
        r#"{"p1": "2025-08-01", "p2": "2025-07-01"}"#,
        false,
    )
    .await
    .unwrap();

    assert!(!result.wrap_json);
    assert_eq!(
        result.sql,
        "SELECT \"class\", \
         SUM(CASE WHEN \"period_date\" = '2025-08-01' THEN \"value\" ELSE NULL END) AS \"value\" \
         FROM \"mart\".\"balance\" \
         WHERE \"period_date\" IN ('2025-08-01', '2025-07-01') \
         GROUP BY \"class\""
    );
}

#[tokio::test]
async fn builds_are_deterministic() {
    let store = store();
    let params = r#"{"p1": "2025-08-01", "p2": "2025-07-01"}"#;
    let first = build_query_from_id(&store, "balance_by_class", params, false)
        .await
        .unwrap();
    let second = build_query_from_id(&store, "balance_by_class", params, false)
        .await
        .unwrap();
    assert_eq!(first.sql, second.sql);
}

#[tokio::test]
async fn missing_parameter_names_the_key() {
    let store = store();
    let err = build_query_from_id(&store, "balance_by_class", r#"{"p1": "2025-08-01"}"#, false)
        .await
        .unwrap_err();

    match builder_error(err) {
        QueryBuilderError::ParameterContractViolation { missing, excess } => {
            assert_eq!(missing, vec!["p2"]);
            assert!(excess.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn excess_parameter_names_the_key() {
    let store = store();
    let err = build_query_from_id(
        &store,
        "balance_by_class",
        r#"{"p1": "2025-08-01", "p2": "2025-07-01", "extra": 1}"#,
        false,
    )
    .await
    .unwrap_err();

    let err = builder_error(err);
    assert!(err.to_string().contains("excess parameters: extra"));
}

#[tokio::test]
async fn unknown_query_id_is_invalid_config() {
    let store = store();
    let err = build_query_from_id(&store, "no_such_query", "{}", false)
        .await
        .unwrap_err();

    let err = builder_error(err);
    assert!(matches!(err, QueryBuilderError::DefinitionNotFound(_)));
    assert!(err.to_string().starts_with("invalid config"));
}

#[tokio::test]
async fn malformed_definition_is_distinguishable_from_absence() {
    let store = store();
    let err = build_query_from_id(&store, "broken", "{}", false)
        .await
        .unwrap_err();

    let err = builder_error(err);
    assert!(matches!(err, QueryBuilderError::InvalidConfig(_)));
    assert!(err.to_string().starts_with("invalid config"));
}

#[tokio::test]
async fn unparseable_params_are_invalid_json() {
    let store = store();
    let err = build_query_from_id(&store, "balance_by_class", "{not json", false)
        .await
        .unwrap_err();

    let err = builder_error(err);
    assert!(matches!(err, QueryBuilderError::InvalidJson(_)));
    assert!(err.to_string().starts_with("invalid JSON"));
}

#[tokio::test]
async fn wrap_definitions_emit_the_json_shell() {
    let store = store();
    let result = build_query_from_id(
        &store,
        "balance_by_class_wrapped",
        r#"{"p1": "2025-08-01", "p2": "2025-07-01"}"#,
        false,
    )
    .await
    .unwrap();

    assert!(result.wrap_json);
    assert!(result
        .sql
        .starts_with("SELECT coalesce(json_agg(row_to_json(\"_rows\")), '[]') AS \"rows\" FROM ("));
}

#[tokio::test]
async fn unwrapped_request_against_wrap_definition_is_a_policy_error() {
    let store = store();
    let err = build_query_from_id(
        &store,
        "balance_by_class_wrapped",
        r#"{"p1": "2025-08-01", "p2": "2025-07-01"}"#,
        true,
    )
    .await
    .unwrap_err();

    let err = builder_error(err);
    assert!(matches!(err, QueryBuilderError::WrapRequired(_)));
    assert!(err.to_string().contains("wrap_json=false"));
}

#[tokio::test]
async fn unwrapped_request_against_plain_definition_is_fine() {
    let store = store();
    let result = build_query_from_id(
        &store,
        "balance_by_class",
        r#"{"p1": "2025-08-01", "p2": "2025-07-01"}"#,
        true,
    )
    .await
    .unwrap();

    assert!(!result.wrap_json);
    assert!(result.sql.starts_with("SELECT \"class\""));
}
