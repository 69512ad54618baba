use std::{
    error::Error,
    fmt::{Display, Formatter},
};

pub mod ast;
pub mod definition;
pub mod grammar;
pub mod params;
pub mod query_builder;
pub mod store;
pub mod validate;

pub use params::{check_params, required_parameters, BoundParams, BoundValue};
pub use query_builder::{QueryBuilder, QueryBuilderError};
pub use store::{DefinitionStore, StoreError, StoredDefinition};
pub use validate::validate_definition;

#[derive(Debug, Clone)]
pub struct BuildResult {
    pub sql: String,
    pub wrap_json: bool,
}

/// A build either fails on the config-store read (backend fault) or on the
/// definition/parameters themselves (caller fault). Kept apart so the HTTP
/// layer can map them to 500 vs 400.
#[derive(Debug)]
pub enum BuildError {
    Store(StoreError),
    Builder(QueryBuilderError),
}

impl Display for BuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::Store(err) => write!(f, "{}", err),
            BuildError::Builder(err) => write!(f, "{}", err),
        }
    }
}
impl Error for BuildError {}

impl From<StoreError> for BuildError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}
impl From<QueryBuilderError> for BuildError {
    fn from(err: QueryBuilderError) -> Self {
        Self::Builder(err)
    }
}

/// The single entry point callers use: load the definition, validate its
/// shape, enforce the parameter contract, emit one statement. Any stage
/// failure aborts the whole build; no partial SQL is ever returned.
///
/// `unwrapped` requests raw row output; it is a policy violation against a
/// definition whose wrap flag is set.
pub async fn build_query_from_id(
    store: &dyn DefinitionStore,
    query_id: &str,
    params_json: &str,
    unwrapped: bool,
) -> Result<BuildResult, BuildError> {
    let stored = store
        .load(query_id)
        .await?
        .ok_or_else(|| QueryBuilderError::DefinitionNotFound(query_id.to_owned()))?;

    if unwrapped && stored.wrap_json {
        return Err(QueryBuilderError::WrapRequired(query_id.to_owned()).into());
    }

    let definition = validate_definition(&stored.definition)?;
    let bound = check_params(&definition, params_json)?;

    let wrap_json = stored.wrap_json && !unwrapped;
    let statement = QueryBuilder::build_sql_statement(&definition, &bound, wrap_json)?;

    Ok(BuildResult {
        sql: statement.to_string(),
        wrap_json,
    })
}
