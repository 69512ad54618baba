use std::{
    error::Error,
    fmt::{Display, Formatter},
};

use async_trait::async_trait;

/// One config-store record: the raw definition JSON and its execution mode.
/// The JSON stays untyped here so that a malformed stored definition is the
/// validator's verdict, not a load failure.
#[derive(Debug, Clone)]
pub struct StoredDefinition {
    pub definition: serde_json::Value,
    pub wrap_json: bool,
}

#[derive(Debug)]
pub enum StoreError {
    Unavailable(String),
    Read(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(message) => {
                write!(f, "config store unavailable: {}", message)
            }
            StoreError::Read(message) => write!(f, "config store read failed: {}", message),
        }
    }
}
impl Error for StoreError {}

/// The builder's only I/O dependency, injected so tests can run against an
/// in-memory fake.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// Load the active, non-deleted definition for `query_id`. Absence is a
    /// normal outcome (`Ok(None)`), not an error.
    async fn load(&self, query_id: &str) -> Result<Option<StoredDefinition>, StoreError>;
}
