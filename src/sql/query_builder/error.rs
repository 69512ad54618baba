use std::{
    error::Error,
    fmt::{Display, Formatter},
};

#[derive(Debug)]
pub enum QueryBuilderError {
    DefinitionNotFound(String),
    InvalidConfig(String),
    MalformedIdentifier(String),
    MalformedPlaceholder(String),
    WildcardAggregateArgument(String),
    UnboundParameter(String),
    InvalidJson(String),
    ParameterContractViolation {
        missing: Vec<String>,
        excess: Vec<String>,
    },
    WrapRequired(String),
}

impl Display for QueryBuilderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryBuilderError::DefinitionNotFound(query_id) => write!(
                f,
                "invalid config: no active query definition with id \"{}\"",
                query_id
            ),
            QueryBuilderError::InvalidConfig(message) => write!(f, "invalid config: {}", message),
            QueryBuilderError::MalformedIdentifier(name) => {
                write!(f, "invalid config: malformed identifier \"{}\"", name)
            }
            QueryBuilderError::MalformedPlaceholder(token) => write!(
                f,
                "invalid config: malformed parameter placeholder \"{}\"",
                token
            ),
            QueryBuilderError::WildcardAggregateArgument(function) => write!(
                f,
                "invalid config: * is only a valid argument for count, got {}",
                function
            ),
            QueryBuilderError::UnboundParameter(name) => {
                write!(f, "invalid config: parameter \"{}\" is not bound", name)
            }
            QueryBuilderError::InvalidJson(message) => write!(f, "invalid JSON: {}", message),
            QueryBuilderError::ParameterContractViolation { missing, excess } => {
                if !missing.is_empty() {
                    write!(f, "missing parameters: {}", missing.join(", "))?;
                    if !excess.is_empty() {
                        write!(f, "; ")?;
                    }
                }
                if !excess.is_empty() {
                    write!(f, "excess parameters: {}", excess.join(", "))?;
                }
                Ok(())
            }
            QueryBuilderError::WrapRequired(query_id) => write!(
                f,
                "query definition \"{}\" does not allow wrap_json=false",
                query_id
            ),
        }
    }
}
impl Error for QueryBuilderError {}
