//! Error types for GraphModel operations.

use std::fmt;

/// The primary error type for all GraphModel operations.
#[derive(Debug)]
pub enum Error {
    /// A relationship write was attempted from an instance that has no identity yet.
    NonPersisted(NonPersistedError),
    /// Association declaration, lookup or target-resolution errors
    Association(AssociationError),
    /// Query execution errors reported by the engine
    Query(QueryError),
    /// Transaction control errors
    Transaction(TransactionError),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

/// Raised when creating or replacing a relationship from an unsaved node.
#[derive(Debug, Clone)]
pub struct NonPersistedError {
    /// Type of the unsaved node.
    pub node_type: String,
    /// Association that was being written.
    pub association: String,
    /// The operation that was refused (e.g. `"replace"`, `"connect"`).
    pub operation: &'static str,
}

#[derive(Debug, Clone)]
pub struct AssociationError {
    pub kind: AssociationErrorKind,
    /// Type the association was looked up on or declared against.
    pub node_type: String,
    /// Association name, when one applies.
    pub association: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationErrorKind {
    /// No descriptor registered under the requested name
    Undeclared,
    /// Exact target resolution requested but zero or several target classes declared
    AmbiguousTargetType,
    /// Name collides with a reserved accessor on the type
    ReservedName,
    /// Name or relationship type is not a valid identifier
    InvalidName,
    /// Node type is not registered in the schema
    UnknownNodeType,
    /// A result row could not be mapped to a concrete node type
    UnresolvedTarget,
    /// A writer was handed a node the association does not accept
    InvalidTarget,
    /// A subtype would become its own ancestor
    CyclicHierarchy,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    /// The realized query text, when the failure is tied to one.
    pub query: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax rejected by the engine
    Syntax,
    /// Constraint violation
    Constraint,
    /// Connection to the store failed mid-query
    Connection,
    /// Query returned a shape the caller did not expect
    UnexpectedResult,
    /// Other engine error
    Database,
}

#[derive(Debug, Clone)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// Commit or rollback with no open transaction
    NotActive,
    /// Begin while a transaction is already open
    AlreadyActive,
}

impl Error {
    /// Build an undeclared-association error.
    pub fn undeclared(node_type: impl Into<String>, association: impl Into<String>) -> Self {
        let node_type = node_type.into();
        let association = association.into();
        Error::Association(AssociationError {
            kind: AssociationErrorKind::Undeclared,
            message: format!("{node_type} has no association named '{association}'"),
            node_type,
            association: Some(association),
        })
    }

    /// Build an unknown-node-type error.
    pub fn unknown_node_type(node_type: impl Into<String>) -> Self {
        let node_type = node_type.into();
        Error::Association(AssociationError {
            kind: AssociationErrorKind::UnknownNodeType,
            message: format!("node type '{node_type}' is not registered"),
            node_type,
            association: None,
        })
    }

    /// Build a non-persisted error for the given write operation.
    pub fn non_persisted(
        node_type: impl Into<String>,
        association: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Error::NonPersisted(NonPersistedError {
            node_type: node_type.into(),
            association: association.into(),
            operation,
        })
    }

    /// Is this a write attempted on an unsaved node?
    pub fn is_non_persisted(&self) -> bool {
        matches!(self, Error::NonPersisted(_))
    }

    /// Is this a lookup of an association that was never declared?
    pub fn is_undeclared(&self) -> bool {
        self.association_kind() == Some(AssociationErrorKind::Undeclared)
    }

    /// Is this an ambiguous-target configuration error?
    pub fn is_ambiguous_target(&self) -> bool {
        self.association_kind() == Some(AssociationErrorKind::AmbiguousTargetType)
    }

    /// Get the association error kind, if this is an association error.
    pub fn association_kind(&self) -> Option<AssociationErrorKind> {
        match self {
            Error::Association(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Get the query text that caused this error, if available.
    pub fn query(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.query.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NonPersisted(e) => write!(f, "Non-persisted node: {}", e),
            Error::Association(e) => write!(f, "Association error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for NonPersistedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot {} '{}' on an unsaved {}; save the node first",
            self.operation, self.association, self.node_type
        )
    }
}

impl fmt::Display for AssociationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<NonPersistedError> for Error {
    fn from(err: NonPersistedError) -> Self {
        Error::NonPersisted(err)
    }
}

impl From<AssociationError> for Error {
    fn from(err: AssociationError) -> Self {
        Error::Association(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for GraphModel operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn association_helpers() {
        let err = Error::undeclared("Person", "pets");
        assert!(err.is_undeclared());
        assert!(!err.is_non_persisted());
        assert_eq!(err.association_kind(), Some(AssociationErrorKind::Undeclared));
        assert_eq!(
            err.to_string(),
            "Association error: Person has no association named 'pets'"
        );
    }

    #[test]
    fn non_persisted_message() {
        let err = Error::non_persisted("Person", "vehicles", "replace");
        assert!(err.is_non_persisted());
        assert_eq!(
            err.to_string(),
            "Non-persisted node: cannot replace 'vehicles' on an unsaved Person; save the node first"
        );
    }

    #[test]
    fn query_text_is_exposed() {
        let err = Error::Query(QueryError {
            kind: QueryErrorKind::Syntax,
            query: Some("MATCH (n) RETURN n".to_string()),
            message: "bad input".to_string(),
            source: None,
        });
        assert_eq!(err.query(), Some("MATCH (n) RETURN n"));
        assert!(std::error::Error::source(&err).is_none());
    }
}
