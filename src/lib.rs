//! # Seqeline - data lineage for procedural SQL
//!
//! Seqeline walks an already-parsed PL/SQL syntax tree and builds a binding
//! graph: which packages, routines, cursors, variables and relations exist,
//! what every name reference resolves to, and how values flow between them.
//!
//! Seqeline provides:
//! - A binding arena with structural (member) and lineage (value flow) edges
//! - Nested lexical scoping through a stack of frames
//! - A tree-driven dispatcher with one rule table per grammar dialect
//! - Read-only relation metadata used as the outermost resolution fallback

pub mod binding;
pub mod name;
pub mod catalog;
pub mod scope;
pub mod schema;
pub mod tree;
pub mod dialect;
pub mod analyzer;
pub mod analysis;
pub mod config;
pub mod report;

// Re-exports for convenient access
pub use analysis::Analysis;
pub use analyzer::{analyze, Analyzer};
pub use binding::{Binding, BindingGraph, BindingId, BindingKind};
pub use dialect::{Dialect, DialectKind};
pub use name::QualifiedName;
pub use schema::{Relation, Schema};
pub use tree::{Location, Node, SyntaxTree};

/// Result type alias for Seqeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Seqeline operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unresolved reference `{name}` at {location}")]
    Unresolved { name: String, location: Location },

    #[error("Malformed pairing at {location}: {detail}")]
    Pairing { detail: String, location: Location },

    #[error("Unexpected tree shape at {location}: {detail}")]
    Structure { detail: String, location: Location },

    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn unresolved(name: impl ToString) -> Self {
        Error::Unresolved {
            name: name.to_string(),
            location: Location::unknown(),
        }
    }

    pub fn pairing(detail: impl Into<String>) -> Self {
        Error::Pairing {
            detail: detail.into(),
            location: Location::unknown(),
        }
    }

    pub fn structure(detail: impl Into<String>) -> Self {
        Error::Structure {
            detail: detail.into(),
            location: Location::unknown(),
        }
    }

    /// Attach `at` to an analysis error raised without a node at hand.
    pub fn at(mut self, at: Location) -> Self {
        if let Error::Unresolved { location, .. }
        | Error::Pairing { location, .. }
        | Error::Structure { location, .. } = &mut self
        {
            if location.is_unknown() {
                *location = at;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_attached_once() {
        let first = Location { tag: "call_statement".into(), line: Some(4), column: None };
        let second = Location { tag: "body".into(), line: Some(1), column: None };
        let err = Error::unresolved("p.f").at(first.clone()).at(second);
        match err {
            Error::Unresolved { name, location } => {
                assert_eq!(name, "p.f");
                assert_eq!(location, first);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_error_message() {
        let err = Error::pairing("2 values for 3 columns");
        assert_eq!(err.to_string(), "Malformed pairing at <unknown>: 2 values for 3 columns");
    }
}
