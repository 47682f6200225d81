//! Structured error taxonomy for the query engines
//!
//! Query-side operations (prefix resolution, reachability, ROA checks) return
//! `QueryError` so callers can tell a missing record from a bad request or a
//! broken storage backend. Ingestion keeps using `anyhow` with its own
//! skip-vs-abort policy.

use thiserror::Error;

/// Errors surfaced by read-only query operations
#[derive(Debug, Error)]
pub enum QueryError {
    /// The requested prefix or address has no matching record
    #[error("no route found for {0}")]
    PrefixNotFound(String),

    /// Malformed input: unparseable prefix/ASN or a missing required argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The storage backend could not be opened or a query failed at the
    /// storage layer; distinct from a record simply not existing
    #[error("storage backend unavailable: {0}")]
    Store(#[from] rusqlite::Error),
}

impl QueryError {
    /// True when the error reflects missing data rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, QueryError::PrefixNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(QueryError::PrefixNotFound("10.0.0.0/24".to_string()).is_not_found());
        assert!(!QueryError::InvalidArgument("no source ASNs".to_string()).is_not_found());
    }

    #[test]
    fn test_display() {
        let err = QueryError::PrefixNotFound("10.0.0.0/24".to_string());
        assert_eq!(err.to_string(), "no route found for 10.0.0.0/24");
    }
}
