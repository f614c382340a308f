//! Error types shared by the ontology, association and sampler crates.

use thiserror::Error;

/// Result type alias for ontology and enrichment operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A strict lookup by term id/name failed
    #[error("unknown term: {0}")]
    UnknownTerm(Box<str>),

    /// The term exists but is outside the relevant scope of a gene set
    #[error("term {0} is not relevant to this gene set")]
    IrrelevantTerm(Box<str>),

    #[error("genes not found in the associations list: {}", .0.join(", "))]
    UnknownGenes(Vec<Box<str>>),

    /// Cycle or dangling parent reference
    #[error("malformed ontology: {0}")]
    MalformedOntology(String),

    #[error("malformed associations: {0}")]
    MalformedAssociations(String),

    #[error("invalid gene set: {0}")]
    InvalidGeneSet(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("statistics error: {0}")]
    Statistics(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_genes_message_lists_names() {
        let err = Error::UnknownGenes(vec!["foo".into(), "bar".into()]);
        assert_eq!(
            err.to_string(),
            "genes not found in the associations list: foo, bar"
        );
    }
}
