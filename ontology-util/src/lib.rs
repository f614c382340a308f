//! Term ontologies and gene ↔ term associations.
//!
//! An [`Ontology`] is an immutable DAG of terms (e.g. Gene Ontology
//! categories). [`Assocs`] maps genes onto that DAG, closed under the
//! ancestor relation, and groups terms that annotate identical gene sets
//! into equivalence classes.

/// Error type shared across the workspace
pub mod errors;

/// Term DAG: parents, children, ancestor closure, subgraphs
pub mod ontology;

/// Gene ↔ term annotation table
pub mod assocs;

/// Hypergeometric over-representation p-values
pub mod enrichment;

/// gz-aware readers/writers for gene lists and JSON inputs
pub mod common_io;

pub use assocs::{Assocs, AssocsJson, AssocsOptions};
pub use enrichment::TermPvalue;
pub use errors::{Error, Result};
pub use ontology::{Ontology, OntologyJson, TermRecord};
