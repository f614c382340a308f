#![allow(unused)]

pub use ontology_util::common_io as io;
pub use ontology_util::{Assocs, AssocsJson, AssocsOptions, Ontology, OntologyJson};

pub use clap::{Args, Parser, Subcommand};
pub use log::{info, warn};

pub use indicatif::{ProgressBar, ProgressStyle};
pub use rayon::prelude::*;

/// Read an ontology in either JSON layout (optionally gzipped)
pub fn read_ontology(file: &str) -> anyhow::Result<Ontology> {
    let json: OntologyJson = io::read_json(file)?;
    Ok(Ontology::from_json(json)?)
}

/// Read `[[gene, term], ...]` pairs (optionally gzipped)
pub fn read_assocs_pairs(file: &str) -> anyhow::Result<AssocsJson> {
    let pairs: AssocsJson = io::read_json(file)?;
    info!("{} associations in {}", pairs.len(), file);
    Ok(pairs)
}
