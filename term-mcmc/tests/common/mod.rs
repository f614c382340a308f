#![allow(dead_code)]

use ontology_util::{Assocs, AssocsOptions, Ontology, OntologyJson};
use std::sync::Arc;
use term_mcmc::{ActivationModel, GroupingOptions, Parameterization};

pub const ONTOLOGY: &str = r#"[
    ["arachnid", "animal"],
    ["mammal", "animal"],
    ["spider", "arachnid"],
    ["primate", "mammal"],
    ["human", "primate"],
    ["spiderhuman", "arachnid", "human", "mutant"],
    ["gorilla", "primate"],
    ["animal"],
    ["mutant"]
]"#;

pub const ASSOCS: [(&str, &str); 6] = [
    ("peter-parker", "spiderhuman"),
    ("may-parker", "spiderhuman"),
    ("socrates", "human"),
    ("charlotte", "spider"),
    ("king-kong", "gorilla"),
    ("king-kong", "mutant"),
];

pub const MUTANTS: [&str; 3] = ["peter-parker", "may-parker", "king-kong"];
pub const NORMALS: [&str; 2] = ["socrates", "charlotte"];

pub fn animals() -> Assocs {
    let json: OntologyJson = serde_json::from_str(ONTOLOGY).unwrap();
    let onto = Ontology::from_json(json).unwrap();
    Assocs::new(onto, &ASSOCS, &AssocsOptions::default()).unwrap()
}

pub fn parameterization(assocs: &Assocs) -> Arc<Parameterization> {
    Arc::new(Parameterization::new(assocs, &GroupingOptions::default()).unwrap())
}

pub fn model<'a>(assocs: &'a Assocs, genes: &[&str]) -> ActivationModel<'a> {
    ActivationModel::from_gene_names(assocs, parameterization(assocs), genes).unwrap()
}

pub fn term(assocs: &Assocs, name: &str) -> usize {
    assocs.ontology().term_index(name).unwrap()
}

pub fn counts_json(model: &ActivationModel) -> serde_json::Value {
    serde_json::to_value(model.counts_json()).unwrap()
}
