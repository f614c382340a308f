//! Assignment of terms and genes to named Bernoulli parameter groups.
//!
//! The grouping strategy is chosen once and resolved into flat
//! `term -> group` and `gene -> group` tables over the whole association
//! store, so the sampler never dispatches on strategy inside its loop.

use crate::bernoulli::{BernoulliParams, ParamKind};
use ontology_util::{Assocs, Error, Result};
use std::collections::BTreeMap;

/// How terms are mapped to their activation-prior group
#[derive(Debug, Clone)]
pub enum TermGrouping {
    /// every term shares one group
    Constant(Box<str>),
    /// by position in the ontology (a term with no parents is a root)
    ByTopology {
        root: Box<str>,
        internal: Box<str>,
        leaf: Box<str>,
    },
    /// explicit `term name -> group`; unlisted terms go to `default`
    Table {
        groups: BTreeMap<Box<str>, Box<str>>,
        default: Box<str>,
    },
}

/// How genes are mapped to a false-positive or false-negative group
#[derive(Debug, Clone)]
pub enum GeneGrouping {
    Constant(Box<str>),
    Table {
        groups: BTreeMap<Box<str>, Box<str>>,
        default: Box<str>,
    },
}

#[derive(Debug, Clone)]
pub struct GroupingOptions {
    pub term_prior: TermGrouping,
    pub false_pos: GeneGrouping,
    pub false_neg: GeneGrouping,
}

impl Default for GroupingOptions {
    fn default() -> Self {
        GroupingOptions {
            term_prior: TermGrouping::Constant("t".into()),
            false_pos: GeneGrouping::Constant("fp".into()),
            false_neg: GeneGrouping::Constant("fn".into()),
        }
    }
}

/// Resolved group tables plus the sorted parameter registry
#[derive(Debug, Clone)]
pub struct Parameterization {
    params: BernoulliParams,
    term_prior: Vec<usize>,
    gene_false_pos: Vec<usize>,
    gene_false_neg: Vec<usize>,
}

impl Parameterization {
    pub fn new(assocs: &Assocs, options: &GroupingOptions) -> Result<Self> {
        let onto = assocs.ontology();

        let term_group: Vec<Box<str>> = match &options.term_prior {
            TermGrouping::Constant(name) => vec![name.clone(); onto.num_terms()],
            TermGrouping::ByTopology {
                root,
                internal,
                leaf,
            } => (0..onto.num_terms())
                .map(|t| {
                    if onto.is_root(t) {
                        root.clone()
                    } else if onto.is_leaf(t) {
                        leaf.clone()
                    } else {
                        internal.clone()
                    }
                })
                .collect(),
            TermGrouping::Table { groups, default } => {
                for name in groups.keys() {
                    onto.term_index(name)?;
                }
                onto.term_names()
                    .iter()
                    .map(|t| groups.get(t).unwrap_or(default).clone())
                    .collect()
            }
        };

        let fp_group = resolve_genes(assocs, &options.false_pos)?;
        let fn_group = resolve_genes(assocs, &options.false_neg)?;

        let params = BernoulliParams::new(
            term_group
                .iter()
                .map(|x| (x, ParamKind::TermPrior))
                .chain(fp_group.iter().map(|x| (x, ParamKind::FalsePos)))
                .chain(fn_group.iter().map(|x| (x, ParamKind::FalseNeg)))
                .chain(default_names(options)),
        )?;

        let lookup = |names: &[Box<str>]| -> Result<Vec<usize>> {
            names
                .iter()
                .map(|x| {
                    params
                        .index(x)
                        .ok_or_else(|| Error::Configuration(format!("unregistered parameter {}", x)))
                })
                .collect()
        };

        let term_prior = lookup(&term_group)?;
        let gene_false_pos = lookup(&fp_group)?;
        let gene_false_neg = lookup(&fn_group)?;

        Ok(Parameterization {
            params,
            term_prior,
            gene_false_pos,
            gene_false_neg,
        })
    }

    pub fn params(&self) -> &BernoulliParams {
        &self.params
    }

    #[inline]
    pub fn term_prior(&self, t: usize) -> usize {
        self.term_prior[t]
    }

    #[inline]
    pub fn gene_false_pos(&self, g: usize) -> usize {
        self.gene_false_pos[g]
    }

    #[inline]
    pub fn gene_false_neg(&self, g: usize) -> usize {
        self.gene_false_neg[g]
    }
}

fn resolve_genes(assocs: &Assocs, grouping: &GeneGrouping) -> Result<Vec<Box<str>>> {
    Ok(match grouping {
        GeneGrouping::Constant(name) => vec![name.clone(); assocs.num_genes()],
        GeneGrouping::Table { groups, default } => {
            let listed: Vec<&Box<str>> = groups.keys().collect();
            let missing = assocs.validate_gene_names(&listed);
            if !missing.is_empty() {
                return Err(Error::UnknownGenes(missing));
            }
            assocs
                .gene_names()
                .iter()
                .map(|g| groups.get(g).unwrap_or(default).clone())
                .collect()
        }
    })
}

/// Constant and default group names are registered even when no term or
/// gene ends up using them, so the registry does not depend on the data.
fn default_names(options: &GroupingOptions) -> Vec<(&Box<str>, ParamKind)> {
    let mut ret = vec![];
    match &options.term_prior {
        TermGrouping::Constant(x) | TermGrouping::Table { default: x, .. } => {
            ret.push((x, ParamKind::TermPrior))
        }
        TermGrouping::ByTopology { .. } => {}
    }
    for (grouping, kind) in [
        (&options.false_pos, ParamKind::FalsePos),
        (&options.false_neg, ParamKind::FalseNeg),
    ] {
        match grouping {
            GeneGrouping::Constant(x) | GeneGrouping::Table { default: x, .. } => {
                ret.push((x, kind))
            }
        }
    }
    ret
}
