//! Gene ↔ term annotation table over an [`Ontology`].
//!
//! Raw `(gene, term)` pairs are expanded to the ancestor closure of each
//! term, so a gene annotated to `t` is annotated to every ancestor of `t`.
//! Terms inducing identical gene sets are grouped into equivalence classes.

use crate::errors::{Error, Result};
use crate::ontology::Ontology;
use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};
use log::{debug, info, warn};

/// Association pairs `[[gene, term], ...]` as read from JSON
pub type AssocsJson = Vec<(Box<str>, Box<str>)>;

#[derive(Debug, Clone)]
pub struct AssocsOptions {
    /// Skip pairs whose term is not in the ontology (otherwise fail)
    pub ignore_missing_terms: bool,
    /// Expand every annotation to the term's ancestors at load time.
    /// When false, the pairs are taken as already closed.
    pub closure: bool,
    /// Merge repeated raw pairs (otherwise fail)
    pub merge_duplicates: bool,
}

impl Default for AssocsOptions {
    fn default() -> Self {
        AssocsOptions {
            ignore_missing_terms: false,
            closure: true,
            merge_duplicates: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Assocs {
    ontology: Ontology,
    gene_name: Vec<Box<str>>,
    gene_index: HashMap<Box<str>, usize>,
    /// sorted gene indices per term
    genes_by_term: Vec<Vec<usize>>,
    /// sorted term indices per gene
    terms_by_gene: Vec<Vec<usize>>,
    equiv_class_by_term: Vec<usize>,
    terms_in_equiv_class: Vec<Vec<usize>>,
}

impl Assocs {
    /// Build the annotation table.
    ///
    /// * `ontology` - term graph (taken over by the store)
    /// * `pairs` - raw `(gene name, term id or info string)` pairs
    /// * `options` - missing-term policy, closure and duplicate handling
    pub fn new<G, T>(ontology: Ontology, pairs: &[(G, T)], options: &AssocsOptions) -> Result<Self>
    where
        G: AsRef<str>,
        T: AsRef<str>,
    {
        let mut gene_name: Vec<Box<str>> = vec![];
        let mut gene_index: HashMap<Box<str>, usize> = HashMap::default();
        let mut seen: HashSet<(usize, usize)> = HashSet::default();
        let mut direct: Vec<(usize, usize)> = Vec::with_capacity(pairs.len());
        let mut n_missing = 0_usize;
        let mut n_duplicate = 0_usize;

        for (g, t) in pairs {
            let (g, t) = (g.as_ref(), t.as_ref());
            let gi = match gene_index.get(g) {
                Some(&gi) => gi,
                None => {
                    gene_name.push(g.into());
                    gene_index.insert(g.into(), gene_name.len() - 1);
                    gene_name.len() - 1
                }
            };
            let ti = match ontology.find_term(t) {
                Some(ti) => ti,
                None if options.ignore_missing_terms => {
                    n_missing += 1;
                    continue;
                }
                None => return Err(Error::UnknownTerm(t.into())),
            };
            if !seen.insert((gi, ti)) {
                if !options.merge_duplicates {
                    return Err(Error::MalformedAssociations(format!(
                        "duplicate association {} -> {}",
                        g, t
                    )));
                }
                n_duplicate += 1;
                continue;
            }
            direct.push((gi, ti));
        }

        if n_missing > 0 {
            warn!("ignored {} associations to terms missing from the ontology", n_missing);
        }
        if n_duplicate > 0 {
            debug!("merged {} duplicate associations", n_duplicate);
        }

        let n_genes = gene_name.len();
        let n_terms = ontology.num_terms();
        let mut terms_by_gene: Vec<Vec<usize>> = vec![Vec::new(); n_genes];
        for &(g, t) in direct.iter() {
            terms_by_gene[g].push(t);
            if options.closure {
                terms_by_gene[g].extend_from_slice(ontology.ancestors(t));
            }
        }
        let mut genes_by_term: Vec<Vec<usize>> = vec![Vec::new(); n_terms];
        for (g, tt) in terms_by_gene.iter_mut().enumerate() {
            tt.sort_unstable();
            tt.dedup();
            for &t in tt.iter() {
                genes_by_term[t].push(g);
            }
        }

        let (equiv_class_by_term, terms_in_equiv_class) = equivalence_classes(&genes_by_term);

        info!(
            "{} genes, {} terms, {} equivalence classes, {} direct associations",
            n_genes,
            n_terms,
            terms_in_equiv_class.len(),
            direct.len()
        );

        Ok(Assocs {
            ontology,
            gene_name,
            gene_index,
            genes_by_term,
            terms_by_gene,
            equiv_class_by_term,
            terms_in_equiv_class,
        })
    }

    pub fn from_json(ontology: Ontology, json: &AssocsJson, options: &AssocsOptions) -> Result<Self> {
        Self::new(ontology, json, options)
    }

    pub fn ontology(&self) -> &Ontology {
        &self.ontology
    }

    pub fn num_genes(&self) -> usize {
        self.gene_name.len()
    }

    pub fn num_terms(&self) -> usize {
        self.ontology.num_terms()
    }

    pub fn gene_name(&self, g: usize) -> &str {
        &self.gene_name[g]
    }

    pub fn gene_names(&self) -> &[Box<str>] {
        &self.gene_name
    }

    pub fn find_gene(&self, name: &str) -> Option<usize> {
        self.gene_index.get(name).copied()
    }

    pub fn genes_of_term(&self, t: usize) -> &[usize] {
        &self.genes_by_term[t]
    }

    pub fn terms_of_gene(&self, g: usize) -> &[usize] {
        &self.terms_by_gene[g]
    }

    /// Sorted, deduplicated union of the terms of every gene in `gene_set`
    pub fn relevant_terms(&self, gene_set: &[usize]) -> Vec<usize> {
        let mut ret: Vec<usize> = gene_set
            .iter()
            .flat_map(|&g| self.terms_by_gene[g].iter().copied())
            .collect();
        ret.sort_unstable();
        ret.dedup();
        ret
    }

    /// Names absent from the store, in input order. Never fails.
    pub fn validate_gene_names<S: AsRef<str>>(&self, names: &[S]) -> Vec<Box<str>> {
        names
            .iter()
            .map(|x| x.as_ref())
            .filter(|x| !self.gene_index.contains_key(*x))
            .map(Box::from)
            .collect()
    }

    /// Strict lookup of a gene set; duplicates are collapsed and the
    /// result is sorted.
    pub fn gene_indices<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        let missing = self.validate_gene_names(names);
        if !missing.is_empty() {
            return Err(Error::UnknownGenes(missing));
        }
        let mut ret: Vec<usize> = names
            .iter()
            .filter_map(|x| self.find_gene(x.as_ref()))
            .collect();
        ret.sort_unstable();
        ret.dedup();
        Ok(ret)
    }

    pub fn equiv_class_of_term(&self, t: usize) -> usize {
        self.equiv_class_by_term[t]
    }

    pub fn terms_in_equiv_class(&self, c: usize) -> &[usize] {
        &self.terms_in_equiv_class[c]
    }

    pub fn num_equiv_classes(&self) -> usize {
        self.terms_in_equiv_class.len()
    }
}

/// Group terms by identical (sorted) gene lists. Class ids follow the
/// order of each class's first term.
fn equivalence_classes(genes_by_term: &[Vec<usize>]) -> (Vec<usize>, Vec<Vec<usize>>) {
    let mut class_of_genes: HashMap<&[usize], usize> = HashMap::default();
    let mut class_by_term = Vec::with_capacity(genes_by_term.len());
    let mut terms_in_class: Vec<Vec<usize>> = vec![];
    for (t, genes) in genes_by_term.iter().enumerate() {
        let c = *class_of_genes.entry(genes.as_slice()).or_insert_with(|| {
            terms_in_class.push(vec![]);
            terms_in_class.len() - 1
        });
        terms_in_class[c].push(t);
        class_by_term.push(c);
    }
    (class_by_term, terms_in_class)
}
