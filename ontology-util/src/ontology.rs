//! Immutable term DAG with parent/child adjacency and ancestor closure.
//!
//! Terms are stored in an arena (`0..num_terms()`), in order of first
//! declaration. Parent and child lists hold term indices; the ancestor
//! closure of every term is computed once, in topological order, when the
//! graph is built. Building fails on a cycle or a dangling parent.

use crate::errors::{Error, Result};
use fnv::FnvHashMap as HashMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Serialized ontology, in either of the two accepted layouts.
///
/// * `Nested`: `[[term, parent1, parent2, ...], ...]`
/// * `Mapped`: `{"termParents": {term: [parents]}, "termInfo": {term: info}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OntologyJson {
    Nested(Vec<Vec<Box<str>>>),
    Mapped {
        #[serde(rename = "termParents")]
        term_parents: BTreeMap<Box<str>, Vec<Box<str>>>,
        #[serde(rename = "termInfo", default, skip_serializing_if = "Option::is_none")]
        term_info: Option<BTreeMap<Box<str>, Box<str>>>,
    },
}

/// One declared term before index resolution.
#[derive(Debug, Clone)]
pub struct TermRecord {
    pub name: Box<str>,
    pub info: Option<Box<str>>,
    pub parents: Vec<Box<str>>,
}

#[derive(Debug, Clone)]
pub struct Ontology {
    term_name: Vec<Box<str>>,
    term_info: Vec<Option<Box<str>>>,
    term_index: HashMap<Box<str>, usize>,
    info_index: HashMap<Box<str>, usize>,
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
    /// sorted, excluding the term itself
    ancestors: Vec<Vec<usize>>,
}

impl Ontology {
    /// Build the graph from declared terms.
    ///
    /// Every parent must itself be declared; parent edges must not form a
    /// cycle. Both conditions raise [`Error::MalformedOntology`].
    pub fn new(records: Vec<TermRecord>) -> Result<Self> {
        let n = records.len();
        let mut term_index = HashMap::default();
        for (t, rec) in records.iter().enumerate() {
            if term_index.insert(rec.name.clone(), t).is_some() {
                return Err(Error::MalformedOntology(format!(
                    "term {} declared more than once",
                    rec.name
                )));
            }
        }

        let mut parents = vec![Vec::new(); n];
        for (t, rec) in records.iter().enumerate() {
            for p in rec.parents.iter() {
                let &pi = term_index.get(p).ok_or_else(|| {
                    Error::MalformedOntology(format!(
                        "term {} has undeclared parent {}",
                        rec.name, p
                    ))
                })?;
                parents[t].push(pi);
            }
            parents[t].sort_unstable();
            parents[t].dedup();
        }

        let mut children = vec![Vec::new(); n];
        for (t, pp) in parents.iter().enumerate() {
            for &p in pp {
                children[p].push(t);
            }
        }

        let order = topological_order(&parents, &children).map_err(|t| {
            Error::MalformedOntology(format!("cycle through term {}", records[t].name))
        })?;

        let mut ancestors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for &t in order.iter() {
            let mut anc = Vec::new();
            for &p in parents[t].iter() {
                anc.push(p);
                anc.extend_from_slice(&ancestors[p]);
            }
            anc.sort_unstable();
            anc.dedup();
            ancestors[t] = anc;
        }

        let mut info_index = HashMap::default();
        let mut term_name = Vec::with_capacity(n);
        let mut term_info = Vec::with_capacity(n);
        for (t, rec) in records.into_iter().enumerate() {
            if let Some(info) = rec.info.as_ref() {
                info_index.entry(info.clone()).or_insert(t);
            }
            term_name.push(rec.name);
            term_info.push(rec.info);
        }

        Ok(Ontology {
            term_name,
            term_info,
            term_index,
            info_index,
            parents,
            children,
            ancestors,
        })
    }

    pub fn from_json(json: OntologyJson) -> Result<Self> {
        let records = match json {
            OntologyJson::Nested(rows) => rows
                .into_iter()
                .map(|row| {
                    let mut it = row.into_iter();
                    let name = it.next().ok_or_else(|| {
                        Error::MalformedOntology("empty term row".to_string())
                    })?;
                    Ok(TermRecord {
                        name,
                        info: None,
                        parents: it.collect(),
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            OntologyJson::Mapped {
                term_parents,
                term_info,
            } => {
                let mut term_info = term_info.unwrap_or_default();
                term_parents
                    .into_iter()
                    .map(|(name, parents)| TermRecord {
                        info: term_info.remove(&name),
                        name,
                        parents,
                    })
                    .collect()
            }
        };
        let ret = Self::new(records)?;
        info!("ontology with {} terms", ret.num_terms());
        Ok(ret)
    }

    /// Snapshot in the `termParents`/`termInfo` layout
    pub fn to_json(&self) -> OntologyJson {
        let term_parents = (0..self.num_terms())
            .map(|t| {
                let pp = self.parents[t]
                    .iter()
                    .map(|&p| self.term_name[p].clone())
                    .collect();
                (self.term_name[t].clone(), pp)
            })
            .collect();
        let term_info: BTreeMap<_, _> = (0..self.num_terms())
            .filter_map(|t| {
                self.term_info[t]
                    .as_ref()
                    .map(|info| (self.term_name[t].clone(), info.clone()))
            })
            .collect();
        OntologyJson::Mapped {
            term_parents,
            term_info: (!term_info.is_empty()).then_some(term_info),
        }
    }

    /// Serialize; `expand` selects pretty-printed output
    pub fn to_json_string(&self, expand: bool) -> Result<String> {
        let json = self.to_json();
        Ok(if expand {
            serde_json::to_string_pretty(&json)?
        } else {
            serde_json::to_string(&json)?
        })
    }

    pub fn num_terms(&self) -> usize {
        self.term_name.len()
    }

    pub fn term_name(&self, t: usize) -> &str {
        &self.term_name[t]
    }

    pub fn term_names(&self) -> &[Box<str>] {
        &self.term_name
    }

    pub fn term_info(&self, t: usize) -> Option<&str> {
        self.term_info[t].as_deref()
    }

    /// Human-readable label: the info string if present, else the id
    pub fn display_name(&self, t: usize) -> &str {
        self.term_info(t).unwrap_or(&self.term_name[t])
    }

    /// Strict lookup by term id
    pub fn term_index(&self, name: &str) -> Result<usize> {
        self.term_index
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownTerm(name.into()))
    }

    /// Lookup by term id, falling back to the info string
    pub fn find_term(&self, name_or_info: &str) -> Option<usize> {
        self.term_index
            .get(name_or_info)
            .or_else(|| self.info_index.get(name_or_info))
            .copied()
    }

    pub fn parents(&self, t: usize) -> &[usize] {
        &self.parents[t]
    }

    pub fn children(&self, t: usize) -> &[usize] {
        &self.children[t]
    }

    /// Transitive closure of the parent relation, sorted, excluding `t`
    pub fn ancestors(&self, t: usize) -> &[usize] {
        &self.ancestors[t]
    }

    pub fn is_root(&self, t: usize) -> bool {
        self.parents[t].is_empty()
    }

    pub fn is_leaf(&self, t: usize) -> bool {
        self.children[t].is_empty()
    }

    /// Induced subgraph over `names` and all their descendants.
    ///
    /// * `names` - term ids (or info strings)
    /// * `tolerate_missing` - skip unknown names with a warning instead of failing
    pub fn subgraph_rooted_at<S: AsRef<str>>(
        &self,
        names: &[S],
        tolerate_missing: bool,
    ) -> Result<Self> {
        let seeds = self.resolve_names(names, tolerate_missing)?;
        let mut keep = vec![false; self.num_terms()];
        let mut queue: VecDeque<usize> = seeds.into_iter().collect();
        while let Some(t) = queue.pop_front() {
            if keep[t] {
                continue;
            }
            keep[t] = true;
            queue.extend(self.children[t].iter().copied().filter(|&c| !keep[c]));
        }
        self.induced_subgraph(&keep)
    }

    /// Induced subgraph over `names` and all their ancestors (slim ontology).
    pub fn subgraph_with_ancestors<S: AsRef<str>>(
        &self,
        names: &[S],
        tolerate_missing: bool,
    ) -> Result<Self> {
        let seeds = self.resolve_names(names, tolerate_missing)?;
        let mut keep = vec![false; self.num_terms()];
        for t in seeds {
            keep[t] = true;
            for &a in self.ancestors[t].iter() {
                keep[a] = true;
            }
        }
        self.induced_subgraph(&keep)
    }

    fn resolve_names<S: AsRef<str>>(&self, names: &[S], tolerate_missing: bool) -> Result<Vec<usize>> {
        let mut ret = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            match self.find_term(name) {
                Some(t) => ret.push(t),
                None if tolerate_missing => warn!("term not found: {}", name),
                None => return Err(Error::UnknownTerm(name.into())),
            }
        }
        Ok(ret)
    }

    fn induced_subgraph(&self, keep: &[bool]) -> Result<Self> {
        let records = (0..self.num_terms())
            .filter(|&t| keep[t])
            .map(|t| TermRecord {
                name: self.term_name[t].clone(),
                info: self.term_info[t].clone(),
                parents: self.parents[t]
                    .iter()
                    .filter(|&&p| keep[p])
                    .map(|&p| self.term_name[p].clone())
                    .collect(),
            })
            .collect();
        Self::new(records)
    }
}

/// Kahn's algorithm, parents before children. On a cycle, returns a term
/// that could not be ordered.
fn topological_order(
    parents: &[Vec<usize>],
    children: &[Vec<usize>],
) -> std::result::Result<Vec<usize>, usize> {
    let n = parents.len();
    let mut n_unvisited_parents: Vec<usize> = parents.iter().map(|pp| pp.len()).collect();
    let mut queue: VecDeque<usize> = (0..n).filter(|&t| parents[t].is_empty()).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(t) = queue.pop_front() {
        order.push(t);
        for &c in children[t].iter() {
            n_unvisited_parents[c] -= 1;
            if n_unvisited_parents[c] == 0 {
                queue.push_back(c);
            }
        }
    }
    if order.len() < n {
        let stuck = (0..n).find(|&t| n_unvisited_parents[t] > 0).unwrap_or(0);
        return Err(stuck);
    }
    Ok(order)
}
