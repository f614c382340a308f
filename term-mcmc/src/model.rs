//! Activation state of the terms relevant to one gene set.
//!
//! Each relevant term carries one bit. A gene is *explained* when at least
//! one active term annotates it. Sufficient statistics are kept per
//! parameter group:
//!
//! * a relevant term counts toward its term-prior group, `succ` when active;
//! * an unexplained gene counts toward its false-positive group, `succ`
//!   when it is in the gene set (observed without explanation);
//! * an explained gene counts toward its false-negative group, `succ` when
//!   it is missing from the gene set (explained but not observed).
//!
//! Every update goes through [`ActivationModel::state_delta`], a pure
//! function of the current state and a batch of flips. Committing a batch
//! adds that delta to the counts, so previewing and applying share one
//! rule. The cost of a flip is proportional to the number of genes under
//! the term, not to the size of the ontology.

use crate::bernoulli::{BernoulliCounts, BernoulliParams, CountsJson};
use crate::indexed_set::IndexedSet;
use crate::parameterization::Parameterization;
use fnv::FnvHashMap as HashMap;
use log::info;
use ontology_util::{Assocs, Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Proposed or applied term states, keyed by term index
pub type Assignment = BTreeMap<usize, bool>;

/// Count change that a batch of slot flips would cause
#[derive(Debug, Clone)]
pub struct StateDelta {
    pub counts: BernoulliCounts,
    /// genes whose explained/unexplained status changes
    pub toggled_genes: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct ActivationModel<'a> {
    assocs: &'a Assocs,
    param: Arc<Parameterization>,
    gene_set: Vec<usize>,
    in_set: Vec<bool>,
    /// slot -> term, ascending
    relevant: Vec<usize>,
    /// term -> slot
    slot_of_term: Vec<Option<usize>>,
    /// slot -> bit
    state: Vec<bool>,
    /// gene -> number of active terms annotating it
    active_count: Vec<u32>,
    counts: BernoulliCounts,
    /// (child slot, parent slot) for each relevant ontology edge
    edges: Vec<(usize, usize)>,
    edges_of_slot: Vec<Vec<usize>>,
    active: IndexedSet,
    inactive: IndexedSet,
    /// edges whose endpoints differ in state
    discordant: IndexedSet,
}

impl<'a> ActivationModel<'a> {
    /// All terms start inactive.
    ///
    /// * `assocs` - annotation table; all of its genes are in scope
    /// * `param` - group tables shared with the posterior
    /// * `gene_set` - gene indices (duplicates are ignored)
    pub fn new(assocs: &'a Assocs, param: Arc<Parameterization>, gene_set: &[usize]) -> Result<Self> {
        let num_genes = assocs.num_genes();
        if gene_set.is_empty() {
            return Err(Error::InvalidGeneSet("empty gene set".to_string()));
        }
        if let Some(&g) = gene_set.iter().find(|&&g| g >= num_genes) {
            return Err(Error::InvalidGeneSet(format!(
                "gene index {} out of range ({} genes)",
                g, num_genes
            )));
        }
        let mut gene_set = gene_set.to_vec();
        gene_set.sort_unstable();
        gene_set.dedup();

        let mut in_set = vec![false; num_genes];
        for &g in gene_set.iter() {
            in_set[g] = true;
        }

        let relevant = assocs.relevant_terms(&gene_set);
        let mut slot_of_term = vec![None; assocs.num_terms()];
        for (s, &t) in relevant.iter().enumerate() {
            slot_of_term[t] = Some(s);
        }

        let onto = assocs.ontology();
        let mut edges = vec![];
        let mut edges_of_slot = vec![Vec::new(); relevant.len()];
        for (s, &t) in relevant.iter().enumerate() {
            for &p in onto.parents(t) {
                if let Some(ps) = slot_of_term[p] {
                    edges_of_slot[s].push(edges.len());
                    edges_of_slot[ps].push(edges.len());
                    edges.push((s, ps));
                }
            }
        }

        let n_slots = relevant.len();
        let n_edges = edges.len();
        let mut ret = ActivationModel {
            assocs,
            param,
            gene_set,
            in_set,
            relevant,
            slot_of_term,
            state: vec![false; n_slots],
            active_count: vec![0; num_genes],
            counts: BernoulliCounts::zeros(0),
            edges,
            edges_of_slot,
            active: IndexedSet::new(n_slots),
            inactive: IndexedSet::full(n_slots),
            discordant: IndexedSet::new(n_edges),
        };
        ret.counts = ret.recompute_counts();

        info!(
            "gene set of {} genes: {} relevant terms, {} relevant edges",
            ret.gene_set.len(),
            n_slots,
            n_edges
        );
        Ok(ret)
    }

    /// Resolve gene names first. Any name missing from the associations
    /// is an [`Error::UnknownGenes`].
    pub fn from_gene_names<S: AsRef<str>>(
        assocs: &'a Assocs,
        param: Arc<Parameterization>,
        names: &[S],
    ) -> Result<Self> {
        let gene_set = assocs.gene_indices(names)?;
        Self::new(assocs, param, &gene_set)
    }

    pub fn assocs(&self) -> &'a Assocs {
        self.assocs
    }

    pub fn params(&self) -> &BernoulliParams {
        self.param.params()
    }

    /// Sorted gene indices of the set
    pub fn gene_set(&self) -> &[usize] {
        &self.gene_set
    }

    pub fn in_gene_set(&self, g: usize) -> bool {
        self.in_set[g]
    }

    /// Number of free bits
    pub fn n_variables(&self) -> usize {
        self.relevant.len()
    }

    /// Sorted term indices touching the gene set
    pub fn relevant_terms(&self) -> &[usize] {
        &self.relevant
    }

    pub fn is_relevant(&self, t: usize) -> bool {
        self.slot_of_term.get(t).is_some_and(|s| s.is_some())
    }

    /// Parents of `t` that are relevant to this gene set
    pub fn relevant_parents(&self, t: usize) -> Vec<usize> {
        let onto = self.assocs.ontology();
        onto.parents(t)
            .iter()
            .copied()
            .filter(|&p| self.is_relevant(p))
            .collect()
    }

    /// Children of `t` that are relevant to this gene set
    pub fn relevant_children(&self, t: usize) -> Vec<usize> {
        let onto = self.assocs.ontology();
        onto.children(t)
            .iter()
            .copied()
            .filter(|&c| self.is_relevant(c))
            .collect()
    }

    /// Irrelevant terms are always inactive
    pub fn get_state(&self, t: usize) -> bool {
        match self.slot_of_term.get(t) {
            Some(&Some(s)) => self.state[s],
            _ => false,
        }
    }

    pub fn set_state(&mut self, t: usize, on: bool) -> Result<()> {
        self.set_states(&Assignment::from([(t, on)]))
    }

    pub fn set_states(&mut self, assignment: &Assignment) -> Result<()> {
        let changes = self.to_slot_changes(assignment)?;
        let delta = self.state_delta(&changes);
        self.commit(&changes, &delta);
        Ok(())
    }

    /// The assignment that undoes `assignment`: every key mapped to its
    /// current state.
    pub fn invert(&self, assignment: &Assignment) -> Result<Assignment> {
        assignment
            .keys()
            .map(|&t| self.slot(t).map(|s| (t, self.state[s])))
            .collect()
    }

    pub fn get_counts(&self) -> &BernoulliCounts {
        &self.counts
    }

    pub fn counts_json(&self) -> CountsJson {
        self.counts.to_json(self.params())
    }

    /// Change in counts that `set_states(assignment)` would cause; the
    /// model is not touched.
    pub fn get_count_delta(&self, assignment: &Assignment) -> Result<BernoulliCounts> {
        let changes = self.to_slot_changes(assignment)?;
        Ok(self.state_delta(&changes).counts)
    }

    /// Count everything again from the current bits
    pub fn recompute_counts(&self) -> BernoulliCounts {
        let mut active_count = vec![0_u32; self.in_set.len()];
        let mut counts = BernoulliCounts::zeros(self.params().len());
        for (s, &t) in self.relevant.iter().enumerate() {
            counts.record(self.param.term_prior(t), self.state[s], 1);
            if self.state[s] {
                for &g in self.assocs.genes_of_term(t) {
                    active_count[g] += 1;
                }
            }
        }
        for (g, &n) in active_count.iter().enumerate() {
            self.record_gene(&mut counts, g, n > 0, 1);
        }
        counts
    }

    /// Sorted indices of the active terms
    pub fn active_terms(&self) -> Vec<usize> {
        let mut ret: Vec<usize> = self.active.iter().map(|s| self.relevant[s]).collect();
        ret.sort_unstable();
        ret
    }

    /// Active term id -> display name
    pub fn to_json(&self) -> BTreeMap<Box<str>, Box<str>> {
        let onto = self.assocs.ontology();
        self.active
            .iter()
            .map(|s| {
                let t = self.relevant[s];
                (onto.term_name(t).into(), onto.display_name(t).into())
            })
            .collect()
    }

    pub fn to_json_string(&self, expand: bool) -> Result<String> {
        let json = self.to_json();
        Ok(if expand {
            serde_json::to_string_pretty(&json)?
        } else {
            serde_json::to_string(&json)?
        })
    }

    /// Term names to a checked assignment
    pub fn assignment_from_names<S: AsRef<str>>(&self, names: &[(S, bool)]) -> Result<Assignment> {
        let onto = self.assocs.ontology();
        names
            .iter()
            .map(|(name, on)| {
                let t = onto.term_index(name.as_ref())?;
                self.slot(t)?;
                Ok((t, *on))
            })
            .collect()
    }

    fn slot(&self, t: usize) -> Result<usize> {
        match self.slot_of_term.get(t) {
            Some(&Some(s)) => Ok(s),
            Some(None) => Err(Error::IrrelevantTerm(
                self.assocs.ontology().term_name(t).into(),
            )),
            None => Err(Error::UnknownTerm(t.to_string().into())),
        }
    }

    fn to_slot_changes(&self, assignment: &Assignment) -> Result<Vec<(usize, bool)>> {
        assignment
            .iter()
            .map(|(&t, &on)| self.slot(t).map(|s| (s, on)))
            .collect()
    }

    #[inline]
    fn record_gene(&self, counts: &mut BernoulliCounts, g: usize, explained: bool, weight: i64) {
        if explained {
            counts.record(self.param.gene_false_neg(g), !self.in_set[g], weight);
        } else {
            counts.record(self.param.gene_false_pos(g), self.in_set[g], weight);
        }
    }

    /// Counts delta of setting each `(slot, bit)`. Slots must be distinct.
    pub(crate) fn state_delta(&self, changes: &[(usize, bool)]) -> StateDelta {
        let mut counts = BernoulliCounts::zeros(self.params().len());
        let mut shift: HashMap<usize, i64> = HashMap::default();
        for &(s, on) in changes {
            if self.state[s] == on {
                continue;
            }
            let t = self.relevant[s];
            let tp = self.param.term_prior(t);
            counts.record(tp, self.state[s], -1);
            counts.record(tp, on, 1);
            let d = if on { 1 } else { -1 };
            for &g in self.assocs.genes_of_term(t) {
                *shift.entry(g).or_default() += d;
            }
        }

        let mut toggled_genes = vec![];
        for (&g, &d) in shift.iter() {
            let before = self.active_count[g] > 0;
            let after = self.active_count[g] as i64 + d > 0;
            if before != after {
                self.record_gene(&mut counts, g, before, -1);
                self.record_gene(&mut counts, g, after, 1);
                toggled_genes.push(g);
            }
        }
        toggled_genes.sort_unstable();

        StateDelta {
            counts,
            toggled_genes,
        }
    }

    /// Apply `changes` whose delta was computed by [`Self::state_delta`]
    /// against the current state.
    pub(crate) fn commit(&mut self, changes: &[(usize, bool)], delta: &StateDelta) {
        let assocs = self.assocs;
        for &(s, on) in changes {
            if self.state[s] == on {
                continue;
            }
            self.state[s] = on;
            if on {
                self.active.insert(s);
                self.inactive.remove(s);
            } else {
                self.inactive.insert(s);
                self.active.remove(s);
            }
            for &g in assocs.genes_of_term(self.relevant[s]) {
                if on {
                    self.active_count[g] += 1;
                } else {
                    self.active_count[g] -= 1;
                }
            }
        }
        for &(s, _) in changes {
            for &e in self.edges_of_slot[s].iter() {
                let (c, p) = self.edges[e];
                if self.state[c] != self.state[p] {
                    self.discordant.insert(e);
                } else {
                    self.discordant.remove(e);
                }
            }
        }
        self.counts += &delta.counts;
        debug_assert_eq!(self.counts, self.recompute_counts());
    }

    /// Number of discordant edges after `changes`, without applying them
    pub(crate) fn discordant_after(&self, changes: &[(usize, bool)]) -> usize {
        let state_after = |s: usize| {
            changes
                .iter()
                .find(|&&(x, _)| x == s)
                .map_or(self.state[s], |&(_, on)| on)
        };
        let mut touched: Vec<usize> = changes
            .iter()
            .flat_map(|&(s, _)| self.edges_of_slot[s].iter().copied())
            .collect();
        touched.sort_unstable();
        touched.dedup();

        let before = touched
            .iter()
            .filter(|&&e| self.discordant.contains(e))
            .count();
        let after = touched
            .iter()
            .filter(|&&e| {
                let (c, p) = self.edges[e];
                state_after(c) != state_after(p)
            })
            .count();
        self.discordant.len() + after - before
    }

    #[inline]
    pub(crate) fn slot_state(&self, s: usize) -> bool {
        self.state[s]
    }

    #[inline]
    pub(crate) fn term_of_slot(&self, s: usize) -> usize {
        self.relevant[s]
    }

    #[inline]
    pub(crate) fn is_gene_explained(&self, g: usize) -> bool {
        self.active_count[g] > 0
    }

    pub(crate) fn num_genes(&self) -> usize {
        self.in_set.len()
    }

    pub(crate) fn num_active(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn active_slot(&self, i: usize) -> usize {
        self.active.get(i)
    }

    pub(crate) fn inactive_slot(&self, i: usize) -> usize {
        self.inactive.get(i)
    }

    pub(crate) fn active_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.active.iter()
    }

    pub(crate) fn num_discordant(&self) -> usize {
        self.discordant.len()
    }

    /// `(child slot, parent slot)` of the `i`-th discordant edge
    pub(crate) fn discordant_edge(&self, i: usize) -> (usize, usize) {
        self.edges[self.discordant.get(i)]
    }

    /// Number of (active, inactive) slot pairs
    pub(crate) fn num_swap_pairs(&self) -> usize {
        self.active.len() * self.inactive.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameterization::GroupingOptions;
    use ontology_util::{AssocsOptions, Ontology};

    fn chain() -> Assocs {
        let onto = Ontology::from_json(
            serde_json::from_str(r#"[["a"],["b","a"],["c","b"],["d","a"],["x"]]"#).unwrap(),
        )
        .unwrap();
        let pairs = [("g1", "c"), ("g2", "b"), ("g3", "d"), ("g4", "x")];
        Assocs::new(onto, &pairs, &AssocsOptions::default()).unwrap()
    }

    fn model<'a>(assocs: &'a Assocs, genes: &[&str]) -> ActivationModel<'a> {
        let param = Arc::new(Parameterization::new(assocs, &GroupingOptions::default()).unwrap());
        ActivationModel::from_gene_names(assocs, param, genes).unwrap()
    }

    #[test]
    fn irrelevant_terms_are_excluded() {
        let assocs = chain();
        let m = model(&assocs, &["g1", "g2"]);
        // a, b, c
        assert_eq!(m.relevant_terms(), &[0, 1, 2]);
        assert!(!m.is_relevant(3));
        assert!(!m.get_state(4));
        let mut m = m;
        assert!(matches!(m.set_state(3, true), Err(Error::IrrelevantTerm(_))));
        assert!(matches!(m.set_state(99, true), Err(Error::UnknownTerm(_))));
    }

    #[test]
    fn discordant_edges_follow_state() {
        let assocs = chain();
        let mut m = model(&assocs, &["g1", "g2"]);
        assert_eq!(m.num_discordant(), 0);
        let b = m.slot(1).unwrap();
        assert_eq!(m.discordant_after(&[(b, true)]), 2);
        m.set_state(1, true).unwrap();
        assert_eq!(m.num_discordant(), 2);
        let c = m.slot(2).unwrap();
        // swapping b and c moves activation down the chain
        assert_eq!(m.discordant_after(&[(b, false), (c, true)]), 1);
        m.set_states(&Assignment::from([(1, false), (2, true)])).unwrap();
        assert_eq!(m.num_discordant(), 1);
        assert_eq!(m.discordant_edge(0), (c, b));
    }

    #[test]
    fn toggled_genes_are_reported() {
        let assocs = chain();
        let mut m = model(&assocs, &["g1", "g2"]);
        let b = m.slot(1).unwrap();
        let delta = m.state_delta(&[(b, true)]);
        // g1 (via c -> b) and g2
        assert_eq!(delta.toggled_genes, vec![0, 1]);
        m.commit(&[(b, true)], &delta);
        assert!(m.is_gene_explained(0));
        assert!(!m.is_gene_explained(2));
        let c = m.slot(2).unwrap();
        // g1 stays explained by b
        assert!(m.state_delta(&[(c, true)]).toggled_genes.is_empty());
    }

    #[test]
    fn unknown_gene_names() {
        let assocs = chain();
        let param = Arc::new(Parameterization::new(&assocs, &GroupingOptions::default()).unwrap());
        assert!(matches!(
            ActivationModel::from_gene_names(&assocs, param.clone(), &["nobody"]),
            Err(Error::UnknownGenes(_))
        ));
        match ActivationModel::from_gene_names(&assocs, param.clone(), &["g3", "nobody"]) {
            Err(Error::UnknownGenes(missing)) => assert_eq!(missing, vec!["nobody".into()]),
            _ => panic!("unknown gene was accepted"),
        }
        let m = ActivationModel::from_gene_names(&assocs, param, &["g3"]).unwrap();
        assert_eq!(m.gene_set(), &[2]);
    }
}
