//! Running posterior summaries over post-burn samples.
//!
//! Indicators change only when a move is accepted, so each tracker keeps
//! the current value and the sample index at which it took that value,
//! and folds the whole run into its mean when the value changes. Reading
//! a tracker folds the open run into a copy. Samples are indexed by a
//! clock that counts post-burn iterations only.

use crate::model::ActivationModel;
use fnv::FnvHashMap as HashMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Incremental mean, `mean += (x - mean) * k / n` for a run of `k` equal samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunningMean {
    mean: f64,
    n: u64,
}

impl RunningMean {
    pub fn push(&mut self, x: f64) {
        self.push_run(x, 1);
    }

    pub fn push_run(&mut self, x: f64, k: u64) {
        if k == 0 {
            return;
        }
        self.n += k;
        self.mean += (x - self.mean) * (k as f64 / self.n as f64);
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn count(&self) -> u64 {
        self.n
    }
}

/// Fraction of samples in which a binary indicator was on
#[derive(Debug, Clone, Copy)]
pub(crate) struct Occupancy {
    on: bool,
    since: u64,
    mean: RunningMean,
}

impl Occupancy {
    fn new(on: bool, clock: u64) -> Self {
        Occupancy {
            on,
            since: clock,
            mean: RunningMean::default(),
        }
    }

    fn set(&mut self, on: bool, clock: u64) {
        if on == self.on {
            return;
        }
        self.mean.push_run(indicator(self.on), clock - self.since);
        self.on = on;
        self.since = clock;
    }

    pub(crate) fn peek(&self, clock: u64) -> f64 {
        let mut mean = self.mean;
        mean.push_run(indicator(self.on), clock - self.since);
        mean.mean()
    }
}

#[inline]
fn is_false(model: &ActivationModel, g: usize) -> bool {
    model.is_gene_explained(g) != model.in_gene_set(g)
}

#[inline]
fn indicator(on: bool) -> f64 {
    if on {
        1.0
    } else {
        0.0
    }
}

/// Co-activation counts over pairs of tracked terms `(i, j)` with `i <= j`
#[derive(Debug, Clone, Default)]
pub(crate) struct TermPairLog {
    /// ascending
    tracked: Vec<usize>,
    counts: HashMap<(usize, usize), u64>,
    n_samples: u64,
    pub(crate) enabled: bool,
}

impl TermPairLog {
    /// Track `terms` from now on; counts of terms no longer tracked are kept
    pub(crate) fn track(&mut self, terms: &[usize]) {
        let mut tracked = terms.to_vec();
        tracked.sort_unstable();
        tracked.dedup();
        self.tracked = tracked;
        self.enabled = true;
    }

    pub(crate) fn tracked(&self) -> &[usize] {
        &self.tracked
    }

    pub(crate) fn is_tracked(&self, t: usize) -> bool {
        self.tracked.binary_search(&t).is_ok()
    }

    fn record(&mut self, model: &ActivationModel) {
        let active: Vec<usize> = self
            .tracked
            .iter()
            .copied()
            .filter(|&t| model.get_state(t))
            .collect();
        for (i, &a) in active.iter().enumerate() {
            for &b in active[i..].iter() {
                *self.counts.entry((a, b)).or_default() += 1;
            }
        }
        self.n_samples += 1;
    }

    pub(crate) fn n_samples(&self) -> u64 {
        self.n_samples
    }

    /// Fraction of logged samples with both terms active
    pub(crate) fn frequency(&self, a: usize, b: usize) -> f64 {
        if self.n_samples == 0 {
            return 0.0;
        }
        let key = if a <= b { (a, b) } else { (b, a) };
        self.counts.get(&key).copied().unwrap_or(0) as f64 / self.n_samples as f64
    }
}

/// All trackers of one activation model
#[derive(Debug, Clone)]
pub(crate) struct ModelSummary {
    /// per slot
    pub(crate) term: Vec<Occupancy>,
    /// per equivalence class: number of active members
    class_active: Vec<u32>,
    pub(crate) class: Vec<Occupancy>,
    /// per gene: false status, i.e. explained but not in the set, or
    /// unexplained but in the set
    pub(crate) gene: Vec<Occupancy>,
    pub(crate) pairs: TermPairLog,
}

impl ModelSummary {
    /// Start tracking from the model's current state at `clock`
    pub(crate) fn new(model: &ActivationModel, clock: u64) -> Self {
        let assocs = model.assocs();
        let n_slots = model.n_variables();
        let term = (0..n_slots)
            .map(|s| Occupancy::new(model.slot_state(s), clock))
            .collect();
        let mut class_active = vec![0; assocs.num_equiv_classes()];
        for s in model.active_slots() {
            class_active[assocs.equiv_class_of_term(model.term_of_slot(s))] += 1;
        }
        let class = class_active
            .iter()
            .map(|&n| Occupancy::new(n > 0, clock))
            .collect();
        let gene = (0..model.num_genes())
            .map(|g| Occupancy::new(is_false(model, g), clock))
            .collect();
        ModelSummary {
            term,
            class_active,
            class,
            gene,
            pairs: TermPairLog::default(),
        }
    }

    /// Fold the changes of an accepted move. `model` is already updated.
    pub(crate) fn update(
        &mut self,
        model: &ActivationModel,
        changes: &[(usize, bool)],
        toggled_genes: &[usize],
        clock: u64,
    ) {
        let assocs = model.assocs();
        for &(s, _) in changes {
            let on = model.slot_state(s);
            if self.term[s].on == on {
                continue;
            }
            self.term[s].set(on, clock);
            let c = assocs.equiv_class_of_term(model.term_of_slot(s));
            if on {
                self.class_active[c] += 1;
            } else {
                self.class_active[c] -= 1;
            }
            self.class[c].set(self.class_active[c] > 0, clock);
        }
        for &g in toggled_genes {
            self.gene[g].set(is_false(model, g), clock);
        }
    }

    /// Called once per post-burn sample
    pub(crate) fn record_sample(&mut self, model: &ActivationModel) {
        if self.pairs.enabled {
            self.pairs.record(model);
        }
    }
}

/// Posterior activation probability of one equivalence class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassPosterior {
    pub class: usize,
    /// member terms, ascending
    pub terms: Vec<usize>,
    pub probability: f64,
}

/// Co-activation frequencies over a chosen set of terms. The diagonal
/// holds the marginals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermPairSummary {
    pub terms: Vec<usize>,
    pub samples: u64,
    pub probability: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermEnrichment {
    pub term: Box<str>,
    pub name: Box<str>,
    pub overlap: usize,
    pub pvalue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermPosterior {
    /// ids of the equivalent terms
    pub terms: Vec<Box<str>>,
    pub names: Vec<Box<str>>,
    pub probability: f64,
}

/// Report for one gene set: frequentist p-values next to the posterior
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneSetSummary {
    pub gene_set: Vec<Box<str>>,
    /// post-burn samples behind the posterior estimates
    pub samples: u64,
    pub hypergeometric: Vec<TermEnrichment>,
    /// descending probability
    pub term_posterior: Vec<TermPosterior>,
    pub false_pos: BTreeMap<Box<str>, f64>,
    pub false_neg: BTreeMap<Box<str>, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_mean_runs() {
        let mut a = RunningMean::default();
        let mut b = RunningMean::default();
        for x in [1.0, 1.0, 1.0, 0.0, 0.0] {
            a.push(x);
        }
        b.push_run(1.0, 3);
        b.push_run(0.5, 0);
        b.push_run(0.0, 2);
        approx::assert_abs_diff_eq!(a.mean(), 0.6, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(b.mean(), 0.6, epsilon = 1e-12);
        assert_eq!(b.count(), 5);
    }

    #[test]
    fn occupancy_folds_lazily() {
        let mut occ = Occupancy::new(false, 0);
        occ.set(true, 4);
        occ.set(true, 6);
        approx::assert_abs_diff_eq!(occ.peek(8), 0.5, epsilon = 1e-12);
        occ.set(false, 8);
        approx::assert_abs_diff_eq!(occ.peek(10), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn pair_frequency_is_symmetric() {
        let mut log = TermPairLog::default();
        log.counts.insert((2, 5), 3);
        log.n_samples = 4;
        approx::assert_abs_diff_eq!(log.frequency(5, 2), 0.75, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(log.frequency(1, 1), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn tracked_terms_are_a_sorted_set() {
        let mut log = TermPairLog::default();
        log.track(&[7, 2, 7, 4]);
        assert!(log.enabled);
        assert_eq!(log.tracked(), &[2, 4, 7]);
        assert!(log.is_tracked(4));
        assert!(!log.is_tracked(3));
    }
}
