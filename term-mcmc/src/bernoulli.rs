//! Beta-Bernoulli parameter groups and their collapsed marginal likelihood.
//!
//! Every Bernoulli parameter (a term-activation prior, a false-positive or
//! a false-negative rate) is identified by a group name. Counts are kept
//! densely, one `(succ, fail)` pair per group, indexed by the position of
//! the group in the sorted name registry.

use ontology_util::{Error, Result};
use serde::Serialize;
use special::Gamma as SpecialGamma;
use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

/// Which part of the model a parameter group belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ParamKind {
    TermPrior,
    FalsePos,
    FalseNeg,
}

/// Sorted registry of parameter group names
#[derive(Debug, Clone, PartialEq)]
pub struct BernoulliParams {
    names: Vec<Box<str>>,
    kinds: Vec<ParamKind>,
}

impl BernoulliParams {
    /// Register `(name, kind)` pairs. Repeats of the same pair are merged;
    /// one name claimed by two kinds is a configuration error.
    pub fn new<I, S>(named: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ParamKind)>,
        S: AsRef<str>,
    {
        let mut by_name: BTreeMap<Box<str>, ParamKind> = BTreeMap::new();
        for (name, kind) in named {
            let name = name.as_ref();
            match by_name.get(name) {
                Some(&k) if k != kind => {
                    return Err(Error::Configuration(format!(
                        "parameter {} used as both {:?} and {:?}",
                        name, k, kind
                    )));
                }
                Some(_) => {}
                None => {
                    by_name.insert(name.into(), kind);
                }
            }
        }
        let (names, kinds) = by_name.into_iter().unzip();
        Ok(BernoulliParams { names, kinds })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[Box<str>] {
        &self.names
    }

    pub fn name(&self, p: usize) -> &str {
        &self.names[p]
    }

    pub fn kind(&self, p: usize) -> ParamKind {
        self.kinds[p]
    }

    pub fn index(&self, name: &str) -> Option<usize> {
        self.names.binary_search_by(|x| x.as_ref().cmp(name)).ok()
    }
}

/// Signed success/failure counts, one pair per parameter group.
///
/// The same type carries absolute counts and deltas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BernoulliCounts {
    pub succ: Vec<i64>,
    pub fail: Vec<i64>,
}

/// `{"succ": {name: n}, "fail": {name: n}}` with zero entries omitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountsJson {
    pub succ: BTreeMap<Box<str>, i64>,
    pub fail: BTreeMap<Box<str>, i64>,
}

impl BernoulliCounts {
    pub fn zeros(n_params: usize) -> Self {
        BernoulliCounts {
            succ: vec![0; n_params],
            fail: vec![0; n_params],
        }
    }

    pub fn is_zero(&self) -> bool {
        self.succ.iter().chain(self.fail.iter()).all(|&x| x == 0)
    }

    /// Record one Bernoulli outcome (`weight` may be negative to retract)
    #[inline]
    pub fn record(&mut self, p: usize, success: bool, weight: i64) {
        if success {
            self.succ[p] += weight;
        } else {
            self.fail[p] += weight;
        }
    }

    pub fn to_json(&self, params: &BernoulliParams) -> CountsJson {
        let nonzero = |v: &[i64]| -> BTreeMap<Box<str>, i64> {
            v.iter()
                .enumerate()
                .filter(|(_, &n)| n != 0)
                .map(|(p, &n)| (params.names[p].clone(), n))
                .collect()
        };
        CountsJson {
            succ: nonzero(&self.succ),
            fail: nonzero(&self.fail),
        }
    }
}

impl AddAssign<&BernoulliCounts> for BernoulliCounts {
    fn add_assign(&mut self, other: &BernoulliCounts) {
        debug_assert_eq!(self.succ.len(), other.succ.len());
        for (a, b) in self.succ.iter_mut().zip(other.succ.iter()) {
            *a += b;
        }
        for (a, b) in self.fail.iter_mut().zip(other.fail.iter()) {
            *a += b;
        }
    }
}

impl Add<&BernoulliCounts> for &BernoulliCounts {
    type Output = BernoulliCounts;

    fn add(self, other: &BernoulliCounts) -> BernoulliCounts {
        let mut ret = self.clone();
        ret += other;
        ret
    }
}

/// Beta(succ, fail) pseudo-counts
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BetaPrior {
    pub succ: f64,
    pub fail: f64,
}

impl BetaPrior {
    pub fn new(succ: f64, fail: f64) -> Result<Self> {
        let ret = BetaPrior { succ, fail };
        ret.validate()?;
        Ok(ret)
    }

    /// Uniform Beta(1, 1)
    pub fn laplace() -> Self {
        BetaPrior {
            succ: 1.0,
            fail: 1.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.succ > 0.0 && self.fail > 0.0 && self.succ.is_finite() && self.fail.is_finite())
        {
            return Err(Error::Configuration(format!(
                "Beta prior pseudo-counts must be positive, got ({}, {})",
                self.succ, self.fail
            )));
        }
        Ok(())
    }

    /// `ln B(a + s, b + f) - ln B(a, b)`
    pub fn log_marginal(&self, succ: i64, fail: i64) -> f64 {
        ln_beta(self.succ + succ as f64, self.fail + fail as f64) - ln_beta(self.succ, self.fail)
    }
}

impl Default for BetaPrior {
    /// Rare events: Beta(1, 99)
    fn default() -> Self {
        BetaPrior {
            succ: 1.0,
            fail: 99.0,
        }
    }
}

/// Default prior per kind plus per-group overrides
#[derive(Debug, Clone, Default)]
pub struct PriorOptions {
    pub term_prior: BetaPrior,
    pub false_pos: BetaPrior,
    pub false_neg: BetaPrior,
    pub overrides: BTreeMap<Box<str>, BetaPrior>,
}

impl PriorOptions {
    fn prior_of(&self, name: &str, kind: ParamKind) -> BetaPrior {
        self.overrides.get(name).copied().unwrap_or(match kind {
            ParamKind::TermPrior => self.term_prior,
            ParamKind::FalsePos => self.false_pos,
            ParamKind::FalseNeg => self.false_neg,
        })
    }
}

/// Beta priors and live counts aggregated over all activation models that
/// share the parameter namespace.
#[derive(Debug, Clone)]
pub struct ParamPosterior {
    params: BernoulliParams,
    prior: Vec<BetaPrior>,
    counts: BernoulliCounts,
}

impl ParamPosterior {
    pub fn new(params: BernoulliParams, options: &PriorOptions) -> Result<Self> {
        for name in options.overrides.keys() {
            if params.index(name).is_none() {
                return Err(Error::Configuration(format!(
                    "prior given for unknown parameter {}",
                    name
                )));
            }
        }
        let prior = (0..params.len())
            .map(|p| {
                let beta = options.prior_of(params.name(p), params.kind(p));
                beta.validate().map(|_| beta)
            })
            .collect::<Result<Vec<_>>>()?;
        let counts = BernoulliCounts::zeros(params.len());
        Ok(ParamPosterior {
            params,
            prior,
            counts,
        })
    }

    pub fn params(&self) -> &BernoulliParams {
        &self.params
    }

    pub fn prior(&self, p: usize) -> BetaPrior {
        self.prior[p]
    }

    pub fn counts(&self) -> &BernoulliCounts {
        &self.counts
    }

    pub fn to_json(&self) -> CountsJson {
        self.counts.to_json(&self.params)
    }

    /// Totals after applying `delta`, leaving `self` untouched
    pub fn add(&self, delta: &BernoulliCounts) -> BernoulliCounts {
        &self.counts + delta
    }

    /// Sum over groups of the Beta-Bernoulli log marginal of `counts`
    pub fn log_marginal_of(&self, counts: &BernoulliCounts) -> f64 {
        self.prior
            .iter()
            .enumerate()
            .map(|(p, beta)| beta.log_marginal(counts.succ[p], counts.fail[p]))
            .sum()
    }

    /// Log marginal likelihood of the current counts
    pub fn log_marginal_likelihood(&self) -> f64 {
        self.log_marginal_of(&self.counts)
    }

    /// Posterior mean `(a + s) / (a + b + s + f)` of group `p`
    pub fn posterior_mean(&self, p: usize) -> f64 {
        let a = self.prior[p].succ + self.counts.succ[p] as f64;
        let b = self.prior[p].fail + self.counts.fail[p] as f64;
        a / (a + b)
    }

    pub(crate) fn commit(&mut self, delta: &BernoulliCounts) {
        self.counts += delta;
    }

    pub(crate) fn replace_counts(&mut self, counts: BernoulliCounts) {
        self.counts = counts;
    }
}

/// `ln B(a, b) = ln Γ(a) + ln Γ(b) - ln Γ(a + b)`
pub fn ln_beta(a: f64, b: f64) -> f64 {
    SpecialGamma::ln_gamma(a).0 + SpecialGamma::ln_gamma(b).0 - SpecialGamma::ln_gamma(a + b).0
}
