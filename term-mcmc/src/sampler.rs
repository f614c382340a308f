//! Metropolis-Hastings sampler over term activations.
//!
//! One [`ActivationModel`] per gene set; all models share one
//! [`ParamPosterior`], so the rates of each parameter group are pooled
//! across gene sets. Rates are integrated out (collapsed), and a state is
//! scored by the Beta-Bernoulli marginal likelihood of its counts.
//!
//! The sampler runs on the caller's thread: [`McmcSampler::run`] performs
//! exactly `n` iterations and returns. Summaries can be read between
//! batches.

use crate::bernoulli::{BernoulliCounts, ParamPosterior, PriorOptions};
use crate::model::ActivationModel;
use crate::moves::{propose, MoveRate, MoveType};
use crate::parameterization::{GroupingOptions, Parameterization};
use crate::summary::*;
use log::{debug, info, trace};
use ontology_util::{Assocs, Error, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct McmcOptions {
    pub move_rate: MoveRate,
    pub seed: u64,
    /// iterations excluded from summaries
    pub burn: u64,
    pub prior: PriorOptions,
    pub grouping: GroupingOptions,
    /// keep the log-likelihood of every iteration
    pub trace: bool,
}

impl Default for McmcOptions {
    fn default() -> Self {
        McmcOptions {
            move_rate: MoveRate::default(),
            seed: 123456789,
            burn: 0,
            prior: PriorOptions::default(),
            grouping: GroupingOptions::default(),
            trace: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MoveStat {
    pub proposed: u64,
    pub accepted: u64,
}

impl MoveStat {
    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }
}

pub struct McmcSampler<'a> {
    assocs: &'a Assocs,
    param: Arc<Parameterization>,
    models: Vec<ActivationModel<'a>>,
    posterior: ParamPosterior,
    rng: SmallRng,
    move_rate: MoveRate,
    samples_including_burn: u64,
    burn: u64,
    /// post-burn samples folded into `summaries`
    n_post_burn: u64,
    summaries: Vec<ModelSummary>,
    log_likelihood: f64,
    trace: Option<Vec<f64>>,
    move_stats: [MoveStat; 3],
}

impl<'a> McmcSampler<'a> {
    /// Start from the all-inactive state.
    ///
    /// * `assocs` - annotation table shared (read-only) by every model
    /// * `gene_sets` - one list of gene indices per model
    /// * `options` - move weights, seed, burn-in, priors and grouping
    pub fn new(assocs: &'a Assocs, gene_sets: &[Vec<usize>], options: &McmcOptions) -> Result<Self> {
        options.move_rate.validate()?;
        if gene_sets.is_empty() {
            return Err(Error::InvalidGeneSet("no gene sets given".to_string()));
        }

        let param = Arc::new(Parameterization::new(assocs, &options.grouping)?);
        let models = gene_sets
            .iter()
            .map(|gs| ActivationModel::new(assocs, param.clone(), gs))
            .collect::<Result<Vec<_>>>()?;

        let mut posterior = ParamPosterior::new(param.params().clone(), &options.prior)?;
        for m in models.iter() {
            posterior.commit(m.get_counts());
        }
        let log_likelihood = posterior.log_marginal_likelihood();
        let summaries = models.iter().map(|m| ModelSummary::new(m, 0)).collect();

        let ret = McmcSampler {
            assocs,
            param,
            models,
            posterior,
            rng: SmallRng::seed_from_u64(options.seed),
            move_rate: options.move_rate,
            samples_including_burn: 0,
            burn: options.burn,
            n_post_burn: 0,
            summaries,
            log_likelihood,
            trace: options.trace.then(Vec::new),
            move_stats: [MoveStat::default(); 3],
        };

        info!(
            "sampler over {} gene set(s): {} variables, {} parameters",
            ret.models.len(),
            ret.n_variables(),
            ret.param.params().len()
        );
        Ok(ret)
    }

    /// Run exactly `n` iterations
    pub fn run(&mut self, n: u64) {
        for _ in 0..n {
            self.iterate();
        }
        debug!(
            "{} samples ({} post-burn), log-likelihood {:.4}",
            self.samples_including_burn, self.n_post_burn, self.log_likelihood
        );
    }

    fn iterate(&mut self) {
        let clock = self.n_post_burn;

        if let Some(prop) = propose(&self.models, &self.move_rate, &mut self.rng) {
            let model = &self.models[prop.model];
            let delta = model.state_delta(&prop.changes);
            let new_counts = self.posterior.add(&delta.counts);
            let new_log_likelihood = self.posterior.log_marginal_of(&new_counts);
            let log_ratio = new_log_likelihood - self.log_likelihood + prop.log_hastings;
            let accept = log_ratio >= 0.0 || self.rng.random::<f64>() < log_ratio.exp();

            if log::log_enabled!(log::Level::Trace) {
                let terms: Vec<(&str, bool)> = prop
                    .changes
                    .iter()
                    .map(|&(s, on)| (self.assocs.ontology().term_name(model.term_of_slot(s)), on))
                    .collect();
                trace!(
                    "{:?} on gene set {}: {:?} log ratio {:.4} {}",
                    prop.move_type,
                    prop.model,
                    terms,
                    log_ratio,
                    if accept { "accepted" } else { "rejected" }
                );
            }

            let stat = &mut self.move_stats[prop.move_type.index()];
            stat.proposed += 1;
            if accept {
                stat.accepted += 1;
                let model = &mut self.models[prop.model];
                model.commit(&prop.changes, &delta);
                self.posterior.replace_counts(new_counts);
                self.log_likelihood = new_log_likelihood;
                self.summaries[prop.model].update(model, &prop.changes, &delta.toggled_genes, clock);
            }
        }

        if self.samples_including_burn >= self.burn {
            for (summary, model) in self.summaries.iter_mut().zip(self.models.iter()) {
                summary.record_sample(model);
            }
            self.n_post_burn += 1;
        }
        if let Some(trace) = self.trace.as_mut() {
            trace.push(self.log_likelihood);
        }
        self.samples_including_burn += 1;
    }

    /// Free bits over all models
    pub fn n_variables(&self) -> usize {
        self.models.iter().map(|m| m.n_variables()).sum()
    }

    pub fn samples_including_burn(&self) -> u64 {
        self.samples_including_burn
    }

    /// Post-burn samples behind the current summaries
    pub fn samples(&self) -> u64 {
        self.n_post_burn
    }

    pub fn burn(&self) -> u64 {
        self.burn
    }

    /// Change the burn-in. Summaries that already started are discarded
    /// and restart from the current state.
    pub fn set_burn(&mut self, burn: u64) {
        if self.n_post_burn > 0 {
            debug!("discarding {} post-burn samples", self.n_post_burn);
            self.n_post_burn = 0;
            for (summary, model) in self.summaries.iter_mut().zip(self.models.iter()) {
                let pairs = std::mem::take(&mut summary.pairs);
                *summary = ModelSummary::new(model, 0);
                summary.pairs.track(pairs.tracked());
                summary.pairs.enabled = pairs.enabled;
            }
        }
        self.burn = burn;
    }

    pub fn finished_burn(&self) -> bool {
        self.samples_including_burn >= self.burn
    }

    pub fn trace_log_likelihood(&mut self, enable: bool) {
        match (enable, self.trace.is_some()) {
            (true, false) => self.trace = Some(vec![]),
            (false, true) => self.trace = None,
            _ => {}
        }
    }

    /// Log-likelihood after each traced iteration
    pub fn log_likelihood_trace(&self) -> &[f64] {
        self.trace.as_deref().unwrap_or(&[])
    }

    /// Start counting co-activations among `terms`, for post-burn samples
    /// from now on. Each sample costs O(|terms|^2) at worst.
    pub fn log_term_pairs(&mut self, terms: &[usize]) -> Result<()> {
        let onto = self.assocs.ontology();
        if let Some(&t) = terms.iter().find(|&&t| t >= onto.num_terms()) {
            return Err(Error::UnknownTerm(t.to_string().into()));
        }
        for s in self.summaries.iter_mut() {
            s.pairs.track(terms);
        }
        debug!("logging co-activation of {} terms", terms.len());
        Ok(())
    }

    /// Terms whose co-activation is logged
    pub fn term_pairs_tracked(&self) -> &[usize] {
        self.summaries
            .first()
            .map(|s| s.pairs.tracked())
            .unwrap_or(&[])
    }

    pub fn stop_logging_term_pairs(&mut self) {
        for s in self.summaries.iter_mut() {
            s.pairs.enabled = false;
        }
    }

    /// Log marginal likelihood maintained across accepted moves
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Log marginal likelihood recounted from the current bits
    pub fn collapsed_log_likelihood(&self) -> f64 {
        let mut counts = BernoulliCounts::zeros(self.param.params().len());
        for m in self.models.iter() {
            counts += &m.recompute_counts();
        }
        self.posterior.log_marginal_of(&counts)
    }

    pub fn move_stats(&self) -> BTreeMap<MoveType, MoveStat> {
        MoveType::ALL
            .iter()
            .map(|&m| (m, self.move_stats[m.index()]))
            .collect()
    }

    pub fn models(&self) -> &[ActivationModel<'a>] {
        &self.models
    }

    pub fn posterior(&self) -> &ParamPosterior {
        &self.posterior
    }

    pub fn parameterization(&self) -> &Parameterization {
        &self.param
    }

    fn model_summary(&self, m: usize) -> Result<(&ActivationModel<'a>, &ModelSummary)> {
        match (self.models.get(m), self.summaries.get(m)) {
            (Some(model), Some(summary)) => Ok((model, summary)),
            _ => Err(Error::InvalidGeneSet(format!(
                "no gene set with index {} ({} gene sets)",
                m,
                self.models.len()
            ))),
        }
    }

    /// Posterior probability of each relevant term, taken from its
    /// equivalence class so that equivalent terms report the same value
    pub fn term_summary(&self, m: usize) -> Result<BTreeMap<usize, f64>> {
        let (model, summary) = self.model_summary(m)?;
        Ok(model
            .relevant_terms()
            .iter()
            .map(|&t| {
                let c = self.assocs.equiv_class_of_term(t);
                (t, summary.class[c].peek(self.n_post_burn))
            })
            .collect())
    }

    /// Fraction of samples in which each relevant term itself was active.
    /// Members of one equivalence class share this mass between them.
    pub fn term_marginal_summary(&self, m: usize) -> Result<BTreeMap<usize, f64>> {
        let (model, summary) = self.model_summary(m)?;
        Ok(summary
            .term
            .iter()
            .enumerate()
            .map(|(s, occ)| (model.term_of_slot(s), occ.peek(self.n_post_burn)))
            .collect())
    }

    /// Posterior probability that at least one member of each relevant
    /// equivalence class is active, by ascending class id
    pub fn equivalence_summary(&self, m: usize) -> Result<Vec<ClassPosterior>> {
        let (model, summary) = self.model_summary(m)?;
        let mut classes: Vec<usize> = model
            .relevant_terms()
            .iter()
            .map(|&t| self.assocs.equiv_class_of_term(t))
            .collect();
        classes.sort_unstable();
        classes.dedup();
        Ok(classes
            .into_iter()
            .map(|c| ClassPosterior {
                class: c,
                terms: self.assocs.terms_in_equiv_class(c).to_vec(),
                probability: summary.class[c].peek(self.n_post_burn),
            })
            .collect())
    }

    /// Joint activation frequencies of `terms`, over the samples logged
    /// while term-pair logging was on. Every term must be tracked.
    pub fn term_pair_summary(&self, m: usize, terms: &[usize]) -> Result<TermPairSummary> {
        let (model, summary) = self.model_summary(m)?;
        let onto = self.assocs.ontology();
        for &t in terms {
            if t >= onto.num_terms() {
                return Err(Error::UnknownTerm(t.to_string().into()));
            }
            if !model.is_relevant(t) {
                return Err(Error::IrrelevantTerm(onto.term_name(t).into()));
            }
            if !summary.pairs.is_tracked(t) {
                return Err(Error::Configuration(format!(
                    "co-activation of {} is not logged",
                    onto.term_name(t)
                )));
            }
        }
        let probability = terms
            .iter()
            .map(|&a| terms.iter().map(|&b| summary.pairs.frequency(a, b)).collect())
            .collect();
        Ok(TermPairSummary {
            terms: terms.to_vec(),
            samples: summary.pairs.n_samples(),
            probability,
        })
    }

    /// For genes in the set: probability of being unexplained
    pub fn gene_false_pos_summary(&self, m: usize) -> Result<BTreeMap<usize, f64>> {
        self.gene_false_summary(m, true)
    }

    /// For genes outside the set: probability of being explained
    pub fn gene_false_neg_summary(&self, m: usize) -> Result<BTreeMap<usize, f64>> {
        self.gene_false_summary(m, false)
    }

    fn gene_false_summary(&self, m: usize, in_set: bool) -> Result<BTreeMap<usize, f64>> {
        let (model, summary) = self.model_summary(m)?;
        Ok((0..model.num_genes())
            .filter(|&g| model.in_gene_set(g) == in_set)
            .map(|g| (g, summary.gene[g].peek(self.n_post_burn)))
            .collect())
    }

    /// Report for gene set `m`.
    ///
    /// * `post_prob_threshold` - minimum posterior probability of reported
    ///   term classes and false genes
    /// * `pvalue_threshold` - maximum hypergeometric p-value reported
    pub fn summary(
        &self,
        m: usize,
        post_prob_threshold: f64,
        pvalue_threshold: f64,
    ) -> Result<GeneSetSummary> {
        let (model, _) = self.model_summary(m)?;
        let onto = self.assocs.ontology();

        let hypergeometric = self
            .assocs
            .hypergeometric_pvalues(model.gene_set(), pvalue_threshold)?
            .into_iter()
            .map(|x| TermEnrichment {
                term: onto.term_name(x.term).into(),
                name: onto.display_name(x.term).into(),
                overlap: x.overlap,
                pvalue: x.pvalue,
            })
            .collect();

        let mut term_posterior: Vec<TermPosterior> = self
            .equivalence_summary(m)?
            .into_iter()
            .filter(|c| c.probability >= post_prob_threshold)
            .map(|c| TermPosterior {
                terms: c.terms.iter().map(|&t| onto.term_name(t).into()).collect(),
                names: c.terms.iter().map(|&t| onto.display_name(t).into()).collect(),
                probability: c.probability,
            })
            .collect();
        term_posterior.sort_by(|a, b| b.probability.total_cmp(&a.probability));

        let gene_names = |probs: BTreeMap<usize, f64>| -> BTreeMap<Box<str>, f64> {
            probs
                .into_iter()
                .filter(|&(_, p)| p >= post_prob_threshold)
                .map(|(g, p)| (self.assocs.gene_name(g).into(), p))
                .collect()
        };

        Ok(GeneSetSummary {
            gene_set: model
                .gene_set()
                .iter()
                .map(|&g| self.assocs.gene_name(g).into())
                .collect(),
            samples: self.n_post_burn,
            hypergeometric,
            term_posterior,
            false_pos: gene_names(self.gene_false_pos_summary(m)?),
            false_neg: gene_names(self.gene_false_neg_summary(m)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontology_util::{AssocsOptions, Ontology};

    fn assocs() -> Assocs {
        let onto = Ontology::from_json(
            serde_json::from_str(r#"[["a"],["b","a"],["c","b"],["d","a"]]"#).unwrap(),
        )
        .unwrap();
        let pairs = [("g1", "c"), ("g2", "d"), ("g3", "d"), ("g4", "c")];
        Assocs::new(onto, &pairs, &AssocsOptions::default()).unwrap()
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let assocs = assocs();
        assert!(matches!(
            McmcSampler::new(&assocs, &[], &McmcOptions::default()),
            Err(Error::InvalidGeneSet(_))
        ));
        assert!(matches!(
            McmcSampler::new(&assocs, &[vec![]], &McmcOptions::default()),
            Err(Error::InvalidGeneSet(_))
        ));
        let options = McmcOptions {
            move_rate: MoveRate {
                flip: 0.0,
                step: 0.0,
                jump: 0.0,
            },
            ..Default::default()
        };
        assert!(matches!(
            McmcSampler::new(&assocs, &[vec![0]], &options),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn counters_and_burn() {
        let assocs = assocs();
        let options = McmcOptions {
            burn: 10,
            trace: true,
            ..Default::default()
        };
        let mut sampler = McmcSampler::new(&assocs, &[vec![0, 3]], &options).unwrap();
        assert_eq!(sampler.n_variables(), 3);
        sampler.run(5);
        assert!(!sampler.finished_burn());
        assert_eq!(sampler.samples(), 0);
        sampler.run(20);
        assert!(sampler.finished_burn());
        assert_eq!(sampler.samples_including_burn(), 25);
        assert_eq!(sampler.samples(), 15);
        assert_eq!(sampler.log_likelihood_trace().len(), 25);

        let stats = sampler.move_stats();
        let proposed: u64 = stats.values().map(|s| s.proposed).sum();
        assert_eq!(proposed, 25);

        sampler.set_burn(30);
        assert_eq!(sampler.samples(), 0);
        assert!(!sampler.finished_burn());
        sampler.trace_log_likelihood(false);
        assert!(sampler.log_likelihood_trace().is_empty());
    }

    #[test]
    fn maintained_likelihood_matches_recount() {
        let assocs = assocs();
        let mut sampler =
            McmcSampler::new(&assocs, &[vec![0, 3], vec![1, 2]], &McmcOptions::default()).unwrap();
        for _ in 0..20 {
            sampler.run(50);
            approx::assert_abs_diff_eq!(
                sampler.log_likelihood(),
                sampler.collapsed_log_likelihood(),
                epsilon = 1e-8
            );
            let mut counts = BernoulliCounts::zeros(sampler.posterior().params().len());
            for m in sampler.models() {
                counts += m.get_counts();
            }
            assert_eq!(&counts, sampler.posterior().counts());
        }
    }

    #[test]
    fn summaries_are_probabilities() {
        let assocs = assocs();
        let mut sampler = McmcSampler::new(&assocs, &[vec![0, 3]], &McmcOptions::default()).unwrap();
        sampler.log_term_pairs(&[0, 1, 2]).unwrap();
        assert_eq!(sampler.term_pairs_tracked(), &[0, 1, 2]);
        sampler.run(2000);

        let terms = sampler.term_summary(0).unwrap();
        assert_eq!(terms.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(terms.values().all(|&p| (0.0..=1.0).contains(&p)));

        // b and c annotate the same genes
        let classes = sampler.equivalence_summary(0).unwrap();
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[1].terms, vec![1, 2]);
        assert_eq!(terms[&1], terms[&2]);
        assert_eq!(terms[&1], classes[1].probability);

        let marginal = sampler.term_marginal_summary(0).unwrap();
        assert!(classes[1].probability >= marginal[&1].max(marginal[&2]) - 1e-12);

        let pairs = sampler.term_pair_summary(0, &[0, 1, 2]).unwrap();
        assert_eq!(pairs.samples, 2000);
        for i in 0..3 {
            approx::assert_abs_diff_eq!(
                pairs.probability[i][i],
                marginal[&pairs.terms[i]],
                epsilon = 1e-9
            );
        }
        assert!(matches!(
            sampler.term_pair_summary(0, &[3]),
            Err(Error::IrrelevantTerm(_))
        ));
        assert!(matches!(
            sampler.log_term_pairs(&[99]),
            Err(Error::UnknownTerm(_))
        ));
        assert!(sampler.term_summary(1).is_err());

        let fp = sampler.gene_false_pos_summary(0).unwrap();
        let fn_ = sampler.gene_false_neg_summary(0).unwrap();
        assert_eq!(fp.keys().copied().collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(fn_.keys().copied().collect::<Vec<_>>(), vec![1, 2]);

        let report = sampler.summary(0, 0.0, 1.0).unwrap();
        assert_eq!(report.gene_set.len(), 2);
        assert_eq!(report.term_posterior.len(), 2);
        assert_eq!(report.false_pos.len(), 2);
        assert_eq!(report.samples, 2000);
    }

    #[test]
    fn same_seed_same_chain() {
        let assocs = assocs();
        let options = McmcOptions {
            seed: 42,
            trace: true,
            ..Default::default()
        };
        let mut a = McmcSampler::new(&assocs, &[vec![0, 3]], &options).unwrap();
        let mut b = McmcSampler::new(&assocs, &[vec![0, 3]], &options).unwrap();
        a.run(500);
        b.run(500);
        assert_eq!(a.log_likelihood_trace(), b.log_likelihood_trace());
        assert_eq!(a.models()[0].active_terms(), b.models()[0].active_terms());
    }
}
