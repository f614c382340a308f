mod common;

use common::*;
use fnv::FnvHashMap as HashMap;
use term_mcmc::{BetaPrior, McmcOptions, McmcSampler, PriorOptions};

/// Per-sample tallies taken directly from the model state
#[derive(Default)]
struct Tally {
    samples: u64,
    term: HashMap<usize, u64>,
    class: HashMap<usize, u64>,
    false_gene: HashMap<usize, u64>,
    pair: HashMap<(usize, usize), u64>,
}

fn frequency(n: Option<&u64>, samples: u64) -> f64 {
    n.copied().unwrap_or(0) as f64 / samples as f64
}

#[test]
fn summaries_match_recounted_samples() {
    let assocs = animals();
    let gene_set = assocs.gene_indices(&MUTANTS).unwrap();
    let beta = BetaPrior::new(1.0, 4.0).unwrap();
    let options = McmcOptions {
        seed: 9,
        burn: 100,
        prior: PriorOptions {
            term_prior: beta,
            false_pos: beta,
            false_neg: beta,
            overrides: Default::default(),
        },
        ..Default::default()
    };
    let mut sampler = McmcSampler::new(&assocs, &[gene_set], &options).unwrap();
    let terms = sampler.models()[0].relevant_terms().to_vec();
    sampler.log_term_pairs(&terms).unwrap();

    let mut tally = Tally::default();
    for _ in 0..20_000 {
        let before = sampler.samples();
        sampler.run(1);
        if sampler.samples() == before {
            continue;
        }
        let model = &sampler.models()[0];
        tally.samples += 1;

        let active: Vec<usize> = terms
            .iter()
            .copied()
            .filter(|&t| model.get_state(t))
            .collect();
        for &t in active.iter() {
            *tally.term.entry(t).or_default() += 1;
        }
        for &t in terms.iter() {
            let c = assocs.equiv_class_of_term(t);
            if assocs
                .terms_in_equiv_class(c)
                .iter()
                .any(|&u| model.get_state(u))
            {
                *tally.class.entry(t).or_default() += 1;
            }
        }
        for (i, &a) in active.iter().enumerate() {
            for &b in active[i..].iter() {
                *tally.pair.entry((a, b)).or_default() += 1;
            }
        }
        for g in 0..assocs.num_genes() {
            let explained = assocs
                .terms_of_gene(g)
                .iter()
                .any(|&t| model.get_state(t));
            if explained != model.in_gene_set(g) {
                *tally.false_gene.entry(g).or_default() += 1;
            }
        }
    }

    let n = tally.samples;
    assert_eq!(n, 19_900);
    assert_eq!(sampler.samples(), n);

    let marginal = sampler.term_marginal_summary(0).unwrap();
    let term_summary = sampler.term_summary(0).unwrap();
    for &t in terms.iter() {
        approx::assert_abs_diff_eq!(marginal[&t], frequency(tally.term.get(&t), n), epsilon = 1e-9);
        approx::assert_abs_diff_eq!(
            term_summary[&t],
            frequency(tally.class.get(&t), n),
            epsilon = 1e-9
        );
    }

    // mammal and primate annotate the same genes
    let mammal = term(&assocs, "mammal");
    let primate = term(&assocs, "primate");
    assert_eq!(term_summary[&mammal], term_summary[&primate]);

    let pairs = sampler.term_pair_summary(0, &terms).unwrap();
    assert_eq!(pairs.samples, n);
    for (i, &a) in terms.iter().enumerate() {
        for (j, &b) in terms.iter().enumerate() {
            let key = if a <= b { (a, b) } else { (b, a) };
            approx::assert_abs_diff_eq!(
                pairs.probability[i][j],
                frequency(tally.pair.get(&key), n),
                epsilon = 1e-9
            );
        }
    }

    let false_pos = sampler.gene_false_pos_summary(0).unwrap();
    let false_neg = sampler.gene_false_neg_summary(0).unwrap();
    assert_eq!(false_pos.len() + false_neg.len(), assocs.num_genes());
    for (g, p) in false_pos.iter().chain(false_neg.iter()) {
        approx::assert_abs_diff_eq!(*p, frequency(tally.false_gene.get(g), n), epsilon = 1e-9);
    }
    assert!(false_pos.values().chain(false_neg.values()).any(|&p| p > 0.0));
}

#[test]
fn pair_summary_needs_tracked_terms() {
    let assocs = animals();
    let gene_set = assocs.gene_indices(&MUTANTS).unwrap();
    let mut sampler = McmcSampler::new(&assocs, &[gene_set], &McmcOptions::default()).unwrap();
    let human = term(&assocs, "human");
    let mutant = term(&assocs, "mutant");
    sampler.log_term_pairs(&[human]).unwrap();
    sampler.run(100);
    assert_eq!(sampler.term_pair_summary(0, &[human]).unwrap().samples, 100);
    assert!(sampler.term_pair_summary(0, &[human, mutant]).is_err());

    // a new burn-in keeps the tracked set but drops the samples
    sampler.set_burn(150);
    assert_eq!(sampler.term_pairs_tracked(), &[human]);
    sampler.run(100);
    assert_eq!(sampler.term_pair_summary(0, &[human]).unwrap().samples, 50);

    sampler.stop_logging_term_pairs();
    sampler.run(100);
    assert_eq!(sampler.term_pair_summary(0, &[human]).unwrap().samples, 50);
}
