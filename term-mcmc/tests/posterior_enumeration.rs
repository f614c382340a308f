mod common;

use common::*;
use term_mcmc::{
    Assignment, BetaPrior, McmcOptions, McmcSampler, MoveRate, ParamPosterior, PriorOptions,
};

fn prior() -> PriorOptions {
    let beta = BetaPrior::new(1.0, 4.0).unwrap();
    PriorOptions {
        term_prior: beta,
        false_pos: beta,
        false_neg: beta,
        overrides: Default::default(),
    }
}

/// Exact posterior over all 2^n activation vectors: per-term marginals and
/// the probability that some member of each term's equivalence class is on
fn enumerate(genes: &[&str]) -> (Vec<usize>, Vec<f64>, Vec<f64>) {
    let assocs = animals();
    let param = parameterization(&assocs);
    let posterior = ParamPosterior::new(param.params().clone(), &prior()).unwrap();
    let mut model = model(&assocs, genes);
    let terms = model.relevant_terms().to_vec();
    let n = terms.len();

    let mut log_lik = Vec::with_capacity(1 << n);
    for mask in 0..(1_usize << n) {
        let assignment: Assignment = terms
            .iter()
            .enumerate()
            .map(|(i, &t)| (t, mask & (1 << i) != 0))
            .collect();
        model.set_states(&assignment).unwrap();
        log_lik.push(posterior.log_marginal_of(model.get_counts()));
    }

    let max = log_lik.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let weight: Vec<f64> = log_lik.iter().map(|&x| (x - max).exp()).collect();
    let total: f64 = weight.iter().sum();

    let probability = |on: &dyn Fn(usize) -> bool| -> f64 {
        weight
            .iter()
            .enumerate()
            .filter(|&(mask, _)| on(mask))
            .map(|(_, &w)| w)
            .sum::<f64>()
            / total
    };

    let marginal = (0..n)
        .map(|i| probability(&|mask| mask & (1 << i) != 0))
        .collect();
    let class = terms
        .iter()
        .map(|&t| {
            let c = assocs.equiv_class_of_term(t);
            let members: Vec<usize> = (0..n)
                .filter(|&j| assocs.equiv_class_of_term(terms[j]) == c)
                .collect();
            probability(&|mask| members.iter().any(|&j| mask & (1 << j) != 0))
        })
        .collect();
    (terms, marginal, class)
}

fn check_sampler(genes: &[&str], move_rate: MoveRate, seed: u64) {
    let (terms, exact, exact_class) = enumerate(genes);

    let assocs = animals();
    let gene_set = assocs.gene_indices(genes).unwrap();
    let options = McmcOptions {
        move_rate,
        seed,
        burn: 10_000,
        prior: prior(),
        ..Default::default()
    };
    let mut sampler = McmcSampler::new(&assocs, &[gene_set], &options).unwrap();
    sampler.run(310_000);
    assert_eq!(sampler.samples(), 300_000);

    approx::assert_abs_diff_eq!(
        sampler.log_likelihood(),
        sampler.collapsed_log_likelihood(),
        epsilon = 1e-8
    );

    let estimate = sampler.term_marginal_summary(0).unwrap();
    let class_estimate = sampler.term_summary(0).unwrap();
    for (i, t) in terms.iter().enumerate() {
        for (p, q) in [(exact[i], estimate[t]), (exact_class[i], class_estimate[t])] {
            assert!(
                (p - q).abs() < 0.03,
                "term {}: exact {:.4} sampled {:.4}",
                assocs.ontology().term_name(*t),
                p,
                q
            );
        }
    }
}

#[test]
fn mutant_posterior_all_moves() {
    check_sampler(&MUTANTS, MoveRate::default(), 1);
}

#[test]
fn mutant_posterior_flip_only() {
    let rate = MoveRate {
        flip: 1.0,
        step: 0.0,
        jump: 0.0,
    };
    check_sampler(&MUTANTS, rate, 2);
}

#[test]
fn normal_posterior_step_heavy() {
    let rate = MoveRate {
        flip: 0.2,
        step: 1.0,
        jump: 0.5,
    };
    check_sampler(&NORMALS, rate, 3);
}

#[test]
fn equivalent_terms_share_class_posterior() {
    let assocs = animals();
    let gene_set = assocs.gene_indices(&MUTANTS).unwrap();
    let options = McmcOptions {
        seed: 5,
        burn: 1_000,
        prior: prior(),
        ..Default::default()
    };
    let mut sampler = McmcSampler::new(&assocs, &[gene_set], &options).unwrap();
    sampler.run(20_000);

    let classes = sampler.equivalence_summary(0).unwrap();
    let mammal = term(&assocs, "mammal");
    let primate = term(&assocs, "primate");
    let class = classes
        .iter()
        .find(|c| c.terms.contains(&mammal))
        .unwrap();
    assert_eq!(class.terms, vec![mammal, primate]);

    let terms = sampler.term_summary(0).unwrap();
    assert_eq!(terms[&mammal], terms[&primate]);
    assert_eq!(terms[&mammal], class.probability);

    let marginal = sampler.term_marginal_summary(0).unwrap();
    assert!(class.probability + 1e-12 >= marginal[&mammal].max(marginal[&primate]));
    assert!(class.probability <= marginal[&mammal] + marginal[&primate] + 1e-12);
}
