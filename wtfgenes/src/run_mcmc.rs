use crate::common::*;
use serde::Serialize;
use std::collections::BTreeMap;
use term_mcmc::{
    BetaPrior, GeneSetSummary, McmcOptions, McmcSampler, MoveRate, MoveStat, MoveType,
    PriorOptions,
};

#[derive(Args, Debug)]
pub struct McmcArgs {
    #[arg(
        short = 'o',
        long = "ontology",
        required = true,
        help = "Ontology JSON file",
        long_help = "Ontology in JSON, either `[[term, parent, ...], ...]` \n\
		     or `{\"termParents\": {...}, \"termInfo\": {...}}`. \n\
		     May be gzipped."
    )]
    ontology_file: Box<str>,

    #[arg(
        short = 'a',
        long = "assocs",
        required = true,
        help = "Gene-term associations JSON file",
        long_help = "Associations as `[[gene, term], ...]` in JSON. \n\
		     Each gene is annotated to the term and all its ancestors."
    )]
    assocs_file: Box<str>,

    #[arg(
        short = 'g',
        long = "genes",
        value_delimiter = ',',
        required = true,
        help = "Gene-set files",
        long_help = "Comma-separated list of gene-set files, one gene name per line. \n\
		     Each file is one gene set; all gene sets share the \n\
		     false-positive and false-negative rates. \n\
		     Example: set1.txt,set2.txt.gz"
    )]
    gene_files: Vec<Box<str>>,

    #[arg(
        long = "ignore-missing-terms",
        default_value_t = false,
        help = "Skip associations to terms missing from the ontology"
    )]
    ignore_missing_terms: bool,

    #[arg(
        long = "strict",
        default_value_t = false,
        help = "Fail on gene names missing from the associations",
        long_help = "Fail on gene names missing from the associations. \n\
		     By default these are reported and dropped."
    )]
    strict: bool,

    #[arg(short = 's', long, default_value_t = 123456789, help = "Random seed")]
    seed: u64,

    #[arg(long, default_value_t = 1.0, help = "Relative weight of flip moves")]
    flip: f64,

    #[arg(long, default_value_t = 1.0, help = "Relative weight of step moves")]
    step: f64,

    #[arg(long, default_value_t = 1.0, help = "Relative weight of jump moves")]
    jump: f64,

    #[arg(
        long = "term-prior",
        value_delimiter = ',',
        default_values_t = vec![1.0, 99.0],
        help = "Beta prior of term activation (succ,fail)"
    )]
    term_prior: Vec<f64>,

    #[arg(
        long = "false-pos-prior",
        value_delimiter = ',',
        default_values_t = vec![1.0, 99.0],
        help = "Beta prior of the false-positive rate (succ,fail)"
    )]
    false_pos_prior: Vec<f64>,

    #[arg(
        long = "false-neg-prior",
        value_delimiter = ',',
        default_values_t = vec![1.0, 99.0],
        help = "Beta prior of the false-negative rate (succ,fail)"
    )]
    false_neg_prior: Vec<f64>,

    #[arg(
        long = "burn-per-var",
        default_value_t = 10,
        help = "Burn-in iterations per variable"
    )]
    burn_per_var: u64,

    #[arg(
        long = "samples-per-var",
        default_value_t = 100,
        help = "Post-burn iterations per variable"
    )]
    samples_per_var: u64,

    #[arg(
        long = "term-pairs",
        default_value_t = false,
        help = "Report co-activation of likely terms",
        long_help = "Log term co-activation, starting `--pairs-after-per-var` \n\
		     iterations per variable into the post-burn phase. Only terms \n\
		     with posterior probability above `--pair-prob` at that point \n\
		     are tracked; the report covers those above `--post-prob`."
    )]
    term_pairs: bool,

    #[arg(
        long = "pair-prob",
        default_value_t = 0.05,
        help = "Minimum posterior probability of terms tracked for co-activation"
    )]
    pair_prob: f64,

    #[arg(
        long = "pairs-after-per-var",
        default_value_t = 50,
        help = "Post-burn iterations per variable before pair logging starts"
    )]
    pairs_after_per_var: u64,

    #[arg(long, default_value_t = 1, help = "Number of independent chains")]
    chains: usize,

    #[arg(
        long = "batch",
        default_value_t = 1000,
        help = "Iterations between progress updates"
    )]
    batch: u64,

    #[arg(
        long = "post-prob",
        default_value_t = 0.5,
        help = "Minimum posterior probability to report"
    )]
    post_prob: f64,

    #[arg(
        long = "pvalue",
        default_value_t = 0.05,
        help = "Maximum hypergeometric p-value to report"
    )]
    pvalue: f64,

    #[arg(
        long = "trace",
        default_value_t = false,
        help = "Include the log-likelihood of every iteration"
    )]
    trace: bool,

    #[arg(long, default_value = "stdout", help = "Output JSON file")]
    out: Box<str>,

    #[arg(long, default_value_t = false, help = "Pretty-print the output")]
    expand: bool,
}

#[derive(Serialize)]
struct TermPairReport {
    terms: Vec<Box<str>>,
    samples: u64,
    probability: Vec<Vec<f64>>,
}

#[derive(Serialize)]
struct ChainReport {
    seed: u64,
    samples_including_burn: u64,
    burn: u64,
    log_likelihood: f64,
    move_stats: BTreeMap<MoveType, MoveStat>,
    gene_sets: Vec<GeneSetSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    term_pairs: Vec<TermPairReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<Vec<f64>>,
}

fn beta_prior(what: &str, x: &[f64]) -> anyhow::Result<BetaPrior> {
    if x.len() != 2 {
        anyhow::bail!("{} needs two pseudo-counts (succ,fail), got {:?}", what, x);
    }
    Ok(BetaPrior::new(x[0], x[1])?)
}

fn read_gene_sets(args: &McmcArgs, assocs: &Assocs) -> anyhow::Result<Vec<Vec<usize>>> {
    let mut ret = vec![];
    for file in args.gene_files.iter() {
        let names = io::read_words(file)?;
        let missing = assocs.validate_gene_names(&names);
        if !missing.is_empty() {
            if args.strict {
                anyhow::bail!("{}: {}", file, ontology_util::Error::UnknownGenes(missing));
            }
            warn!(
                "{}: dropped {} genes not in the associations: {}",
                file,
                missing.len(),
                missing.join(", ")
            );
        }
        let known: Vec<&Box<str>> = names
            .iter()
            .filter(|x| assocs.find_gene(x).is_some())
            .collect();
        if known.is_empty() {
            anyhow::bail!("{}: no known genes", file);
        }
        let gene_set = assocs.gene_indices(&known)?;
        info!("{}: {} genes", file, gene_set.len());
        ret.push(gene_set);
    }
    Ok(ret)
}

/// Terms worth tracking for co-activation, over all gene sets. Before any
/// post-burn sample every relevant term qualifies.
fn pair_candidates(sampler: &McmcSampler, min_prob: f64) -> anyhow::Result<Vec<usize>> {
    let mut ret = vec![];
    for (m, model) in sampler.models().iter().enumerate() {
        if sampler.samples() == 0 {
            ret.extend_from_slice(model.relevant_terms());
        } else {
            let posterior = sampler.term_summary(m)?;
            ret.extend(posterior.into_iter().filter(|&(_, p)| p >= min_prob).map(|(t, _)| t));
        }
    }
    ret.sort_unstable();
    ret.dedup();
    info!("tracking co-activation of {} terms", ret.len());
    Ok(ret)
}

pub fn run_mcmc(args: &McmcArgs) -> anyhow::Result<()> {
    let ontology = read_ontology(&args.ontology_file)?;
    let pairs = read_assocs_pairs(&args.assocs_file)?;
    let assocs_options = AssocsOptions {
        ignore_missing_terms: args.ignore_missing_terms,
        ..Default::default()
    };
    let assocs = Assocs::from_json(ontology, &pairs, &assocs_options)?;
    let gene_sets = read_gene_sets(args, &assocs)?;

    let base = McmcOptions {
        move_rate: MoveRate {
            flip: args.flip,
            step: args.step,
            jump: args.jump,
        },
        seed: args.seed,
        prior: PriorOptions {
            term_prior: beta_prior("--term-prior", &args.term_prior)?,
            false_pos: beta_prior("--false-pos-prior", &args.false_pos_prior)?,
            false_neg: beta_prior("--false-neg-prior", &args.false_neg_prior)?,
            overrides: Default::default(),
        },
        trace: args.trace,
        ..Default::default()
    };
    base.move_rate.validate()?;

    let n_chains = args.chains.max(1);
    let n_var = gene_sets
        .iter()
        .map(|gs| assocs.relevant_terms(gs).len() as u64)
        .sum::<u64>();
    let burn = args.burn_per_var * n_var;
    let total = burn + args.samples_per_var * n_var;
    let pairs_from = burn + args.pairs_after_per_var * n_var;
    info!(
        "{} chain(s), {} variables: {} burn-in + {} iterations each",
        n_chains,
        n_var,
        burn,
        total - burn
    );

    let pb = ProgressBar::new(total * n_chains as u64).with_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} ({eta})")?
            .progress_chars("##-"),
    );

    let chains = (0..n_chains)
        .into_par_iter()
        .map(|chain| -> anyhow::Result<ChainReport> {
            let options = McmcOptions {
                seed: base.seed.wrapping_add(chain as u64),
                burn,
                ..base.clone()
            };
            let mut sampler = McmcSampler::new(&assocs, &gene_sets, &options)?;
            let mut logging_pairs = false;

            while sampler.samples_including_burn() < total {
                let done = sampler.samples_including_burn();
                if args.term_pairs && !logging_pairs && done >= pairs_from {
                    sampler.log_term_pairs(&pair_candidates(&sampler, args.pair_prob)?)?;
                    logging_pairs = true;
                }
                let mut next = (done + args.batch.max(1)).min(total);
                if args.term_pairs && !logging_pairs && pairs_from > done {
                    next = next.min(pairs_from);
                }
                sampler.run(next - done);
                pb.inc(next - done);
            }

            let gene_set_summaries = (0..gene_sets.len())
                .map(|m| sampler.summary(m, args.post_prob, args.pvalue))
                .collect::<term_mcmc::Result<Vec<_>>>()?;

            let mut term_pairs = vec![];
            if args.term_pairs {
                let onto = assocs.ontology();
                for m in 0..gene_sets.len() {
                    let posterior = sampler.term_summary(m)?;
                    let likely: Vec<usize> = sampler
                        .term_pairs_tracked()
                        .iter()
                        .copied()
                        .filter(|t| posterior.get(t).is_some_and(|&p| p >= args.post_prob))
                        .collect();
                    let pairs = sampler.term_pair_summary(m, &likely)?;
                    term_pairs.push(TermPairReport {
                        terms: likely.iter().map(|&t| onto.term_name(t).into()).collect(),
                        samples: pairs.samples,
                        probability: pairs.probability,
                    });
                }
            }

            info!(
                "chain {}: log-likelihood {:.3}, {} post-burn samples",
                chain,
                sampler.log_likelihood(),
                sampler.samples()
            );

            Ok(ChainReport {
                seed: options.seed,
                samples_including_burn: sampler.samples_including_burn(),
                burn: sampler.burn(),
                log_likelihood: sampler.log_likelihood(),
                move_stats: sampler.move_stats(),
                gene_sets: gene_set_summaries,
                term_pairs,
                trace: args.trace.then(|| sampler.log_likelihood_trace().to_vec()),
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    pb.finish_and_clear();

    for (c, report) in chains.iter().enumerate() {
        for (kind, stat) in report.move_stats.iter() {
            info!(
                "chain {} {:?}: {} proposed, {:.1}% accepted",
                c,
                kind,
                stat.proposed,
                100.0 * stat.acceptance_rate()
            );
        }
    }

    io::write_json(&BTreeMap::from([("chains", chains)]), &args.out, args.expand)?;
    Ok(())
}
