use crate::common::*;

#[derive(Args, Debug)]
pub struct SubgraphArgs {
    #[arg(
        short = 'o',
        long = "ontology",
        required = true,
        help = "Ontology JSON file"
    )]
    ontology_file: Box<str>,

    #[arg(
        long = "root-ids",
        value_delimiter = ',',
        help = "Keep these terms (by id) and their descendants"
    )]
    root_ids: Vec<Box<str>>,

    #[arg(
        long = "root-names",
        value_delimiter = ',',
        help = "Keep these terms (by name) and their descendants",
        long_help = "Comma-separated term names, matched against the \n\
		     `termInfo` strings of the ontology."
    )]
    root_names: Vec<Box<str>>,

    #[arg(
        long = "slim",
        help = "Keep only terms used by this associations file, plus ancestors",
        long_help = "Associations JSON `[[gene, term], ...]`. The output keeps \n\
		     every term mentioned there and all of its ancestors. \n\
		     Terms absent from the ontology are reported and skipped."
    )]
    slim: Option<Box<str>>,

    #[arg(long, default_value = "stdout", help = "Output JSON file")]
    out: Box<str>,

    #[arg(long, default_value_t = false, help = "Pretty-print the output")]
    expand: bool,
}

pub fn run_subgraph(args: &SubgraphArgs) -> anyhow::Result<()> {
    if args.root_ids.is_empty() && args.root_names.is_empty() && args.slim.is_none() {
        anyhow::bail!("need --root-ids, --root-names or --slim");
    }

    let mut ontology = read_ontology(&args.ontology_file)?;

    if !args.root_ids.is_empty() || !args.root_names.is_empty() {
        let mut roots: Vec<&str> = args.root_ids.iter().map(|x| x.as_ref()).collect();
        for name in args.root_names.iter() {
            match ontology.find_term(name) {
                Some(t) if ontology.term_info(t) == Some(name.as_ref()) => {
                    roots.push(ontology.term_name(t))
                }
                _ => anyhow::bail!("no term named {}", name),
            }
        }
        let sub = ontology.subgraph_rooted_at(&roots, false)?;
        info!(
            "{} of {} terms under {} root(s)",
            sub.num_terms(),
            ontology.num_terms(),
            roots.len()
        );
        ontology = sub;
    }

    if let Some(file) = args.slim.as_deref() {
        let pairs = read_assocs_pairs(file)?;
        let mut terms: Vec<&str> = pairs.iter().map(|(_, t)| t.as_ref()).collect();
        terms.sort_unstable();
        terms.dedup();
        let slim = ontology.subgraph_with_ancestors(&terms, true)?;
        info!(
            "slim ontology: {} of {} terms",
            slim.num_terms(),
            ontology.num_terms()
        );
        ontology = slim;
    }

    io::write_json(&ontology.to_json(), &args.out, args.expand)?;
    Ok(())
}
