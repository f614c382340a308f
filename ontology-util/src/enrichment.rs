//! Frequentist term enrichment, reported alongside posterior summaries.

use crate::assocs::Assocs;
use crate::errors::{Error, Result};
use statrs::distribution::{DiscreteCDF, Hypergeometric};

/// One-sided hypergeometric test for over-representation.
///
/// Returns `P(X >= k)` where `X ~ Hypergeometric(population, successes, draws)`.
pub fn hypergeometric_pvalue_greater(
    population: u64,
    successes: u64,
    draws: u64,
    k: u64,
) -> Result<f64> {
    if k == 0 {
        return Ok(1.0);
    }
    let distrib = Hypergeometric::new(population, successes, draws)
        .map_err(|e| Error::Statistics(e.to_string()))?;
    // P(X >= k) = sf(k-1)
    Ok(distrib.sf(k - 1))
}

/// One hypergeometric test result
#[derive(Debug, Clone, PartialEq)]
pub struct TermPvalue {
    pub term: usize,
    /// number of gene-set members annotated to the term
    pub overlap: usize,
    pub pvalue: f64,
}

impl Assocs {
    /// Over-representation p-values of every term relevant to `gene_set`,
    /// against all genes in the store. Terms with `pvalue > threshold` are
    /// dropped; the rest come back in ascending p-value order.
    pub fn hypergeometric_pvalues(
        &self,
        gene_set: &[usize],
        threshold: f64,
    ) -> Result<Vec<TermPvalue>> {
        let population = self.num_genes() as u64;
        let draws = gene_set.len() as u64;
        let mut in_set = vec![false; self.num_genes()];
        for &g in gene_set {
            in_set[g] = true;
        }

        let mut ret = vec![];
        for term in self.relevant_terms(gene_set) {
            let genes = self.genes_of_term(term);
            let overlap = genes.iter().filter(|&&g| in_set[g]).count();
            let pvalue = hypergeometric_pvalue_greater(
                population,
                genes.len() as u64,
                draws,
                overlap as u64,
            )?;
            if pvalue <= threshold {
                ret.push(TermPvalue {
                    term,
                    overlap,
                    pvalue,
                });
            }
        }
        ret.sort_by(|a, b| a.pvalue.total_cmp(&b.pvalue).then(a.term.cmp(&b.term)));
        Ok(ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pvalue_of_certain_event() {
        // drawing everything must hit every success
        let pv = hypergeometric_pvalue_greater(10, 3, 10, 3).unwrap();
        approx::assert_abs_diff_eq!(pv, 1.0, epsilon = 1e-10);
        assert_eq!(hypergeometric_pvalue_greater(10, 3, 2, 0).unwrap(), 1.0);
    }

    #[test]
    fn pvalue_small_example() {
        // N=5, K=2, n=2: P(X>=2) = 1/C(5,2) = 0.1
        let pv = hypergeometric_pvalue_greater(5, 2, 2, 2).unwrap();
        approx::assert_abs_diff_eq!(pv, 0.1, epsilon = 1e-10);
        // P(X>=1) = 1 - C(3,2)/C(5,2) = 0.7
        let pv = hypergeometric_pvalue_greater(5, 2, 2, 1).unwrap();
        approx::assert_abs_diff_eq!(pv, 0.7, epsilon = 1e-10);
    }

    #[test]
    fn mutant_terms_are_enriched() {
        let onto = crate::Ontology::from_json(
            serde_json::from_str(
                r#"[["arachnid","animal"],["mammal","animal"],["spider","arachnid"],
                    ["primate","mammal"],["human","primate"],
                    ["spiderhuman","arachnid","human","mutant"],
                    ["gorilla","primate"],["animal"],["mutant"]]"#,
            )
            .unwrap(),
        )
        .unwrap();
        let pairs = [
            ("peter-parker", "spiderhuman"),
            ("may-parker", "spiderhuman"),
            ("socrates", "human"),
            ("charlotte", "spider"),
            ("king-kong", "gorilla"),
            ("king-kong", "mutant"),
        ];
        let assocs = Assocs::new(onto, &pairs, &Default::default()).unwrap();
        let gs = assocs
            .gene_indices(&["peter-parker", "may-parker", "king-kong"])
            .unwrap();
        let all = assocs.hypergeometric_pvalues(&gs, 1.0).unwrap();
        assert_eq!(all.len(), 8);
        // mutant covers exactly the gene set: 1/C(5,3)
        assert_eq!(all[0].term, 8);
        assert_eq!(all[0].overlap, 3);
        approx::assert_abs_diff_eq!(all[0].pvalue, 0.1, epsilon = 1e-10);
        // animal covers everything
        let animal = all.iter().find(|x| x.term == 7).unwrap();
        approx::assert_abs_diff_eq!(animal.pvalue, 1.0, epsilon = 1e-10);

        let strict = assocs.hypergeometric_pvalues(&gs, 0.15).unwrap();
        assert!(strict.iter().all(|x| x.pvalue <= 0.15));
        assert!(strict.len() < all.len());
    }

    #[test]
    fn invalid_arguments_are_reported() {
        assert!(matches!(
            hypergeometric_pvalue_greater(3, 5, 1, 1),
            Err(Error::Statistics(_))
        ));
    }
}
