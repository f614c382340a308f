//! Bayesian term enrichment by collapsed MCMC.
//!
//! A gene set is explained by a set of active ontology terms. Genes under
//! an active term are expected in the set, and every other gene is
//! expected outside it. Disagreements are false positives or false
//! negatives. Term-activation, false-positive and false-negative rates are
//! Beta-Bernoulli parameters integrated out of the likelihood, and the
//! posterior over term activations is sampled by Metropolis-Hastings.

/// Parameter groups, Beta-Bernoulli counts and marginal likelihood
pub mod bernoulli;

/// Term and gene grouping into parameter groups
pub mod parameterization;

/// O(1) sampling sets
pub mod indexed_set;

/// Activation state and sufficient statistics of one gene set
pub mod model;

/// Running posterior summaries
pub mod summary;

/// flip / step / jump proposals
pub mod moves;

/// Metropolis-Hastings driver
pub mod sampler;

pub use bernoulli::{BernoulliCounts, BernoulliParams, BetaPrior, ParamPosterior, PriorOptions};
pub use model::{ActivationModel, Assignment};
pub use moves::{MoveRate, MoveType};
pub use ontology_util::{Error, Result};
pub use parameterization::{GeneGrouping, GroupingOptions, Parameterization, TermGrouping};
pub use sampler::{McmcOptions, McmcSampler, MoveStat};
pub use summary::{GeneSetSummary, TermPairSummary};
