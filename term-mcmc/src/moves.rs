//! Metropolis-Hastings proposals over the joint state of all models.
//!
//! * flip: one (model, term) pair, uniform over all free bits
//! * step: one discordant parent-child edge, uniform over all models; the
//!   two endpoints swap states
//! * jump: one (active, inactive) term pair of the same model, uniform
//!   over all such pairs; the two terms swap states
//!
//! A move type is eligible when it has at least one candidate. The type is
//! drawn in proportion to its weight among the eligible types, so the
//! reverse proposal can have a different probability. `log_hastings`
//! carries that ratio.

use crate::model::ActivationModel;
use ontology_util::{Error, Result};
use rand::rngs::SmallRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveType {
    Flip,
    Step,
    Jump,
}

impl MoveType {
    pub const ALL: [MoveType; 3] = [MoveType::Flip, MoveType::Step, MoveType::Jump];

    pub fn index(&self) -> usize {
        match self {
            MoveType::Flip => 0,
            MoveType::Step => 1,
            MoveType::Jump => 2,
        }
    }
}

/// Relative weights of the move types
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveRate {
    pub flip: f64,
    pub step: f64,
    pub jump: f64,
}

impl Default for MoveRate {
    fn default() -> Self {
        MoveRate {
            flip: 1.0,
            step: 1.0,
            jump: 1.0,
        }
    }
}

impl MoveRate {
    pub fn validate(&self) -> Result<()> {
        let ww = [self.flip, self.step, self.jump];
        if ww.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Configuration(format!(
                "move weights must be non-negative, got {:?}",
                self
            )));
        }
        if ww.iter().sum::<f64>() <= 0.0 {
            return Err(Error::Configuration("all move weights are zero".to_string()));
        }
        Ok(())
    }

    pub fn weight(&self, m: MoveType) -> f64 {
        match m {
            MoveType::Flip => self.flip,
            MoveType::Step => self.step,
            MoveType::Jump => self.jump,
        }
    }

    /// Total weight of the types that have candidates
    fn eligible_weight(&self, c: &Candidates) -> f64 {
        MoveType::ALL
            .iter()
            .filter(|&&m| c.count(m) > 0)
            .map(|&m| self.weight(m))
            .sum()
    }
}

/// Number of candidates of each move type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidates {
    flip: usize,
    step: usize,
    jump: usize,
}

impl Candidates {
    fn of(models: &[ActivationModel]) -> Self {
        let mut ret = Candidates {
            flip: 0,
            step: 0,
            jump: 0,
        };
        for m in models {
            ret.flip += m.n_variables();
            ret.step += m.num_discordant();
            ret.jump += m.num_swap_pairs();
        }
        ret
    }

    fn count(&self, m: MoveType) -> usize {
        match m {
            MoveType::Flip => self.flip,
            MoveType::Step => self.step,
            MoveType::Jump => self.jump,
        }
    }
}

/// A proposed batch of slot changes within one model
#[derive(Debug, Clone)]
pub(crate) struct Proposal {
    pub(crate) move_type: MoveType,
    pub(crate) model: usize,
    pub(crate) changes: Vec<(usize, bool)>,
    /// `ln q(y -> x) - ln q(x -> y)`
    pub(crate) log_hastings: f64,
}

/// Draw a proposal, or `None` when no move type has a candidate.
pub(crate) fn propose(
    models: &[ActivationModel],
    rate: &MoveRate,
    rng: &mut SmallRng,
) -> Option<Proposal> {
    let before = Candidates::of(models);
    let total = rate.eligible_weight(&before);
    if total <= 0.0 {
        return None;
    }

    let mut u = rng.random::<f64>() * total;
    let mut move_type = None;
    for m in MoveType::ALL {
        let w = rate.weight(m);
        if before.count(m) == 0 || w <= 0.0 {
            continue;
        }
        move_type = Some(m);
        if u < w {
            break;
        }
        u -= w;
    }
    let move_type = move_type?;

    let (model, changes) = match move_type {
        MoveType::Flip => {
            let (k, s) = locate(models, rng.random_range(0..before.flip), |m| m.n_variables());
            (k, vec![(s, !models[k].slot_state(s))])
        }
        MoveType::Step => {
            let (k, e) = locate(models, rng.random_range(0..before.step), |m| {
                m.num_discordant()
            });
            let (c, p) = models[k].discordant_edge(e);
            let mk = &models[k];
            (k, vec![(c, mk.slot_state(p)), (p, mk.slot_state(c))])
        }
        MoveType::Jump => {
            let (k, i) = locate(models, rng.random_range(0..before.jump), |m| {
                m.num_swap_pairs()
            });
            let mk = &models[k];
            let n_active = mk.num_active();
            let a = mk.active_slot(i % n_active);
            let b = mk.inactive_slot(i / n_active);
            (k, vec![(a, false), (b, true)])
        }
    };

    let after = candidates_after(models, &before, model, &changes);
    let mut log_hastings = total.ln() - rate.eligible_weight(&after).ln();
    if move_type == MoveType::Step {
        log_hastings += (before.step as f64).ln() - (after.step as f64).ln();
    }

    Some(Proposal {
        move_type,
        model,
        changes,
        log_hastings,
    })
}

/// Map a global candidate index to `(model, local index)`
fn locate<F>(models: &[ActivationModel], mut r: usize, size: F) -> (usize, usize)
where
    F: Fn(&ActivationModel) -> usize,
{
    for (k, m) in models.iter().enumerate() {
        let n = size(m);
        if r < n {
            return (k, r);
        }
        r -= n;
    }
    unreachable!("candidate index beyond the total count")
}

fn candidates_after(
    models: &[ActivationModel],
    before: &Candidates,
    model: usize,
    changes: &[(usize, bool)],
) -> Candidates {
    let m = &models[model];
    let n_active_after = changes.iter().fold(m.num_active() as i64, |acc, &(s, on)| {
        match (m.slot_state(s), on) {
            (false, true) => acc + 1,
            (true, false) => acc - 1,
            _ => acc,
        }
    }) as usize;
    let n_inactive_after = m.n_variables() - n_active_after;
    Candidates {
        flip: before.flip,
        step: before.step - m.num_discordant() + m.discordant_after(changes),
        jump: before.jump - m.num_swap_pairs() + n_active_after * n_inactive_after,
    }
}
