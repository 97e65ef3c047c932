use log::debug;
use rand::Rng;

use crate::config::*;

/// One voting agent.
///
/// An elector holds a weight for each option of the election, in the order of
/// the options. It keeps no memory of its previous ballots: every vote derives
/// from the weights and, after the first round, from the tally of the round
/// before.
#[derive(PartialEq, Debug, Clone)]
pub struct Elector {
    name: ElectorName,
    // Invariant: finite, non-negative, at least one strictly positive.
    weights: Vec<(String, f64)>,
    // The largest weight. Scores are computed on weights divided by it so that
    // they stay finite.
    largest: f64,
}

impl Elector {
    /// Creates an elector for the given options.
    ///
    /// Options missing from `preferences` get a weight of zero. Naming an option
    /// that is not in `options` is an error, and so is naming one twice.
    pub fn new(
        name: ElectorName,
        options: &[String],
        preferences: &[(String, f64)],
    ) -> Result<Elector, VotingErrors> {
        let invalid = |reason: String| VotingErrors::InvalidPreferenceSet {
            elector: name.to_string(),
            reason,
        };

        let mut weights: Vec<(String, f64)> = options.iter().map(|o| (o.clone(), 0.0)).collect();
        let mut seen: Vec<&str> = Vec::new();
        for (option, weight) in preferences.iter() {
            if seen.contains(&option.as_str()) {
                return Err(invalid(format!("option {} is listed twice", option)));
            }
            seen.push(option.as_str());
            if !weight.is_finite() || *weight < 0.0 {
                return Err(invalid(format!(
                    "weight {} for option {} is not a non-negative number",
                    weight, option
                )));
            }
            match weights.iter_mut().find(|(o, _)| o == option) {
                Some(slot) => slot.1 = *weight,
                None => {
                    return Err(VotingErrors::UnknownOption {
                        option: option.clone(),
                    })
                }
            }
        }

        let largest = largest_weight(&weights);
        if !(largest > 0.0) {
            return Err(invalid("all the weights are zero".to_string()));
        }

        Ok(Elector {
            name,
            weights,
            largest,
        })
    }

    pub fn name(&self) -> &ElectorName {
        &self.name
    }

    /// The weight of this option, or None if the option is not part of the election.
    pub fn weight(&self, option: &str) -> Option<f64> {
        self.weights
            .iter()
            .find(|(o, _)| o == option)
            .map(|(_, w)| *w)
    }

    /// The sincere vote of the first round: an option drawn at random, with a
    /// probability proportional to its weight.
    pub fn first_pick<R: Rng>(&self, rng: &mut R) -> Result<&str, VotingErrors> {
        let idx = weighted_pick(&self.weights, rng).ok_or_else(|| {
            VotingErrors::InvalidPreferenceSet {
                elector: self.name.to_string(),
                reason: "all the weights are zero".to_string(),
            }
        })?;
        let choice = self.weights[idx].0.as_str();
        debug!("first_pick: elector {}: {}", self.name, choice);
        Ok(choice)
    }

    /// The strategic vote after the first round: the option that maximizes
    /// `weight * votes in the previous round`.
    ///
    /// Options are considered in the order of the election, and a later option
    /// only takes over with a strictly greater score. The earliest option thus
    /// wins all the ties. In particular, if no option has a positive score, the
    /// first option of the election is returned, even if this elector gives it no
    /// weight.
    pub fn next_vote(&self, previous_votes: &VoteTally) -> Result<&str, VotingErrors> {
        let mut best: Option<(&str, f64)> = None;
        for (option, weight) in self.weights.iter() {
            let votes = previous_votes
                .get(option)
                .ok_or_else(|| VotingErrors::UnknownOption {
                    option: option.clone(),
                })?;
            let score = (weight / self.largest) * (votes as f64);
            let leads = match best {
                Some((_, best_score)) => score > best_score,
                None => true,
            };
            if leads {
                best = Some((option.as_str(), score));
            }
        }
        let (choice, score) = best.ok_or(VotingErrors::EmptyElection {})?;
        debug!(
            "next_vote: elector {}: {} (score {})",
            self.name, choice, score
        );
        Ok(choice)
    }
}

/// Draws the index of one entry with a probability proportional to its weight.
///
/// The weights do not need to sum to 1. A uniform value is drawn in
/// `[0, total)` and the first entry whose cumulative interval contains it is
/// returned. Returns None if no weight is positive.
///
/// The intervals are measured in units of the largest weight, so finite weights
/// never overflow the total.
pub fn weighted_pick<T, R: Rng>(weights: &[(T, f64)], rng: &mut R) -> Option<usize> {
    let largest = largest_weight(weights);
    if !(largest > 0.0) {
        return None;
    }
    let total: f64 = weights.iter().map(|(_, w)| *w / largest).sum();
    let draw = rng.gen::<f64>() * total;
    pick_at(weights, largest, draw)
}

fn largest_weight<T>(weights: &[(T, f64)]) -> f64 {
    weights.iter().map(|(_, w)| *w).fold(0.0, f64::max)
}

/// `draw` is expressed in units of `scale`.
fn pick_at<T>(weights: &[(T, f64)], scale: f64, draw: f64) -> Option<usize> {
    let mut counter = 0.0;
    for (idx, (_, weight)) in weights.iter().enumerate() {
        let width = *weight / scale;
        if draw < counter + width {
            return Some(idx);
        }
        counter += width;
    }
    // Rounding may push the draw past the last interval.
    weights.iter().rposition(|(_, w)| *w > 0.0)
}
