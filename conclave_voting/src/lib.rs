/*!
Iterative bandwagon voting, in the style of a conclave.

A population of electors votes over a fixed list of options, round after
round. In the first round every elector votes sincerely, drawing an option
at random in proportion to its preferences. In every later round, each
elector votes for the option that maximizes
`preference * votes received in the previous round`, which makes the votes
consolidate around the leading options. The election stops as soon as one
option gathers the required fraction of the votes, or when the maximum
number of rounds is reached.

```
use conclave_voting::*;

let options = vec!["Anna".to_string(), "Bob".to_string()];
let rules = ElectionRules {
    max_rounds: Some(10),
    ..ElectionRules::DEFAULT_RULES
};
let mut election = Election::seeded(&options, &rules, 42)?;
election.add_elector(&[("Anna".to_string(), 2.0), ("Bob".to_string(), 1.0)], None)?;
election.add_elector(&[("Bob".to_string(), 1.0)], Some("Clara".to_string()))?;
election.add_elector(&[("Anna".to_string(), 1.0)], None)?;

let result = election.run_elections()?;
assert_eq!(election.winner(), Some(result.winner.as_str()));
# Ok::<(), VotingErrors>(())
```
*/

mod config;
mod elector;
pub mod manual;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use std::collections::HashSet;

pub use crate::config::*;
pub use crate::elector::{weighted_pick, Elector};

/// An election over a fixed list of options.
///
/// Electors are registered with `add_elector` before the first round. The
/// rounds are then run one at a time with `vote`, or until a decision with
/// `run_elections`. The random generator is only used by the first round.
pub struct Election<R = StdRng> {
    options: Vec<String>,
    rules: ElectionRules,
    // Insertion order is preserved: it drives the order of the draws in the first round.
    electors: Vec<Elector>,
    history: Vec<VoteTally>,
    decision: Option<(String, Decision)>,
    rng: R,
}

impl Election<StdRng> {
    /// Creates an election whose first round draws from a `StdRng` seeded with `seed`.
    pub fn seeded(
        options: &[String],
        rules: &ElectionRules,
        seed: u64,
    ) -> Result<Election<StdRng>, VotingErrors> {
        Election::new(options, rules, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Election<R> {
    pub fn new(options: &[String], rules: &ElectionRules, rng: R) -> Result<Election<R>, VotingErrors> {
        if options.is_empty() {
            return Err(VotingErrors::EmptyElection {});
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for o in options.iter() {
            if !seen.insert(o.as_str()) {
                return InvalidRulesSnafu {
                    reason: format!("option {} is listed more than once", o),
                }
                .fail();
            }
        }
        rules.validate()?;
        info!(
            "Election: options: {:?}, rules: {:?}",
            options, rules
        );
        Ok(Election {
            options: options.to_vec(),
            rules: rules.clone(),
            electors: Vec::new(),
            history: Vec::new(),
            decision: None,
            rng,
        })
    }

    /// Registers a new elector with the given preferences.
    ///
    /// If no name is provided, the elector is identified by its position in
    /// the population. Electors can only be added before the first round.
    pub fn add_elector(
        &mut self,
        preferences: &[(String, f64)],
        name: Option<String>,
    ) -> Result<(), VotingErrors> {
        if !self.history.is_empty() {
            return PopulationFrozenSnafu {
                round: self.rounds(),
            }
            .fail();
        }
        let name = match name {
            Some(n) => ElectorName::Named(n),
            None => ElectorName::Index(self.electors.len()),
        };
        if self.electors.iter().any(|e| *e.name() == name) {
            return DuplicateNameSnafu {
                name: name.to_string(),
            }
            .fail();
        }
        let elector = Elector::new(name, &self.options, preferences)?;
        debug!("add_elector: {:?}", elector);
        self.electors.push(elector);
        Ok(())
    }

    /// Runs one round of voting and returns its tally.
    ///
    /// The first round uses the sincere pick of every elector, the following
    /// rounds their best response to the tally of the previous round. The
    /// tally is recorded in the history: calling this method again runs the
    /// next round, it does not repeat the current one.
    pub fn vote(&mut self) -> Result<VoteTally, VotingErrors> {
        if let Some((winner, _)) = &self.decision {
            return AlreadyDecidedSnafu {
                winner: winner.clone(),
            }
            .fail();
        }
        if self.electors.is_empty() {
            return Err(VotingErrors::EmptyElection {});
        }

        let round = self.rounds();
        let mut votes = VoteTally::empty(&self.options);
        match self.history.last() {
            None => {
                for elector in self.electors.iter() {
                    votes.add_vote(elector.first_pick(&mut self.rng)?)?;
                }
            }
            Some(previous) => {
                for elector in self.electors.iter() {
                    votes.add_vote(elector.next_vote(previous)?)?;
                }
            }
        }

        info!("Round {}: {:?}", round, votes.counts);
        self.history.push(votes.clone());
        Ok(votes)
    }

    /// Runs the rounds of voting until a winner is decided.
    ///
    /// After each round, the options that received at least `fraction_required`
    /// of the votes qualify. The one with the most votes wins; equal counts
    /// are resolved with the tie-break mode.
    ///
    /// If `max_rounds` is reached first, no further round is voted: the winner
    /// is the option with the most votes in the last round, again using the
    /// tie-break mode for equal counts.
    ///
    /// Without a maximum, the election stops with `NoConvergence` as soon as
    /// the tally of a round repeats an earlier one. Every round after the first
    /// only depends on the tally of the round before, so the votes would
    /// cycle forever.
    pub fn run_elections(&mut self) -> Result<ElectionResult, VotingErrors> {
        if let Some((winner, _)) = &self.decision {
            return AlreadyDecidedSnafu {
                winner: winner.clone(),
            }
            .fail();
        }
        if self.electors.is_empty() {
            return Err(VotingErrors::EmptyElection {});
        }

        let mut seen: HashSet<Vec<u64>> = self.history.iter().map(|t| t.signature()).collect();

        loop {
            let round = self.rounds();
            if let Some(max_rounds) = self.rules.max_rounds {
                if round >= max_rounds {
                    // Invariant: max_rounds >= 1, so the history is not empty here.
                    let last = self.history.last().ok_or(VotingErrors::EmptyElection {})?;
                    let leaders = top_options(&last.counts, |_| true);
                    let winner = self.break_tie(&leaders, round - 1)?;
                    info!(
                        "Maximum of {} rounds reached, {} wins by plurality",
                        max_rounds, winner
                    );
                    return Ok(self.decide(winner, Decision::PluralityAtCap));
                }
            }

            let tally = self.vote()?;
            let population = self.electors.len() as f64;
            let fraction_required = self.rules.fraction_required;
            let qualified = top_options(&tally.counts, |count| {
                (count as f64) / population >= fraction_required
            });
            if !qualified.is_empty() {
                let winner = self.break_tie(&qualified, round)?;
                info!("Round {}: {} reaches the required fraction", round, winner);
                return Ok(self.decide(winner, Decision::Majority));
            }

            if self.rules.max_rounds.is_none() && !seen.insert(tally.signature()) {
                warn!(
                    "Round {}: the tally repeats an earlier round, no majority can be reached",
                    round
                );
                return NoConvergenceSnafu {
                    rounds: self.rounds(),
                }
                .fail();
            }
        }
    }

    fn decide(&mut self, winner: String, decision: Decision) -> ElectionResult {
        self.decision = Some((winner.clone(), decision));
        ElectionResult {
            winner,
            decision,
            rounds: self.rounds(),
            round_stats: self
                .history
                .iter()
                .enumerate()
                .map(|(idx, t)| RoundStats {
                    round: idx as u32,
                    tally: t.counts.clone(),
                })
                .collect(),
        }
    }

    /// Picks one option among options with equal counts.
    fn break_tie(&self, tied: &[String], round: u32) -> Result<String, VotingErrors> {
        if tied.len() > 1 {
            debug!(
                "break_tie: round {}: tie between {:?} using {:?}",
                round, tied, self.rules.tiebreak_mode
            );
        }
        let winner = match self.rules.tiebreak_mode {
            // The tied options are already in the order of the election.
            TieBreakMode::UseOptionOrder => tied.first().cloned(),
            TieBreakMode::Random(seed) => option_permutation_crypto(tied, seed, round)
                .into_iter()
                .next(),
        };
        winner.ok_or(VotingErrors::EmptyElection {})
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn rules(&self) -> &ElectionRules {
        &self.rules
    }

    /// The number of rounds voted so far.
    pub fn rounds(&self) -> u32 {
        self.history.len() as u32
    }

    /// The tallies of all the rounds voted so far, starting with round 0.
    pub fn history(&self) -> &[VoteTally] {
        &self.history
    }

    pub fn winner(&self) -> Option<&str> {
        self.decision.as_ref().map(|(w, _)| w.as_str())
    }

    pub fn decision(&self) -> Option<Decision> {
        self.decision.as_ref().map(|(_, d)| *d)
    }

    pub fn electors(&self) -> &[Elector] {
        &self.electors
    }

    pub fn elector_count(&self) -> usize {
        self.electors.len()
    }
}

/// The options with the highest count among those accepted by the filter, in tally order.
fn top_options<F: Fn(u64) -> bool>(counts: &[(String, u64)], accept: F) -> Vec<String> {
    let best = counts
        .iter()
        .map(|(_, c)| *c)
        .filter(|c| accept(*c))
        .max();
    match best {
        Some(best) => counts
            .iter()
            .filter(|(_, c)| *c == best)
            .map(|(o, _)| o.clone())
            .collect(),
        None => Vec::new(),
    }
}

/// Generates a "random" permutation of the options. Random in this context means hard to guess in advance.
/// This uses a cryptographic hash so that the order does not depend on the position of the options.
fn option_permutation_crypto(options: &[String], seed: u64, num_round: u32) -> Vec<String> {
    let mut data: Vec<(String, String)> = options
        .iter()
        .map(|name| {
            let key = format!("{:08}{:08}{}", seed, num_round, name);
            (name.clone(), sha256::digest(key.as_str()))
        })
        .collect();
    data.sort_by(|a, b| a.1.cmp(&b.1));
    data.into_iter().map(|p| p.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn options(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn prefs(p: &[(&str, f64)]) -> Vec<(String, f64)> {
        p.iter().map(|(o, w)| (o.to_string(), *w)).collect()
    }

    fn rules(fraction_required: f64, max_rounds: Option<u32>) -> ElectionRules {
        ElectionRules {
            fraction_required,
            max_rounds,
            tiebreak_mode: TieBreakMode::UseOptionOrder,
        }
    }

    // The first round always picks the first option with a positive weight.
    fn first_positive_election(
        names: &[&str],
        rules: &ElectionRules,
        electors: &[&[(&str, f64)]],
    ) -> Election<StepRng> {
        let mut election = Election::new(&options(names), rules, StepRng::new(0, 0)).unwrap();
        for p in electors {
            election.add_elector(&prefs(p), None).unwrap();
        }
        election
    }

    fn counts(t: &VoteTally) -> Vec<u64> {
        t.iter().map(|(_, c)| c).collect()
    }

    fn conclave(seed: u64, rules: &ElectionRules) -> Election {
        let mut election = Election::seeded(&options(&["A", "B", "C"]), rules, seed).unwrap();
        election
            .add_elector(&prefs(&[("A", 3.0), ("B", 1.0), ("C", 0.0)]), None)
            .unwrap();
        election
            .add_elector(&prefs(&[("A", 0.0), ("B", 2.0), ("C", 2.0)]), None)
            .unwrap();
        election
            .add_elector(&prefs(&[("A", 1.0), ("B", 1.0), ("C", 1.0)]), None)
            .unwrap();
        election
    }

    #[test]
    fn rejects_invalid_configurations() {
        let opts = options(&["A", "B"]);
        assert!(matches!(
            Election::seeded(&[], &ElectionRules::DEFAULT_RULES, 1),
            Err(VotingErrors::EmptyElection {})
        ));
        assert!(matches!(
            Election::seeded(&options(&["A", "A"]), &ElectionRules::DEFAULT_RULES, 1),
            Err(VotingErrors::InvalidRules { .. })
        ));
        for r in [rules(0.0, None), rules(1.5, None), rules(0.5, Some(0))] {
            assert!(matches!(
                Election::seeded(&opts, &r, 1),
                Err(VotingErrors::InvalidRules { .. })
            ));
        }
        assert!(Election::seeded(&opts, &rules(1.0, Some(1)), 1).is_ok());
    }

    #[test]
    fn add_elector_checks() {
        let mut election = Election::seeded(&options(&["A", "B"]), &rules(0.5, None), 1).unwrap();
        assert!(matches!(
            election.add_elector(&prefs(&[("A", 0.0), ("B", 0.0)]), None),
            Err(VotingErrors::InvalidPreferenceSet { .. })
        ));
        assert!(matches!(
            election.add_elector(&prefs(&[("A", -1.0), ("B", 2.0)]), None),
            Err(VotingErrors::InvalidPreferenceSet { .. })
        ));
        assert_eq!(
            election.add_elector(&prefs(&[("D", 1.0)]), None),
            Err(VotingErrors::UnknownOption {
                option: "D".to_string()
            })
        );
        election
            .add_elector(&prefs(&[("A", 1.0)]), Some("anna".to_string()))
            .unwrap();
        assert_eq!(
            election.add_elector(&prefs(&[("B", 1.0)]), Some("anna".to_string())),
            Err(VotingErrors::DuplicateName {
                name: "anna".to_string()
            })
        );
        // Indexes and names do not collide.
        election
            .add_elector(&prefs(&[("B", 1.0)]), Some("1".to_string()))
            .unwrap();
        election.add_elector(&prefs(&[("B", 1.0)]), None).unwrap();
        assert_eq!(election.elector_count(), 3);
        assert_eq!(*election.electors()[2].name(), ElectorName::Index(2));
    }

    #[test]
    fn population_is_frozen_after_first_round() {
        let mut election = first_positive_election(&["A", "B"], &rules(0.9, None), &[&[("A", 1.0)]]);
        election.vote().unwrap();
        assert_eq!(
            election.add_elector(&prefs(&[("B", 1.0)]), None),
            Err(VotingErrors::PopulationFrozen { round: 1 })
        );
    }

    #[test]
    fn voting_without_electors() {
        let mut election = Election::seeded(&options(&["A"]), &rules(0.5, None), 1).unwrap();
        assert_eq!(election.vote(), Err(VotingErrors::EmptyElection {}));
        assert_eq!(election.run_elections(), Err(VotingErrors::EmptyElection {}));
    }

    #[test]
    fn tallies_sum_to_population() {
        let _ = env_logger::builder().is_test(true).try_init();
        for seed in 0..20 {
            let mut election = conclave(seed, &rules(0.9, Some(6)));
            election.run_elections().unwrap();
            assert_eq!(election.rounds() as usize, election.history().len());
            for t in election.history() {
                assert_eq!(t.total(), 3);
                assert_eq!(t.len(), 3);
            }
        }
    }

    #[test]
    fn concrete_scenario_follows_best_response() {
        let mut election = conclave(2024, &rules(0.5, Some(10)));
        let round0 = election.vote().unwrap();
        assert_eq!(round0.total(), 3);
        assert_eq!(election.rounds(), 1);

        let expected: Vec<String> = election
            .electors()
            .iter()
            .map(|e| e.next_vote(&round0).unwrap().to_string())
            .collect();
        let round1 = election.vote().unwrap();
        for o in election.options() {
            let n = expected.iter().filter(|e| *e == o).count() as u64;
            assert_eq!(round1.get(o), Some(n), "option {}", o);
        }
        assert_eq!(election.history(), &[round0, round1]);
    }

    #[test]
    fn same_seed_same_history() {
        let r = rules(0.9, Some(8));
        let mut e1 = conclave(7, &r);
        let mut e2 = conclave(7, &r);
        let res1 = e1.run_elections().unwrap();
        let res2 = e2.run_elections().unwrap();
        assert_eq!(e1.history(), e2.history());
        assert_eq!(res1, res2);
    }

    #[test]
    fn majority_at_first_round_achieved() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut election = first_positive_election(
            &["A", "B", "C"],
            &rules(0.5, None),
            &[
                &[("A", 1.0), ("B", 1.0)],
                &[("B", 1.0)],
                &[("B", 1.0), ("C", 1.0)],
                &[("C", 1.0)],
                &[("A", 1.0), ("C", 3.0)],
            ],
        );
        let res = election.run_elections().unwrap();
        let history: Vec<Vec<u64>> = election.history().iter().map(counts).collect();
        assert_eq!(history, vec![vec![2, 2, 1], vec![1, 2, 2], vec![0, 3, 2]]);
        assert_eq!(res.winner, "B");
        assert_eq!(res.decision, Decision::Majority);
        assert_eq!(res.rounds, 3);
        assert_eq!(election.rounds(), 3);
        assert_eq!(election.winner(), Some("B"));
        assert_eq!(election.decision(), Some(Decision::Majority));
        assert_eq!(res.round_stats.len(), 3);
        assert_eq!(res.round_stats[2].round, 2);
        assert_eq!(
            res.round_stats[2].tally,
            vec![
                ("A".to_string(), 0),
                ("B".to_string(), 3),
                ("C".to_string(), 2)
            ]
        );
    }

    #[test]
    fn plurality_at_cap_with_locked_tie() {
        let mut election = first_positive_election(
            &["A", "B"],
            &rules(0.6, Some(5)),
            &[&[("A", 1.0)], &[("B", 1.0)]],
        );
        let res = election.run_elections().unwrap();
        assert_eq!(election.rounds(), 5);
        assert!(election.history().iter().all(|t| counts(t) == vec![1, 1]));
        // Equal counts: the first option wins.
        assert_eq!(res.winner, "A");
        assert_eq!(res.decision, Decision::PluralityAtCap);
    }

    #[test]
    fn plurality_at_cap_picks_highest_count() {
        let mut election = first_positive_election(
            &["A", "B", "C"],
            &rules(0.9, Some(2)),
            &[&[("B", 1.0)], &[("C", 1.0)], &[("C", 1.0)]],
        );
        let res = election.run_elections().unwrap();
        assert_eq!(res.winner, "C");
        assert_eq!(res.decision, Decision::PluralityAtCap);
        assert_eq!(res.rounds, 2);
    }

    #[test]
    fn never_votes_beyond_the_cap() {
        let mut election = first_positive_election(
            &["A", "B"],
            &rules(0.6, Some(2)),
            &[&[("A", 1.0)], &[("B", 1.0)]],
        );
        election.vote().unwrap();
        election.vote().unwrap();
        election.vote().unwrap();
        let res = election.run_elections().unwrap();
        // Manual rounds are kept, and no extra round is voted.
        assert_eq!(res.rounds, 3);
        assert_eq!(res.winner, "A");
    }

    #[test]
    fn unbounded_locked_tie_does_not_converge() {
        let mut election = first_positive_election(
            &["A", "B"],
            &rules(0.6, None),
            &[&[("A", 1.0)], &[("B", 1.0)]],
        );
        assert_eq!(
            election.run_elections(),
            Err(VotingErrors::NoConvergence { rounds: 2 })
        );
        assert_eq!(election.winner(), None);
    }

    #[test]
    fn low_threshold_several_qualify() {
        // Round 0: A 2, B 2, C 1 with a threshold of 0.4: A and B qualify.
        let mut election = first_positive_election(
            &["A", "B", "C"],
            &rules(0.4, None),
            &[
                &[("A", 1.0)],
                &[("A", 1.0)],
                &[("B", 1.0)],
                &[("B", 1.0)],
                &[("C", 1.0)],
            ],
        );
        let res = election.run_elections().unwrap();
        assert_eq!(res.rounds, 1);
        assert_eq!(res.winner, "A");

        // The highest count wins regardless of the order.
        let mut election = first_positive_election(
            &["A", "B", "C"],
            &rules(0.2, None),
            &[&[("A", 1.0)], &[("B", 1.0)], &[("B", 1.0)], &[("C", 1.0)]],
        );
        assert_eq!(election.run_elections().unwrap().winner, "B");
    }

    #[test]
    fn random_tiebreak_between_qualified_options() {
        // Round 0: A 2, B 2, C 1 with a threshold of 0.4: A and B qualify with equal counts.
        for seed in 0..8 {
            let r = ElectionRules {
                fraction_required: 0.4,
                max_rounds: None,
                tiebreak_mode: TieBreakMode::Random(seed),
            };
            let mut election = first_positive_election(
                &["A", "B", "C"],
                &r,
                &[
                    &[("A", 1.0)],
                    &[("A", 1.0)],
                    &[("B", 1.0)],
                    &[("B", 1.0)],
                    &[("C", 1.0)],
                ],
            );
            let res = election.run_elections().unwrap();
            assert_eq!(res.decision, Decision::Majority);
            assert_eq!(res.rounds, 1);
            assert_eq!(
                res.winner,
                option_permutation_crypto(&options(&["A", "B"]), seed, 0)[0]
            );
        }
    }

    #[test]
    fn winner_is_decided_once() {
        let mut election = first_positive_election(
            &["A", "B"],
            &rules(0.5, None),
            &[&[("A", 1.0)], &[("A", 1.0)]],
        );
        let res = election.run_elections().unwrap();
        assert_eq!(res.winner, "A");
        let already = VotingErrors::AlreadyDecided {
            winner: "A".to_string(),
        };
        assert_eq!(election.run_elections(), Err(already.clone()));
        assert_eq!(election.vote(), Err(already));
        assert_eq!(election.rounds(), 1);
    }

    #[test]
    fn random_tiebreak_is_reproducible() {
        let tied = options(&["A", "B", "C", "D"]);
        let p1 = option_permutation_crypto(&tied, 3, 1);
        let p2 = option_permutation_crypto(&tied, 3, 1);
        assert_eq!(p1, p2);
        let mut sorted = p1.clone();
        sorted.sort();
        assert_eq!(sorted, tied);

        let r = ElectionRules {
            fraction_required: 0.6,
            max_rounds: Some(3),
            tiebreak_mode: TieBreakMode::Random(3),
        };
        let run = || {
            let mut election =
                Election::new(&options(&["A", "B"]), &r, StepRng::new(0, 0)).unwrap();
            election.add_elector(&prefs(&[("A", 1.0)]), None).unwrap();
            election.add_elector(&prefs(&[("B", 1.0)]), None).unwrap();
            election.run_elections().unwrap().winner
        };
        let w = run();
        assert!(w == "A" || w == "B");
        assert_eq!(run(), w);
        // The tie of the last round (round 2) is resolved with the hashed order.
        assert_eq!(w, option_permutation_crypto(&options(&["A", "B"]), 3, 2)[0]);
    }

    #[test]
    fn top_options_keeps_all_leaders() {
        let c = vec![
            ("A".to_string(), 2),
            ("B".to_string(), 5),
            ("C".to_string(), 5),
        ];
        assert_eq!(top_options(&c, |_| true), options(&["B", "C"]));
        assert_eq!(top_options(&c, |n| n < 5), options(&["A"]));
        assert!(top_options(&c, |n| n > 5).is_empty());
    }
}
