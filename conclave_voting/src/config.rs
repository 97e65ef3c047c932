// ********* Input data structures ***********

use std::fmt::Display;

use snafu::Snafu;

/// The identity of an elector.
///
/// Electors registered without a name receive the next free index. Indexes and
/// names live in separate spaces: `Index(1)` never collides with `Named("1")`.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum ElectorName {
    Index(usize),
    Named(String),
}

impl Display for ElectorName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElectorName::Index(idx) => write!(f, "#{}", idx),
            ElectorName::Named(name) => write!(f, "{}", name),
        }
    }
}

/// The votes received by every configured option during one round.
///
/// The counts are stored in the order of the options of the election. Options
/// that received no vote are present with a count of zero.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct VoteTally {
    pub(crate) counts: Vec<(String, u64)>,
}

impl VoteTally {
    /// A tally with zero votes for each of the given options.
    pub fn empty(options: &[String]) -> VoteTally {
        VoteTally {
            counts: options.iter().map(|o| (o.clone(), 0)).collect(),
        }
    }

    /// The number of votes for this option, or None if the option is not part of the tally.
    pub fn get(&self, option: &str) -> Option<u64> {
        self.counts
            .iter()
            .find(|(name, _)| name == option)
            .map(|(_, count)| *count)
    }

    /// The total number of votes cast. It is always the number of electors.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|(_, count)| *count).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub(crate) fn add_vote(&mut self, option: &str) -> Result<(), VotingErrors> {
        match self.counts.iter_mut().find(|(name, _)| name == option) {
            Some((_, count)) => {
                *count += 1;
                Ok(())
            }
            None => Err(VotingErrors::UnknownOption {
                option: option.to_string(),
            }),
        }
    }

    pub(crate) fn signature(&self) -> Vec<u64> {
        self.counts.iter().map(|(_, count)| *count).collect()
    }
}

// ******** Output data structures *********

/// How the winner of an election was determined.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Decision {
    /// One option reached the required fraction of the votes.
    Majority,
    /// The maximum number of rounds was reached and the option with the most
    /// votes in the last round was chosen.
    PluralityAtCap,
}

impl Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Majority => write!(f, "majority"),
            Decision::PluralityAtCap => write!(f, "pluralityAtCap"),
        }
    }
}

/// Statistics for one round
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RoundStats {
    /// The round number, starting at 0.
    pub round: u32,
    pub tally: Vec<(String, u64)>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ElectionResult {
    pub winner: String,
    pub decision: Decision,
    /// The number of rounds that were voted.
    pub rounds: u32,
    pub round_stats: Vec<RoundStats>,
}

/// Errors that prevent an election from completing successfully.
///
/// All of them point to a misconfigured model, except `NoConvergence` which
/// depends on the dynamics of the electors.
#[derive(Eq, PartialEq, Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum VotingErrors {
    #[snafu(display("invalid preferences for elector {elector}: {reason}"))]
    InvalidPreferenceSet { elector: String, reason: String },

    #[snafu(display("an elector named {name} is already registered"))]
    DuplicateName { name: String },

    #[snafu(display("electors cannot be added once voting started (round {round})"))]
    PopulationFrozen { round: u32 },

    #[snafu(display("option {option} is not part of this election"))]
    UnknownOption { option: String },

    #[snafu(display("no majority reached: the tally of round {rounds} repeats an earlier round"))]
    NoConvergence { rounds: u32 },

    #[snafu(display("the election has no options or no electors"))]
    EmptyElection {},

    #[snafu(display("invalid election rules: {reason}"))]
    InvalidRules { reason: String },

    #[snafu(display("the election was already decided in favor of {winner}"))]
    AlreadyDecided { winner: String },
}

// ********* Configuration **********

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TieBreakMode {
    /// The option listed first in the election wins.
    UseOptionOrder,
    /// Uses a cryptographic hash on the option names, salted with the seed and the
    /// round number. It does not draw from the random generator of the election.
    Random(u64),
}

#[derive(PartialEq, Debug, Clone)]
pub struct ElectionRules {
    /// The fraction of the votes an option needs to win outright, in (0, 1].
    pub fraction_required: f64,
    /// The maximum number of rounds. If None, the election runs until a majority
    /// is found or the votes settle into a cycle.
    pub max_rounds: Option<u32>,
    pub tiebreak_mode: TieBreakMode,
}

impl ElectionRules {
    pub const DEFAULT_RULES: ElectionRules = ElectionRules {
        fraction_required: 0.5,
        max_rounds: None,
        tiebreak_mode: TieBreakMode::UseOptionOrder,
    };

    pub(crate) fn validate(&self) -> Result<(), VotingErrors> {
        if !(self.fraction_required > 0.0 && self.fraction_required <= 1.0) {
            return InvalidRulesSnafu {
                reason: format!(
                    "fraction_required must be in (0, 1], got {}",
                    self.fraction_required
                ),
            }
            .fail();
        }
        if self.max_rounds == Some(0) {
            return InvalidRulesSnafu {
                reason: "max_rounds must be at least 1",
            }
            .fail();
        }
        Ok(())
    }
}

impl Default for ElectionRules {
    fn default() -> Self {
        ElectionRules::DEFAULT_RULES
    }
}
