use log::{debug, info, warn};

use conclave_voting::*;
use snafu::{prelude::*, Snafu};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;

mod config_reader;
mod io_csv;

pub use crate::sim::config_reader::*;
pub use crate::sim::io_csv::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SimError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON content"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Expected a column index, got {content}"))]
    ParsingJsonNumber { content: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("CSV file {path} is empty"))]
    CsvEmpty { path: String },
    #[snafu(display("Error reading CSV line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("CSV line {lineno} is too short"))]
    CsvLineTooShort { lineno: usize },
    #[snafu(display("CSV line {lineno}: {content:?} is not a weight"))]
    CsvWeightParse { lineno: usize, content: String },
    #[snafu(display("No options to vote on: provide them with --options, in the configuration or in a CSV header"))]
    MissingOptions {},
    #[snafu(display("Voting error: {source}"))]
    Voting { source: VotingErrors },
    #[snafu(display("Error writing the summary to {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SimResult<T> = Result<T, SimError>;

/// One elector, before it is registered in an election.
#[derive(PartialEq, Debug, Clone)]
pub struct ElectorEntry {
    pub name: Option<String>,
    pub preferences: Vec<(String, f64)>,
}

/// Everything needed to run an election, once the configuration and the
/// command line arguments have been merged.
#[derive(PartialEq, Debug, Clone)]
pub struct SimSetup {
    pub contest: String,
    pub options: Vec<String>,
    pub electors: Vec<ElectorEntry>,
    pub rules: ElectionRules,
    pub seed: u64,
    pub output_path: Option<String>,
}

fn tiebreak_name(mode: &TieBreakMode) -> &'static str {
    match mode {
        TieBreakMode::UseOptionOrder => "useOptionOrder",
        TieBreakMode::Random(_) => "random",
    }
}

fn parse_tiebreak(mode: &str, seed: u64) -> SimResult<TieBreakMode> {
    match mode {
        "useOptionOrder" => Ok(TieBreakMode::UseOptionOrder),
        "random" => Ok(TieBreakMode::Random(seed)),
        x => whatever!(
            "Cannot use tiebreak mode {:?}: expected useOptionOrder or random",
            x
        ),
    }
}

fn read_elector_source(root_path: &Path, cfs: &FileSource) -> SimResult<PreferenceTable> {
    let p: PathBuf = root_path.join(&cfs.file_path);
    let p2 = p.as_path().display().to_string();
    info!("Attempting to read preference file {:?}", p2);
    match cfs.provider.as_str() {
        "csv" => read_csv_preferences(&p2, cfs),
        x => whatever!("Provider not implemented {:?}", x),
    }
}

/// Merges the configuration file (if any) and the command line arguments.
/// The arguments take precedence.
pub fn build_setup(args: &Args) -> SimResult<SimSetup> {
    let (config, root_path): (Option<SimConfig>, PathBuf) = match &args.config {
        Some(config_path) => {
            let config = read_config(config_path)?;
            let root = Path::new(config_path)
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_default();
            (Some(config), root)
        }
        None => (None, PathBuf::new()),
    };

    let mut electors: Vec<ElectorEntry> = Vec::new();
    let mut csv_options: Option<Vec<String>> = None;
    let mut tables: Vec<PreferenceTable> = Vec::new();

    if let Some(cfg) = &config {
        for ce in cfg.electors.iter() {
            electors.push(ElectorEntry {
                name: ce.name.clone(),
                preferences: ce
                    .preferences
                    .iter()
                    .map(|(o, w)| (o.clone(), *w))
                    .collect(),
            });
        }
        for cfs in cfg.elector_file_sources.iter() {
            tables.push(read_elector_source(&root_path, cfs)?);
        }
    }
    if let Some(input) = &args.input {
        tables.push(read_csv_preferences(input, &FileSource::csv(input))?);
    }
    for table in tables {
        if csv_options.is_none() {
            csv_options = Some(table.options.clone());
        }
        electors.extend(table.electors);
    }

    let config_options = config
        .as_ref()
        .map(|c| c.options.clone())
        .filter(|o| !o.is_empty());
    let options = args
        .options
        .clone()
        .or(config_options)
        .or(csv_options)
        .context(MissingOptionsSnafu {})?;

    let default_rules = SimRules::default();
    let cfg_rules = config.as_ref().map(|c| &c.rules).unwrap_or(&default_rules);
    let seed = match args.seed {
        Some(s) => s,
        None => match cfg_rules.random_seed()? {
            Some(s) => s,
            None => {
                let s = rand::random::<u64>();
                info!("No seed provided, using seed {}", s);
                s
            }
        },
    };
    let tiebreak = args
        .tiebreak
        .clone()
        .or_else(|| cfg_rules.tiebreak_mode.clone())
        .unwrap_or_else(|| "useOptionOrder".to_string());
    let rules = ElectionRules {
        fraction_required: args
            .fraction_required
            .or(cfg_rules.fraction_required)
            .unwrap_or(ElectionRules::DEFAULT_RULES.fraction_required),
        max_rounds: args.max_rounds.or(cfg_rules.max_rounds),
        tiebreak_mode: parse_tiebreak(&tiebreak, seed)?,
    };

    let contest = config
        .as_ref()
        .map(|c| c.output_settings.contest_name.clone())
        .unwrap_or_else(|| "conclave".to_string());
    let output_path = config
        .as_ref()
        .and_then(|c| c.output_settings.output_directory.clone())
        .map(|dir| {
            root_path
                .join(dir)
                .join(format!("{}_summary.json", contest.replace(' ', "_")))
                .display()
                .to_string()
        });

    Ok(SimSetup {
        contest,
        options,
        electors,
        rules,
        seed,
        output_path,
    })
}

/// Runs one election from the setup, seeding the first round with `seed`.
pub fn run_once(setup: &SimSetup, seed: u64) -> SimResult<ElectionResult> {
    let mut election =
        Election::seeded(&setup.options, &setup.rules, seed).context(VotingSnafu {})?;
    for e in setup.electors.iter() {
        election
            .add_elector(&e.preferences, e.name.clone())
            .context(VotingSnafu {})?;
    }
    info!(
        "Processing {} electors, options: {:?}",
        election.elector_count(),
        election.options()
    );
    let result = election.run_elections().context(VotingSnafu {})?;
    info!(
        "Winner: {} ({}) after {} rounds",
        result.winner, result.decision, result.rounds
    );
    Ok(result)
}

fn result_stats_to_json(rs: &ElectionResult) -> Vec<JSValue> {
    let mut l: Vec<JSValue> = Vec::new();
    for round_stat in rs.round_stats.iter() {
        let mut tally: JSMap<String, JSValue> = JSMap::new();
        for (name, count) in round_stat.tally.iter() {
            tally.insert(name.clone(), json!(count.to_string()));
        }
        l.push(json!({"round": round_stat.round, "tally": tally}));
    }
    l
}

fn build_config_js(setup: &SimSetup) -> JSValue {
    json!({
        "contest": setup.contest,
        "electors": setup.electors.len(),
        "fractionRequired": setup.rules.fraction_required,
        "maxRounds": setup.rules.max_rounds,
        "seed": setup.seed,
        "tiebreakMode": tiebreak_name(&setup.rules.tiebreak_mode),
    })
}

fn build_summary_js(setup: &SimSetup, rv: &ElectionResult) -> JSValue {
    json!({
        "config": build_config_js(setup),
        "outcome": {
            "winner": rv.winner,
            "decidedBy": rv.decision.to_string(),
            "rounds": rv.rounds,
        },
        "results": result_stats_to_json(rv),
    })
}

/// Runs `num_trials` elections with consecutive seeds and counts the winners.
///
/// Elections that do not converge are counted separately. Any other error
/// stops the trials.
pub fn run_trials(setup: &SimSetup, num_trials: u32) -> SimResult<JSValue> {
    let mut wins: BTreeMap<String, u64> = setup.options.iter().map(|o| (o.clone(), 0)).collect();
    let mut no_convergence: u64 = 0;
    let mut total_rounds: u64 = 0;
    for trial in 0..num_trials {
        let seed = setup.seed.wrapping_add(u64::from(trial));
        match run_once(setup, seed) {
            Ok(res) => {
                debug!("run_trials: seed {}: {} in {} rounds", seed, res.winner, res.rounds);
                total_rounds += u64::from(res.rounds);
                *wins.entry(res.winner).or_insert(0) += 1;
            }
            Err(SimError::Voting {
                source: VotingErrors::NoConvergence { rounds },
            }) => {
                warn!("run_trials: seed {}: no convergence after {} rounds", seed, rounds);
                no_convergence += 1;
            }
            Err(e) => return Err(e),
        }
    }
    let decided = u64::from(num_trials) - no_convergence;
    let mean_rounds = if decided > 0 {
        json!(total_rounds as f64 / decided as f64)
    } else {
        JSValue::Null
    };
    let wins_js: JSMap<String, JSValue> = wins
        .into_iter()
        .map(|(o, n)| (o, json!(n.to_string())))
        .collect();
    Ok(json!({
        "config": build_config_js(setup),
        "trials": {
            "count": num_trials,
            "wins": wins_js,
            "noConvergence": no_convergence.to_string(),
            "meanRounds": mean_rounds,
        },
    }))
}

fn write_summary(out: Option<&str>, pretty_js: &str) -> SimResult<()> {
    match out {
        Some(path) if path != "stdout" => {
            info!("Writing summary to {}", path);
            fs::write(path, pretty_js).context(WritingOutputSnafu { path })
        }
        _ => {
            println!("{}", pretty_js);
            Ok(())
        }
    }
}

fn check_reference(summary_path: &str, result_js: &JSValue, pretty_js: &str) -> SimResult<()> {
    let summary_ref = read_summary(summary_path)?;
    debug!("summary: {:?}", summary_ref);
    if summary_ref != *result_js {
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        warn!("Found differences with the reference string");
        print_diff(pretty_js_summary_ref.as_str(), pretty_js, "\n");
        whatever!("Difference detected between calculated summary and reference summary")
    }
    Ok(())
}

pub fn run_simulation(args: &Args) -> SimResult<()> {
    let setup = build_setup(args)?;
    debug!("run_simulation: setup: {:?}", setup);

    let result_js = match args.trials {
        Some(0) => whatever!("The number of trials must be at least 1"),
        Some(n) if n > 1 => run_trials(&setup, n)?,
        _ => {
            let result = run_once(&setup, setup.seed)?;
            build_summary_js(&setup, &result)
        }
    };

    let pretty_js = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    let out = args.out.clone().or_else(|| setup.output_path.clone());
    write_summary(out.as_deref(), &pretty_js)?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        check_reference(summary_p, &result_js, &pretty_js)?;
    }

    Ok(())
}
