use clap::Parser;

/// This is a simulation program for iterative, conclave-style elections.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The file containing the election description in JSON format.
    /// For more information about the file format, read the documentation of the manual module.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference file containing the summary of an election in JSON format. If provided,
    /// conclave will check that the simulated output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the election will be written in JSON format to the given
    /// location. Setting this option overrides the output directory that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) A CSV file with the preferences of the electors. These electors are added
    /// after the ones of the configuration file.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (list of values or not specified) The options to vote on, in order. If not specified, they are
    /// taken from the configuration file or from the header of the CSV input.
    #[clap(long, value_parser)]
    pub options: Option<Vec<String>>,

    /// (default 0.5) The fraction of the votes an option needs to win.
    #[clap(long, value_parser)]
    pub fraction_required: Option<f64>,

    /// (default unlimited) The maximum number of rounds of voting.
    #[clap(long, value_parser)]
    pub max_rounds: Option<u32>,

    /// (default random) The seed for the first round of voting and for the random tie-break.
    #[clap(long, value_parser)]
    pub seed: Option<u64>,

    /// (default useOptionOrder) How to break ties: useOptionOrder or random.
    #[clap(long, value_parser)]
    pub tiebreak: Option<String>,

    /// (default 1) The number of elections to run, with consecutive seeds. With more than one
    /// election, the summary reports how often each option won.
    #[clap(long, value_parser)]
    pub trials: Option<u32>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
