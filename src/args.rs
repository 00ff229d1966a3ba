use clap::{Parser, Subcommand};

/// Extracts the feedback of a survey wave from a spreadsheet, summarizes it and
/// computes net promoter statistics.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file. Relative paths inside the
    /// file are resolved against its directory. Without it, the defaults are used.
    #[clap(short, long, value_parser, global = true)]
    pub config: Option<String>,

    /// (gsheets, xlsx or csv) Where the responses come from. Overrides the provider
    /// of the configuration file.
    #[clap(long, value_parser, global = true)]
    pub input_type: Option<String>,

    /// (default "Survey Wave") The name of the column holding the wave label.
    #[clap(long, value_parser, global = true)]
    pub wave_column: Option<String>,

    /// If passed as an argument, will turn on debug logging to the standard error.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Writes the feedback bundle of one wave.
    Extract {
        /// Spreadsheet URL or identifier (a file path for xlsx and csv inputs).
        #[clap(short, long, value_parser)]
        locator: String,
        #[clap(short, long, value_parser)]
        wave: String,
        /// (file path) Where to write the bundle. Overrides the configuration.
        #[clap(short, long, value_parser)]
        out: Option<String>,
        /// (file path) A reference bundle. If provided, the written bundle must match it.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Summarizes a feedback bundle with the text generation service.
    Summarize {
        /// (file path) The bundle to summarize. Defaults to the configured bundle file.
        #[clap(short, long, value_parser)]
        bundle: Option<String>,
        /// (file path) Where to write the summary. Overrides the configuration.
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },
    /// Computes the net promoter statistics of one or more waves.
    Score {
        #[clap(short, long, value_parser)]
        locator: String,
        /// The wave to score. Can be repeated.
        #[clap(short, long = "wave", value_parser, required = true)]
        waves: Vec<String>,
        /// Also reports each wave separately.
        #[clap(long, takes_value = false)]
        by_wave: bool,
    },
    /// Keyword statistics over a feedback bundle.
    Insights {
        #[clap(short, long, value_parser)]
        bundle: Option<String>,
    },
    /// Extracts the feedback of a wave and summarizes it.
    Run {
        #[clap(short, long, value_parser)]
        locator: String,
        #[clap(short, long, value_parser)]
        wave: String,
    },
}
