use clap::Parser;

/// Prepares the bar chart race tables and renders them as HTML animations.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file overriding the default paths, cutoff day and presentation options.
    /// See the manual of the race_data crate for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (votes, cases or empty) If specified, only this race is prepared and rendered.
    #[clap(short, long, value_parser)]
    pub pipeline: Option<String>,

    /// If passed as an argument, the prepared tables are printed in JSON format to the standard output.
    #[clap(long, takes_value = false)]
    pub dump: bool,

    /// (file path) A reference file containing the prepared tables in JSON format. If provided, barrace will
    /// check that the prepared tables match the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
