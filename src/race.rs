use log::{debug, info, warn};

use race_data::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::race::config_reader::*;

mod io_common;
mod io_excel;
mod io_html;
mod io_sqlite;

#[derive(Debug, Snafu)]
pub enum RaceError {
    #[snafu(display("Database {path} is unavailable"))]
    SourceUnavailable {
        source: rusqlite::Error,
        path: String,
    },
    #[snafu(display("Database {path} does not have the expected tables and columns"))]
    QuerySchema {
        source: rusqlite::Error,
        path: String,
    },
    #[snafu(display("Error reading a row of {path}"))]
    ReadingRow {
        source: rusqlite::Error,
        path: String,
    },
    #[snafu(display("Negative count {value} in {path}"))]
    NegativeCount { value: i64, path: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No worksheet in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Unexpected layout of {path}: {details}"))]
    SchemaMismatch { path: String, details: String },
    #[snafu(display("Error preparing the {race} race"))]
    Preparing {
        source: race_data::PrepareErrors,
        race: String,
    },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error in JSON content"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Unknown race {name:?}, expected votes or cases"))]
    UnknownPipeline { name: String },
    #[snafu(display("Difference detected between prepared tables and reference tables"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type RaceResult<T> = Result<T, RaceError>;
pub type BRaceResult<T> = Result<T, Box<RaceError>>;

pub const VOTES_OUTPUT: &str = "bar_chart_race_votes.html";
pub const CASES_OUTPUT: &str = "bar_chart_race_confirmed.html";

/// A sink for a prepared race. It receives rows already shaped as
/// (time, category, value).
pub trait Renderer {
    fn render(&self, table: &RaceTable, options: &RenderOptions, path: &Path) -> BRaceResult<()>;
}

pub mod config_reader {
    use crate::race::*;
    use chrono::NaiveDate;

    pub const DEFAULT_VOTE_DATABASE: &str = "data/taiwan_presidential_election_2024.db";
    pub const DEFAULT_COLLECTION_TIMES: &str = "data/113全國投開票所完成時間.xlsx";
    pub const DEFAULT_CASE_DATABASE: &str = "data/covid_19.db";
    pub const DEFAULT_OUTPUT_DIRECTORY: &str = ".";

    #[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
    pub struct RenderSettings {
        #[serde(rename = "itemLabel")]
        pub item_label: Option<String>,
        #[serde(rename = "valueLabel")]
        pub value_label: Option<String>,
        #[serde(rename = "topEntries")]
        pub top_entries: Option<usize>,
        #[serde(rename = "frameDuration")]
        pub frame_duration: Option<u32>,
    }

    impl RenderSettings {
        pub fn apply(&self, defaults: RenderOptions) -> RaceResult<RenderOptions> {
            let top_entries = match self.top_entries {
                Some(0) => whatever!("topEntries must be at least 1"),
                Some(x) => x,
                None => defaults.top_entries,
            };
            Ok(RenderOptions {
                item_label: self.item_label.clone().unwrap_or(defaults.item_label),
                value_label: self.value_label.clone().unwrap_or(defaults.value_label),
                top_entries,
                frame_duration_ms: self.frame_duration.unwrap_or(defaults.frame_duration_ms),
            })
        }
    }

    #[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
    pub struct RaceConfig {
        #[serde(rename = "voteDatabase")]
        pub vote_database: Option<String>,
        #[serde(rename = "collectionTimes")]
        pub collection_times: Option<String>,
        #[serde(rename = "caseDatabase")]
        pub case_database: Option<String>,
        #[serde(rename = "caseCutoff")]
        pub case_cutoff: Option<String>,
        #[serde(rename = "outputDirectory")]
        pub output_directory: Option<String>,
        pub votes: Option<RenderSettings>,
        pub cases: Option<RenderSettings>,
    }

    /// The resolved settings of one run.
    #[derive(Eq, PartialEq, Debug, Clone)]
    pub struct RunSettings {
        pub vote_database: String,
        pub collection_times: String,
        pub case_database: String,
        pub case_cutoff: NaiveDate,
        pub output_directory: String,
        pub votes_render: RenderOptions,
        pub cases_render: RenderOptions,
    }

    impl RunSettings {
        pub fn from_config(config: &RaceConfig) -> RaceResult<RunSettings> {
            let case_cutoff = match &config.case_cutoff {
                Some(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    Ok(d) => d,
                    Err(e) => whatever!("Cannot read caseCutoff {:?}: {}", s, e),
                },
                None => case_cutoff(),
            };
            Ok(RunSettings {
                vote_database: config
                    .vote_database
                    .clone()
                    .unwrap_or_else(|| DEFAULT_VOTE_DATABASE.to_string()),
                collection_times: config
                    .collection_times
                    .clone()
                    .unwrap_or_else(|| DEFAULT_COLLECTION_TIMES.to_string()),
                case_database: config
                    .case_database
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CASE_DATABASE.to_string()),
                case_cutoff,
                output_directory: config
                    .output_directory
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OUTPUT_DIRECTORY.to_string()),
                votes_render: config
                    .votes
                    .clone()
                    .unwrap_or_default()
                    .apply(RenderOptions::votes_default())?,
                cases_render: config
                    .cases
                    .clone()
                    .unwrap_or_default()
                    .apply(RenderOptions::cases_default())?,
            })
        }

        pub fn output_path(&self, file_name: &str) -> PathBuf {
            [self.output_directory.as_str(), file_name].iter().collect()
        }
    }

    pub fn read_config(path: &str) -> BRaceResult<RaceConfig> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
        debug!("read_config: {:?}", contents);
        let config: RaceConfig =
            serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(config)
    }

    pub fn read_reference(path: &str) -> BRaceResult<JSValue> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
        let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(js)
    }
}

fn format_time(dt: &chrono::NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn votes_to_json(aggs: &[CandidateTimeAggregate]) -> JSValue {
    let l: Vec<JSValue> = aggs
        .iter()
        .map(|a| {
            json!({
                "collected_at": format_time(&a.collected_at),
                "candidate": a.candidate,
                "sum_votes": a.sum_votes,
                "cumulative_sum_votes": a.cumulative_sum_votes,
            })
        })
        .collect();
    JSValue::Array(l)
}

fn cases_to_json(cases: &[CaseRecord]) -> JSValue {
    let l: Vec<JSValue> = cases
        .iter()
        .map(|c| {
            json!({
                "reported_on": format_time(&c.reported_on),
                "country": c.country,
                "confirmed": c.confirmed,
            })
        })
        .collect();
    JSValue::Array(l)
}

pub fn prepare_votes(settings: &RunSettings) -> BRaceResult<Vec<CandidateTimeAggregate>> {
    let votes = io_sqlite::read_vote_records(&settings.vote_database)?;
    let times = io_excel::read_collection_times(&settings.collection_times)?;
    let aggs = aggregate_votes(&votes, &times).context(PreparingSnafu { race: "votes" })?;
    Ok(aggs)
}

pub fn prepare_cases(settings: &RunSettings) -> BRaceResult<Vec<CaseRecord>> {
    let raw = io_sqlite::read_case_records(&settings.case_database, settings.case_cutoff)?;
    let cases = rank_daily_cases(&raw, settings.case_cutoff, DAILY_TOP_N)
        .context(PreparingSnafu { race: "cases" })?;
    Ok(cases)
}

fn selected_races(pipeline: &Option<String>) -> RaceResult<(bool, bool)> {
    match pipeline.as_deref() {
        None => Ok((true, true)),
        Some("votes") => Ok((true, false)),
        Some("cases") => Ok((false, true)),
        Some(x) => UnknownPipelineSnafu { name: x }.fail(),
    }
}

pub fn run(args: &Args) -> BRaceResult<()> {
    let config = match &args.config {
        Some(p) => read_config(p)?,
        None => RaceConfig::default(),
    };
    let settings = RunSettings::from_config(&config)?;
    info!("settings: {:?}", settings);

    let (with_votes, with_cases) = selected_races(&args.pipeline)?;
    let renderer = io_html::HtmlRenderer {};
    let mut tables: JSMap<String, JSValue> = JSMap::new();

    if with_votes {
        let aggs = prepare_votes(&settings)?;
        let table = RaceTable::from_votes(&aggs).before(vote_frame_end());
        let out = settings.output_path(VOTES_OUTPUT);
        info!("Rendering {} vote rows to {:?}", table.rows.len(), out);
        renderer.render(&table, &settings.votes_render, &out)?;
        tables.insert("votes".to_string(), votes_to_json(&aggs));
    }

    if with_cases {
        let cases = prepare_cases(&settings)?;
        let table = RaceTable::from_cases(&cases);
        let out = settings.output_path(CASES_OUTPUT);
        info!("Rendering {} case rows to {:?}", table.rows.len(), out);
        renderer.render(&table, &settings.cases_render, &out)?;
        tables.insert("cases".to_string(), cases_to_json(&cases));
    }

    let tables_js = JSValue::Object(tables);
    let pretty_js_tables = serde_json::to_string_pretty(&tables_js).context(ParsingJsonSnafu {})?;
    if args.dump {
        println!("{}", pretty_js_tables);
    }

    // The reference tables, if provided for comparison
    if let Some(reference_p) = &args.reference {
        let reference = read_reference(reference_p)?;
        let pretty_js_reference =
            serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
        if pretty_js_reference != pretty_js_tables {
            warn!("Found differences with the reference tables");
            print_diff(
                pretty_js_reference.as_str(),
                pretty_js_tables.as_ref(),
                "\n",
            );
            return Err(Box::new(RaceError::ReferenceMismatch {}));
        }
        info!("Prepared tables match the reference {:?}", reference_p);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn defaults_without_config() {
        let settings = RunSettings::from_config(&RaceConfig::default()).unwrap();
        assert_eq!(settings.vote_database, DEFAULT_VOTE_DATABASE);
        assert_eq!(settings.case_cutoff, NaiveDate::from_ymd_opt(2020, 12, 31).unwrap());
        assert_eq!(settings.votes_render.top_entries, 3);
        assert_eq!(settings.cases_render.top_entries, 10);
        assert_eq!(settings.votes_render.frame_duration_ms, 50);
        assert_eq!(
            settings.output_path(VOTES_OUTPUT),
            PathBuf::from("./bar_chart_race_votes.html")
        );
    }

    #[test]
    fn config_overrides() {
        let config: RaceConfig = serde_json::from_str(
            r#"{
                "caseDatabase": "other.db",
                "caseCutoff": "2020-06-30",
                "outputDirectory": "out",
                "votes": { "topEntries": 5, "itemLabel": "Candidates" }
            }"#,
        )
        .unwrap();
        let settings = RunSettings::from_config(&config).unwrap();
        assert_eq!(settings.case_database, "other.db");
        assert_eq!(settings.case_cutoff, NaiveDate::from_ymd_opt(2020, 6, 30).unwrap());
        assert_eq!(settings.votes_render.top_entries, 5);
        assert_eq!(settings.votes_render.item_label, "Candidates");
        assert_eq!(settings.votes_render.value_label, "Cumulative votes");
        assert_eq!(settings.cases_render, RenderOptions::cases_default());
        assert_eq!(
            settings.output_path(CASES_OUTPUT),
            PathBuf::from("out/bar_chart_race_confirmed.html")
        );
    }

    #[test]
    fn invalid_config_values() {
        let bad_cutoff = RaceConfig {
            case_cutoff: Some("31/12/2020".to_string()),
            ..RaceConfig::default()
        };
        assert!(RunSettings::from_config(&bad_cutoff).is_err());

        let no_bars = RaceConfig {
            cases: Some(RenderSettings {
                top_entries: Some(0),
                ..RenderSettings::default()
            }),
            ..RaceConfig::default()
        };
        assert!(RunSettings::from_config(&no_bars).is_err());
    }

    #[test]
    fn race_selection() {
        assert_eq!(selected_races(&None).unwrap(), (true, true));
        assert_eq!(
            selected_races(&Some("cases".to_string())).unwrap(),
            (false, true)
        );
        assert!(matches!(
            selected_races(&Some("ballots".to_string())),
            Err(RaceError::UnknownPipeline { .. })
        ));
    }

    #[test]
    fn dumped_tables() {
        let at = election_day().and_hms_opt(8, 0, 0).unwrap();
        let aggs = vec![CandidateTimeAggregate {
            collected_at: at,
            candidate: "A".to_string(),
            sum_votes: 15,
            cumulative_sum_votes: 15,
        }];
        assert_eq!(
            votes_to_json(&aggs),
            json!([{
                "collected_at": "2024-01-13T08:00:00",
                "candidate": "A",
                "sum_votes": 15,
                "cumulative_sum_votes": 15
            }])
        );
        let cases = vec![CaseRecord {
            reported_on: NaiveDate::from_ymd_opt(2020, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            country: "Italy".to_string(),
            confirmed: 1694,
        }];
        assert_eq!(
            cases_to_json(&cases),
            json!([{ "reported_on": "2020-03-01T00:00:00", "country": "Italy", "confirmed": 1694 }])
        );
    }
}
