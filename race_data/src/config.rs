// ********* Input data structures ***********

use chrono::{NaiveDate, NaiveDateTime};
use std::error::Error;
use std::fmt::Display;

/// Votes of one candidate at one polling place, as returned by the grouped
/// query on the vote database.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteRecord {
    pub county: String,
    pub polling_place: String,
    pub candidate: String,
    pub vote_count: u64,
}

/// The time at which a polling place finished collecting its ballots.
///
/// `collected_at` is kept in the free-text form found in the spreadsheet,
/// for instance `113/01/13 16:30:49`.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CollectionTimeRecord {
    pub county: String,
    pub town: String,
    pub polling_place: String,
    pub collected_at: String,
}

/// A vote record after the left join with the collection times.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct MergedVoteRecord {
    pub county: String,
    pub polling_place: String,
    pub candidate: String,
    pub vote_count: u64,
    pub town: Option<String>,
    // Absent when the polling place has no collection time.
    pub collected_at: Option<String>,
}

/// A raw row of the case database. The confirmed count is already a
/// running total.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RawCaseRecord {
    pub reported_on: String,
    pub country: String,
    pub confirmed: u64,
}

// ******** Output data structures *********

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CandidateTimeAggregate {
    pub collected_at: NaiveDateTime,
    pub candidate: String,
    pub sum_votes: u64,
    pub cumulative_sum_votes: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CaseRecord {
    pub reported_on: NaiveDateTime,
    pub country: String,
    pub confirmed: u64,
}

/// Errors that prevent a pipeline from completing.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum PrepareErrors {
    /// A timestamp could not be normalized. Carries the offending input.
    FormatError(String),
}

impl Error for PrepareErrors {}

impl Display for PrepareErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrepareErrors::FormatError(input) => {
                write!(f, "could not normalize timestamp {:?}", input)
            }
        }
    }
}

// ********* Rendering **********

/// Names the columns of a tidy table that play each role in the race.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct ColumnRoles {
    pub category: &'static str,
    pub value: &'static str,
    pub time: &'static str,
}

/// Presentation options handed to the renderer.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RenderOptions {
    pub item_label: String,
    pub value_label: String,
    /// Maximum number of bars visible in one frame.
    pub top_entries: usize,
    pub frame_duration_ms: u32,
}

// ********* Constants **********

/// The day of the election. Only the clock time of a collection time is read.
pub const ELECTION_DAY: (i32, u32, u32) = (2024, 1, 13);

/// Last reporting day kept for the case race. Country rankings settle after it.
pub const CASE_CUTOFF: (i32, u32, u32) = (2020, 12, 31);

/// Number of countries kept per reporting day.
pub const DAILY_TOP_N: usize = 10;

/// End of the vote animation window (exclusive), as a clock time on the
/// election day.
pub const VOTE_FRAME_END: (u32, u32, u32) = (17, 30, 30);

pub fn election_day() -> NaiveDate {
    let (y, m, d) = ELECTION_DAY;
    // Constant, always valid.
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

pub fn case_cutoff() -> NaiveDate {
    let (y, m, d) = CASE_CUTOFF;
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MAX)
}

pub fn vote_frame_end() -> NaiveDateTime {
    let (h, m, s) = VOTE_FRAME_END;
    election_day()
        .and_hms_opt(h, m, s)
        .unwrap_or(NaiveDateTime::MAX)
}

impl RenderOptions {
    pub fn votes_default() -> RenderOptions {
        RenderOptions {
            item_label: "Votes collected by candidate".to_string(),
            value_label: "Cumulative votes".to_string(),
            top_entries: 3,
            frame_duration_ms: 50,
        }
    }

    pub fn cases_default() -> RenderOptions {
        RenderOptions {
            item_label: "Confirmed by country".to_string(),
            value_label: "Number of cases".to_string(),
            top_entries: DAILY_TOP_N,
            frame_duration_ms: 50,
        }
    }
}
