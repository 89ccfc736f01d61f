mod config;
pub mod manual;
mod normalize;
use log::{debug, info, warn};

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};

pub use crate::config::*;
pub use crate::normalize::*;

// **** Vote accumulation ****

/// Votes of one candidate for one raw collection time, before normalization.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CollectedAtBucket {
    pub collected_at: String,
    pub candidate: String,
    pub sum_votes: u64,
}

/// Left join of the vote records with the collection times on
/// (county, polling place).
///
/// Every vote record is kept. A polling place without a collection time gets
/// an absent `collected_at`. A key matching several collection rows yields one
/// merged row per match, in the order of the collection rows.
pub fn left_join_collection_times(
    votes: &[VoteRecord],
    times: &[CollectionTimeRecord],
) -> Vec<MergedVoteRecord> {
    let mut by_key: HashMap<(&str, &str), Vec<&CollectionTimeRecord>> = HashMap::new();
    for t in times.iter() {
        by_key
            .entry((t.county.as_str(), t.polling_place.as_str()))
            .or_default()
            .push(t);
    }

    let mut res: Vec<MergedVoteRecord> = Vec::with_capacity(votes.len());
    let mut unmatched: usize = 0;
    for v in votes.iter() {
        let merged = |t: Option<&CollectionTimeRecord>| MergedVoteRecord {
            county: v.county.clone(),
            polling_place: v.polling_place.clone(),
            candidate: v.candidate.clone(),
            vote_count: v.vote_count,
            town: t.map(|t| t.town.clone()),
            collected_at: t.map(|t| t.collected_at.clone()),
        };
        match by_key.get(&(v.county.as_str(), v.polling_place.as_str())) {
            Some(matches) => res.extend(matches.iter().map(|t| merged(Some(*t)))),
            None => {
                unmatched += 1;
                res.push(merged(None));
            }
        }
    }
    debug!(
        "left_join_collection_times: {} vote rows, {} collection rows, {} merged, {} unmatched",
        votes.len(),
        times.len(),
        res.len(),
        unmatched
    );
    res
}

/// Sums the merged votes by (collected_at, candidate).
///
/// Buckets come out in ascending key order. Rows without a collection time
/// have no place on the time axis: they are left out and reported.
pub fn sum_by_collected_at_candidate(merged: &[MergedVoteRecord]) -> Vec<CollectedAtBucket> {
    let mut sums: BTreeMap<(&str, &str), u64> = BTreeMap::new();
    let mut dropped_votes: u64 = 0;
    for m in merged.iter() {
        match &m.collected_at {
            Some(collected_at) => {
                *sums
                    .entry((collected_at.as_str(), m.candidate.as_str()))
                    .or_insert(0) += m.vote_count;
            }
            None => dropped_votes += m.vote_count,
        }
    }
    if dropped_votes > 0 {
        warn!(
            "sum_by_collected_at_candidate: {} votes have no collection time and are not placed on the time axis",
            dropped_votes
        );
    }
    sums.into_iter()
        .map(|((collected_at, candidate), sum_votes)| CollectedAtBucket {
            collected_at: collected_at.to_string(),
            candidate: candidate.to_string(),
            sum_votes,
        })
        .collect()
}

/// Normalizes the collection times and computes the running total of each
/// candidate.
///
/// A candidate's series follows the normalized collection time. Buckets with
/// the same time keep their input order.
pub fn cumulative_by_candidate(
    buckets: &[CollectedAtBucket],
) -> Result<Vec<CandidateTimeAggregate>, PrepareErrors> {
    let mut timed: Vec<(NaiveDateTime, &CollectedAtBucket)> = Vec::with_capacity(buckets.len());
    for b in buckets.iter() {
        timed.push((normalize_collected_at(&b.collected_at)?, b));
    }
    timed.sort_by_key(|p| p.0);

    let mut totals: HashMap<&str, u64> = HashMap::new();
    let res = timed
        .into_iter()
        .map(|(collected_at, b)| {
            let total = totals.entry(b.candidate.as_str()).or_insert(0);
            *total += b.sum_votes;
            CandidateTimeAggregate {
                collected_at,
                candidate: b.candidate.clone(),
                sum_votes: b.sum_votes,
                cumulative_sum_votes: *total,
            }
        })
        .collect();
    Ok(res)
}

/// Runs the vote accumulation: join, bucket by collection time, accumulate.
///
/// Any collection time that cannot be normalized fails the whole run.
pub fn aggregate_votes(
    votes: &[VoteRecord],
    times: &[CollectionTimeRecord],
) -> Result<Vec<CandidateTimeAggregate>, PrepareErrors> {
    info!(
        "aggregate_votes: processing {} vote records and {} collection times",
        votes.len(),
        times.len()
    );
    let merged = left_join_collection_times(votes, times);
    let buckets = sum_by_collected_at_candidate(&merged);
    debug!("aggregate_votes: {} buckets", buckets.len());
    let res = cumulative_by_candidate(&buckets)?;
    info!("aggregate_votes: {} aggregate rows", res.len());
    Ok(res)
}

// **** Daily case ranking ****

/// Keeps the cases reported on or before the cutoff day.
pub fn filter_through(cases: Vec<CaseRecord>, cutoff: NaiveDate) -> Vec<CaseRecord> {
    let before = cases.len();
    let res: Vec<CaseRecord> = cases
        .into_iter()
        .filter(|c| c.reported_on.date() <= cutoff)
        .collect();
    if res.len() < before {
        debug!(
            "filter_through: dropped {} records after {}",
            before - res.len(),
            cutoff
        );
    }
    res
}

/// For every reporting day, keeps the `top_n` records with the largest
/// confirmed count, largest first.
///
/// Days come out in ascending order. Equal counts keep their input order.
pub fn top_n_per_day(cases: Vec<CaseRecord>, top_n: usize) -> Vec<CaseRecord> {
    let mut by_day: BTreeMap<NaiveDateTime, Vec<CaseRecord>> = BTreeMap::new();
    for c in cases.into_iter() {
        by_day.entry(c.reported_on).or_default().push(c);
    }
    let mut res: Vec<CaseRecord> = Vec::new();
    for (_, mut day) in by_day.into_iter() {
        // Stable sort: ties stay in source order.
        day.sort_by(|a, b| b.confirmed.cmp(&a.confirmed));
        day.truncate(top_n);
        res.append(&mut day);
    }
    res
}

/// Runs the case ranking: parse, filter by cutoff, select the daily top N.
pub fn rank_daily_cases(
    raw: &[RawCaseRecord],
    cutoff: NaiveDate,
    top_n: usize,
) -> Result<Vec<CaseRecord>, PrepareErrors> {
    info!(
        "rank_daily_cases: processing {} records, cutoff {}, top {}",
        raw.len(),
        cutoff,
        top_n
    );
    let mut cases: Vec<CaseRecord> = Vec::with_capacity(raw.len());
    for r in raw.iter() {
        cases.push(CaseRecord {
            reported_on: parse_reported_on(&r.reported_on)?,
            country: r.country.clone(),
            confirmed: r.confirmed,
        });
    }
    let res = top_n_per_day(filter_through(cases, cutoff), top_n);
    info!("rank_daily_cases: {} ranked rows", res.len());
    Ok(res)
}

// **** Tidy tables for the renderer ****

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RaceRow {
    pub time: NaiveDateTime,
    pub category: String,
    pub value: u64,
}

/// Rows already shaped as (time, category, value), with the names of the
/// columns they came from.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RaceTable {
    pub roles: ColumnRoles,
    pub rows: Vec<RaceRow>,
}

impl RaceTable {
    pub const VOTE_ROLES: ColumnRoles = ColumnRoles {
        category: "candidate",
        value: "cumulative_sum_votes",
        time: "collected_at",
    };

    pub const CASE_ROLES: ColumnRoles = ColumnRoles {
        category: "country",
        value: "confirmed",
        time: "reported_on",
    };

    pub fn from_votes(aggs: &[CandidateTimeAggregate]) -> RaceTable {
        RaceTable {
            roles: RaceTable::VOTE_ROLES,
            rows: aggs
                .iter()
                .map(|a| RaceRow {
                    time: a.collected_at,
                    category: a.candidate.clone(),
                    value: a.cumulative_sum_votes,
                })
                .collect(),
        }
    }

    pub fn from_cases(cases: &[CaseRecord]) -> RaceTable {
        RaceTable {
            roles: RaceTable::CASE_ROLES,
            rows: cases
                .iter()
                .map(|c| RaceRow {
                    time: c.reported_on,
                    category: c.country.clone(),
                    value: c.confirmed,
                })
                .collect(),
        }
    }

    /// Keeps only the rows strictly before `end`.
    pub fn before(self, end: NaiveDateTime) -> RaceTable {
        RaceTable {
            roles: self.roles,
            rows: self.rows.into_iter().filter(|r| r.time < end).collect(),
        }
    }

    /// Upper bound of the value axis.
    pub fn max_value(&self) -> Option<u64> {
        self.rows.iter().map(|r| r.value).max()
    }
}
