// Readers for the vote and case databases.

use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OpenFlags, Row};

use crate::race::{io_common::integral_text, *};

const VOTES_QUERY: &str = "
    SELECT polling_places.county,
           polling_places.polling_place,
           candidates.candidate,
           SUM(votes.votes) AS sum_votes
      FROM votes
      JOIN candidates
        ON votes.candidate_id = candidates.id
      JOIN polling_places
        ON votes.polling_place_id = polling_places.id
     GROUP BY polling_places.county,
              polling_places.polling_place,
              candidates.candidate";

const CASES_QUERY: &str = "
    SELECT reported_on,
           country,
           confirmed
      FROM time_series
     WHERE reported_on <= ?1";

pub fn read_vote_records(path: &str) -> BRaceResult<Vec<VoteRecord>> {
    let conn = open_read_only(path)?;
    let res = query_vote_records(&conn, path);
    close(conn, path)?;
    res
}

pub fn read_case_records(path: &str, cutoff: NaiveDate) -> BRaceResult<Vec<RawCaseRecord>> {
    let conn = open_read_only(path)?;
    let res = query_case_records(&conn, path, cutoff);
    close(conn, path)?;
    res
}

fn open_read_only(path: &str) -> BRaceResult<Connection> {
    info!("Attempting to open database {:?}", path);
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .context(SourceUnavailableSnafu { path })?;
    Ok(conn)
}

fn close(conn: Connection, path: &str) -> BRaceResult<()> {
    conn.close()
        .map_err(|(_, e)| e)
        .context(SourceUnavailableSnafu { path })?;
    debug!("Closed database {:?}", path);
    Ok(())
}

pub fn query_vote_records(conn: &Connection, path: &str) -> BRaceResult<Vec<VoteRecord>> {
    let mut stmt = conn
        .prepare(VOTES_QUERY)
        .context(QuerySchemaSnafu { path })?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                key_text(row, 0)?,
                key_text(row, 1)?,
                key_text(row, 2)?,
                count(row, 3)?,
            ))
        })
        .context(QuerySchemaSnafu { path })?;

    let mut res: Vec<VoteRecord> = Vec::new();
    for row_r in rows {
        let (county, polling_place, candidate, sum_votes) =
            row_r.context(ReadingRowSnafu { path })?;
        res.push(VoteRecord {
            county,
            polling_place,
            candidate,
            vote_count: unsigned(sum_votes, path)?,
        });
    }
    debug!("query_vote_records: {} rows from {:?}", res.len(), path);
    Ok(res)
}

pub fn query_case_records(
    conn: &Connection,
    path: &str,
    cutoff: NaiveDate,
) -> BRaceResult<Vec<RawCaseRecord>> {
    let cutoff_s = cutoff.format("%Y-%m-%d").to_string();
    let mut stmt = conn
        .prepare(CASES_QUERY)
        .context(QuerySchemaSnafu { path })?;
    let rows = stmt
        .query_map([&cutoff_s], |row| {
            Ok((key_text(row, 0)?, key_text(row, 1)?, count(row, 2)?))
        })
        .context(QuerySchemaSnafu { path })?;

    let mut res: Vec<RawCaseRecord> = Vec::new();
    for row_r in rows {
        let (reported_on, country, confirmed) = row_r.context(ReadingRowSnafu { path })?;
        res.push(RawCaseRecord {
            reported_on,
            country,
            confirmed: unsigned(confirmed, path)?,
        });
    }
    debug!("query_case_records: {} rows from {:?}", res.len(), path);
    Ok(res)
}

fn unsigned(value: i64, path: &str) -> BRaceResult<u64> {
    let x = u64::try_from(value)
        .ok()
        .context(NegativeCountSnafu { value, path })?;
    Ok(x)
}

// Keys are compared as text whatever their storage class.
fn key_text(row: &Row, idx: usize) -> rusqlite::Result<String> {
    match row.get::<_, Value>(idx)? {
        Value::Text(s) => Ok(s.trim().to_string()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Real(f) => Ok(integral_text(f)),
        Value::Null => Ok("".to_string()),
        Value::Blob(_) => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "blob key".to_string(),
            Type::Blob,
        )),
    }
}

// NULL counts (an empty SUM) are zero.
fn count(row: &Row, idx: usize) -> rusqlite::Result<i64> {
    match row.get::<_, Value>(idx)? {
        Value::Integer(i) => Ok(i),
        Value::Real(f) => Ok(f as i64),
        Value::Null => Ok(0),
        Value::Text(s) => s.trim().parse::<i64>().map_err(|_| {
            rusqlite::Error::InvalidColumnType(idx, format!("count {:?}", s), Type::Text)
        }),
        Value::Blob(_) => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "blob count".to_string(),
            Type::Blob,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote_database() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE candidates (id INTEGER PRIMARY KEY, candidate TEXT);
             CREATE TABLE polling_places (id INTEGER PRIMARY KEY, county TEXT, polling_place INTEGER);
             CREATE TABLE votes (candidate_id INTEGER, polling_place_id INTEGER, votes INTEGER);
             INSERT INTO candidates VALUES (1, 'A'), (2, 'B');
             INSERT INTO polling_places VALUES (1, 'C', 12), (2, 'C', 13);
             INSERT INTO votes VALUES (1, 1, 4), (1, 1, 6), (2, 1, 3), (1, 2, 5);",
        )
        .unwrap();
        conn
    }

    fn case_database() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE time_series (reported_on TEXT, country TEXT, confirmed INTEGER);
             INSERT INTO time_series VALUES
                ('2020-12-30', 'a', 10),
                ('2020-12-31', 'a', 12),
                ('2021-01-01', 'a', 15);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn grouped_votes() {
        let conn = vote_database();
        let mut res = query_vote_records(&conn, ":memory:").unwrap();
        res.sort_by(|a, b| {
            (&a.polling_place, &a.candidate).cmp(&(&b.polling_place, &b.candidate))
        });
        let rows: Vec<(&str, &str, u64)> = res
            .iter()
            .map(|v| (v.polling_place.as_str(), v.candidate.as_str(), v.vote_count))
            .collect();
        assert_eq!(rows, vec![("12", "A", 10), ("12", "B", 3), ("13", "A", 5)]);
        assert!(res.iter().all(|v| v.county == "C"));
    }

    #[test]
    fn cases_through_cutoff() {
        let conn = case_database();
        let res = query_case_records(&conn, ":memory:", case_cutoff()).unwrap();
        let days: Vec<&str> = res.iter().map(|c| c.reported_on.as_str()).collect();
        assert_eq!(days, vec!["2020-12-30", "2020-12-31"]);
    }

    #[test]
    fn missing_tables() {
        let conn = Connection::open_in_memory().unwrap();
        let err = query_vote_records(&conn, ":memory:").unwrap_err();
        assert!(matches!(*err, RaceError::QuerySchema { .. }));
    }

    #[test]
    fn negative_count() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE time_series (reported_on TEXT, country TEXT, confirmed INTEGER);
             INSERT INTO time_series VALUES ('2020-06-01', 'a', -1);",
        )
        .unwrap();
        let err = query_case_records(&conn, ":memory:", case_cutoff()).unwrap_err();
        assert!(matches!(*err, RaceError::NegativeCount { value: -1, .. }));
    }

    #[test]
    fn missing_database_file() {
        let err = read_vote_records("/nonexistent/dir/votes.db").unwrap_err();
        assert!(matches!(*err, RaceError::SourceUnavailable { .. }));
    }
}
