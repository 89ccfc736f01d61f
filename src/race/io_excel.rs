use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::race::{
    io_common::{integral_text, trimmed_text},
    *,
};

/// Title rows at the top of the sheet, before the header row.
pub const NOISE_ROWS: u32 = 3;

/// The positional names of the columns. The last one is not used.
pub const COLUMN_NAMES: [&str; 5] = [
    "county",
    "town",
    "polling_place",
    "collected_at",
    "number_of_voters",
];

pub fn read_collection_times(path: &str) -> BRaceResult<Vec<CollectionTimeRecord>> {
    info!("Attempting to read collection times {:?}", path);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(EmptyExcelSnafu { path })?
        .context(OpeningExcelSnafu { path })?;

    // The range starts at the first used cell, which is not always A1.
    let first_row = wrange.start().map(|(r, _)| r).unwrap_or(0);
    debug!(
        "read_collection_times: start row {} width {} height {}",
        first_row,
        wrange.width(),
        wrange.height()
    );
    let rows = wrange
        .rows()
        .enumerate()
        .map(|(idx, row)| (first_row + idx as u32, row));
    parse_collection_rows(path, wrange.width(), rows)
}

/// Reads the collection times out of the rows of the sheet, each one given
/// with its absolute row index.
pub fn parse_collection_rows<'a>(
    path: &str,
    width: usize,
    rows: impl Iterator<Item = (u32, &'a [DataType])>,
) -> BRaceResult<Vec<CollectionTimeRecord>> {
    if width != COLUMN_NAMES.len() {
        return SchemaMismatchSnafu {
            path,
            details: format!(
                "expected {} columns {:?}, found {}",
                COLUMN_NAMES.len(),
                COLUMN_NAMES,
                width
            ),
        }
        .fail()
        .map_err(Box::new);
    }

    let mut seen_header = false;
    let mut res: Vec<CollectionTimeRecord> = Vec::new();
    for (lineno, row) in rows {
        if lineno < NOISE_ROWS {
            continue;
        }
        if lineno == NOISE_ROWS {
            debug!("parse_collection_rows: header: {:?}", row);
            seen_header = true;
            continue;
        }
        if !seen_header {
            break;
        }
        let cells: Vec<Option<String>> = (0..COLUMN_NAMES.len() - 1)
            .map(|idx| row.get(idx).and_then(cell_text))
            .collect();
        match cells.as_slice() {
            [None, None, None, None] => {
                debug!("parse_collection_rows: row {}: empty", lineno);
            }
            [county, town, Some(polling_place), Some(collected_at)] => {
                res.push(CollectionTimeRecord {
                    county: county.clone().unwrap_or_default(),
                    town: town.clone().unwrap_or_default(),
                    polling_place: polling_place.clone(),
                    collected_at: collected_at.clone(),
                });
            }
            _ => {
                warn!(
                    "parse_collection_rows: row {}: no polling place or collection time in {:?}",
                    lineno, row
                );
            }
        }
    }

    if !seen_header {
        return SchemaMismatchSnafu {
            path,
            details: format!("missing header row {}", NOISE_ROWS + 1),
        }
        .fail()
        .map_err(Box::new);
    }
    debug!("parse_collection_rows: {} collection times", res.len());
    Ok(res)
}

fn cell_text(cell: &DataType) -> Option<String> {
    match cell {
        DataType::String(s) => trimmed_text(s),
        DataType::Int(i) => Some(i.to_string()),
        DataType::Float(f) => Some(integral_text(*f)),
        DataType::Bool(b) => Some(b.to_string()),
        DataType::Empty => None,
        // Typed dates and cell errors are kept verbatim. A collection time in
        // this form fails normalization later on.
        other => Some(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(x: &str) -> DataType {
        DataType::String(x.to_string())
    }

    fn sheet() -> Vec<Vec<DataType>> {
        let title = vec![s("113年全國投開票所完成時間"), DataType::Empty, DataType::Empty, DataType::Empty, DataType::Empty];
        vec![
            title.clone(),
            vec![DataType::Empty; 5],
            title,
            vec![s("縣市"), s("鄉鎮市區"), s("投開票所"), s("完成時間"), s("投票數")],
            vec![s("臺北市"), s("松山區"), DataType::Float(12.0), s("113/01/13 16:30:49"), DataType::Int(900)],
            vec![DataType::Empty; 5],
            vec![s(" 臺北市 "), s("信義區"), s("P2"), s("113/01/13 16:45:00"), DataType::Empty],
            vec![s("臺北市"), s("信義區"), s("P3"), DataType::Empty, DataType::Empty],
        ]
    }

    fn indexed(rows: &[Vec<DataType>]) -> impl Iterator<Item = (u32, &[DataType])> {
        rows.iter()
            .enumerate()
            .map(|(idx, r)| (idx as u32, r.as_slice()))
    }

    #[test]
    fn positional_columns() {
        let rows = sheet();
        let res = parse_collection_rows("test.xlsx", 5, indexed(&rows)).unwrap();
        assert_eq!(
            res,
            vec![
                CollectionTimeRecord {
                    county: "臺北市".to_string(),
                    town: "松山區".to_string(),
                    polling_place: "12".to_string(),
                    collected_at: "113/01/13 16:30:49".to_string(),
                },
                CollectionTimeRecord {
                    county: "臺北市".to_string(),
                    town: "信義區".to_string(),
                    polling_place: "P2".to_string(),
                    collected_at: "113/01/13 16:45:00".to_string(),
                },
            ]
        );
    }

    #[test]
    fn wrong_width() {
        let rows = sheet();
        let err = parse_collection_rows("test.xlsx", 4, indexed(&rows)).unwrap_err();
        assert!(matches!(*err, RaceError::SchemaMismatch { .. }));
    }

    #[test]
    fn only_title_rows() {
        let rows = sheet();
        let err = parse_collection_rows("test.xlsx", 5, indexed(&rows[..2])).unwrap_err();
        assert!(matches!(*err, RaceError::SchemaMismatch { .. }));
    }

    #[test]
    fn range_not_starting_at_first_row() {
        let rows = sheet();
        // The range of the sheet starts on the second title row.
        let shifted = rows[2..]
            .iter()
            .enumerate()
            .map(|(idx, r)| (idx as u32 + 2, r.as_slice()));
        let res = parse_collection_rows("test.xlsx", 5, shifted).unwrap();
        assert_eq!(res.len(), 2);
    }

    #[test]
    fn missing_file() {
        let err = read_collection_times("/nonexistent/times.xlsx").unwrap_err();
        assert!(matches!(*err, RaceError::OpeningExcel { .. }));
    }
}
