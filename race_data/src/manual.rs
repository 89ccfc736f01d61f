/*!

This is the long-form manual for `race_data` and `barrace`.

## Races

Two races are prepared, independently of each other.

### Votes

The cumulative votes of each candidate of the 2024 presidential election, as
polling places finish counting.

* The vote database is reduced to one row per (county, polling place,
  candidate) with the summed votes.
* The completion time of each polling place comes from a spreadsheet. Its
  first three rows are titles, the fourth row holds column headers, and the
  five columns are read by position: county, town, polling place, completion
  time, number of voters (unused).
* Votes are joined to completion times on (county, polling place), summed by
  (completion time, candidate) and accumulated per candidate in time order.
* Completion times are written like `113/01/13 16:30:49`. Only the clock
  time is read, on the election day 2024-01-13.

The animation stops before 17:30:30 and shows 3 bars.

### Confirmed cases

The confirmed COVID-19 cases of the 10 most affected countries of every day up
to 2020-12-31. The source counts are already running totals, so no
accumulation happens here.

## Output

Each race is written as a single HTML file with no external assets:
`bar_chart_race_votes.html` and `bar_chart_race_confirmed.html`.

## Configuration

All paths, the cutoff day and the presentation options have fixed defaults.
A JSON file passed with `--config` may override any of them:

```json
{
  "voteDatabase": "data/taiwan_presidential_election_2024.db",
  "collectionTimes": "data/113全國投開票所完成時間.xlsx",
  "caseDatabase": "data/covid_19.db",
  "caseCutoff": "2020-12-31",
  "outputDirectory": ".",
  "votes": { "topEntries": 3, "frameDuration": 50 },
  "cases": { "itemLabel": "Confirmed by country" }
}
```

*/
