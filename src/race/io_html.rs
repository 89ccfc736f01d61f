// A self-contained HTML sink for the races.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};

use crate::race::*;

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>__TITLE__</title>
<style>
  body { font-family: sans-serif; margin: 2em; }
  #race { position: relative; width: 100%; max-width: 960px; }
  .bar { position: relative; height: 28px; margin: 4px 0; }
  .fill { position: absolute; left: 12em; top: 0; bottom: 0; transition: width 0.04s linear; }
  .name { position: absolute; left: 0; width: 11.5em; text-align: right; line-height: 28px; overflow: hidden; white-space: nowrap; }
  .value { position: absolute; line-height: 28px; padding-left: 0.4em; }
  #time { font-size: 1.6em; color: #555; margin-top: 0.5em; }
  #axis { color: #555; margin-left: 12em; }
</style>
</head>
<body>
<h2>__TITLE__</h2>
<div id="race"></div>
<div id="axis"></div>
<div id="time"></div>
<button id="replay">Replay</button>
<script type="application/json" id="race-data">__DATA__</script>
<script>
(function () {
  var race = JSON.parse(document.getElementById("race-data").textContent);
  var container = document.getElementById("race");
  var timeLabel = document.getElementById("time");
  document.getElementById("axis").textContent = race.valueLabel + " (max " + race.maxValue.toLocaleString() + ")";
  function color(name) {
    var h = 0;
    for (var i = 0; i < name.length; i++) { h = (h * 31 + name.charCodeAt(i)) % 360; }
    return "hsl(" + h + ", 60%, 55%)";
  }
  function draw(frame) {
    timeLabel.textContent = race.timeColumn + ": " + frame.time;
    container.innerHTML = "";
    frame.bars.forEach(function (bar) {
      var pct = race.maxValue > 0 ? (bar.value / race.maxValue) * 70 : 0;
      var row = document.createElement("div");
      row.className = "bar";
      row.innerHTML = '<span class="name"></span><span class="fill"></span><span class="value"></span>';
      row.children[0].textContent = bar.name;
      row.children[1].style.width = pct + "%";
      row.children[1].style.background = color(bar.name);
      row.children[2].style.left = "calc(12em + " + pct + "%)";
      row.children[2].textContent = bar.value.toLocaleString();
      container.appendChild(row);
    });
  }
  var timer = null;
  function play() {
    if (timer) { clearInterval(timer); }
    var idx = 0;
    if (race.frames.length === 0) { return; }
    draw(race.frames[0]);
    timer = setInterval(function () {
      idx += 1;
      if (idx >= race.frames.length) { clearInterval(timer); timer = null; return; }
      draw(race.frames[idx]);
    }, race.frameDuration);
  }
  document.getElementById("replay").addEventListener("click", play);
  play();
})();
</script>
</body>
</html>
"#;

/// One animation frame: the visible bars at one time, largest first.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Frame {
    pub time: NaiveDateTime,
    pub bars: Vec<(String, u64)>,
}

pub struct HtmlRenderer {}

impl Renderer for HtmlRenderer {
    fn render(&self, table: &RaceTable, options: &RenderOptions, path: &Path) -> BRaceResult<()> {
        let html = render_html(table, options)?;
        let p = path.display().to_string();
        fs::write(path, html).context(WritingOutputSnafu { path: p.clone() })?;
        info!("Wrote {:?}", p);
        Ok(())
    }
}

/// Groups the rows into frames ordered by time.
///
/// A category keeps its last value in the frames where it has no row, so a
/// bar does not vanish between two updates. Only the `top_entries` largest
/// bars are kept; equal values keep the order of first appearance.
pub fn build_frames(table: &RaceTable, top_entries: usize) -> Vec<Frame> {
    let mut by_time: BTreeMap<NaiveDateTime, Vec<&RaceRow>> = BTreeMap::new();
    for r in table.rows.iter() {
        by_time.entry(r.time).or_default().push(r);
    }

    // Categories in order of first appearance, with their latest value.
    let mut order: Vec<&str> = Vec::new();
    let mut latest: HashMap<&str, u64> = HashMap::new();
    let mut frames: Vec<Frame> = Vec::with_capacity(by_time.len());
    for (time, rows) in by_time.into_iter() {
        for r in rows {
            if latest.insert(r.category.as_str(), r.value).is_none() {
                order.push(r.category.as_str());
            }
        }
        let mut bars: Vec<(String, u64)> = order
            .iter()
            .map(|c| (c.to_string(), latest.get(c).cloned().unwrap_or(0)))
            .collect();
        bars.sort_by(|a, b| b.1.cmp(&a.1));
        bars.truncate(top_entries);
        frames.push(Frame { time, bars });
    }
    frames
}

fn frames_to_json(frames: &[Frame]) -> JSValue {
    let l: Vec<JSValue> = frames
        .iter()
        .map(|f| {
            let bars: Vec<JSValue> = f
                .bars
                .iter()
                .map(|(name, value)| json!({ "name": name, "value": value }))
                .collect();
            json!({ "time": f.time.format("%Y-%m-%d %H:%M:%S").to_string(), "bars": bars })
        })
        .collect();
    JSValue::Array(l)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render_html(table: &RaceTable, options: &RenderOptions) -> BRaceResult<String> {
    let frames = build_frames(table, options.top_entries);
    debug!(
        "render_html: {} rows, {} frames, top {}",
        table.rows.len(),
        frames.len(),
        options.top_entries
    );
    let data = json!({
        "itemLabel": options.item_label,
        "valueLabel": options.value_label,
        "categoryColumn": table.roles.category,
        "valueColumn": table.roles.value,
        "timeColumn": table.roles.time,
        "frameDuration": options.frame_duration_ms,
        "maxValue": table.max_value().unwrap_or(0),
        "frames": frames_to_json(&frames),
    });
    let data_s = serde_json::to_string(&data).context(ParsingJsonSnafu {})?;
    // The data sits inside a script element.
    let data_s = data_s.replace("</", "<\\/");
    Ok(PAGE_TEMPLATE
        .replace("__TITLE__", &escape_html(&options.item_label))
        .replace("__DATA__", &data_s))
}
