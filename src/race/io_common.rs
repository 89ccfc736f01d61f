// Helpers shared by the database and spreadsheet readers.

/// Renders a numeric key as text. Whole numbers drop their fractional part so
/// that a polling place stored as `12` in one source and `12.0` in the other
/// compares equal.
pub fn integral_text(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        x.to_string()
    }
}

pub fn trimmed_text(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}
