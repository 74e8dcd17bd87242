//! Text coercion helpers shared by the extractors and the JSON normalizer.

/// Parses the first number in a piece of display text.
///
/// Currency symbols, unit suffixes and thousands separators are ignored, so
/// `"$1,250.00"`, `"245 mi"`, `"$.85/mi"` and `"42,000 lbs"` all parse.
/// Returns `None` when the text has no digits.
pub fn parse_number(text: &str) -> Option<f64> {
    let digit = text.find(|c: char| c.is_ascii_digit())?;
    let start = match text[..digit].strip_suffix('.') {
        Some(head) => head.len(),
        None => digit,
    };
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .filter(|c| *c != ',')
        .collect();

    digits.trim_end_matches('.').parse::<f64>().ok()
}

/// Collapses runs of whitespace and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduces a raw identifier to `[A-Za-z0-9_-]`, folding everything else into
/// single dashes.
pub fn sanitize_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_dash = true;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Splits `"Chicago, IL"` into city and state. A value without a comma is
/// treated as a city.
pub fn split_city_state(location: &str) -> (Option<String>, Option<String>) {
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    match location.rsplit_once(',') {
        Some((city, state)) => (non_empty(city), non_empty(state).map(|s| s.to_uppercase())),
        None => (non_empty(location), None),
    }
}

/// Formats a city/state pair the way the marketplace's location inputs expect.
pub fn join_city_state(city: Option<&str>, state: Option<&str>) -> Option<String> {
    let city = city.map(str::trim).filter(|s| !s.is_empty());
    let state = state.map(str::trim).filter(|s| !s.is_empty());
    match (city, state) {
        (Some(city), Some(state)) => Some(format!("{}, {}", city, state)),
        (Some(city), None) => Some(city.to_string()),
        (None, Some(state)) => Some(state.to_string()),
        (None, None) => None,
    }
}
