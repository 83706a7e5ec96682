use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::NamingConfig;
use crate::model::{Entry, NamingStats};

static DATE_IN_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        (?:19|20)\d{2}[-_.]?(?:0[1-9]|1[0-2])[-_.]?(?:0[1-9]|[12]\d|3[01])
        | (?:0[1-9]|1[0-2])[-_.](?:0[1-9]|[12]\d|3[01])[-_.](?:19|20)?\d{2}
        | (?:^|[^0-9])(?:19|20)\d{2}(?:[^0-9]|$)
        ",
    )
    .expect("date pattern compiles")
});

const CASE_MARKERS: &[&str] = &["client", "matter", "case"];
const SPECIAL_CHARS: &[char] = &['!', '@', '#', '$', '%'];

/// Naming statistics over the first `sample_size` file entries in scan order.
/// Messages are left out: their names are subjects, not file names.
pub fn analyze_naming(entries: &[Entry], config: &NamingConfig) -> NamingStats {
    let sample = entries
        .iter()
        .filter(|entry| !entry.is_message())
        .take(config.sample_size)
        .collect::<Vec<_>>();
    if sample.is_empty() {
        return NamingStats::default();
    }

    let mut spaces = 0_u64;
    let mut dated = 0_u64;
    let mut case_marked = 0_u64;
    let mut case_numbered = 0_u64;
    let mut special = 0_u64;
    let mut descriptive = 0_u64;
    let mut generic = 0_u64;

    for entry in &sample {
        let name = entry.name.as_str();
        let lowered = name.to_lowercase();
        if name.contains(' ') {
            spaces += 1;
        }
        if has_date_marker(name) {
            dated += 1;
        }
        if CASE_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            case_marked += 1;
        }
        if name.contains('-') && name.chars().any(|ch| ch.is_ascii_digit()) {
            case_numbered += 1;
        }
        if name.contains(SPECIAL_CHARS) {
            special += 1;
        }
        let stem_chars = entry.stem().chars().count();
        if stem_chars > config.descriptive_min_chars {
            descriptive += 1;
        } else if stem_chars < config.generic_max_chars {
            generic += 1;
        }
    }

    let total = sample.len() as f64;
    let fraction = |count: u64| count as f64 / total;
    NamingStats {
        sample_size: sample.len() as u64,
        spaces_fraction: fraction(spaces),
        date_fraction: fraction(dated),
        case_marker_fraction: fraction(case_marked),
        case_number_fraction: fraction(case_numbered),
        special_chars_fraction: fraction(special),
        descriptive_fraction: fraction(descriptive),
        generic_fraction: fraction(generic),
    }
}

pub fn has_date_marker(name: &str) -> bool {
    DATE_IN_NAME.is_match(name)
}
