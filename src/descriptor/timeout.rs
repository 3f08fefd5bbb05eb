//! ISO-8601 durations, as accepted by the timeout annotation.
//!
//! Calendar units are converted with fixed lengths: a year is 365.2425 days
//! and a month is a twelfth of that.

use std::time::Duration;

const SECONDS_PER_YEAR: f64 = 31_556_952.0;
const SECONDS_PER_MONTH: f64 = SECONDS_PER_YEAR / 12.0;
const SECONDS_PER_WEEK: f64 = 604_800.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

const DATE_UNITS: &[(char, f64)] = &[
    ('Y', SECONDS_PER_YEAR),
    ('M', SECONDS_PER_MONTH),
    ('W', SECONDS_PER_WEEK),
    ('D', SECONDS_PER_DAY),
];

const TIME_UNITS: &[(char, f64)] = &[('H', 3_600.0), ('M', 60.0), ('S', 1.0)];

/// Parses an ISO-8601 duration literal such as `PT30S` or `P1DT12H`.
///
/// Returns `None` for anything that is not a well-formed, non-negative duration.
/// Only the last component may carry a fraction (`PT1.5M` is accepted, `PT1.5M30S` is not).
pub fn parse(literal: &str) -> Option<Duration> {
    let rest = literal.strip_prefix('P')?;
    let (date, time) = match rest.split_once('T') {
        Some((_, "")) => return None,
        Some((date, time)) => (date, time),
        None => (rest, ""),
    };

    let mut total = 0.0;
    let mut components = 0;
    let mut saw_fraction = false;

    for (mut part, units) in [(date, DATE_UNITS), (time, TIME_UNITS)] {
        let mut next_unit = 0;
        while !part.is_empty() {
            if saw_fraction {
                return None;
            }

            let end = part.find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))?;
            let (number, tail) = part.split_at(end);
            let unit = tail.chars().next()?;

            let position = units[next_unit..]
                .iter()
                .position(|&(symbol, _)| symbol == unit)?
                + next_unit;
            next_unit = position + 1;

            if !number.bytes().any(|b| b.is_ascii_digit()) {
                return None;
            }
            saw_fraction = number.contains(['.', ',']);
            let value: f64 = number.replace(',', ".").parse().ok()?;

            total += value * units[position].1;
            components += 1;
            part = &tail[unit.len_utf8()..];
        }
    }

    if components == 0 {
        return None;
    }
    Duration::try_from_secs_f64(total).ok()
}
