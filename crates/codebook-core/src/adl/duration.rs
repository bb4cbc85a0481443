//! ISO-8601 duration constraint parsing.
//!
//! Archetypes constrain durations with ADL text like `PT0S..PT12H`,
//! `>=P1M` or a bare `P3D`. A literal `T` designator anywhere in the
//! constraint marks clock-time; otherwise the constraint is a calendar
//! period. Both bounds are re-expressed in the most granular unit present
//! in either bound, so `PT0S..PT12H` becomes 0..43200 seconds.

use codebook_model::BoundOperator;

/// Normalized bounds of a duration constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationBounds {
    pub units: String,
    pub min: String,
    pub min_operator: BoundOperator,
    pub max: String,
    pub max_operator: BoundOperator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Unit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

impl Unit {
    fn label(self) -> &'static str {
        match self {
            Unit::Year => "Y",
            Unit::Month => "M",
            Unit::Week => "W",
            Unit::Day => "D",
            Unit::Hour => "H",
            Unit::Minute => "min",
            Unit::Second => "S",
        }
    }

    /// Size of one unit in seconds, with civil factors for the calendar
    /// units (365-day year, 30-day month).
    fn seconds(self) -> f64 {
        match self {
            Unit::Year => 365.0 * 86_400.0,
            Unit::Month => 30.0 * 86_400.0,
            Unit::Week => 7.0 * 86_400.0,
            Unit::Day => 86_400.0,
            Unit::Hour => 3_600.0,
            Unit::Minute => 60.0,
            Unit::Second => 1.0,
        }
    }
}

/// One parsed bound: total size in seconds plus the units it mentioned.
struct Bound {
    total_seconds: f64,
    units: Vec<Unit>,
}

/// Parse one constraint string into normalized bounds.
///
/// Accepts an optional `[|...|]` wrapper, a leading comparison symbol on a
/// single bound, or a `low..high` range. A constraint without any parsable
/// bound is an error; the caller reports it for the affected leaf and
/// moves on.
pub fn parse_constraint(text: &str) -> Result<DurationBounds, String> {
    let cleaned = text.trim().trim_matches(|c| c == '[' || c == ']' || c == '|');
    if cleaned.is_empty() {
        return Err("empty duration constraint".to_string());
    }

    if let Some((low, high)) = cleaned.split_once("..") {
        let lower = parse_bound(low)?;
        let upper = parse_bound(high)?;
        let unit = finest_unit(&[&lower, &upper])?;
        return Ok(DurationBounds {
            units: unit.label().to_string(),
            min: in_unit(lower.total_seconds, unit),
            min_operator: BoundOperator::Ge,
            max: in_unit(upper.total_seconds, unit),
            max_operator: BoundOperator::Le,
        });
    }

    let (operator, rest) = leading_operator(cleaned);
    let bound = parse_bound(rest)?;
    let unit = finest_unit(&[&bound])?;
    let value = in_unit(bound.total_seconds, unit);
    let bounds = match operator {
        BoundOperator::Ge | BoundOperator::Gt => DurationBounds {
            units: unit.label().to_string(),
            min: value,
            min_operator: operator,
            max: String::new(),
            max_operator: BoundOperator::None,
        },
        BoundOperator::Le | BoundOperator::Lt => DurationBounds {
            units: unit.label().to_string(),
            min: String::new(),
            min_operator: BoundOperator::None,
            max: value,
            max_operator: operator,
        },
        // A bare value is an exact constraint.
        _ => DurationBounds {
            units: unit.label().to_string(),
            min: value.clone(),
            min_operator: BoundOperator::Eq,
            max: value,
            max_operator: BoundOperator::Eq,
        },
    };
    Ok(bounds)
}

fn leading_operator(text: &str) -> (BoundOperator, &str) {
    for (symbol, operator) in [
        (">=", BoundOperator::Ge),
        ("<=", BoundOperator::Le),
        (">", BoundOperator::Gt),
        ("<", BoundOperator::Lt),
        ("=", BoundOperator::Eq),
    ] {
        if let Some(rest) = text.strip_prefix(symbol) {
            return (operator, rest.trim_start());
        }
    }
    (BoundOperator::None, text)
}

fn parse_bound(text: &str) -> Result<Bound, String> {
    let text = text.trim();
    let mut chars = text.chars().peekable();
    if chars.next() != Some('P') {
        return Err(format!("duration must start with P: {text}"));
    }

    let mut in_time = false;
    let mut units = Vec::new();
    let mut total_seconds = 0.0;
    let mut number = String::new();
    let mut saw_component = false;

    for c in chars {
        match c {
            'T' => in_time = true,
            '0'..='9' | '.' => number.push(c),
            designator => {
                let unit = match (designator, in_time) {
                    ('Y', false) => Unit::Year,
                    ('M', false) => Unit::Month,
                    ('M', true) => Unit::Minute,
                    ('W', false) => Unit::Week,
                    ('D', false) => Unit::Day,
                    ('H', true) => Unit::Hour,
                    ('S', true) => Unit::Second,
                    _ => return Err(format!("unexpected designator {designator:?} in {text}")),
                };
                let value: f64 = number
                    .parse()
                    .map_err(|_| format!("missing value before {designator:?} in {text}"))?;
                number.clear();
                total_seconds += value * unit.seconds();
                units.push(unit);
                saw_component = true;
            }
        }
    }

    if !saw_component || !number.is_empty() {
        return Err(format!("no parsable duration component in {text}"));
    }
    Ok(Bound {
        total_seconds,
        units,
    })
}

/// The most granular unit mentioned by any bound.
fn finest_unit(bounds: &[&Bound]) -> Result<Unit, String> {
    bounds
        .iter()
        .flat_map(|b| b.units.iter().copied())
        .max()
        .ok_or_else(|| "duration constraint without units".to_string())
}

fn in_unit(total_seconds: f64, unit: Unit) -> String {
    let value = total_seconds / unit.seconds();
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
