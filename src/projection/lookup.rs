//! Year-keyed lookup tables
//!
//! Salary growth, bonus/equity rates and expense adjustments are all
//! authored either as a list indexed by plan-year or as a mapping keyed by
//! `3`, `"1-3"` or `"4+"`. Both shapes resolve through [`YearTable::get`].

use std::fmt;
use std::str::FromStr;

use serde::de::{DeserializeOwned, Error as DeError};
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;

/// Which plan-years a mapping entry applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearKey {
    Single(u32),
    /// Inclusive on both ends
    Range { start: u32, end: u32 },
    /// This year and every later one
    From(u32),
}

impl YearKey {
    pub fn matches(self, year: u32) -> bool {
        match self {
            YearKey::Single(y) => y == year,
            YearKey::Range { start, end } => start <= year && year <= end,
            YearKey::From(threshold) => year >= threshold,
        }
    }
}

impl FromStr for YearKey {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let number = |text: &str| {
            text.trim()
                .parse::<u32>()
                .map_err(|_| format!("invalid year key '{raw}'"))
        };

        if let Some(threshold) = raw.strip_suffix('+') {
            return Ok(YearKey::From(number(threshold)?));
        }
        if let Some((start, end)) = raw.split_once('-') {
            let (start, end) = (number(start)?, number(end)?);
            if start > end {
                return Err(format!("year range '{raw}' ends before it starts"));
            }
            return Ok(YearKey::Range { start, end });
        }
        number(raw).map(YearKey::Single)
    }
}

impl fmt::Display for YearKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearKey::Single(year) => write!(f, "{year}"),
            YearKey::Range { start, end } => write!(f, "{start}-{end}"),
            YearKey::From(threshold) => write!(f, "{threshold}+"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum YearTable<T> {
    /// Element `i` applies to plan-year `i + 1`
    Indexed(Vec<T>),
    /// Entries in document order
    Keyed(Vec<(YearKey, T)>),
}

impl<T> Default for YearTable<T> {
    fn default() -> Self {
        YearTable::Keyed(Vec::new())
    }
}

impl<T> YearTable<T> {
    /// Exact year, then containing range, then the largest open-ended
    /// threshold not after `year`. `None` when nothing matches.
    pub fn get(&self, year: u32) -> Option<&T> {
        match self {
            YearTable::Indexed(values) => {
                let index = usize::try_from(year).ok()?.checked_sub(1)?;
                values.get(index)
            }
            YearTable::Keyed(entries) => {
                let exact = entries
                    .iter()
                    .find(|(key, _)| matches!(key, YearKey::Single(y) if *y == year));
                let range = || {
                    entries
                        .iter()
                        .find(|(key, _)| matches!(key, YearKey::Range { .. }) && key.matches(year))
                };
                let open_ended = || {
                    entries
                        .iter()
                        .filter_map(|(key, value)| match key {
                            YearKey::From(threshold) if *threshold <= year => Some((*threshold, value)),
                            _ => None,
                        })
                        .max_by_key(|(threshold, _)| *threshold)
                        .map(|(_, value)| value)
                };
                exact.map(|(_, value)| value).or_else(|| range().map(|(_, value)| value)).or_else(open_ended)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            YearTable::Indexed(values) => values.is_empty(),
            YearTable::Keyed(entries) => entries.is_empty(),
        }
    }
}

impl<T: Clone> YearTable<T> {
    /// Lookup with a caller-chosen default for unmatched years
    pub fn get_or(&self, year: u32, default: T) -> T {
        self.get(year).cloned().unwrap_or(default)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for YearTable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| serde_yaml::from_value(item).map_err(D::Error::custom))
                .collect::<Result<Vec<T>, _>>()
                .map(YearTable::Indexed),
            Value::Mapping(entries) => entries
                .into_iter()
                .map(|(key, value)| {
                    let key = match key {
                        Value::Number(n) => n
                            .as_u64()
                            .and_then(|year| u32::try_from(year).ok())
                            .map(YearKey::Single)
                            .ok_or_else(|| D::Error::custom(format!("invalid year key {n}")))?,
                        Value::String(text) => text.parse().map_err(D::Error::custom)?,
                        other => {
                            return Err(D::Error::custom(format!("invalid year key {other:?}")))
                        }
                    };
                    let value = serde_yaml::from_value(value).map_err(D::Error::custom)?;
                    Ok((key, value))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(YearTable::Keyed),
            Value::Null => Ok(YearTable::default()),
            other => Err(D::Error::custom(format!(
                "expected a list or a year-keyed mapping, found {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(text: &str) -> YearTable<f64> {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_indexed_lookup() {
        let rates = table("[0.05, 0.03, 0.02]");
        assert_eq!(rates.get(2), Some(&0.03));
        assert_eq!(rates.get(5), None);
        assert_eq!(rates.get(0), None);
        assert_eq!(rates.get_or(5, 0.04), 0.04);
    }

    #[test]
    fn test_range_and_open_ended() {
        let rates = table("{'1-3': 0.1, '4+': 0.2}");
        assert_eq!(rates.get(2), Some(&0.1));
        assert_eq!(rates.get(4), Some(&0.2));
        assert_eq!(rates.get(40), Some(&0.2));
    }

    #[test]
    fn test_precedence() {
        // exact beats range beats open-ended
        let rates = table("{'2+': 0.01, '1-5': 0.02, 3: 0.03}");
        assert_eq!(rates.get(3), Some(&0.03));
        assert_eq!(rates.get(4), Some(&0.02));
        assert_eq!(rates.get(6), Some(&0.01));
        assert_eq!(rates.get(1), Some(&0.02));
    }

    #[test]
    fn test_largest_threshold_wins() {
        let rates = table("{'2+': 0.05, '10+': 0.02}");
        assert_eq!(rates.get(1), None);
        assert_eq!(rates.get(5), Some(&0.05));
        assert_eq!(rates.get(12), Some(&0.02));
    }

    #[test]
    fn test_string_single_year_key() {
        let rates = table("{'7': 0.5}");
        assert_eq!(rates.get(7), Some(&0.5));
        assert_eq!(rates.get(8), None);
    }

    #[test]
    fn test_malformed_keys_rejected() {
        assert!(serde_yaml::from_str::<YearTable<f64>>("{'5-2': 0.1}").is_err());
        assert!(serde_yaml::from_str::<YearTable<f64>>("{'soon': 0.1}").is_err());
        assert!(serde_yaml::from_str::<YearTable<f64>>("0.1").is_err());
    }

    #[test]
    fn test_key_display() {
        assert_eq!("1-3".parse::<YearKey>().unwrap().to_string(), "1-3");
        assert_eq!("4+".parse::<YearKey>().unwrap(), YearKey::From(4));
    }
}
