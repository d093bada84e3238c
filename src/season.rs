use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PipelineError;

pub const DEFAULT_FIRST_SEASON: i32 = 1999;
pub const DEFAULT_LAST_SEASON: i32 = 2023;

/// NBA season identified by the calendar year it starts in.
/// Displays and parses as the usual `"1999-00"` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Season {
    start_year: i32,
}

impl Season {
    pub const fn new(start_year: i32) -> Self {
        Self { start_year }
    }

    pub fn start_year(self) -> i32 {
        self.start_year
    }

    pub fn label(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = (self.start_year + 1).rem_euclid(100);
        write!(f, "{}-{:02}", self.start_year, end)
    }
}

impl FromStr for Season {
    type Err = PipelineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let invalid = || PipelineError::InvalidConfig(format!("invalid season label {raw:?}"));

        let (start, end) = match trimmed.split_once('-') {
            Some((start, end)) => (start, Some(end)),
            None => (trimmed, None),
        };
        if start.len() != 4 {
            return Err(invalid());
        }
        let start_year = start.parse::<i32>().map_err(|_| invalid())?;
        if let Some(end) = end {
            let expected = (start_year + 1).rem_euclid(100);
            let parsed = end.parse::<i32>().map_err(|_| invalid())?;
            let matches = match end.len() {
                2 => parsed == expected,
                4 => parsed == start_year + 1,
                _ => false,
            };
            if !matches {
                return Err(invalid());
            }
        }
        Ok(Self::new(start_year))
    }
}

impl Serialize for Season {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Season {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Inclusive range of seasons, e.g. `1999-00..2023-24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonRange {
    pub first: Season,
    pub last: Season,
}

impl SeasonRange {
    pub fn new(first: Season, last: Season) -> Result<Self, PipelineError> {
        if first > last {
            return Err(PipelineError::InvalidConfig(format!(
                "season range {first}..{last} is reversed"
            )));
        }
        Ok(Self { first, last })
    }

    pub fn seasons(&self) -> Vec<Season> {
        (self.first.start_year()..=self.last.start_year())
            .map(Season::new)
            .collect()
    }

    pub fn contains(&self, season: Season) -> bool {
        season >= self.first && season <= self.last
    }
}

impl Default for SeasonRange {
    fn default() -> Self {
        Self {
            first: Season::new(DEFAULT_FIRST_SEASON),
            last: Season::new(DEFAULT_LAST_SEASON),
        }
    }
}

impl fmt::Display for SeasonRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.first, self.last)
    }
}

impl FromStr for SeasonRange {
    type Err = PipelineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        match trimmed.split_once("..") {
            Some((first, last)) => {
                let last = last.strip_prefix('=').unwrap_or(last);
                Self::new(first.parse()?, last.parse()?)
            }
            None => {
                let single = trimmed.parse::<Season>()?;
                Self::new(single, single)
            }
        }
    }
}
