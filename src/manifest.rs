use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

use crate::error::{ArchiveError, Result};

pub const DEFAULT_PREFIX: &str = "Bittrex";

pub const FILE_EXTENSION: &str = "csv.gz";

/// Calendar key of one archive day. Orders by year, then month, then day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl DayKey {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl FromStr for DayKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
        Ok(Self::new(date.year(), date.month(), date.day()))
    }
}

/// One parsed manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub symbol: String,
}

impl ManifestEntry {
    pub fn day_key(&self) -> DayKey {
        DayKey::new(self.year, self.month, self.day)
    }
}

/// Naming scheme of the archive:
/// `<Prefix>/<SYMBOL>/<YYYY>_<MM>/<Prefix>_<SYMBOL>_trades_<YYYY>_<MM>_<DD>.csv.gz`
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    prefix: String,
    file_name: Regex,
}

impl ArchiveLayout {
    pub fn new(prefix: &str) -> Result<Self> {
        if prefix.is_empty() || prefix.contains('/') {
            return Err(ArchiveError::InvalidConfig(format!(
                "archive prefix '{}' must be a non-empty single path segment",
                prefix
            )));
        }
        let pattern = format!(
            r"^{}_([^_]+)_trades_([0-9]+)_([0-9]+)_([0-9]+)\.csv\.gz$",
            regex::escape(prefix)
        );
        let file_name = Regex::new(&pattern)
            .map_err(|e| ArchiveError::InvalidConfig(format!("bad file name pattern: {}", e)))?;

        Ok(Self {
            prefix: prefix.to_string(),
            file_name,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Splits a manifest path into its date and symbol components.
    ///
    /// The path must be exactly the one [`build_file_path`](Self::build_file_path)
    /// gives back for the parsed entry, directories and zero padding included.
    pub fn parse_entry(&self, path: &str) -> Result<ManifestEntry> {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != 4 {
            return Err(ArchiveError::malformed_path(
                path,
                format!("expected 4 path segments, found {}", parts.len()),
            ));
        }

        let caps = self.file_name.captures(parts[3]).ok_or_else(|| {
            ArchiveError::malformed_path(
                path,
                format!(
                    "file name doesn't match '{}_<SYMBOL>_trades_<YYYY>_<MM>_<DD>.{}'",
                    self.prefix, FILE_EXTENSION
                ),
            )
        })?;

        let entry = ManifestEntry {
            symbol: caps[1].to_string(),
            year: parse_number(path, &caps[2], "year")?,
            month: parse_number(path, &caps[3], "month")?,
            day: parse_number(path, &caps[4], "day")?,
        };

        let canonical = self.build_file_path(&entry.symbol, entry.year, entry.month, entry.day);
        if canonical != path {
            return Err(ArchiveError::malformed_path(
                path,
                format!("not in canonical form, expected '{}'", canonical),
            ));
        }
        Ok(entry)
    }

    /// Canonical archive-relative path of one symbol/day file.
    pub fn build_file_path(&self, symbol: &str, year: i32, month: u32, day: u32) -> String {
        let prefix = &self.prefix;
        format!(
            "{prefix}/{symbol}/{year}_{month:02}/{prefix}_{symbol}_trades_{year}_{month:02}_{day:02}.{FILE_EXTENSION}"
        )
    }
}

impl Default for ArchiveLayout {
    fn default() -> Self {
        DEFAULT_LAYOUT.clone()
    }
}

static DEFAULT_LAYOUT: Lazy<ArchiveLayout> = Lazy::new(|| {
    ArchiveLayout::new(DEFAULT_PREFIX)
        .unwrap_or_else(|e| panic!("Failed to build default archive layout: {}", e))
});

/// [`ArchiveLayout::parse_entry`] with the `Bittrex` layout.
pub fn parse_entry(path: &str) -> Result<ManifestEntry> {
    DEFAULT_LAYOUT.parse_entry(path)
}

pub fn build_file_path(symbol: &str, year: i32, month: u32, day: u32) -> String {
    DEFAULT_LAYOUT.build_file_path(symbol, year, month, day)
}

fn parse_number<T: FromStr>(path: &str, digits: &str, what: &str) -> Result<T> {
    digits
        .parse::<T>()
        .map_err(|_| ArchiveError::malformed_path(path, format!("{} '{}' is out of range", what, digits)))
}
