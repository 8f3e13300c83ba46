use flate2::read::GzDecoder;
use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};
use crate::manifest::{ArchiveLayout, DayKey};
use crate::record::{self, Record, TimestampZone};
use crate::symbol_resolver::{Pair, SymbolResolver};

pub type Calendar = BTreeMap<DayKey, Vec<String>>;

/// Symbol list of one day, created empty on first use.
pub fn day_slot(calendar: &mut Calendar, day: DayKey) -> &mut Vec<String> {
    calendar.entry(day).or_default()
}

/// Decoded line stream of one archive file.
///
/// Only handed out by [`ArchiveIndex::for_symbol`] and closed when the
/// visitor returns.
pub struct ArchiveReader {
    path: PathBuf,
    inner: BufReader<GzDecoder<File>>,
}

impl ArchiveReader {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            inner: BufReader::new(GzDecoder::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&mut self) -> impl Iterator<Item = Result<String>> + '_ {
        let path = &self.path;
        self.inner.by_ref().lines().map(move |line| {
            line.map_err(|source| ArchiveError::Io {
                path: path.clone(),
                source,
            })
        })
    }

    /// Remaining lines of the file run through [`ArchiveIndex::parse_line`].
    pub fn records<'a>(&'a mut self, index: &'a ArchiveIndex) -> impl Iterator<Item = Result<Record>> + 'a {
        self.lines().map(move |line| index.parse_line(&line?))
    }
}

impl Read for ArchiveReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Calendar index over a Bittrex trade archive.
///
/// Built once from a manifest listing every archive file; read-only afterwards.
#[derive(Debug)]
pub struct ArchiveIndex {
    root: PathBuf,
    layout: ArchiveLayout,
    zone: TimestampZone,
    calendar: Calendar,
    all_symbols: Vec<String>,
    symbol_to_pair: FxHashMap<String, Pair>,
}

impl ArchiveIndex {
    fn empty(config: &ArchiveConfig) -> Result<Self> {
        Ok(Self {
            root: config.root_dir.clone(),
            layout: config.layout()?,
            zone: config.timestamp_zone()?,
            calendar: Calendar::new(),
            all_symbols: Vec::new(),
            symbol_to_pair: FxHashMap::default(),
        })
    }

    fn add_entry(&mut self, path: &str) -> Result<()> {
        let entry = self.layout.parse_entry(path)?;
        day_slot(&mut self.calendar, entry.day_key()).push(entry.symbol.clone());
        self.all_symbols.push(entry.symbol);
        Ok(())
    }

    fn resolve(mut self, resolver: &SymbolResolver) -> Result<Self> {
        self.symbol_to_pair = resolver.build(self.all_symbols.as_slice())?;
        info!(
            "Indexed {} archive files over {} days ({} pairs)",
            self.all_symbols.len(),
            self.calendar.len(),
            self.symbol_to_pair.len()
        );
        Ok(self)
    }

    /// Builds the index from manifest paths, failing on the first bad one.
    pub fn from_lines<I, S>(lines: I, config: &ArchiveConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::empty(config)?;
        for line in lines {
            index.add_entry(line.as_ref())?;
        }
        index.resolve(&config.resolver())
    }

    /// Builds the index from a header-less, single-column manifest.
    /// Blank lines are skipped.
    pub fn from_reader<R: Read>(reader: R, config: &ArchiveConfig) -> Result<Self> {
        let mut manifest = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut index = Self::empty(config)?;
        for row in manifest.records() {
            let row = row?;
            if row.len() != 1 {
                let line = row.iter().collect::<Vec<_>>().join(",");
                return Err(ArchiveError::malformed_path(&line, "expected one path per line"));
            }
            index.add_entry(&row[0])?;
        }
        index.resolve(&config.resolver())
    }

    pub fn from_file(path: &Path, config: &ArchiveConfig) -> Result<Self> {
        let file = File::open(path).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), config)
    }

    pub fn from_config(config: &ArchiveConfig) -> Result<Self> {
        Self::from_file(config.manifest_path(), config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn days(&self) -> impl Iterator<Item = DayKey> + '_ {
        self.calendar.keys().copied()
    }

    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.days().map(|d| d.year).collect();
        years.dedup();
        years
    }

    pub fn months(&self, year: i32) -> Vec<u32> {
        let mut months: Vec<u32> = self
            .calendar
            .range(DayKey::new(year, 0, 0)..=DayKey::new(year, u32::MAX, u32::MAX))
            .map(|(d, _)| d.month)
            .collect();
        months.dedup();
        months
    }

    pub fn days_of(&self, year: i32, month: u32) -> Vec<u32> {
        self.calendar
            .range(DayKey::new(year, month, 0)..=DayKey::new(year, month, u32::MAX))
            .map(|(d, _)| d.day)
            .collect()
    }

    /// Symbols listed for one day, in manifest order. Empty for unknown days.
    pub fn symbols_on(&self, year: i32, month: u32, day: u32) -> &[String] {
        self.calendar
            .get(&DayKey::new(year, month, day))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn all_symbols(&self) -> &[String] {
        &self.all_symbols
    }

    pub fn pairs(&self) -> &FxHashMap<String, Pair> {
        &self.symbol_to_pair
    }

    pub fn pair(&self, symbol: &str) -> Option<&Pair> {
        self.symbol_to_pair.get(&symbol.to_lowercase())
    }

    pub fn file_path(&self, symbol: &str, year: i32, month: u32, day: u32) -> PathBuf {
        self.root
            .join(self.layout.build_file_path(symbol, year, month, day))
    }

    pub fn for_each_day<E, F>(&self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(DayKey) -> Result<(), E>,
    {
        for day in self.days() {
            visit(day)?;
        }
        Ok(())
    }

    pub fn for_each_symbol_on_day<E, F>(&self, year: i32, month: u32, day: u32, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&str) -> Result<(), E>,
    {
        for symbol in self.symbols_on(year, month, day) {
            visit(symbol)?;
        }
        Ok(())
    }

    /// Opens the archive file of one symbol/day and hands its decoded stream
    /// to `visit`. The file is closed before this returns.
    pub fn for_symbol<T, E, F>(&self, year: i32, month: u32, day: u32, symbol: &str, visit: F) -> Result<T, E>
    where
        E: From<ArchiveError>,
        F: FnOnce(&mut ArchiveReader) -> Result<T, E>,
    {
        let path = self.file_path(symbol, year, month, day);
        if !path.is_file() {
            return Err(ArchiveError::MissingArchiveFile { path }.into());
        }
        let mut reader = ArchiveReader::open(&path)?;
        debug!("Opened {}", path.display());
        visit(&mut reader)
    }

    /// Calls `f` with the decoded file of every symbol listed on one day.
    pub fn process_day<E, F>(&self, year: i32, month: u32, day: u32, mut f: F) -> Result<(), E>
    where
        E: From<ArchiveError>,
        F: FnMut(DayKey, &str, &mut ArchiveReader) -> Result<(), E>,
    {
        let key = DayKey::new(year, month, day);
        for symbol in self.symbols_on(year, month, day) {
            self.for_symbol(year, month, day, symbol, |reader| f(key, symbol, reader))?;
        }
        Ok(())
    }

    /// Calls `f` with the decoded file of every symbol of every day, in
    /// calendar order.
    pub fn process_all<E, F>(&self, mut f: F) -> Result<(), E>
    where
        E: From<ArchiveError>,
        F: FnMut(DayKey, &str, &mut ArchiveReader) -> Result<(), E>,
    {
        for day in self.days() {
            self.process_day(day.year, day.month, day.day, &mut f)?;
        }
        Ok(())
    }

    /// [`process_all`](Self::process_all) with days spread over the current
    /// rayon pool. Stops at the first error; visiting order is unspecified.
    pub fn par_process_all<E, F>(&self, f: F) -> Result<(), E>
    where
        E: From<ArchiveError> + Send,
        F: Fn(DayKey, &str, &mut ArchiveReader) -> Result<(), E> + Sync,
    {
        let days: Vec<DayKey> = self.days().collect();
        days.par_iter()
            .try_for_each(|day| self.process_day(day.year, day.month, day.day, &f))
    }

    /// Parses one raw archive line into a [`Record`].
    pub fn parse_line(&self, line: &str) -> Result<Record> {
        record::parse_line(line, &self.symbol_to_pair, self.zone)
    }
}
