use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::index::ArchiveIndex;
use crate::manifest::DayKey;
use crate::record::Record;

/// Trade totals accumulated over one or more archive files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayStats {
    pub files: u64,
    pub buys: u64,
    pub sells: u64,
    pub skipped: u64,
    /// Traded value per quote currency.
    pub volume: BTreeMap<String, f64>,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
}

impl DayStats {
    pub fn trades(&self) -> u64 {
        self.buys + self.sells
    }

    pub fn add(&mut self, record: &Record) {
        if record.is_sell {
            self.sells += 1;
        } else {
            self.buys += 1;
        }
        *self.volume.entry(record.pair.quote().to_string()).or_default() += record.notional();
        self.first = Some(self.first.map_or(record.timestamp, |t| t.min(record.timestamp)));
        self.last = Some(self.last.map_or(record.timestamp, |t| t.max(record.timestamp)));
    }

    pub fn merge(&mut self, other: DayStats) {
        self.files += other.files;
        self.buys += other.buys;
        self.sells += other.sells;
        self.skipped += other.skipped;
        for (quote, value) in other.volume {
            *self.volume.entry(quote).or_default() += value;
        }
        self.first = match (self.first, other.first) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.last = match (self.last, other.last) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

pub fn print_index_summary(index: &ArchiveIndex) {
    let days = index.calendar().len();
    println!("\n========== Archive Index ==========");
    println!("  root:    {}", index.root().display());
    println!("  files:   {}", index.all_symbols().len());
    println!("  days:    {}", days);
    println!("  pairs:   {}", index.pairs().len());
    for year in index.years() {
        let months = index.months(year);
        let days: usize = months.iter().map(|m| index.days_of(year, *m).len()).sum();
        println!("  {}: {} months, {} days", year, months.len(), days);
    }
}

pub fn print_day_summary(day: DayKey, stats: &DayStats) {
    if stats.files == 0 {
        return;
    }
    let volume: Vec<String> = stats
        .volume
        .iter()
        .map(|(quote, value)| format!("{:.6} {}", value, quote))
        .collect();
    println!(
        "  {}: {:3} files | {:8} trades (buy {} / sell {}) | {} | skipped {}",
        day,
        stats.files,
        stats.trades(),
        stats.buys,
        stats.sells,
        volume.join(", "),
        stats.skipped
    );
}
