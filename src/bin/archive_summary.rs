use anyhow::{Context, Result};
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use bittrex_archive::config::config_path;
use bittrex_archive::display::{DayStats, print_day_summary, print_index_summary};
use bittrex_archive::*;

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(config_path);
    let cfg = load_config(&path).with_context(|| format!("loading {}", path.display()))?;

    let index = ArchiveIndex::from_config(&cfg).context("building archive index")?;
    print_index_summary(&index);

    let per_day: Mutex<BTreeMap<DayKey, DayStats>> = Mutex::new(BTreeMap::new());
    let summarize = || {
        index.par_process_all(|day, symbol, reader| -> Result<()> {
            let mut stats = DayStats {
                files: 1,
                ..DayStats::default()
            };
            for record in reader.records(&index) {
                match record {
                    Ok(record) => stats.add(&record),
                    // a bad line only costs that line
                    Err(e @ (ArchiveError::MalformedRecord { .. } | ArchiveError::UnresolvedSymbol { .. })) => {
                        warn!("{} {}: skipping line: {}", day, symbol, e);
                        stats.skipped += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            per_day
                .lock()
                .map_err(|_| anyhow::anyhow!("day stats lock poisoned"))?
                .entry(day)
                .or_default()
                .merge(stats);
            Ok(())
        })
    };

    let start = std::time::Instant::now();
    match cfg.thread_pool()? {
        Some(pool) => pool.install(summarize)?,
        None => summarize()?,
    }
    info!("Processed archive in {:.2}s", start.elapsed().as_secs_f64());

    let per_day = per_day
        .into_inner()
        .map_err(|_| anyhow::anyhow!("day stats lock poisoned"))?;

    println!("\n========== Trades per Day ==========");
    let mut total = DayStats::default();
    for (day, stats) in per_day {
        print_day_summary(day, &stats);
        total.merge(stats);
    }
    println!(
        "\nTotal: {} trades in {} files, {} lines skipped",
        total.trades(),
        total.files,
        total.skipped
    );
    Ok(())
}
