use anyhow::{Context, Result, bail};
use log::warn;
use std::io::Write;
use std::path::Path;

use bittrex_archive::*;

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 4 {
        bail!("usage: archive_dump <config.yaml> <YYYY-MM-DD> <SYMBOL>");
    }
    let cfg = load_config(Path::new(&args[1])).with_context(|| format!("loading {}", args[1]))?;
    let day: DayKey = args[2]
        .parse()
        .with_context(|| format!("invalid date '{}'", args[2]))?;

    let index = ArchiveIndex::from_config(&cfg).context("building archive index")?;

    // archive paths use the manifest's spelling of the symbol
    let symbol = match index
        .symbols_on(day.year, day.month, day.day)
        .iter()
        .find(|s| s.eq_ignore_ascii_case(&args[3]))
    {
        Some(listed) => listed.as_str(),
        None => {
            warn!("{} is not listed for {} in the manifest", args[3], day);
            args[3].as_str()
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    index.for_symbol(day.year, day.month, day.day, symbol, |reader| -> Result<()> {
        for record in reader.records(&index) {
            serde_json::to_writer(&mut out, &record?)?;
            writeln!(out)?;
        }
        Ok(())
    })?;
    Ok(())
}
