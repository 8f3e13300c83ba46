use chrono::{DateTime, FixedOffset, NaiveDateTime};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::{ArchiveError, Result};
use crate::symbol_resolver::Pair;

/// Number of comma-separated fields on an archive line:
/// `id,exchange,symbol,timestampMillis,price,amount,sellFlag`.
pub const FIELD_COUNT: usize = 7;

/// Zone the epoch timestamps of the archive are rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampZone {
    /// The host's local time zone.
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl TimestampZone {
    /// `None` selects the local zone. Offsets beyond ±24h are rejected.
    pub fn from_offset_secs(secs: Option<i32>) -> Option<Self> {
        match secs {
            None => Some(TimestampZone::Local),
            Some(0) => Some(TimestampZone::Utc),
            Some(secs) => FixedOffset::east_opt(secs).map(TimestampZone::Fixed),
        }
    }

    /// Wall-clock time of an epoch timestamp in milliseconds.
    pub fn to_naive(&self, millis: i64) -> Option<NaiveDateTime> {
        let utc = DateTime::from_timestamp_millis(millis)?;
        Some(match self {
            TimestampZone::Local => utc.with_timezone(&chrono::Local).naive_local(),
            TimestampZone::Utc => utc.naive_utc(),
            TimestampZone::Fixed(offset) => utc.with_timezone(offset).naive_local(),
        })
    }
}

/// One trade tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: i64,
    pub exchange: String,
    pub symbol: String,
    pub raw_timestamp_millis: i64,
    /// In the quote currency.
    pub price: f64,
    /// In the base currency.
    pub amount: f64,
    pub is_sell: bool,
    pub timestamp: NaiveDateTime,
    pub pair: Pair,
}

impl Record {
    pub fn notional(&self) -> f64 {
        self.price * self.amount
    }
}

/// Parses one raw archive line. A trailing line terminator is ignored.
pub fn parse_line(line: &str, pairs: &FxHashMap<String, Pair>, zone: TimestampZone) -> Result<Record> {
    let line = line.trim_end_matches(['\n', '\r']);
    let fields: Vec<&str> = line.split(',').collect();
    parse_fields(line, &fields, pairs, zone)
}

fn parse_fields(
    line: &str,
    fields: &[&str],
    pairs: &FxHashMap<String, Pair>,
    zone: TimestampZone,
) -> Result<Record> {
    let [id, exchange, symbol, millis, price, amount, sell] = fields else {
        return Err(ArchiveError::malformed_record(
            line,
            format!("expected {} fields, found {}", FIELD_COUNT, fields.len()),
        ));
    };

    let id = parse_int(line, id, "id")?;
    let raw_timestamp_millis = parse_int(line, millis, "timestamp")?;
    let price = parse_decimal(line, price, "price")?;
    let amount = parse_decimal(line, amount, "amount")?;
    let is_sell = match *sell {
        "true" => true,
        "false" => false,
        other => {
            return Err(ArchiveError::malformed_record(
                line,
                format!("sell flag must be 'true' or 'false', got '{}'", other),
            ));
        }
    };
    let timestamp = zone.to_naive(raw_timestamp_millis).ok_or_else(|| {
        ArchiveError::malformed_record(line, format!("timestamp {} is out of range", raw_timestamp_millis))
    })?;
    let pair = pairs
        .get(&symbol.to_lowercase())
        .cloned()
        .ok_or_else(|| ArchiveError::unresolved(symbol))?;

    Ok(Record {
        id,
        exchange: exchange.to_string(),
        symbol: symbol.to_string(),
        raw_timestamp_millis,
        price,
        amount,
        is_sell,
        timestamp,
        pair,
    })
}

fn parse_int(line: &str, value: &str, field: &str) -> Result<i64> {
    value
        .parse::<i64>()
        .map_err(|e| ArchiveError::malformed_record(line, format!("{} '{}': {}", field, value, e)))
}

fn parse_decimal(line: &str, value: &str, field: &str) -> Result<f64> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(ArchiveError::malformed_record(
            line,
            format!("{} '{}' is not a finite number", field, value),
        )),
        Err(e) => Err(ArchiveError::malformed_record(
            line,
            format!("{} '{}': {}", field, value, e),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol_resolver::SymbolResolver;
    use chrono::{NaiveDate, TimeZone, Timelike};

    const LINE: &str = "35728026,bt,maidbtc,1503014482990,0.00009897,500,false";

    fn pairs() -> FxHashMap<String, Pair> {
        SymbolResolver::default()
            .build(&["MAIDBTC", "XZCBTC"])
            .unwrap()
    }

    fn new_york_summer() -> TimestampZone {
        TimestampZone::from_offset_secs(Some(-4 * 3600)).unwrap()
    }

    #[test]
    fn test_parse_line() {
        let record = parse_line(LINE, &pairs(), new_york_summer()).unwrap();

        assert_eq!(record.id, 35728026);
        assert_eq!(record.exchange, "bt");
        assert_eq!(record.symbol, "maidbtc");
        assert_eq!(record.raw_timestamp_millis, 1503014482990);
        assert!((record.price - 0.00009897).abs() < 1e-4);
        assert!((record.amount - 500.0).abs() < 1e-4);
        assert!(!record.is_sell);
        assert_eq!(
            record.timestamp,
            NaiveDate::from_ymd_opt(2017, 8, 17)
                .unwrap()
                .and_hms_milli_opt(20, 1, 22, 990)
                .unwrap()
        );
        assert_eq!(record.timestamp.nanosecond() / 1_000, 990_000);
        assert_eq!(record.pair.base(), "MAID");
        assert_eq!(record.pair.quote(), "BTC");
    }

    #[test]
    fn test_local_zone() {
        let record = parse_line(LINE, &pairs(), TimestampZone::Local).unwrap();
        let expected = chrono::Local
            .timestamp_millis_opt(1503014482990)
            .unwrap()
            .naive_local();
        assert_eq!(record.timestamp, expected);
    }

    #[test]
    fn test_utc_zone() {
        let record = parse_line(LINE, &pairs(), TimestampZone::Utc).unwrap();
        assert_eq!(record.timestamp.to_string(), "2017-08-18 00:01:22.990");
    }

    #[test]
    fn test_sell_and_uppercase_symbol() {
        let line = "1,bt,XZCBTC,1481000000000,0.0012,3.5,true\r\n";
        let record = parse_line(line, &pairs(), TimestampZone::Utc).unwrap();
        assert!(record.is_sell);
        assert_eq!(record.symbol, "XZCBTC");
        assert_eq!(record.pair.to_string(), "XZC/BTC");
        assert!((record.notional() - 0.0042).abs() < 1e-9);
    }

    #[test]
    fn test_sell_flag_literals_only() {
        for flag in ["TRUE", "False", "1", "0", "yes", "", " true"] {
            let line = format!("35728026,bt,maidbtc,1503014482990,0.00009897,500,{}", flag);
            assert!(
                matches!(
                    parse_line(&line, &pairs(), TimestampZone::Utc),
                    Err(ArchiveError::MalformedRecord { .. })
                ),
                "flag '{}' should be rejected",
                flag
            );
        }
    }

    #[test]
    fn test_field_count() {
        for line in [
            "35728026,bt,maidbtc,1503014482990,0.00009897,500",
            "35728026,bt,maidbtc,1503014482990,0.00009897,500,false,extra",
            "",
        ] {
            assert!(matches!(
                parse_line(line, &pairs(), TimestampZone::Utc),
                Err(ArchiveError::MalformedRecord { .. })
            ));
        }
    }

    #[test]
    fn test_bad_numbers() {
        for line in [
            "x,bt,maidbtc,1503014482990,0.00009897,500,false",
            "1.5,bt,maidbtc,1503014482990,0.00009897,500,false",
            "35728026,bt,maidbtc,1503014482.990,0.00009897,500,false",
            "35728026,bt,maidbtc,1503014482990,abc,500,false",
            "35728026,bt,maidbtc,1503014482990,0.00009897,,false",
            "35728026,bt,maidbtc,1503014482990,NaN,500,false",
            "35728026,bt,maidbtc,1503014482990,0.00009897,inf,false",
            "35728026,bt,maidbtc,9223372036854775807,0.00009897,500,false",
        ] {
            assert!(
                matches!(
                    parse_line(line, &pairs(), TimestampZone::Utc),
                    Err(ArchiveError::MalformedRecord { .. })
                ),
                "{} should be rejected",
                line
            );
        }
    }

    #[test]
    fn test_unknown_symbol() {
        let line = "35728026,bt,ltcbtc,1503014482990,0.00009897,500,false";
        match parse_line(line, &pairs(), TimestampZone::Utc) {
            Err(ArchiveError::UnresolvedSymbol { symbol }) => assert_eq!(symbol, "ltcbtc"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_zone_from_offset() {
        assert_eq!(TimestampZone::from_offset_secs(None), Some(TimestampZone::Local));
        assert_eq!(TimestampZone::from_offset_secs(Some(0)), Some(TimestampZone::Utc));
        assert!(TimestampZone::from_offset_secs(Some(3600)).is_some());
        assert!(TimestampZone::from_offset_secs(Some(86_400)).is_none());
    }
}
