//! CSV ingestion for backtest history.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::info;

use common::{Candle, Error, MarketData, Result};

const TIMESTAMP: &[&str] = &["timestamp", "time", "datetime", "date"];
const OPEN: &[&str] = &["open", "o"];
const HIGH: &[&str] = &["high", "h"];
const LOW: &[&str] = &["low", "l"];
const CLOSE: &[&str] = &["close", "c"];
const VOLUME: &[&str] = &["volume", "vol", "v"];
const TICK_COUNT: &[&str] = &["tick_count", "ticks", "tickcount"];
const BID: &[&str] = &["bid"];
const OFFER: &[&str] = &["offer"];

/// Header lookup by case-insensitive name.
struct Columns(HashMap<String, usize>);

impl Columns {
    fn new(headers: &csv::StringRecord) -> Self {
        Self(
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.trim().to_lowercase(), i))
                .collect(),
        )
    }

    fn find(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|a| self.0.get(*a).copied())
    }

    /// Resolve every required column or name all the missing ones.
    fn require<const N: usize>(&self, wanted: [(&str, &[&str]); N]) -> Result<[usize; N]> {
        let found = wanted.map(|(_, aliases)| self.find(aliases));
        let missing: Vec<&str> = wanted
            .iter()
            .zip(found.iter())
            .filter(|(_, idx)| idx.is_none())
            .map(|((name, _), _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "CSV missing required columns: {}",
                missing.join(", ")
            )));
        }
        Ok(found.map(|idx| idx.unwrap_or_default()))
    }
}

/// True for a trailing `Z`, any `+hh:mm` offset, or a `-hh:mm` suffix.
fn has_zone(ts: &str) -> bool {
    if ts.ends_with('Z') || ts.contains('+') {
        return true;
    }
    let tail = ts.len().checked_sub(6).and_then(|start| ts.get(start..));
    matches!(tail.map(str::as_bytes), Some([b'-', h1, h2, b':', m1, m2])
        if [h1, h2, m1, m2].iter().all(|b| b.is_ascii_digit()))
}

/// Timestamps without a zone designator are UTC; make that explicit.
fn normalize_timestamp(ts: &str) -> String {
    if has_zone(ts) {
        ts.to_string()
    } else {
        format!("{ts}Z")
    }
}

fn field<'r>(row: &'r csv::StringRecord, idx: Option<usize>) -> &'r str {
    idx.and_then(|i| row.get(i)).map(str::trim).unwrap_or("")
}

fn number(value: &str, column: &str, line: u64) -> Result<f64> {
    if value.is_empty() {
        return Ok(0.0);
    }
    value
        .parse()
        .map_err(|_| Error::Config(format!("line {line}: invalid {column} '{value}'")))
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input)
}

/// Read OHLC candles, plus optional volume and tick count columns.
pub fn read_candles<R: Read>(input: R) -> Result<Vec<Candle>> {
    let mut rdr = reader(input);
    let cols = Columns::new(rdr.headers()?);
    let [ts_i, open_i, high_i, low_i, close_i] = cols.require([
        ("timestamp", TIMESTAMP),
        ("open", OPEN),
        ("high", HIGH),
        ("low", LOW),
        ("close", CLOSE),
    ])?;
    let vol_i = cols.find(VOLUME);
    let ticks_i = cols.find(TICK_COUNT);

    let mut candles = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let line = row.position().map_or(0, |p| p.line());
        let ts = field(&row, Some(ts_i));
        if ts.is_empty() {
            continue;
        }
        let candle = Candle::new(
            normalize_timestamp(ts),
            number(field(&row, Some(open_i)), "open", line)?,
            number(field(&row, Some(high_i)), "high", line)?,
            number(field(&row, Some(low_i)), "low", line)?,
            number(field(&row, Some(close_i)), "close", line)?,
        )
        .with_volume(number(field(&row, vol_i), "volume", line)?)
        .with_tick_count(number(field(&row, ticks_i), "tick_count", line)? as u64);
        candles.push(candle);
    }
    Ok(candles)
}

/// Read bid/offer ticks for `epic`.
pub fn read_ticks<R: Read>(input: R, epic: &str) -> Result<Vec<MarketData>> {
    let mut rdr = reader(input);
    let cols = Columns::new(rdr.headers()?);
    let [ts_i, bid_i, offer_i] = cols.require([
        ("timestamp", TIMESTAMP),
        ("bid", BID),
        ("offer", OFFER),
    ])?;

    let mut ticks = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let line = row.position().map_or(0, |p| p.line());
        let ts = field(&row, Some(ts_i));
        if ts.is_empty() {
            continue;
        }
        let bid = number(field(&row, Some(bid_i)), "bid", line)?;
        let offer = number(field(&row, Some(offer_i)), "offer", line)?;
        ticks.push(MarketData {
            epic: epic.to_string(),
            bid,
            offer,
            timestamp: normalize_timestamp(ts),
            raw: serde_json::json!({ "bid": bid, "offer": offer }),
        });
    }
    Ok(ticks)
}

pub fn load_candles_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let candles = read_candles(File::open(path)?)?;
    info!(path = %path.display(), candles = candles.len(), "Loaded candle CSV");
    Ok(candles)
}

pub fn load_ticks_csv(path: impl AsRef<Path>, epic: &str) -> Result<Vec<MarketData>> {
    let path = path.as_ref();
    let ticks = read_ticks(File::open(path)?, epic)?;
    info!(path = %path.display(), epic = %epic, ticks = ticks.len(), "Loaded tick CSV");
    Ok(ticks)
}
